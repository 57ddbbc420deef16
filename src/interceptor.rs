use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use std::any::Any;
use std::error::Error;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::CapturedOutput;
use crate::config::RecorderConfig;
use crate::context::{self, RequestContext};
use crate::failure::{panic_exception, HandlerFailure};
use crate::formatter::{JsonPrettyFormatter, RecordFormatter};
use crate::record::{LogRecord, RecordBuilder, RequestMeta};
use crate::sink::{RecordSink, WriterSink};

/// Message of the synthesized failure response.
pub const FAILURE_MESSAGE: &str = "Something went wrong...";

/// Error type for the recording itself.
#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("failed to open sink: {0}")]
    Open(#[source] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("formatter failed: {0}")]
    Format(#[source] std::io::Error),

    #[error("failed to write record to sink: {0}")]
    Sink(#[source] Box<dyn Error + Send + Sync>),
}

/// Error returned by [`RequestInterceptor::process`].
#[derive(thiserror::Error, Debug)]
pub enum InterceptError {
    /// The handler failed and `reraise_failures` is set. Its record has
    /// already been written.
    #[error("handler failed: {0}")]
    Handler(HandlerFailure),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// How the handler finished.
enum Outcome<RB> {
    Returned(Option<Response<RB>>),
    Failed(HandlerFailure),
    Panicked(Box<dyn Any + Send>),
}

impl<RB> Outcome<RB> {
    fn from_result(result: Result<Option<Response<RB>>, HandlerFailure>) -> Self {
        match result {
            Ok(response) => Outcome::Returned(response),
            Err(failure) => Outcome::Failed(failure),
        }
    }
}

/// Wraps one request handler and writes one [`LogRecord`] per request.
pub struct RequestInterceptor {
    config: RecorderConfig,
    sink: Arc<dyn RecordSink>,
    formatter: Arc<dyn RecordFormatter>,
}

impl RequestInterceptor {
    /// Open the configured sink and build an interceptor around it.
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        let sink = WriterSink::open(&config.sink).map_err(RecorderError::Open)?;
        Ok(Self::with_sink(config, Arc::new(sink)))
    }

    /// Use `sink` instead of the one described by `config.sink`.
    pub fn with_sink(config: RecorderConfig, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config,
            sink,
            formatter: Arc::new(JsonPrettyFormatter),
        }
    }

    /// Formatter used when `pretty_print` is set.
    pub fn with_formatter(mut self, formatter: Arc<dyn RecordFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Run a synchronous handler for `request` and record it.
    ///
    /// The handler finds the request's [`RequestContext`] in the request
    /// extensions, and it is also current while the handler runs, for the
    /// `cprint!` macros. This holds inside an async request too: the
    /// innermost request owns the output.
    ///
    /// **Returns**
    /// - the handler's response, or the synthesized 500 JSON response when
    ///   it produced none or failed;
    /// - `Err(InterceptError::Handler)` for a failure when
    ///   `reraise_failures` is set;
    /// - `Err(InterceptError::Recorder)` when the record could not be
    ///   written. The response is not returned in that case.
    pub fn process<B, RB, H>(&self, mut request: Request<B>, handler: H) -> Result<Response<RB>, InterceptError>
    where
        H: FnOnce(Request<B>) -> Result<Option<Response<RB>>, HandlerFailure>,
        RB: From<String>,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let meta = RequestMeta::from_request(&request);

        let ctx = RequestContext::new(start);
        let capture = ctx.output().scope();
        request.extensions_mut().insert(ctx.clone());

        let outcome = match ctx.in_scope(|| panic::catch_unwind(AssertUnwindSafe(|| handler(request)))) {
            Ok(result) => Outcome::from_result(result),
            Err(payload) => Outcome::Panicked(payload),
        };
        let output = capture.release();
        self.finish(self.builder(started_at, start, meta, output, &ctx), outcome)
    }

    /// Async counterpart of [`process`](Self::process).
    ///
    /// The context is current for the handler future through a task-local,
    /// so interleaved requests on one thread keep separate captures.
    pub async fn process_async<B, RB, H, Fut>(
        &self,
        mut request: Request<B>,
        handler: H,
    ) -> Result<Response<RB>, InterceptError>
    where
        H: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<Option<Response<RB>>, HandlerFailure>>,
        RB: From<String>,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let meta = RequestMeta::from_request(&request);

        let ctx = RequestContext::new(start);
        let capture = ctx.output().scope();
        request.extensions_mut().insert(ctx.clone());

        let outcome = {
            let handling = AssertUnwindSafe(async move { handler(request).await }).catch_unwind();
            match context::scope(ctx.clone(), handling).await {
                Ok(result) => Outcome::from_result(result),
                Err(payload) => Outcome::Panicked(payload),
            }
        };
        let output = capture.release();
        self.finish(self.builder(started_at, start, meta, output, &ctx), outcome)
    }

    fn builder(
        &self,
        started_at: DateTime<Utc>,
        start: Instant,
        request: RequestMeta,
        output: CapturedOutput,
        ctx: &RequestContext,
    ) -> RecordBuilder {
        RecordBuilder {
            started_at,
            elapsed: start.elapsed(),
            request,
            status: None,
            from: self.config.from.clone(),
            pid: std::process::id(),
            output,
            events: ctx.timeline().record_events(),
            exception: None,
        }
    }

    /// Write the record, then settle the caller's result.
    fn finish<RB: From<String>>(
        &self,
        mut builder: RecordBuilder,
        outcome: Outcome<RB>,
    ) -> Result<Response<RB>, InterceptError> {
        let (response, failure, panic_payload) = match outcome {
            Outcome::Returned(response) => (response, None, None),
            Outcome::Failed(failure) => {
                builder.exception = Some(failure.exception().clone());
                (None, Some(failure), None)
            }
            Outcome::Panicked(payload) => {
                builder.exception = Some(panic_exception(&*payload));
                (None, None, Some(payload))
            }
        };
        builder.status = response.as_ref().map(|r| r.status().as_u16());

        let record = builder.build();
        if let Err(err) = self.emit(&record) {
            tracing::error!(
                error = %err,
                method = %record.request_method,
                path = %record.request,
                "failed to write request record"
            );
            return Err(err.into());
        }
        tracing::debug!(
            method = %record.request_method,
            path = %record.request,
            status = record.status,
            duration = record.duration,
            "request recorded"
        );

        if self.config.reraise_failures {
            if let Some(payload) = panic_payload {
                panic::resume_unwind(payload);
            }
            if let Some(failure) = failure {
                return Err(InterceptError::Handler(failure));
            }
        }

        Ok(response.unwrap_or_else(failure_response))
    }

    /// Serialize `record` and hand it to the sink as one payload, flushing
    /// the sink afterwards when `auto_flush` is set.
    pub fn emit(&self, record: &LogRecord) -> Result<(), RecorderError> {
        let mut payload = serde_json::to_string(record)?;
        let payload = if self.config.pretty_print {
            let parsed: serde_json::Value = serde_json::from_str(&payload)?;
            let mut out = Vec::new();
            self.formatter
                .format(&parsed, &mut out, &self.config.formatter_options)
                .map_err(RecorderError::Format)?;
            out
        } else {
            payload.push('\n');
            payload.into_bytes()
        };
        self.sink.send(&payload).map_err(RecorderError::Sink)?;
        if self.config.auto_flush {
            self.sink.flush().map_err(RecorderError::Sink)?;
        }
        Ok(())
    }
}

/// The 500 response returned when the handler produced none.
pub fn failure_response<RB: From<String>>() -> Response<RB> {
    let body = serde_json::json!({
        "status": 500,
        "message": FAILURE_MESSAGE,
    })
    .to_string();
    let mut response = Response::new(RB::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
