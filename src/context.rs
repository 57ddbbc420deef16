//! The per-request context handed to application code.
//!
//! A [`RequestContext`] is inserted into the request extensions before the
//! handler runs, and is also made *current* for the duration of the handler
//! through a tokio task-local: [`scope`] for async handlers and
//! [`RequestContext::in_scope`] for sync ones. Both install into the same slot,
//! so the innermost request wins when one is processed inside another, and
//! interleaved tasks on one worker thread each see their own request.

use http::Request;
use std::future::Future;
use std::time::Instant;

use crate::capture::OutputCapture;
use crate::timeline::EventTimeline;

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

/// Timeline and output capture belonging to one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    timeline: EventTimeline,
    output: OutputCapture,
}

impl RequestContext {
    pub fn new(start: Instant) -> Self {
        Self {
            timeline: EventTimeline::new(start),
            output: OutputCapture::new(),
        }
    }

    pub fn timeline(&self) -> &EventTimeline {
        &self.timeline
    }

    pub fn output(&self) -> &OutputCapture {
        &self.output
    }

    /// Run `f` with this context current, restoring the previous one after.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        TASK_CONTEXT.sync_scope(self.clone(), f)
    }
}

/// Run `fut` with `ctx` as the current context of the task.
pub fn scope<F: Future>(ctx: RequestContext, fut: F) -> impl Future<Output = F::Output> {
    TASK_CONTEXT.scope(ctx, fut)
}

/// The context of the innermost request currently executing.
pub fn current() -> Option<RequestContext> {
    TASK_CONTEXT.try_with(RequestContext::clone).ok()
}

/// Access to the [`RequestContext`] stored in a request's extensions.
pub trait RequestContextExt {
    fn record_context(&self) -> Option<&RequestContext>;

    /// The request's event timeline, for logging custom events.
    fn timeline(&self) -> Option<&EventTimeline> {
        self.record_context().map(RequestContext::timeline)
    }
}

impl<B> RequestContextExt for Request<B> {
    fn record_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}
