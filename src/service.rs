//! `tower` middleware running every request through a [`RequestInterceptor`].

use futures_util::future::BoxFuture;
use http::{Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::failure::HandlerFailure;
use crate::interceptor::{InterceptError, RequestInterceptor};

/// Layer producing [`RecordService`]s that share one interceptor.
#[derive(Clone)]
pub struct RecordLayer {
    interceptor: Arc<RequestInterceptor>,
}

impl RecordLayer {
    pub fn new(interceptor: Arc<RequestInterceptor>) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for RecordLayer {
    type Service = RecordService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecordService {
            inner,
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

#[derive(Clone)]
pub struct RecordService<S> {
    inner: S,
    interceptor: Arc<RequestInterceptor>,
}

impl<S, B, RB> Service<Request<B>> for RecordService<S>
where
    S: Service<Request<B>, Response = Response<RB>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<HandlerFailure>,
    B: Send + 'static,
    RB: From<String> + Send + 'static,
{
    type Response = Response<RB>;
    type Error = InterceptError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| InterceptError::Handler(e.into()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // The ready service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = Arc::clone(&self.interceptor);

        Box::pin(async move {
            interceptor
                .process_async(request, move |request| async move {
                    let result: Result<Option<Response<RB>>, HandlerFailure> =
                        inner.call(request).await.map(Some).map_err(Into::into);
                    result
                })
                .await
        })
    }
}
