//! Wraps a request handler and writes one structured record per request:
//! timing, request metadata, the handler's captured output, the events it
//! logged and the failure it raised, if any.

pub mod record;
pub mod timeline;
pub mod capture;
pub mod context;
pub mod failure;
pub mod formatter;
pub mod sink;
pub mod noop_sink;
pub mod config;
pub mod env;
pub mod interceptor;
pub mod layer;
pub mod init;

#[cfg(feature = "tower")]
pub mod service;

pub use config::RecorderConfig;
pub use context::{RequestContext, RequestContextExt};
pub use failure::HandlerFailure;
pub use interceptor::{InterceptError, RecorderError, RequestInterceptor};
pub use record::{Event, ExceptionInfo, LogRecord};
pub use timeline::EventTimeline;
