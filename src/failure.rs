use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

use crate::record::ExceptionInfo;

/// Class recorded for a panic caught inside the handler.
pub const PANIC_CLASS: &str = "panic";

/// Failure returned by a wrapped handler.
///
/// Any `std::error::Error` converts into it, so handlers can use `?`. The
/// class name, message and backtrace are taken at conversion time, which is
/// the closest point to where the failure happened.
pub struct HandlerFailure {
    info: ExceptionInfo,
    source: Box<dyn Error + Send + Sync>,
}

impl HandlerFailure {
    /// Build from an already boxed error. The concrete type is no longer
    /// known, so the class is the generic trait object name.
    pub fn from_boxed(source: Box<dyn Error + Send + Sync>) -> Self {
        Self {
            info: ExceptionInfo {
                class: "dyn std::error::Error".to_string(),
                message: source.to_string(),
                backtrace: capture_backtrace(),
            },
            source,
        }
    }

    /// Ad hoc failure with an explicit class.
    pub fn msg(class: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            info: ExceptionInfo {
                class: class.into(),
                message: message.clone(),
                backtrace: capture_backtrace(),
            },
            source: message.into(),
        }
    }

    pub fn exception(&self) -> &ExceptionInfo {
        &self.info
    }

    pub fn source(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.source
    }

    pub fn into_source(self) -> Box<dyn Error + Send + Sync> {
        self.source
    }
}

impl<E> From<E> for HandlerFailure
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            info: ExceptionInfo {
                class: std::any::type_name::<E>().to_string(),
                message: err.to_string(),
                backtrace: capture_backtrace(),
            },
            source: Box::new(err),
        }
    }
}

impl fmt::Debug for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFailure")
            .field("class", &self.info.class)
            .field("message", &self.info.message)
            .finish()
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.info.class, self.info.message)
    }
}

/// Describe a caught panic payload.
///
/// The panic's own stack is gone by the time the payload is caught, so the
/// backtrace is left empty.
pub fn panic_exception(payload: &(dyn Any + Send)) -> ExceptionInfo {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    ExceptionInfo {
        class: PANIC_CLASS.to_string(),
        message,
        backtrace: Vec::new(),
    }
}

/// Frames of the current backtrace, or nothing when backtraces are disabled
/// (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
fn capture_backtrace() -> Vec<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
