//! Per-request capture of diagnostic output.
//!
//! Nothing here touches the process-wide stdout/stderr. Each request gets its
//! own [`OutputCapture`] and application code writes into it either through
//! the `io::Write` handles returned by [`OutputCapture::stdout`] and
//! [`OutputCapture::stderr`], or through the `cprint!` family of macros, which
//! resolve the request that is current on this task or thread.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context;

/// Text captured for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
struct Buffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    sealed: bool,
}

/// Pair of in-memory buffers standing in for stdout and stderr.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    inner: Arc<Mutex<Buffers>>,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> CaptureWriter {
        CaptureWriter {
            capture: self.clone(),
            stream: Stream::Stdout,
        }
    }

    pub fn stderr(&self) -> CaptureWriter {
        CaptureWriter {
            capture: self.clone(),
            stream: Stream::Stderr,
        }
    }

    /// Open the capture scope. The returned guard seals the buffers when it
    /// is released or dropped.
    pub fn scope(&self) -> CaptureScope {
        CaptureScope {
            capture: self.clone(),
            released: false,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    fn push(&self, stream: Stream, bytes: &[u8]) {
        let mut buffers = self.lock();
        // Output arriving after release belongs to no record.
        if buffers.sealed {
            return;
        }
        match stream {
            Stream::Stdout => buffers.stdout.extend_from_slice(bytes),
            Stream::Stderr => buffers.stderr.extend_from_slice(bytes),
        }
    }

    fn seal(&self) -> CapturedOutput {
        let mut buffers = self.lock();
        buffers.sealed = true;
        CapturedOutput {
            stdout: String::from_utf8_lossy(&std::mem::take(&mut buffers.stdout)).into_owned(),
            stderr: String::from_utf8_lossy(&std::mem::take(&mut buffers.stderr)).into_owned(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `io::Write` handle into one of the capture buffers.
#[derive(Debug, Clone)]
pub struct CaptureWriter {
    capture: OutputCapture,
    stream: Stream,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.push(self.stream, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Guard for the capture scope of one request.
#[derive(Debug)]
pub struct CaptureScope {
    capture: OutputCapture,
    released: bool,
}

impl CaptureScope {
    /// Seal the capture and take what was written.
    pub fn release(mut self) -> CapturedOutput {
        self.released = true;
        self.capture.seal()
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        if !self.released {
            self.capture.seal();
        }
    }
}

/// Write to the current request's stdout buffer, or the process stdout when
/// no request is active. Used by [`cprint!`](crate::cprint).
pub fn write_stdout(text: &str) {
    match context::current() {
        Some(ctx) => ctx.output().push(Stream::Stdout, text.as_bytes()),
        None => {
            let _ = io::stdout().lock().write_all(text.as_bytes());
        }
    }
}

/// Stderr counterpart of [`write_stdout`].
pub fn write_stderr(text: &str) {
    match context::current() {
        Some(ctx) => ctx.output().push(Stream::Stderr, text.as_bytes()),
        None => {
            let _ = io::stderr().lock().write_all(text.as_bytes());
        }
    }
}

#[macro_export]
macro_rules! cprint {
    ($($arg:tt)*) => {
        $crate::capture::write_stdout(&::std::format!($($arg)*))
    };
}

#[macro_export]
macro_rules! cprintln {
    () => {
        $crate::capture::write_stdout("\n")
    };
    ($($arg:tt)*) => {
        $crate::capture::write_stdout(&::std::format!("{}\n", ::std::format_args!($($arg)*)))
    };
}

#[macro_export]
macro_rules! ceprint {
    ($($arg:tt)*) => {
        $crate::capture::write_stderr(&::std::format!($($arg)*))
    };
}

#[macro_export]
macro_rules! ceprintln {
    () => {
        $crate::capture::write_stderr("\n")
    };
    ($($arg:tt)*) => {
        $crate::capture::write_stderr(&::std::format!("{}\n", ::std::format_args!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use std::time::Instant;

    #[test]
    fn writers_fill_separate_buffers() {
        let capture = OutputCapture::new();
        let scope = capture.scope();
        write!(capture.stdout(), "out {}", 1).unwrap();
        writeln!(capture.stderr(), "err").unwrap();
        let output = scope.release();
        assert_eq!(output.stdout, "out 1");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn writes_after_release_are_dropped() {
        let capture = OutputCapture::new();
        let mut late = capture.stdout();
        let scope = capture.scope();
        late.write_all(b"in time").unwrap();
        let output = scope.release();
        late.write_all(b"too late").unwrap();
        assert_eq!(output.stdout, "in time");
        assert!(capture.is_sealed());
        assert_eq!(capture.scope().release().stdout, "");
    }

    #[test]
    fn dropping_scope_seals_capture() {
        let capture = OutputCapture::new();
        {
            let _scope = capture.scope();
        }
        assert!(capture.is_sealed());
    }

    #[test]
    fn macros_target_current_context() {
        let ctx = RequestContext::new(Instant::now());
        let scope = ctx.output().scope();
        ctx.in_scope(|| {
            crate::cprintln!("hello");
            crate::cprint!("{}-{}", 1, 2);
            crate::ceprintln!("warn: {}", "disk");
        });
        let output = scope.release();
        assert_eq!(output.stdout, "hello\n1-2");
        assert_eq!(output.stderr, "warn: disk\n");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let capture = OutputCapture::new();
        let scope = capture.scope();
        capture.stdout().write_all(&[b'a', 0xff, b'b']).unwrap();
        assert_eq!(scope.release().stdout, "a\u{fffd}b");
    }
}
