use std::error::Error;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for serialized records.
///
/// The interceptor calls `send` once per request with the complete payload
/// for that request (a JSON line, or the formatter's output in pretty mode).
/// Sinks shared between concurrent requests must write each payload as a
/// unit so records never interleave.
pub trait RecordSink: Send + Sync {
    /// Write one record payload.
    ///
    /// **Returns**
    /// - `Ok(())` once the payload was handed to the underlying medium.
    /// - `Err(..)` on any write failure. The interceptor surfaces this to
    ///   its caller instead of dropping the record.
    fn send(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush buffered output, if the sink buffers.
    ///
    /// Default implementation is a no-op.
    fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Writer shared between the caller and a [`WriterSink`].
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Where records are written.
#[derive(Clone, Default)]
pub enum SinkTarget {
    #[default]
    Stdout,
    Stderr,
    /// File opened in append mode, created if missing.
    Path(PathBuf),
    /// Already open writer.
    Handle(SharedWriter),
}

impl SinkTarget {
    pub fn handle(writer: impl Write + Send + 'static) -> Self {
        SinkTarget::Handle(Arc::new(Mutex::new(Box::new(writer))))
    }
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Stdout => f.write_str("Stdout"),
            SinkTarget::Stderr => f.write_str("Stderr"),
            SinkTarget::Path(path) => f.debug_tuple("Path").field(path).finish(),
            SinkTarget::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

/// Parse a sink description.
///
/// Examples:
/// - "stdout" or "-"
/// - "stderr"
/// - "file:///var/log/app/requests.log"
/// - "/var/log/app/requests.log"
impl FromStr for SinkTarget {
    type Err = SinkTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();

        if s.is_empty() {
            Err(SinkTargetError::Empty)
        } else if lower == "stdout" || s == "-" {
            Ok(SinkTarget::Stdout)
        } else if lower == "stderr" {
            Ok(SinkTarget::Stderr)
        } else if lower.starts_with("file://") {
            let path = &s["file://".len()..];
            if path.is_empty() {
                Err(SinkTargetError::Empty)
            } else {
                Ok(SinkTarget::Path(PathBuf::from(path)))
            }
        } else if let Some((scheme, _)) = s.split_once("://") {
            Err(SinkTargetError::UnknownScheme(scheme.to_string()))
        } else {
            Ok(SinkTarget::Path(PathBuf::from(s)))
        }
    }
}

/// Error type returned when parsing a [`SinkTarget`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SinkTargetError {
    #[error("empty sink target")]
    Empty,

    #[error("unknown or unsupported sink scheme: {0}")]
    UnknownScheme(String),
}

/// Sink over any `io::Write`, serialized by a mutex.
///
/// `send` only writes; the interceptor calls `flush` when `auto_flush` is set.
pub struct WriterSink {
    writer: SharedWriter,
}

impl WriterSink {
    pub fn new(writer: SharedWriter) -> Self {
        Self { writer }
    }

    /// Open the writer described by `target`.
    pub fn open(target: &SinkTarget) -> io::Result<Self> {
        let writer: SharedWriter = match target {
            SinkTarget::Stdout => Arc::new(Mutex::new(Box::new(io::stdout()))),
            SinkTarget::Stderr => Arc::new(Mutex::new(Box::new(io::stderr()))),
            SinkTarget::Path(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Arc::new(Mutex::new(Box::new(file)))
            }
            SinkTarget::Handle(writer) => Arc::clone(writer),
        };
        Ok(Self::new(writer))
    }
}

impl RecordSink for WriterSink {
    fn send(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(payload)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}

/// Keeps every payload in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far, decoded as UTF-8.
    pub fn payloads(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }

    /// Received payloads parsed as JSON lines; payloads that are not valid
    /// JSON are skipped.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.payloads()
            .iter()
            .filter_map(|p| serde_json::from_str(p.trim_end()).ok())
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn send(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_vec());
        Ok(())
    }
}
