use crate::sink::RecordSink;
use std::error::Error;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the interceptor itself without any
/// I/O, and for tests that only care about the returned response.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl RecordSink for NoopSink {
    fn send(&self, _payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
