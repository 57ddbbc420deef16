use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::record::{round_millis, Event};

/// Append-only list of events logged by application code during one request.
///
/// Clones share the same list, which lets the handler hold one copy (via the
/// request extensions) while the interceptor keeps another. A timeline is
/// created per request and never handed to another request.
#[derive(Debug, Clone)]
pub struct EventTimeline {
    start: Instant,
    inner: Arc<Mutex<TimelineState>>,
}

#[derive(Debug, Default)]
struct TimelineState {
    events: Vec<Event>,
    used: bool,
}

impl EventTimeline {
    /// Create a timeline whose event times are measured from `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            inner: Arc::new(Mutex::new(TimelineState::default())),
        }
    }

    /// Append an event stamped with the seconds elapsed since request start.
    pub fn log(&self, kind: impl Into<String>, value: impl Into<serde_json::Value>) {
        let time = round_millis(self.start.elapsed().as_secs_f64());
        let mut state = self.lock();
        state.events.push(Event {
            kind: kind.into(),
            value: value.into(),
            time,
        });
        state.used = true;
    }

    /// Like [`log`](Self::log), for any serde-serializable value.
    pub fn log_serialize<T: Serialize>(&self, kind: impl Into<String>, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.log(kind, value);
        Ok(())
    }

    pub fn is_used(&self) -> bool {
        self.lock().used
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the events logged so far, in call order.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Events for the record: `None` if `log` was never called.
    pub fn record_events(&self) -> Option<Vec<Event>> {
        let state = self.lock();
        state.used.then(|| state.events.clone())
    }

    fn lock(&self) -> MutexGuard<'_, TimelineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
