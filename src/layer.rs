use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::context;

/// `tracing_subscriber` layer that turns `tracing` events emitted while a
/// request is being handled into events on that request's timeline.
///
/// The event type is the event's message (or its target when there is no
/// message); the value carries the level, target and remaining fields.
/// Events outside any request, events more verbose than `max_level`, and
/// events emitted by this crate itself are ignored.
pub struct TimelineLayer {
    max_level: Level,
    /// Events appended to a request timeline.
    pub recorded_events: Arc<AtomicU64>,
    /// Events seen outside any request.
    pub unscoped_events: Arc<AtomicU64>,
}

impl TimelineLayer {
    pub fn new(max_level: Level) -> Self {
        Self {
            max_level,
            recorded_events: Arc::new(AtomicU64::new(0)),
            unscoped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for TimelineLayer {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl<S> Layer<S> for TimelineLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let Some(request) = context::current() else {
            self.unscoped_events.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut fields = Map::new();
        let mut message: Option<String> = None;
        event.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });

        let mut value = Map::new();
        value.insert("level".to_string(), Value::from(meta.level().as_str()));
        value.insert("target".to_string(), Value::from(meta.target()));
        if !fields.is_empty() {
            value.insert("fields".to_string(), Value::Object(fields));
        }

        let kind = message.unwrap_or_else(|| meta.target().to_string());
        request.timeline().log(kind, Value::Object(value));
        self.recorded_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // `message` arrives here as fmt::Arguments.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
