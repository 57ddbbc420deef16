use serde_json::{Map, Value};
use std::io::{self, Write};

/// Renders a parsed record as human-readable text.
///
/// The interceptor hands over the record as a generic JSON value, parsed
/// back from the exact line it would otherwise have written, and never looks
/// at what the formatter produces.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &Value, out: &mut dyn Write, options: &FormatterOptions) -> io::Result<()>;
}

/// Options passed through untouched to the formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterOptions(pub Map<String, Value>);

impl FormatterOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl Default for FormatterOptions {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("trace".to_string(), Value::Bool(true));
        Self(map)
    }
}

/// Pretty-printed JSON, one block per record.
///
/// With `trace: false` the exception backtrace is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPrettyFormatter;

impl RecordFormatter for JsonPrettyFormatter {
    fn format(&self, record: &Value, out: &mut dyn Write, options: &FormatterOptions) -> io::Result<()> {
        let mut record = record.clone();
        if options.flag("trace") == Some(false) {
            if let Some(exception) = record.get_mut("exception").and_then(Value::as_object_mut) {
                exception.remove("backtrace");
            }
        }
        serde_json::to_writer_pretty(&mut *out, &record)?;
        out.write_all(b"\n")
    }
}
