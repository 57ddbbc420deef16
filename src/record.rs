use chrono::{DateTime, Utc};
use http::Request;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::CapturedOutput;

/// Status recorded when the handler produced no response.
pub const MISSING_RESPONSE_STATUS: u16 = 500;

/// One structured record per request.
///
/// `events` and `exception` are left out of the serialized form entirely
/// when absent, so "no events logged" never shows up as an empty array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub ts: i64,
    pub duration: f64,
    pub request_method: String,
    pub request: String,
    pub query_string: String,
    pub status: u16,
    pub from: String,
    pub pid: u32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// Application-emitted event, stamped with seconds since request start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
    pub time: f64,
}

/// Failure raised by the wrapped handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub class: String,
    pub message: String,
    pub backtrace: Vec<String>,
}

/// Request metadata copied into the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub query: String,
}

impl RequestMeta {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let uri = request.uri();
        Self {
            method: request.method().as_str().to_string(),
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
        }
    }
}

/// Round seconds to millisecond precision.
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Every input needed to assemble a [`LogRecord`].
///
/// [`RecordBuilder::build`] performs no I/O and reads no clock, so the
/// interceptor gathers all of this first and assembly can be tested alone.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub request: RequestMeta,
    /// `None` when the handler produced no response.
    pub status: Option<u16>,
    pub from: String,
    pub pid: u32,
    pub output: CapturedOutput,
    pub events: Option<Vec<Event>>,
    pub exception: Option<ExceptionInfo>,
}

impl RecordBuilder {
    pub fn build(self) -> LogRecord {
        LogRecord {
            ts: self.started_at.timestamp(),
            duration: round_millis(self.elapsed.as_secs_f64()).max(0.0),
            request_method: self.request.method,
            request: self.request.path,
            query_string: self.request.query,
            status: self.status.unwrap_or(MISSING_RESPONSE_STATUS),
            from: self.from,
            pid: self.pid,
            stdout: self.output.stdout,
            stderr: self.output.stderr,
            events: self.events,
            exception: self.exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn builder() -> RecordBuilder {
        RecordBuilder {
            started_at: Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap(),
            elapsed: Duration::from_micros(12_345_678),
            request: RequestMeta {
                method: "GET".into(),
                path: "/users".into(),
                query: "page=2".into(),
            },
            status: Some(200),
            from: "web-1".into(),
            pid: 4242,
            output: CapturedOutput {
                stdout: "hello\n".into(),
                stderr: String::new(),
            },
            events: None,
            exception: None,
        }
    }

    #[test]
    fn build_copies_inputs() {
        let record = builder().build();
        assert_eq!(record.ts, 1_700_000_000);
        assert_eq!(record.duration, 12.346);
        assert_eq!(record.request_method, "GET");
        assert_eq!(record.request, "/users");
        assert_eq!(record.query_string, "page=2");
        assert_eq!(record.status, 200);
        assert_eq!(record.from, "web-1");
        assert_eq!(record.pid, 4242);
        assert_eq!(record.stdout, "hello\n");
    }

    #[test]
    fn missing_status_becomes_500() {
        let mut b = builder();
        b.status = None;
        assert_eq!(b.build().status, 500);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let value = serde_json::to_value(builder().build()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("events"));
        assert!(!obj.contains_key("exception"));
        assert_eq!(obj["stderr"], json!(""));
    }

    #[test]
    fn present_events_serialize_with_type_key() {
        let mut b = builder();
        b.events = Some(vec![Event {
            kind: "cache".into(),
            value: json!({"hit": true}),
            time: 0.002,
        }]);
        b.exception = Some(ExceptionInfo {
            class: "std::io::Error".into(),
            message: "boom".into(),
            backtrace: vec![],
        });
        let value = serde_json::to_value(b.build()).unwrap();
        assert_eq!(value["events"], json!([{"type": "cache", "value": {"hit": true}, "time": 0.002}]));
        assert_eq!(value["exception"]["message"], json!("boom"));
    }

    #[test]
    fn serialized_line_parses_back() {
        let record = builder().build();
        let line = serde_json::to_string(&record).unwrap();
        let parsed: LogRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn request_meta_from_request() {
        let request = Request::post("/orders?id=7&x=1").body(()).unwrap();
        let meta = RequestMeta::from_request(&request);
        assert_eq!(meta.method, "POST");
        assert_eq!(meta.path, "/orders");
        assert_eq!(meta.query, "id=7&x=1");

        let bare = Request::get("/").body(()).unwrap();
        assert_eq!(RequestMeta::from_request(&bare).query, "");
    }

    #[test]
    fn round_millis_keeps_three_decimals() {
        assert_eq!(round_millis(0.0004), 0.0);
        assert_eq!(round_millis(1.23456), 1.235);
    }
}
