//! End-to-end request recording through a file sink.

use http::{Request, Response, StatusCode};
use request_log_recorder::formatter::{FormatterOptions, RecordFormatter};
use request_log_recorder::sink::SinkTarget;
use request_log_recorder::{cprintln, HandlerFailure, LogRecord, RecorderConfig, RequestContextExt, RequestInterceptor};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn file_config(path: &Path) -> RecorderConfig {
    RecorderConfig {
        from: "web-01".into(),
        sink: SinkTarget::Path(path.to_path_buf()),
        ..RecorderConfig::default()
    }
}

fn read_records(path: &Path) -> Vec<LogRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn respond(status: StatusCode) -> Result<Option<Response<String>>, HandlerFailure> {
    let mut response = Response::new(String::from("body"));
    *response.status_mut() = status;
    Ok(Some(response))
}

#[test]
fn successful_request_with_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let interceptor = RequestInterceptor::new(file_config(&path)).unwrap();

    let started = Instant::now();
    let response = interceptor
        .process(Request::get("/greet?lang=en").body(()).unwrap(), |_req| {
            cprintln!("hello");
            std::thread::sleep(Duration::from_millis(20));
            respond(StatusCode::OK)
        })
        .unwrap();
    let wall = started.elapsed().as_secs_f64();
    assert_eq!(response.status(), StatusCode::OK);

    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, 200);
    assert_eq!(record.stdout, "hello\n");
    assert_eq!(record.stderr, "");
    assert_eq!(record.request_method, "GET");
    assert_eq!(record.request, "/greet");
    assert_eq!(record.query_string, "lang=en");
    assert_eq!(record.from, "web-01");
    assert!(record.exception.is_none());
    assert!(record.events.is_none());
    assert!(record.duration >= 0.02);
    assert!(record.duration <= wall + 0.001);
}

#[test]
fn failing_request_gets_synthesized_response() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let interceptor = RequestInterceptor::new(file_config(&path)).unwrap();

    let response: Response<String> = interceptor
        .process(Request::post("/orders").body(()).unwrap(), |_req| {
            Err(io::Error::new(io::ErrorKind::Other, "boom").into())
        })
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = serde_json::from_str(response.body()).unwrap();
    assert_eq!(body, json!({"status": 500, "message": "Something went wrong..."}));

    let record = &read_records(&path)[0];
    assert_eq!(record.status, 500);
    let exception = record.exception.as_ref().unwrap();
    assert_eq!(exception.message, "boom");
    assert!(!exception.class.is_empty());
}

#[test]
fn events_are_recorded_in_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let interceptor = RequestInterceptor::new(file_config(&path)).unwrap();

    interceptor
        .process(Request::get("/report").body(()).unwrap(), |req| {
            let timeline = req.timeline().unwrap();
            timeline.log("query.start", json!({"sql": "select 1"}));
            std::thread::sleep(Duration::from_millis(5));
            timeline.log("query.done", json!({"rows": 1}));
            respond(StatusCode::OK)
        })
        .unwrap();
    interceptor
        .process(Request::get("/quiet").body(()).unwrap(), |_req| respond(StatusCode::OK))
        .unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);

    let events = records[0].events.as_ref().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, "query.start");
    assert_eq!(events[1].kind, "query.done");
    assert!(events[1].time > events[0].time);

    assert!(records[1].events.is_none());
    let raw = std::fs::read_to_string(&path).unwrap();
    let second: Value = serde_json::from_str(raw.lines().nth(1).unwrap()).unwrap();
    assert!(second.get("events").is_none());
}

struct OneLineFormatter;

impl RecordFormatter for OneLineFormatter {
    fn format(&self, record: &Value, out: &mut dyn Write, _options: &FormatterOptions) -> io::Result<()> {
        writeln!(
            out,
            "{} {} {} ({}s) stdout={}",
            record["request_method"].as_str().unwrap_or("?"),
            record["request"].as_str().unwrap_or("?"),
            record["status"],
            record["duration"],
            record["stdout"],
        )
    }
}

#[test]
fn pretty_mode_uses_formatter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let config = RecorderConfig {
        pretty_print: true,
        ..file_config(&path)
    };
    let interceptor = RequestInterceptor::new(config)
        .unwrap()
        .with_formatter(Arc::new(OneLineFormatter));

    interceptor
        .process(Request::delete("/items/9").body(()).unwrap(), |_req| {
            cprintln!("deleted");
            respond(StatusCode::NO_CONTENT)
        })
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("DELETE /items/9 204 ("));
    assert!(text.ends_with("stdout=\"deleted\\n\"\n"));
}

#[test]
fn pretty_mode_defaults_to_pretty_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.log");
    let config = RecorderConfig {
        pretty_print: true,
        ..file_config(&path)
    };
    let interceptor = RequestInterceptor::new(config).unwrap();
    interceptor
        .process(Request::get("/").body(()).unwrap(), |_req| respond(StatusCode::OK))
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().count() > 1);
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["status"], json!(200));
    assert_eq!(parsed["from"], json!("web-01"));
}
