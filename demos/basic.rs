use http::{Request, Response, StatusCode};
use request_log_recorder::init::init_tracing;
use request_log_recorder::{ceprintln, cprintln, HandlerFailure, RecorderConfig, RequestContextExt, RequestInterceptor};
use serde_json::json;

fn handler(request: Request<()>) -> Result<Option<Response<String>>, HandlerFailure> {
    let timeline = request.timeline().expect("timeline attached by the interceptor");
    timeline.log("lookup", json!({"user": 42}));
    tracing::info!(user_id = 42, "user loaded");

    if request.uri().path() == "/fail" {
        ceprintln!("giving up");
        let _port: u16 = "not a port".parse()?;
    }

    cprintln!("hello from {}", request.uri().path());
    let mut response = Response::new(String::from("ok"));
    *response.status_mut() = StatusCode::OK;
    Ok(Some(response))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    // Records go to stdout, one JSON line per request.
    let interceptor = RequestInterceptor::new(RecorderConfig::from_env()?)?;

    for path in ["/hello", "/fail"] {
        let request = Request::get(path).body(())?;
        let response = interceptor.process(request, handler)?;
        eprintln!("{} -> {}", path, response.status());
    }
    Ok(())
}
