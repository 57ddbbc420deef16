use http::{Request, Response};
use request_log_recorder::service::RecordLayer;
use request_log_recorder::sink::MemorySink;
use request_log_recorder::{cprintln, RecorderConfig, RequestContextExt, RequestInterceptor};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tower::{service_fn, ServiceBuilder, ServiceExt};

#[tokio::main]
async fn main() {
    let sink = MemorySink::new();
    let interceptor = Arc::new(RequestInterceptor::with_sink(RecorderConfig::default(), Arc::new(sink.clone())));

    let service = ServiceBuilder::new()
        .layer(RecordLayer::new(interceptor))
        .service(service_fn(|req: Request<()>| async move {
            let timeline = req.timeline().cloned();
            cprintln!("handling {}", req.uri());
            sleep(Duration::from_millis(10)).await;
            if let Some(timeline) = timeline {
                timeline.log("slept", 10);
            }
            Ok::<_, Infallible>(Response::new(String::from("done")))
        }));

    let calls = (0..3).map(|i| {
        let service = service.clone();
        async move {
            let request = Request::get(format!("/jobs/{}", i)).body(()).expect("valid request");
            service.oneshot(request).await
        }
    });
    for result in futures_util::future::join_all(calls).await {
        if let Err(err) = result {
            eprintln!("request failed: {}", err);
        }
    }

    for line in sink.payloads() {
        print!("{}", line);
    }
}
