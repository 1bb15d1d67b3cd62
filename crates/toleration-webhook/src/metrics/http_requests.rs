use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        family::Family,
        gauge::Gauge,
        histogram::{exponential_buckets, Histogram},
    },
    registry::Registry,
};

lazy_static! {
    static ref HTTP_REQUEST_DURATION_SECONDS: Family<HttpRequestLabels, Histogram> =
        Family::new_with_constructor(|| Histogram::new(exponential_buckets(0.005, 2.0, 12)));
    static ref HTTP_REQUESTS_INFLIGHT: Family<HandlerLabels, Gauge> = Family::default();
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HttpRequestLabels {
    handler: String,
    method: String,
    code: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HandlerLabels {
    handler: String,
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(
        "http_request_duration_seconds",
        "The latency of the HTTP requests",
        HTTP_REQUEST_DURATION_SECONDS.clone(),
    );
    registry.register(
        "http_requests_inflight",
        "The number of inflight requests being handled at the same time",
        HTTP_REQUESTS_INFLIGHT.clone(),
    );
}

/// Counts a request as inflight until dropped, the request future can be
/// dropped before completing when the client goes away.
struct InflightGuard(Gauge);

impl InflightGuard {
    fn new(labels: &HandlerLabels) -> Self {
        let gauge = HTTP_REQUESTS_INFLIGHT.get_or_create(labels).clone();
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Middleware recording the latency and the concurrency of the requests
/// served by the routes it wraps.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let method = request.method().to_string();

    let inflight = HandlerLabels {
        handler: handler.clone(),
    };
    let _inflight = InflightGuard::new(&inflight);
    let start = Instant::now();

    let response = next.run(request).await;

    HTTP_REQUEST_DURATION_SECONDS
        .get_or_create(&HttpRequestLabels {
            handler,
            method,
            code: response.status().as_u16().to_string(),
        })
        .observe(start.elapsed().as_secs_f64());

    response
}
