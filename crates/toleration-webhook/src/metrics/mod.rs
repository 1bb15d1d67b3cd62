use lazy_static::lazy_static;
use prometheus_client::{encoding::text::encode, registry::Registry};

mod admission_reviews_total;
pub use admission_reviews_total::add_admission_review;
mod http_requests;
pub use http_requests::track_http_metrics;

/// Content type of the OpenMetrics text exposition format
pub const METRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

lazy_static! {
    static ref REGISTRY: Registry = {
        let mut registry = Registry::default();
        admission_reviews_total::register(&mut registry);
        http_requests::register(&mut registry);
        registry
    };
}

/// Render all the metrics using the OpenMetrics text format
pub fn encode_metrics() -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    encode(&mut buffer, &REGISTRY)?;
    Ok(buffer)
}
