use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::{self, TraceLayer};
use tracing::{span::Span, Level};

use crate::{
    api::{
        admission_review::AdmissionRequest,
        handlers::{metrics_handler, mutate_handler, status_handler},
        state::{ApiServerState, Readiness},
    },
    metrics::track_http_metrics,
};

pub mod admission_review;
pub(crate) mod api_error;
pub(crate) mod handlers;
pub(crate) mod service;
pub mod state;

pub(crate) fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("kind", adm_req.kind.kind.as_str());
    Span::current().record("kind_group", adm_req.kind.group.as_str());
    Span::current().record("kind_version", adm_req.kind.version.as_str());
    Span::current().record("name", adm_req.name.as_deref().unwrap_or_default());
    Span::current().record(
        "namespace",
        adm_req.namespace.as_deref().unwrap_or_default(),
    );
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("resource", adm_req.resource.resource.as_str());
    Span::current().record("resource_group", adm_req.resource.group.as_str());
    Span::current().record("resource_version", adm_req.resource.version.as_str());
    Span::current().record(
        "subresource",
        adm_req.sub_resource.as_deref().unwrap_or_default(),
    );
}

/// Routes served over TLS to the Kubernetes API server.
pub fn webhook_router(state: Arc<ApiServerState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route_layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Plain HTTP routes used by the kubelet probes and by the metrics scraper.
pub fn status_router(readiness: Readiness) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .with_state(readiness)
        .route("/metrics", get(metrics_handler))
}
