use axum::{
    body::Bytes,
    extract::{self, rejection::BytesRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn, Span};

use crate::{
    api::{
        admission_review::AdmissionResponse,
        api_error::ApiError,
        service,
        state::{ApiServerState, Readiness},
    },
    metrics,
};

#[tracing::instrument(
    name = "mutation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        subresource=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        resource_group=tracing::field::Empty,
        resource_version=tracing::field::Empty,
        resource=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Add the configured toleration to the Pod carried by an AdmissionReview.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;

    let review = service::review(&body, |request| {
        service::add_toleration(request, &state.toleration)
    })
    .map_err(|e| {
        warn!(error = %e, "Bad AdmissionReview request");
        ApiError::from(e)
    })?;

    populate_span_with_admission_response(&review.response);
    metrics::add_admission_review(review.response.allowed, review.response.patch.is_some());
    info!(
        uid = review.response.uid.as_str(),
        allowed = review.response.allowed,
        "Admission review completed"
    );

    let payload = serde_json::to_vec(&review).map_err(|e| {
        error!(error = %e, "Cannot encode AdmissionReview response");
        ApiError::internal_server_error(format!("could not encode response: {e}"))
    })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], payload).into_response())
}

/// Probe endpoint: healthy until the shutdown begins.
pub(crate) async fn status_handler(
    extract::State(readiness): extract::State<Readiness>,
) -> (StatusCode, Json<serde_json::Value>) {
    let status = if readiness.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(json!({})))
}

pub(crate) async fn metrics_handler() -> Result<Response, ApiError> {
    let body = metrics::encode_metrics().map_err(|e| {
        error!(error = %e, "Cannot encode metrics");
        ApiError::internal_server_error(format!("could not encode metrics: {e}"))
    })?;

    Ok(([(header::CONTENT_TYPE, metrics::METRICS_CONTENT_TYPE)], body).into_response())
}

fn populate_span_with_admission_response(response: &AdmissionResponse) {
    Span::current().record("allowed", response.allowed);
    Span::current().record("mutated", response.patch.is_some());
    if let Some(message) = response
        .status
        .as_ref()
        .and_then(|status| status.message.as_ref())
    {
        Span::current().record("response_message", message.as_str());
    }
}
