use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, info};

use crate::{
    api::admission_review::{
        AdmissionRequest, AdmissionResponse, AdmissionReviewRequest, AdmissionReviewResponse,
        GroupVersionResource,
    },
    errors::{MutationError, ReviewError},
    mutation,
    patch::{create_patch, encode_patch},
    toleration::Toleration,
};

/// Decode and validate the AdmissionReview carried by `body`, then run
/// `mutate` against its request.
///
/// Envelope problems are returned as errors and `mutate` is not invoked.
/// A failing mutation is not an error: it becomes a denial inside of the
/// returned AdmissionReview.
pub(crate) fn review<M>(body: &[u8], mutate: M) -> Result<AdmissionReviewResponse, ReviewError>
where
    M: FnOnce(&AdmissionRequest) -> Result<AdmissionResponse, MutationError>,
{
    let request = decode_admission_request(body)?;
    super::populate_span_with_admission_request_data(&request);

    let mut response = match mutate(&request) {
        Ok(response) => response,
        Err(e) => {
            info!(error = %e, "Admission failed");
            AdmissionResponse::reject(String::new(), e.to_string())
        }
    };
    response.uid = request.uid;

    Ok(AdmissionReviewResponse::new(response))
}

pub(crate) fn decode_admission_request(body: &[u8]) -> Result<AdmissionRequest, ReviewError> {
    if body.is_empty() {
        return Err(ReviewError::EmptyBody);
    }

    let admission_review: AdmissionReviewRequest =
        serde_json::from_slice(body).map_err(ReviewError::Decode)?;
    let request = admission_review
        .request
        .ok_or(ReviewError::MissingRequest)?;

    if request.resource != GroupVersionResource::pods() {
        return Err(ReviewError::UnsupportedResource(request.resource));
    }

    Ok(request)
}

/// Append the configured toleration to the Pod of the request and build the
/// allowing response carrying the resulting patch.
pub(crate) fn add_toleration(
    request: &AdmissionRequest,
    toleration: &Toleration,
) -> Result<AdmissionResponse, MutationError> {
    let raw = request
        .object
        .as_ref()
        .ok_or(MutationError::MissingObject)?
        .get()
        .as_bytes();

    let mutated = mutation::add_toleration(raw, toleration)?;
    let patch = create_patch(raw, &mutated)?;
    let patch = encode_patch(&patch)?;
    debug!(patch = %String::from_utf8_lossy(&patch), "patch computed");

    Ok(AdmissionResponse::allow_with_patch(
        request.uid.clone(),
        general_purpose::STANDARD.encode(patch),
    ))
}
