use thiserror::Error;

use crate::api::admission_review::GroupVersionResource;

/// Failures that reject an AdmissionReview before any mutation is attempted.
/// They are reported to the caller as transport level errors.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("empty body")]
    EmptyBody,

    #[error("failed to deserialize body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("missing admission request")]
    MissingRequest,

    #[error("resource is not a pod, got {0}")]
    UnsupportedResource(GroupVersionResource),
}

/// Failures of the mutation pipeline. They are turned into an admission
/// denial, the caller always gets a well formed decision.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("admission request carries no object")]
    MissingObject,

    #[error("failed to parse pod: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to marshal mutated pod: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to create patch: {0}")]
    Patch(#[from] PatchError),
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("original object is not valid JSON: {0}")]
    Original(#[source] serde_json::Error),

    #[error("mutated object is not valid JSON: {0}")]
    Mutated(#[source] serde_json::Error),

    #[error("cannot serialize patch: {0}")]
    Serialize(#[source] serde_json::Error),
}
