use json_patch::Patch;
use serde_json::Value;

use crate::errors::PatchError;

/// Compute the JSON Patch (RFC 6902) that turns `original` into `mutated`.
///
/// Both documents are parsed before diffing, so the result only depends on
/// their structure: applying the patch to `original` yields a document equal
/// to `mutated`.
pub fn create_patch(original: &[u8], mutated: &[u8]) -> Result<Patch, PatchError> {
    let original: Value = serde_json::from_slice(original).map_err(PatchError::Original)?;
    let mutated: Value = serde_json::from_slice(mutated).map_err(PatchError::Mutated)?;

    Ok(json_patch::diff(&original, &mutated))
}

/// Serialized form of the patch, as carried by an AdmissionResponse before
/// the base64 encoding.
pub fn encode_patch(patch: &Patch) -> Result<Vec<u8>, PatchError> {
    serde_json::to_vec(patch).map_err(PatchError::Serialize)
}
