use k8s_openapi::api::core::v1::{Pod, Toleration as CoreToleration};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{errors::MutationError, toleration::Toleration};

/// The Pod as seen by the mutation: the toleration list is the only field
/// we touch, everything else is carried over untouched so the generated
/// patch does not drop fields unknown to this program.
#[derive(Debug, Serialize, Deserialize)]
struct PodObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spec: Option<PodSpecObject>,

    #[serde(flatten)]
    other: Map<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PodSpecObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tolerations: Option<Vec<CoreToleration>>,

    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Append `toleration` to the Pod serialized in `raw` and return the
/// serialized mutated Pod.
///
/// Existing tolerations are never inspected: a Pod that already carries the
/// very same toleration gets it appended once more.
///
/// `raw` is parsed once. The resulting value must deserialize as a typed
/// `Pod`, which is then discarded: the mutation works on the untyped view of
/// the same value.
pub fn add_toleration(raw: &[u8], toleration: &Toleration) -> Result<Vec<u8>, MutationError> {
    let value: Value = serde_json::from_slice(raw).map_err(MutationError::Decode)?;
    Pod::deserialize(&value).map_err(MutationError::Decode)?;
    let mut pod: PodObject = serde_json::from_value(value).map_err(MutationError::Decode)?;

    pod.spec
        .get_or_insert_with(PodSpecObject::default)
        .tolerations
        .get_or_insert_with(Vec::new)
        .push(CoreToleration::from(toleration));

    serde_json::to_vec(&pod).map_err(MutationError::Encode)
}
