use std::{fmt, str::FromStr};

use k8s_openapi::api::core::v1::Toleration as CoreToleration;
use thiserror::Error;

/// Help text describing the grammar accepted by [`Toleration::from_str`]
pub const TOLERATION_FORMAT_DESCRIPTION: &str = "OP:KEY:VALUE:EFFECT:PERIOD
If fewer segments are specified, the remainder are treated as empty
Segments:
    OP: Required, one of 'Exists', 'Equal'
    KEY: Required unless OP is 'Exists'
    VALUE: Optional, must be empty if OP is 'Exists'
    EFFECT: Optional, one of 'NoSchedule', 'PreferNoSchedule' or 'NoExecute'
    PERIOD: Optional, must be in duration format, e.g. '1m30s'";

const MAX_SEGMENTS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("error parsing toleration: {reason}")]
pub struct ParseTolerationError {
    reason: String,
}

impl ParseTolerationError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    Equal,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exists => "Exists",
            Operator::Equal => "Equal",
        }
    }
}

impl FromStr for Operator {
    type Err = ParseTolerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exists" => Ok(Operator::Exists),
            "Equal" => Ok(Operator::Equal),
            other => Err(ParseTolerationError::new(format!(
                "invalid operator {other:?}"
            ))),
        }
    }
}

/// Taint effect matched by a toleration. An unset effect matches all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::NoSchedule => "NoSchedule",
            Effect::PreferNoSchedule => "PreferNoSchedule",
            Effect::NoExecute => "NoExecute",
        }
    }
}

impl FromStr for Effect {
    type Err = ParseTolerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoSchedule" => Ok(Effect::NoSchedule),
            "PreferNoSchedule" => Ok(Effect::PreferNoSchedule),
            "NoExecute" => Ok(Effect::NoExecute),
            other => Err(ParseTolerationError::new(format!("invalid effect {other:?}"))),
        }
    }
}

/// The toleration injected into every admitted Pod.
///
/// Built once from the startup configuration and shared read-only by all the
/// request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toleration {
    pub operator: Operator,
    pub key: String,
    pub value: String,
    pub effect: Option<Effect>,
    /// Eviction grace period, whole seconds
    pub toleration_seconds: Option<i64>,
}

impl FromStr for Toleration {
    type Err = ParseTolerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseTolerationError::new("empty value"));
        }

        let segments: Vec<&str> = s.split(':').collect();
        if segments.len() > MAX_SEGMENTS {
            return Err(ParseTolerationError::new(format!(
                "too many segments, expected at most {MAX_SEGMENTS}, found {}",
                segments.len()
            )));
        }

        let operator = segments[0].parse::<Operator>()?;
        let key = segments.get(1).copied().unwrap_or_default().to_owned();
        let value = segments.get(2).copied().unwrap_or_default().to_owned();
        let effect = segments
            .get(3)
            .map(|effect| effect.parse::<Effect>())
            .transpose()?;
        let toleration_seconds = segments
            .get(4)
            .map(|period| parse_period(period))
            .transpose()?;

        match operator {
            Operator::Equal if key.is_empty() => {
                return Err(ParseTolerationError::new(
                    "a key is required when the operator is 'Equal'",
                ));
            }
            Operator::Exists if !value.is_empty() => {
                return Err(ParseTolerationError::new(format!(
                    "value must be empty when the operator is 'Exists', found {value:?}"
                )));
            }
            _ => {}
        }

        Ok(Toleration {
            operator,
            key,
            value,
            effect,
            toleration_seconds,
        })
    }
}

fn parse_period(period: &str) -> Result<i64, ParseTolerationError> {
    let duration = humantime::parse_duration(period).map_err(|e| {
        ParseTolerationError::new(format!(
            "invalid toleration period {period:?}, must be valid duration ({e})"
        ))
    })?;

    i64::try_from(duration.as_secs()).map_err(|_| {
        ParseTolerationError::new(format!("toleration period {period:?} is too large"))
    })
}

/// Formats the toleration back into the `OP:KEY:VALUE:EFFECT:PERIOD` grammar,
/// omitting trailing empty segments.
impl fmt::Display for Toleration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = vec![
            self.operator.as_str().to_owned(),
            self.key.clone(),
            self.value.clone(),
            self.effect
                .map(|effect| effect.as_str().to_owned())
                .unwrap_or_default(),
            self.toleration_seconds
                .map(|seconds| format!("{seconds}s"))
                .unwrap_or_default(),
        ];
        while segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        write!(f, "{}", segments.join(":"))
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

impl From<&Toleration> for CoreToleration {
    fn from(toleration: &Toleration) -> Self {
        CoreToleration {
            effect: toleration.effect.map(|effect| effect.as_str().to_owned()),
            key: non_empty(&toleration.key),
            operator: Some(toleration.operator.as_str().to_owned()),
            toleration_seconds: toleration.toleration_seconds,
            value: non_empty(&toleration.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_exists_only() {
        let toleration: Toleration = "Exists".parse().unwrap();

        assert_eq!(toleration.operator, Operator::Exists);
        assert!(toleration.key.is_empty());
        assert!(toleration.value.is_empty());
        assert_eq!(toleration.effect, None);
        assert_eq!(toleration.toleration_seconds, None);
    }

    #[test]
    fn parse_all_segments() {
        let toleration: Toleration = "Equal:foo:bar:NoSchedule:1m30s".parse().unwrap();

        assert_eq!(
            toleration,
            Toleration {
                operator: Operator::Equal,
                key: "foo".to_owned(),
                value: "bar".to_owned(),
                effect: Some(Effect::NoSchedule),
                toleration_seconds: Some(90),
            }
        );
    }

    #[test]
    fn period_truncates_to_whole_seconds() {
        let toleration: Toleration = "Exists:node.kubernetes.io/unreachable::NoExecute:2500ms"
            .parse()
            .unwrap();

        assert_eq!(toleration.toleration_seconds, Some(2));
    }

    #[rstest]
    #[case::empty("")]
    #[case::unknown_operator("Bogus:foo")]
    #[case::lowercase_operator("exists")]
    #[case::unknown_effect("Equal:foo:bar:WrongEffect")]
    #[case::empty_effect_segment("Equal:foo:bar:")]
    #[case::invalid_period("Equal:foo:bar:NoSchedule:soon")]
    #[case::too_many_segments("Equal:foo:bar:NoSchedule:1m:extra")]
    #[case::equal_without_key("Equal")]
    #[case::exists_with_value("Exists:foo:bar")]
    fn malformed_descriptors_are_rejected(#[case] input: &str) {
        let result = input.parse::<Toleration>();

        let err = result.expect_err("descriptor should be rejected");
        assert!(err.to_string().starts_with("error parsing toleration"));
    }

    #[rstest]
    #[case("Exists")]
    #[case("Exists:dedicated")]
    #[case("Exists:::NoExecute")]
    #[case("Exists:::NoExecute:5m")]
    #[case("Equal:dedicated:gpu")]
    #[case("Equal:dedicated:gpu:NoSchedule")]
    #[case("Equal:foo:bar:NoSchedule:1m30s")]
    #[case("Equal:foo::PreferNoSchedule:0s")]
    fn format_is_inverse_of_parse(#[case] input: &str) {
        let parsed: Toleration = input.parse().unwrap();
        let reparsed: Toleration = parsed.to_string().parse().unwrap();

        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn format_omits_trailing_empty_segments() {
        let toleration: Toleration = "Equal:dedicated:gpu".parse().unwrap();
        assert_eq!(toleration.to_string(), "Equal:dedicated:gpu");

        let toleration: Toleration = "Equal:foo:bar:NoSchedule:1m30s".parse().unwrap();
        assert_eq!(toleration.to_string(), "Equal:foo:bar:NoSchedule:90s");
    }

    #[test]
    fn convert_to_core_toleration() {
        let toleration: Toleration = "Equal:dedicated:gpu:NoSchedule".parse().unwrap();
        let core = CoreToleration::from(&toleration);

        assert_eq!(
            serde_json::to_value(core).unwrap(),
            serde_json::json!({
                "key": "dedicated",
                "value": "gpu",
                "operator": "Equal",
                "effect": "NoSchedule",
            })
        );
    }

    #[test]
    fn convert_exists_to_core_toleration_omits_empty_fields() {
        let toleration: Toleration = "Exists".parse().unwrap();
        let core = CoreToleration::from(&toleration);

        assert_eq!(
            serde_json::to_value(core).unwrap(),
            serde_json::json!({"operator": "Exists"})
        );
    }
}
