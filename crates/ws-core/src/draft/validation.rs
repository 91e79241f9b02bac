//! Step validators.
//!
//! Each step supplies a pure predicate over its payload. Validity is never
//! read back from storage; it is always recomputed through these.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of validating one step payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidation {
    /// Field names the UI should highlight.
    pub missing: Vec<String>,
}

impl StepValidation {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            missing: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

pub trait StepValidator: Send + Sync {
    fn validate(&self, payload: &Value) -> StepValidation;

    /// Canonicalize a payload before it is stored. Identity by default.
    fn normalize(&self, payload: Value) -> Value {
        payload
    }
}

impl<F> StepValidator for F
where
    F: Fn(&Value) -> StepValidation + Send + Sync,
{
    fn validate(&self, payload: &Value) -> StepValidation {
        self(payload)
    }
}

/// Validator for informational steps that are always complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl StepValidator for AcceptAll {
    fn validate(&self, _payload: &Value) -> StepValidation {
        StepValidation::ok()
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    allow_empty: bool,
}

/// Presence check over the top-level fields of an object payload.
///
/// Absent, `null` and blank-string fields are missing. Empty arrays and empty
/// objects are missing too unless the field was added with
/// [`RequiredFields::allow_empty`], which is how a step says "an explicit
/// empty selection counts as an answer".
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    rules: Vec<FieldRule>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: fields
                .into_iter()
                .map(|name| FieldRule {
                    name: name.into(),
                    allow_empty: false,
                })
                .collect(),
        }
    }

    /// Require `field` to be present, accepting `[]` and `{}` as answers.
    pub fn allow_empty(mut self, field: impl Into<String>) -> Self {
        let name = field.into();
        match self.rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => rule.allow_empty = true,
            None => self.rules.push(FieldRule {
                name,
                allow_empty: true,
            }),
        }
        self
    }

    fn is_answered(value: Option<&Value>, allow_empty: bool) -> bool {
        match value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => allow_empty || !items.is_empty(),
            Some(Value::Object(map)) => allow_empty || !map.is_empty(),
            Some(Value::Bool(_)) | Some(Value::Number(_)) => true,
        }
    }
}

impl StepValidator for RequiredFields {
    fn validate(&self, payload: &Value) -> StepValidation {
        let object = payload.as_object();
        StepValidation::missing(
            self.rules
                .iter()
                .filter(|rule| {
                    !Self::is_answered(object.and_then(|o| o.get(&rule.name)), rule.allow_empty)
                })
                .map(|rule| rule.name.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_reports_missing_in_declaration_order() {
        let validator = RequiredFields::new(["age", "name", "goals"]);
        let result = validator.validate(&json!({"name": "  ", "goals": []}));
        assert_eq!(result.missing, vec!["age", "name", "goals"]);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_required_fields_accepts_false_and_zero() {
        let validator = RequiredFields::new(["smoker", "cycles"]);
        assert!(validator
            .validate(&json!({"smoker": false, "cycles": 0}))
            .is_valid());
    }

    #[test]
    fn test_allow_empty_distinguishes_empty_array_from_absent() {
        let validator = RequiredFields::new(["conditions"]).allow_empty("conditions");

        assert!(validator.validate(&json!({"conditions": []})).is_valid());
        assert_eq!(
            validator.validate(&json!({})).missing,
            vec!["conditions".to_string()]
        );
    }

    #[test]
    fn test_non_object_payload_misses_every_field() {
        let validator = RequiredFields::new(["a", "b"]);
        assert_eq!(validator.validate(&Value::Null).missing.len(), 2);
    }

    #[test]
    fn test_closure_validator() {
        let validator = |payload: &Value| {
            if payload.get("consent") == Some(&json!(true)) {
                StepValidation::ok()
            } else {
                StepValidation::missing(["consent"])
            }
        };
        assert!(validator.validate(&json!({"consent": true})).is_valid());
        assert!(!validator.validate(&json!({"consent": false})).is_valid());
    }
}
