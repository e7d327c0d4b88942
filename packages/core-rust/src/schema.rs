use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::InputMap;

/// One schema violation, keyed by the offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the field (e.g. `"userName"`, `"address.city"`).
    pub key: String,
    /// Human-readable description of the violation.
    pub message: String,
}

/// Result of validating an input map against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The input conforms to the schema.
    Valid,
    /// The input violates one or more schema constraints, all of them listed.
    Invalid {
        errors: Vec<ValidationIssue>,
    },
}

impl ValidationResult {
    /// Builds a result from a (possibly empty) list of violations.
    #[must_use]
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Consumes the result, returning the violations (empty when valid).
    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        match self {
            Self::Valid => Vec::new(),
            Self::Invalid { errors } => errors,
        }
    }
}

/// The schema itself could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schema: {reason}")]
pub struct SchemaError {
    pub reason: String,
}

/// Checks an input map against a declared schema.
///
/// Implementations must report every violation, not just the first.
pub trait SchemaValidator: Send + Sync {
    /// Validate `input` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when `schema` is not a usable schema.
    fn validate(&self, schema: &Value, input: &InputMap) -> Result<ValidationResult, SchemaError>;
}

/// JSON Schema validator backed by the `jsonschema` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, input: &InputMap) -> Result<ValidationResult, SchemaError> {
        let compiled = jsonschema::validator_for(schema).map_err(|err| SchemaError {
            reason: err.to_string(),
        })?;
        let instance = Value::Object(input.clone());
        let issues = compiled
            .iter_errors(&instance)
            .map(|err| {
                let parent = pointer_to_key(&err.instance_path.to_string());
                let key = match &err.kind {
                    ValidationErrorKind::Required { property } => {
                        let property = property
                            .as_str()
                            .map_or_else(|| property.to_string(), str::to_string);
                        join_key(&parent, &property)
                    }
                    _ => parent,
                };
                ValidationIssue {
                    key,
                    message: err.to_string(),
                }
            })
            .collect();
        Ok(ValidationResult::from_issues(issues))
    }
}

/// `/address/city` -> `address.city`, unescaping `~1` and `~0`.
fn pointer_to_key(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

fn join_key(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn input(value: Value) -> InputMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn valid_input_passes() {
        let schema = json!({"type": "object", "required": ["userName"]});
        let result = JsonSchemaValidator
            .validate(&schema, &input(json!({"userName": "ada"})))
            .unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn collects_every_missing_required_field() {
        let schema = json!({
            "type": "object",
            "required": ["userName", "password"],
        });
        let issues = JsonSchemaValidator
            .validate(&schema, &InputMap::new())
            .unwrap()
            .into_issues();
        assert_eq!(issues.len(), 2);
        let keys: Vec<_> = issues.iter().map(|i| i.key.as_str()).collect();
        assert!(keys.contains(&"userName"));
        assert!(keys.contains(&"password"));
        assert!(issues.iter().all(|i| !i.message.is_empty()));
    }

    #[test]
    fn nested_violation_keys_are_dotted() {
        let schema = json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {"zip": {"type": "string"}},
                    "required": ["city"],
                },
            },
        });
        let issues = JsonSchemaValidator
            .validate(&schema, &input(json!({"address": {"zip": 5}})))
            .unwrap()
            .into_issues();
        let keys: Vec<_> = issues.iter().map(|i| i.key.as_str()).collect();
        assert!(keys.contains(&"address.city"));
        assert!(keys.contains(&"address.zip"));
    }

    #[test]
    fn broken_schema_is_an_error() {
        let schema = json!({"type": 12});
        assert!(JsonSchemaValidator.validate(&schema, &InputMap::new()).is_err());
    }

    #[test]
    fn pointer_conversion_unescapes() {
        assert_eq!(pointer_to_key(""), "");
        assert_eq!(pointer_to_key("/a~1b/c~0d"), "a/b.c~d");
    }
}
