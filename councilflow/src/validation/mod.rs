//! Declarative output-shape validation for stage results.
//!
//! External reasoning services return schema-free content; each stage
//! can declare the shape it expects back, and anything that fails the
//! check is a permanent stage failure rather than content that silently
//! propagates downstream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error describing a shape mismatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The value has the wrong JSON type.
    #[error("Expected {expected}, got {actual}")]
    WrongType {
        /// The expected type name.
        expected: &'static str,
        /// The actual type name.
        actual: &'static str,
    },

    /// A required object field is absent.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// The absent field.
        field: String,
    },
}

/// The expected shape of a stage's output value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeValidator {
    /// Any value passes.
    Any,
    /// A JSON string.
    Text,
    /// A JSON array.
    List,
    /// A JSON object with the given required fields present.
    Object {
        /// Fields that must be present (any value, including null).
        required: Vec<String>,
    },
}

impl ShapeValidator {
    /// An object shape with required fields.
    #[must_use]
    pub fn object(required: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Object {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates a value against the expected shape.
    ///
    /// # Errors
    ///
    /// Returns `ShapeError` on a type mismatch or a missing required
    /// field.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), ShapeError> {
        match self {
            Self::Any => Ok(()),
            Self::Text => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(ShapeError::WrongType {
                        expected: "string",
                        actual: json_type_name(value),
                    })
                }
            }
            Self::List => {
                if value.is_array() {
                    Ok(())
                } else {
                    Err(ShapeError::WrongType {
                        expected: "array",
                        actual: json_type_name(value),
                    })
                }
            }
            Self::Object { required } => {
                let Some(map) = value.as_object() else {
                    return Err(ShapeError::WrongType {
                        expected: "object",
                        actual: json_type_name(value),
                    });
                };
                for field in required {
                    if !map.contains_key(field) {
                        return Err(ShapeError::MissingField {
                            field: field.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything() {
        assert!(ShapeValidator::Any.validate(&serde_json::json!(null)).is_ok());
        assert!(ShapeValidator::Any.validate(&serde_json::json!([1])).is_ok());
    }

    #[test]
    fn text_requires_string() {
        assert!(ShapeValidator::Text.validate(&serde_json::json!("hi")).is_ok());
        let err = ShapeValidator::Text.validate(&serde_json::json!(42)).unwrap_err();
        assert_eq!(
            err,
            ShapeError::WrongType {
                expected: "string",
                actual: "number"
            }
        );
    }

    #[test]
    fn list_requires_array() {
        assert!(ShapeValidator::List.validate(&serde_json::json!([])).is_ok());
        assert!(ShapeValidator::List.validate(&serde_json::json!({})).is_err());
    }

    #[test]
    fn object_checks_required_fields() {
        let shape = ShapeValidator::object(["verdict", "status"]);

        assert!(shape
            .validate(&serde_json::json!({"verdict": "x", "status": "APPROVED"}))
            .is_ok());

        let err = shape
            .validate(&serde_json::json!({"verdict": "x"}))
            .unwrap_err();
        assert_eq!(
            err,
            ShapeError::MissingField {
                field: "status".to_string()
            }
        );

        assert!(shape.validate(&serde_json::json!("not an object")).is_err());
    }

    #[test]
    fn null_fields_still_count_as_present() {
        let shape = ShapeValidator::object(["verdict"]);
        assert!(shape.validate(&serde_json::json!({"verdict": null})).is_ok());
    }

    #[test]
    fn serde_round_trip() {
        let shape = ShapeValidator::object(["a"]);
        let json = serde_json::to_string(&shape).unwrap();
        let back: ShapeValidator = serde_json::from_str(&json).unwrap();
        assert_eq!(shape, back);
    }
}
