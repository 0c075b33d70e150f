//! Declarative parameter schemas for tools.
//!
//! A schema is a map of parameter name to [`ParamSpec`]. Validation
//! checks declared parameters only (undeclared extras are ignored) and
//! stops at the first violation, in a fixed order: required presence,
//! type, enum membership, numeric range, string length, regex pattern.

use crate::tool::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The JSON type a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        write!(f, "{label}")
    }
}

/// Constraints for a single parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub required: bool,
    /// Enum membership: the value must equal one of these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ParamSpec {
    pub fn of(param_type: ParamType) -> Self {
        Self {
            param_type,
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of(ParamType::String)
    }

    pub fn integer() -> Self {
        Self::of(ParamType::Integer)
    }

    pub fn number() -> Self {
        Self::of(ParamType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(ParamType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// The first constraint a parameter map violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("missing required parameter '{param}'")]
    MissingRequired { param: String },

    #[error("parameter '{param}' must be of type {expected}")]
    TypeMismatch { param: String, expected: ParamType },

    #[error("parameter '{param}' is not one of the allowed values")]
    NotAllowed { param: String },

    #[error("parameter '{param}' must be >= {minimum}")]
    BelowMinimum { param: String, minimum: f64 },

    #[error("parameter '{param}' must be <= {maximum}")]
    AboveMaximum { param: String, maximum: f64 },

    #[error("parameter '{param}' must be at least {min_length} characters")]
    TooShort { param: String, min_length: usize },

    #[error("parameter '{param}' must be at most {max_length} characters")]
    TooLong { param: String, max_length: usize },

    #[error("parameter '{param}' does not match pattern '{pattern}'")]
    PatternMismatch { param: String, pattern: String },

    /// The schema itself carries an unparseable regex.
    #[error("parameter '{param}' has an invalid pattern '{pattern}'")]
    InvalidPattern { param: String, pattern: String },
}

/// Map of parameter name to its constraints. `BTreeMap` keeps listings
/// and serialized snapshots in a stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: BTreeMap<String, ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamSpec)> {
        self.params.iter()
    }

    /// Check a parameter map against this schema, returning the first
    /// violation found.
    pub fn validate(&self, params: &JsonMap) -> Result<(), SchemaViolation> {
        for (name, spec) in &self.params {
            let value = match params.get(name) {
                Some(value) => value,
                None => {
                    if spec.required {
                        return Err(SchemaViolation::MissingRequired {
                            param: name.clone(),
                        });
                    }
                    continue;
                }
            };

            if !spec.param_type.matches(value) {
                return Err(SchemaViolation::TypeMismatch {
                    param: name.clone(),
                    expected: spec.param_type,
                });
            }

            if let Some(allowed) = &spec.allowed {
                if !allowed.contains(value) {
                    return Err(SchemaViolation::NotAllowed {
                        param: name.clone(),
                    });
                }
            }

            if let Some(n) = value.as_f64() {
                if let Some(minimum) = spec.minimum {
                    if n < minimum {
                        return Err(SchemaViolation::BelowMinimum {
                            param: name.clone(),
                            minimum,
                        });
                    }
                }
                if let Some(maximum) = spec.maximum {
                    if n > maximum {
                        return Err(SchemaViolation::AboveMaximum {
                            param: name.clone(),
                            maximum,
                        });
                    }
                }
            }

            if let Some(s) = value.as_str() {
                let chars = s.chars().count();
                if let Some(min_length) = spec.min_length {
                    if chars < min_length {
                        return Err(SchemaViolation::TooShort {
                            param: name.clone(),
                            min_length,
                        });
                    }
                }
                if let Some(max_length) = spec.max_length {
                    if chars > max_length {
                        return Err(SchemaViolation::TooLong {
                            param: name.clone(),
                            max_length,
                        });
                    }
                }
                if let Some(pattern) = &spec.pattern {
                    let re = regex::Regex::new(pattern).map_err(|_| {
                        SchemaViolation::InvalidPattern {
                            param: name.clone(),
                            pattern: pattern.clone(),
                        }
                    })?;
                    if !re.is_match(s) {
                        return Err(SchemaViolation::PatternMismatch {
                            param: name.clone(),
                            pattern: pattern.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
