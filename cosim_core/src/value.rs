//! Typed values and text coercion.
//!
//! Every value that crosses the engine boundary is one of four scalar kinds.
//! [`TypedValue`] is the closed union over them; reads, writes and
//! comparisons dispatch on its tag with an exhaustive `match`.

use crate::catalog::ModelVariable;
use crate::error::CoreError;
use cosim_env::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value tagged with its declared type.
///
/// Equality is type-aware: numbers compare by value, strings by content,
/// and values of different tags are never equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum TypedValue {
    Integer(i32),
    Boolean(bool),
    Real(f64),
    String(String),
}

impl TypedValue {
    /// Returns the tag of this value.
    pub fn variable_type(&self) -> VariableType {
        match self {
            TypedValue::Integer(_) => VariableType::Integer,
            TypedValue::Boolean(_) => VariableType::Boolean,
            TypedValue::Real(_) => VariableType::Real,
            TypedValue::String(_) => VariableType::String,
        }
    }

    /// Parses text as the given type.
    ///
    /// Returns `None` when the text is not a valid literal of that type.
    /// Integers are parsed as floating point and truncated toward zero, so
    /// `"1.0"` and `"-2.7"` are accepted as `1` and `-2`.
    pub fn parse(var_type: VariableType, raw: &str) -> Option<Self> {
        match var_type {
            VariableType::Integer => {
                let parsed: f64 = raw.trim().parse().ok()?;
                if !parsed.is_finite() {
                    return None;
                }
                let truncated = parsed.trunc();
                if truncated < i32::MIN as f64 || truncated > i32::MAX as f64 {
                    return None;
                }
                Some(TypedValue::Integer(truncated as i32))
            }
            VariableType::Boolean => {
                let text = raw.trim();
                if text.eq_ignore_ascii_case("true") {
                    Some(TypedValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(TypedValue::Boolean(false))
                } else {
                    None
                }
            }
            VariableType::Real => raw.trim().parse().ok().map(TypedValue::Real),
            VariableType::String => Some(TypedValue::String(raw.to_string())),
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            TypedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            TypedValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Boolean(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" so 1.0 does not print like an integer
            TypedValue::Real(v) => write!(f, "{:?}", v),
            TypedValue::String(v) => f.write_str(v),
        }
    }
}

/// Converts text to the declared type of `variable`.
///
/// Fails with [`CoreError::InvalidValueFormat`] naming the variable and the
/// offending text.
pub fn coerce(variable: &ModelVariable, raw: &str) -> Result<TypedValue, CoreError> {
    TypedValue::parse(variable.var_type, raw).ok_or_else(|| CoreError::InvalidValueFormat {
        variable: variable.name.clone(),
        expected: variable.var_type,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_env::{Causality, ValueReference, Variability};

    fn variable(var_type: VariableType) -> ModelVariable {
        ModelVariable {
            name: "x".to_string(),
            var_type,
            causality: Causality::Input,
            variability: Variability::Continuous,
            value_reference: ValueReference(0),
            default: None,
        }
    }

    #[test]
    fn test_integer_accepts_float_text_and_truncates() {
        let var = variable(VariableType::Integer);

        assert_eq!(coerce(&var, "1.0").unwrap(), TypedValue::Integer(1));
        assert_eq!(coerce(&var, "2.9").unwrap(), TypedValue::Integer(2));
        assert_eq!(coerce(&var, "-2.9").unwrap(), TypedValue::Integer(-2));
        assert_eq!(coerce(&var, " 10 ").unwrap(), TypedValue::Integer(10));
    }

    #[test]
    fn test_integer_rejects_garbage_and_overflow() {
        let var = variable(VariableType::Integer);

        assert!(coerce(&var, "ten").is_err());
        assert!(coerce(&var, "NaN").is_err());
        assert!(coerce(&var, "1e12").is_err());
    }

    #[test]
    fn test_boolean_is_case_insensitive() {
        let var = variable(VariableType::Boolean);

        assert_eq!(coerce(&var, "TRUE").unwrap(), TypedValue::Boolean(true));
        assert_eq!(coerce(&var, "False").unwrap(), TypedValue::Boolean(false));
        assert!(coerce(&var, "1").is_err());
        assert!(coerce(&var, "yes").is_err());
    }

    #[test]
    fn test_real_and_string() {
        assert_eq!(
            coerce(&variable(VariableType::Real), "2.6").unwrap(),
            TypedValue::Real(2.6)
        );
        assert_eq!(
            coerce(&variable(VariableType::String), " Hello, world! ").unwrap(),
            TypedValue::String(" Hello, world! ".to_string())
        );
    }

    #[test]
    fn test_invalid_format_names_variable_and_text() {
        let err = coerce(&variable(VariableType::Real), "abc").unwrap_err();

        match err {
            CoreError::InvalidValueFormat { variable, expected, raw } => {
                assert_eq!(variable, "x");
                assert_eq!(expected, VariableType::Real);
                assert_eq!(raw, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_equality_is_type_aware() {
        assert_eq!(TypedValue::Real(1.0), TypedValue::Real(1.0));
        assert_ne!(TypedValue::Integer(1), TypedValue::Real(1.0));
        assert_ne!(TypedValue::String("1".into()), TypedValue::Integer(1));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for value in [
            TypedValue::Integer(-3),
            TypedValue::Boolean(true),
            TypedValue::Real(1.0),
            TypedValue::Real(0.1),
            TypedValue::String("abc".into()),
        ] {
            let text = value.to_string();
            assert_eq!(TypedValue::parse(value.variable_type(), &text), Some(value));
        }
    }
}
