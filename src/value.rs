//! Engine-native value type crossing the automation boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value as the measurement engine's automation interface represents it.
///
/// The engine is loosely typed at its boundary: signal reads come back as
/// "stringable numbers" and CAPL function results arrive as whatever the
/// engine's runtime produced. `EngineValue` keeps that shape and offers
/// lossy accessors for the conversions the bridge actually needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value (CAPL int, byte, word, dword, long, int64, qword).
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value, possibly a textual rendering of a number.
    Str(String),
    /// No value (a void function's result).
    Null,
}

impl EngineValue {
    /// Extract the value as f64, parsing textual renderings of numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EngineValue::Float(f) => Some(*f),
            EngineValue::Int(i) => Some(*i as f64),
            EngineValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Extract the value as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EngineValue::Int(i) => Some(*i),
            EngineValue::Float(f) => Some(*f as i64),
            EngineValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Extract the value as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EngineValue::Bool(b) => Some(*b),
            EngineValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// True for the `Null` variant.
    pub fn is_null(&self) -> bool {
        matches!(self, EngineValue::Null)
    }
}

impl fmt::Display for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineValue::Bool(b) => write!(f, "{}", b),
            EngineValue::Int(i) => write!(f, "{}", i),
            EngineValue::Float(fl) => write!(f, "{}", fl),
            EngineValue::Str(s) => write!(f, "{}", s),
            EngineValue::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for EngineValue {
    fn from(value: bool) -> Self {
        EngineValue::Bool(value)
    }
}

impl From<i64> for EngineValue {
    fn from(value: i64) -> Self {
        EngineValue::Int(value)
    }
}

impl From<i32> for EngineValue {
    fn from(value: i32) -> Self {
        EngineValue::Int(value as i64)
    }
}

impl From<f64> for EngineValue {
    fn from(value: f64) -> Self {
        EngineValue::Float(value)
    }
}

impl From<&str> for EngineValue {
    fn from(value: &str) -> Self {
        EngineValue::Str(value.to_string())
    }
}

impl From<String> for EngineValue {
    fn from(value: String) -> Self {
        EngineValue::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64_parses_stringable_numbers() {
        assert_eq!(EngineValue::Str("42.5".to_string()).as_f64(), Some(42.5));
        assert_eq!(EngineValue::Str(" 17 ".to_string()).as_f64(), Some(17.0));
        assert_eq!(EngineValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(EngineValue::Str("n/a".to_string()).as_f64(), None);
        assert_eq!(EngineValue::Null.as_f64(), None);
        assert_eq!(EngineValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(EngineValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(EngineValue::Str("100".to_string()).as_i64(), Some(100));
    }

    #[test]
    fn test_display() {
        assert_eq!(EngineValue::Int(7).to_string(), "7");
        assert_eq!(EngineValue::Null.to_string(), "null");
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(EngineValue::from(5_i32), EngineValue::Int(5));
        assert_eq!(
            EngineValue::from("hi"),
            EngineValue::Str("hi".to_string())
        );
    }
}
