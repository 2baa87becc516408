//! Plugin property values
//!
//! Plugin nodes expose a flat map of string keys to loosely typed values.
//! Modules convert these into their own typed structs straight away, so
//! `ParamValue` never appears in a module's public API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat property map of one plugin node
pub type ParamMap = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

impl ParamValue {
    /// Numeric view; ints widen, bools and strings do not convert
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    /// Integer view; floats truncate toward zero
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.is_finite() => Some(*f as i32),
            _ => None,
        }
    }

    /// Boolean view; plugins commonly report toggles as 0/1 numbers
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Float(f) => Some(*f != 0.0),
            ParamValue::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form used by `pw-cli set-param`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
            ParamValue::Int(i) => serde_json::Value::from(*i),
            ParamValue::Float(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ParamValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Build from a JSON scalar; integral numbers become `Int`
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(ParamValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                    Some(ParamValue::Int(i))
                } else {
                    n.as_f64().map(|f| ParamValue::Float(f as f32))
                }
            }
            serde_json::Value::String(s) => Some(ParamValue::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(ParamValue::Int(3).as_f32(), Some(3.0));
        assert_eq!(ParamValue::Float(2.7).as_i32(), Some(2));
        assert_eq!(ParamValue::Int(0).as_bool(), Some(false));
        assert_eq!(ParamValue::Float(1.0).as_bool(), Some(true));
        assert_eq!(ParamValue::String("x".into()).as_f32(), None);
        assert_eq!(ParamValue::Bool(true).as_f32(), None);
    }

    #[test]
    fn test_json_scalars() {
        assert_eq!(
            ParamValue::from_json(&serde_json::json!(1000)),
            Some(ParamValue::Int(1000))
        );
        assert_eq!(
            ParamValue::from_json(&serde_json::json!(0.5)),
            Some(ParamValue::Float(0.5))
        );
        assert_eq!(ParamValue::from_json(&serde_json::json!(null)), None);
        assert_eq!(ParamValue::Float(0.5).to_json(), serde_json::json!(0.5));
    }
}
