//! Engine-neutral values crossing the native/script boundary.

use std::fmt;

use super::ObjectHandle;

/// A script value after it left the engine, or a native value before it
/// enters it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Dynamic {
    /// `undefined`, and the result of void natives
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A wrapped native object
    Object(ObjectHandle),
}

impl Dynamic {
    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "undefined",
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Dynamic::Void)
    }

    pub fn as_handle(&self) -> Option<ObjectHandle> {
        match self {
            Dynamic::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The value as a number, for both integer and float payloads.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Int(v) => Some(*v as f64),
            Dynamic::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Void => f.write_str("undefined"),
            Dynamic::Null => f.write_str("null"),
            Dynamic::Bool(v) => write!(f, "{v}"),
            Dynamic::Int(v) => write!(f, "{v}"),
            Dynamic::Float(v) => f.write_str(&format_number(*v)),
            Dynamic::String(s) => f.write_str(s),
            Dynamic::Object(handle) => write!(f, "[native object #{}]", handle.index),
        }
    }
}

/// Format a number the way script `String(n)` does for common values.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        let name = if value > 0.0 { "Infinity" } else { "-Infinity" };
        name.to_owned()
    } else if value == 0.0 {
        "0".to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl From<i64> for Dynamic {
    fn from(value: i64) -> Self {
        Dynamic::Int(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Float(value)
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_owned())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}
