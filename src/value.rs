//! Dynamic host values
//!
//! Host object properties, override values, and method arguments/returns are all
//! dynamically typed in the instrumented environment. `Value` is the crate's
//! representation of that type universe. It serializes untagged so that a config
//! document can write `"en-US"`, `24`, or `false` directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed host value.
///
/// `Undefined` models a property slot or return value that carries no value;
/// it serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// String value (user agent strings, platform names, data URLs)
    Str(String),
    /// Integer value (screen dimensions, color depth, timezone offsets)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Ordered collection (empty plugin/MIME-type lists in the generic profile)
    List(Vec<Value>),
    /// Missing value; must stay the last variant so untagged deserialization
    /// only falls through to it for JSON `null`
    Undefined,
}

impl Value {
    /// True when this value is the `Undefined` marker.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Borrow the string contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
