//! Typed values held by configuration entries.
//!
//! Entries persist their values as text. A store declares each entry's
//! [`ValueType`], and reads convert the (resolved) text into a [`Value`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Char,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "real", alias = "double")]
    Float,
    #[serde(alias = "logical", alias = "boolean")]
    Bool,
}

impl ValueType {
    /// Parses a type name as written in store definitions.
    ///
    /// Accepts the common aliases (`integer`, `real`, `logical`, ...).
    #[must_use]
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "char" => Some(Self::Char),
            "int" | "integer" => Some(Self::Int),
            "float" | "real" | "double" => Some(Self::Float),
            "bool" | "boolean" | "logical" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Canonical name of this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Char => "char",
            Self::Int => "integer",
            Self::Float => "real",
            Self::Bool => "logical",
        }
    }

    /// Converts raw text into a value of this type.
    ///
    /// Returns `None` when the text does not parse.
    #[must_use]
    pub fn convert(self, raw: &str) -> Option<Value> {
        match self {
            Self::String | Self::Char => Some(Value::String(raw.to_string())),
            Self::Int => raw.trim().parse::<i64>().ok().map(Value::Int),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            Self::Bool => parse_bool(raw).map(Value::Bool),
        }
    }

    /// Returns true if `raw` converts cleanly into this type.
    #[must_use]
    pub fn accepts(self, raw: &str) -> bool {
        self.convert(raw).is_some()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "TRUE" | "T" | ".TRUE." | "YES" | "ON" | "1" => Some(true),
        "FALSE" | "F" | ".FALSE." | "NO" | "OFF" | "0" => Some(false),
        _ => None,
    }
}

/// A typed configuration value.
///
/// # Examples
///
/// ```
/// use casekit::Value;
///
/// let tasks = Value::from(64);
/// let flag = Value::from(false);
///
/// assert_eq!(tasks.as_int(), Some(64));
/// assert_eq!(flag.to_string(), "FALSE");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the type name for display.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "logical",
            Self::Int(_) => "integer",
            Self::Float(_) => "real",
            Self::String(_) => "string",
        }
    }

    /// Text form written into stores.
    #[must_use]
    pub fn to_raw(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
