//! Runtime values and their type tags.
//!
//! Every value carries one of a closed set of [`TypeTag`]s. Narrowing a
//! value to the type a parameter or return slot declares is a checked match
//! over tags: it either yields the value (widening integers to floats where
//! a float is expected) or reports the tag that was found instead.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

// =============================================================================
// Type tags
// =============================================================================

/// Static and dynamic type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Accepts every value.
    Any,
    /// The absence value; also the return type of functions run for their
    /// effect.
    Void,
    Bool,
    Integer,
    Float,
    String,
    Ip,
    Timestamp,
    /// JSON objects and arrays.
    Object,
    /// A message created during the current evaluation.
    Message,
}

impl TypeTag {
    /// Whether a value tagged `found` may be used where `self` is declared.
    ///
    /// `Any` accepts everything, every tag accepts the absence value, and
    /// `Float` accepts `Integer`.
    pub fn accepts(self, found: TypeTag) -> bool {
        match (self, found) {
            (TypeTag::Any, _) | (_, TypeTag::Void) => true,
            (TypeTag::Float, TypeTag::Integer) => true,
            (expected, found) => expected == found,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Any => "any",
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Ip => "ip",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Object => "object",
            TypeTag::Message => "message",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Values
// =============================================================================

/// Refers to a message created during one evaluation.
///
/// Handles index into the evaluation context's created messages and are
/// meaningless outside the evaluation that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(usize);

impl MessageHandle {
    pub(crate) fn new(index: usize) -> Self {
        MessageHandle(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A dynamically typed runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Ip(IpAddr),
    Timestamp(DateTime<Utc>),
    Object(serde_json::Value),
    Message(MessageHandle),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Void,
            Value::Bool(_) => TypeTag::Bool,
            Value::Integer(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Ip(_) => TypeTag::Ip,
            Value::Timestamp(_) => TypeTag::Timestamp,
            Value::Object(_) => TypeTag::Object,
            Value::Message(_) => TypeTag::Message,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Narrow to `expected`, widening integers to floats when a float is
    /// expected. On failure returns the tag that was found.
    pub fn coerce(self, expected: TypeTag) -> Result<Value, TypeTag> {
        let found = self.type_tag();
        if !expected.accepts(found) {
            return Err(found);
        }
        Ok(match (expected, self) {
            (TypeTag::Float, Value::Integer(n)) => Value::Float(n as f64),
            (_, value) => value,
        })
    }

    /// Narrow to a concrete Rust type. On failure returns the tag that was
    /// found.
    pub fn narrow<X: FromValue>(self) -> Result<X, TypeTag> {
        let found = self.type_tag();
        X::from_value(self).ok_or(found)
    }

    /// Convert a JSON value. Objects and arrays stay JSON.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::Object(other.clone()),
        }
    }

    /// Render as JSON. Addresses and timestamps become strings; non-finite
    /// floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Ip(ip) => serde_json::Value::String(ip.to_string()),
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
            Value::Object(v) => v.clone(),
            Value::Message(h) => serde_json::Value::String(format!("<message #{}>", h.index())),
        }
    }
}

/// Plain rendering: strings without quotes, `null` as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Ip(ip) => write!(f, "{ip}"),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            Value::Object(v) => write!(f, "{v}"),
            Value::Message(h) => write!(f, "<message #{}>", h.index()),
        }
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Ip(ip)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

// =============================================================================
// Narrowing to Rust types
// =============================================================================

/// Rust types a [`Value`] can be narrowed to.
pub trait FromValue: Sized {
    /// The tag a value must carry to narrow to `Self`.
    const TYPE: TypeTag;

    /// `None` if the value's tag does not fit.
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    const TYPE: TypeTag = TypeTag::Any;

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    const TYPE: TypeTag = TypeTag::Bool;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const TYPE: TypeTag = TypeTag::Integer;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const TYPE: TypeTag = TypeTag::Float;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            Value::Integer(i) => Some(i as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    const TYPE: TypeTag = TypeTag::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for IpAddr {
    const TYPE: TypeTag = TypeTag::Ip;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Ip(ip) => Some(ip),
            _ => None,
        }
    }
}

impl FromValue for DateTime<Utc> {
    const TYPE: TypeTag = TypeTag::Timestamp;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

impl FromValue for serde_json::Value {
    const TYPE: TypeTag = TypeTag::Object;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for MessageHandle {
    const TYPE: TypeTag = TypeTag::Message;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Message(h) => Some(h),
            _ => None,
        }
    }
}
