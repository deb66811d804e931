//! The message model rules operate on.
//!
//! A message is a flat map of named fields with three reserved names:
//! `message`, `source` and `timestamp`. Field lookup checks the flat key
//! first and falls back to dot-notation traversal into object values.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{EvalError, EvalResult};
use crate::value::{FromValue, Value};

pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_SOURCE: &str = "source";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Fields that [`Message::remove_field`] refuses to remove.
pub const RESERVED_FIELDS: [&str; 3] = [FIELD_MESSAGE, FIELD_SOURCE, FIELD_TIMESTAMP];

/// How JSON input is turned into messages.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Fields tried in order for the message timestamp.
    ///
    /// The first field that yields a parseable timestamp wins. If none
    /// does, the timestamp is `Utc::now()`.
    pub timestamp_fields: Vec<String>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        MessageConfig {
            timestamp_fields: vec![
                "timestamp".to_string(),
                "@timestamp".to_string(),
                "time".to_string(),
                "EventTime".to_string(),
            ],
        }
    }
}

/// A structured log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    fields: BTreeMap<String, Value>,
}

impl Message {
    pub fn new(message: impl Into<String>, source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let mut msg = Message {
            fields: BTreeMap::new(),
        };
        msg.add_field(FIELD_MESSAGE, Value::String(message.into()));
        msg.add_field(FIELD_SOURCE, Value::String(source.into()));
        msg.add_field(FIELD_TIMESTAMP, Value::Timestamp(timestamp));
        msg
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Look up a field. A flat key takes precedence over dot-notation
    /// traversal into object values (`"http.status"`).
    pub fn get_field(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(name) {
            return Some(v.clone());
        }
        let (head, rest) = name.split_once('.')?;
        match self.fields.get(head)? {
            Value::Object(obj) => traverse(obj, rest).map(Value::from_json),
            _ => None,
        }
    }

    /// Look up a field and narrow it to `X`. `None` if the field is absent
    /// or has a different type.
    pub fn get_field_as<X: FromValue>(&self, name: &str) -> Option<X> {
        self.get_field(name).and_then(X::from_value)
    }

    /// Set a field. Returns `false` if the write was ignored: empty names,
    /// empty strings and `null` are never stored, and `timestamp` only
    /// takes timestamp values. Message handles are only valid inside the
    /// evaluation that created them and are never stored either.
    pub fn add_field(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if name.is_empty() {
            return false;
        }
        match &value {
            Value::Null | Value::Message(_) => return false,
            Value::String(s) if s.is_empty() => return false,
            Value::Timestamp(_) => {}
            _ if name == FIELD_TIMESTAMP => return false,
            _ => {}
        }
        self.fields.insert(name, value);
        true
    }

    /// Set several fields; returns how many were stored.
    pub fn add_fields<I, S>(&mut self, fields: I) -> usize
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .map(|(name, value)| self.add_field(name, value))
            .filter(|stored| *stored)
            .count()
    }

    /// Remove a field. Reserved fields stay; returns the removed value.
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        if RESERVED_FIELDS.contains(&name) {
            return None;
        }
        self.fields.remove(name)
    }

    pub fn message(&self) -> Option<&str> {
        match self.fields.get(FIELD_MESSAGE) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self.fields.get(FIELD_SOURCE) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.fields.get(FIELD_TIMESTAMP) {
            Some(Value::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Build a message from a JSON object.
    ///
    /// Every key becomes a field. The timestamp comes from the first
    /// configured timestamp field that parses, or `Utc::now()`.
    pub fn from_json(value: &serde_json::Value, config: &MessageConfig) -> EvalResult<Self> {
        let Some(obj) = value.as_object() else {
            return Err(EvalError::InvalidMessage(
                "expected a JSON object".to_string(),
            ));
        };

        let mut msg = Message {
            fields: BTreeMap::new(),
        };
        for (key, val) in obj {
            if key == FIELD_TIMESTAMP {
                continue;
            }
            msg.add_field(key.as_str(), Value::from_json(val));
        }

        let timestamp = config
            .timestamp_fields
            .iter()
            .filter_map(|field| obj.get(field))
            .find_map(parse_timestamp_value)
            .unwrap_or_else(Utc::now);
        msg.add_field(FIELD_TIMESTAMP, Value::Timestamp(timestamp));
        Ok(msg)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

fn traverse<'a>(current: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let next = current.as_object()?.get(head)?;
    match rest {
        Some(rest) => traverse(next, rest),
        None => Some(next),
    }
}

// =============================================================================
// Timestamp parsing
// =============================================================================

fn parse_timestamp_value(val: &serde_json::Value) -> Option<DateTime<Utc>> {
    match val {
        serde_json::Value::Number(n) => {
            let epoch = match n.as_i64() {
                Some(i) => i,
                None => n.as_f64()? as i64,
            };
            from_epoch(epoch)
        }
        serde_json::Value::String(s) => parse_timestamp_string(s),
        _ => None,
    }
}

/// Epoch values above 1e12 are taken as milliseconds.
fn from_epoch(v: i64) -> Option<DateTime<Utc>> {
    if v > 1_000_000_000_000 {
        Utc.timestamp_millis_opt(v).single()
    } else {
        Utc.timestamp_opt(v, 0).single()
    }
}

/// RFC 3339 first, then naive ISO forms taken as UTC.
pub(crate) fn parse_timestamp_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
