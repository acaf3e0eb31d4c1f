//! mpv JSON IPC wire format.
//!
//! Every message is a single JSON object terminated by a newline:
//!
//! ```text
//! -> {"command": ["get_property", "volume"], "request_id": 7}
//! <- {"data": 100.0, "error": "success", "request_id": 7}
//! <- {"event": "end-file", "reason": "error", "playlist_entry_id": 3, "file_error": "loading failed"}
//! ```
//!
//! Replies carry the `request_id` of the request they answer; anything with an
//! `event` field is an asynchronous notification.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::error::{PlayerError, Result};

/// A dynamically typed value as carried by the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Short name of the variant, used in `TypeMismatch` errors.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Number(_) => "number",
            PropertyValue::String(_) => "string",
            PropertyValue::Array(_) => "array",
            PropertyValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    fn mismatch(&self, expected: &'static str) -> PlayerError {
        PlayerError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            PropertyValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            PropertyValue::Number(n) => Ok(*n),
            other => Err(other.mismatch("number")),
        }
    }

    /// Numeric value truncated toward zero.
    pub fn as_i64(&self) -> Result<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            PropertyValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[PropertyValue]> {
        match self {
            PropertyValue::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, PropertyValue>> {
        match self {
            PropertyValue::Map(map) => Ok(map),
            other => Err(other.mismatch("map")),
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        match self {
            PropertyValue::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            other => write!(f, "{}", Value::from(other.clone())),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => PropertyValue::String(s),
            Value::Array(items) => {
                PropertyValue::Array(items.into_iter().map(PropertyValue::from).collect())
            }
            Value::Object(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            // Integral values go out as JSON integers; mpv rejects 1.0 for
            // integer-typed arguments such as playlist indices.
            PropertyValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                json!(n as i64)
            }
            PropertyValue::Number(n) => json!(n),
            PropertyValue::String(s) => Value::String(s),
            PropertyValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            PropertyValue::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Number(n.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n as f64)
    }
}

impl From<usize> for PropertyValue {
    fn from(n: usize) -> Self {
        PropertyValue::Number(n as f64)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

/// Reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: u64,
    pub error: String,
    pub data: PropertyValue,
}

impl Response {
    pub fn into_result(self) -> Result<PropertyValue> {
        if self.error == "success" {
            Ok(self.data)
        } else {
            Err(PlayerError::Command(self.error))
        }
    }
}

/// Asynchronous notification pushed by the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub name: String,
    /// Observer id for `property-change` events.
    pub id: Option<i64>,
    /// Property name for `property-change` events.
    pub property: Option<String>,
    pub data: PropertyValue,
    /// Every other top-level field (`playlist_entry_id`, `file_error`, ...).
    pub extra: BTreeMap<String, PropertyValue>,
}

impl Event {
    pub fn extra_i64(&self, key: &str) -> Option<i64> {
        self.extra.get(key).and_then(|v| v.as_i64().ok())
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str().ok())
    }
}

/// Anything that can arrive on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Response(Response),
    Event(Event),
}

/// Encode a command as a newline-terminated request line.
pub fn encode_request(request_id: u64, command: &[PropertyValue]) -> String {
    let command: Vec<Value> = command.iter().cloned().map(Value::from).collect();
    let mut line = json!({
        "command": command,
        "request_id": request_id,
    })
    .to_string();
    line.push('\n');
    line
}

/// Decode one line received from the socket.
pub fn decode_message(line: &str) -> Result<Message> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| PlayerError::Protocol(e.to_string()))?;

    let Value::Object(mut fields) = value else {
        return Err(PlayerError::Protocol(format!("expected object: {}", line)));
    };

    if let Some(name) = fields.remove("event") {
        let name = match name {
            Value::String(s) => s,
            other => return Err(PlayerError::Protocol(format!("bad event name: {}", other))),
        };
        let id = fields.remove("id").and_then(|v| v.as_i64());
        let property = match fields.remove("name") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let data = fields
            .remove("data")
            .map(PropertyValue::from)
            .unwrap_or_default();
        let extra = fields
            .into_iter()
            .map(|(k, v)| (k, PropertyValue::from(v)))
            .collect();

        return Ok(Message::Event(Event {
            name,
            id,
            property,
            data,
            extra,
        }));
    }

    let request_id = fields
        .get("request_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| PlayerError::Protocol(format!("neither event nor reply: {}", line)))?;

    let error = match fields.remove("error") {
        Some(Value::String(s)) => s,
        _ => "success".to_string(),
    };
    let data = fields
        .remove("data")
        .map(PropertyValue::from)
        .unwrap_or_default();

    Ok(Message::Response(Response {
        request_id,
        error,
        data,
    }))
}
