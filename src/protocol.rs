//! Operation wire format
//!
//! A request is a single JSON object: the operation name under `op` with the
//! operation's fields merged in flat beside it.
//!
//! ```text
//! {"op": "user.validate", "uid": "u1", "token": "eyJ..."}
//! ```
//!
//! A response is a single frame holding JSON, or, when the backend fails
//! internally, bare error text. Both are represented by [`Reply`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{Error, Result};

/// Operations understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    UserQuery,
    UserMod,
    UserMkToken,
    UserValidate,
    UserRmToken,
    EmojiInsert,
    EmojiQuery,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserQuery => "user.query",
            Self::UserMod => "user.mod",
            Self::UserMkToken => "user.mktoken",
            Self::UserValidate => "user.validate",
            Self::UserRmToken => "user.rmtoken",
            Self::EmojiInsert => "emoji.insert",
            Self::EmojiQuery => "emoji.query",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request as sent over the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    op: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Envelope {
    /// Envelope with no fields besides `op`
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            fields: Map::new(),
        }
    }

    /// Build an envelope from any value that serializes to a JSON object (or unit/null).
    ///
    /// Fields are merged flat next to `op`; a field named `op` is rejected.
    pub fn with_fields<F: Serialize + ?Sized>(op: impl Into<String>, fields: &F) -> Result<Self> {
        let fields = match serde_json::to_value(fields)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::InvalidEnvelope(format!(
                    "fields must serialize to an object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        if fields.contains_key("op") {
            return Err(Error::InvalidEnvelope(
                "field name 'op' is reserved for the operation discriminator".into(),
            ));
        }

        Ok(Self {
            op: op.into(),
            fields,
        })
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize to the text frame sent on the wire
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded response
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Payload parsed as JSON
    Json(Value),
    /// Payload that was not valid JSON, passed through untouched
    Raw(String),
}

impl Reply {
    /// Parse a response payload, falling back to the raw text.
    pub fn parse(payload: String) -> Self {
        match serde_json::from_str(&payload) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(payload),
        }
    }

    /// Loose truthiness as the backend's callers have always applied it
    ///
    /// `null`, `false`, `0` and `""` are falsy; everything else, including
    /// empty arrays/objects and any raw payload, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Json(value) => is_truthy(value),
            Self::Raw(text) => !text.is_empty(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Decode structured data; a raw payload is reported as a backend error.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => serde_json::from_value(value)
                .map_err(|e| Error::Decode(format!("unexpected response shape: {e}"))),
            Self::Raw(text) => Err(Error::Backend(text)),
        }
    }

    /// Truthiness for call sites that need a JSON answer.
    pub fn truthy_json(self) -> Result<bool> {
        match self {
            Self::Json(value) => Ok(is_truthy(&value)),
            Self::Raw(text) => Err(Error::Backend(text)),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
