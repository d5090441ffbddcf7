//! Request payloads and their declared encodings.

use bytes::Bytes;
use serde_json::Value;

use crate::{Form, QueryPairs, Result};

/// Declared encoding for a structured request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyKind {
    /// Serialize as JSON (`application/json`).
    #[default]
    Json,
    /// Serialize object fields as `application/x-www-form-urlencoded`.
    Query,
    /// Build a `multipart/form-data` body from object fields.
    Form,
    /// Pass the payload through unconverted.
    Raw,
}

/// A request payload.
///
/// Transport-native shapes ([`Payload::Bytes`], a pre-built [`Payload::Form`],
/// pre-built [`Payload::Query`] pairs) pass through the codec unchanged
/// regardless of the declared [`BodyKind`]; structured values are encoded
/// according to it.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A structured JSON value.
    Value(Value),
    /// Plain text.
    Text(String),
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// A pre-built multipart form, sent as-is.
    Form(Form),
    /// Pre-built query pairs, sent url-encoded.
    Query(QueryPairs),
}

impl Payload {
    /// Builds a structured payload from any `Serialize` value.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    /// Returns `true` if the payload is transport-native and skips encoding.
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::Form(_) | Self::Query(_))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Self::Form(form)
    }
}

impl From<QueryPairs> for Payload {
    fn from(pairs: QueryPairs) -> Self {
        Self::Query(pairs)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_json_constructor() {
        #[derive(serde::Serialize)]
        struct User {
            name: String,
        }

        let payload = Payload::json(&User {
            name: "Alice".to_string(),
        })
        .expect("serialize");
        let_assert!(Payload::Value(value) = payload);
        check!(value == json!({"name": "Alice"}));
    }

    #[test]
    fn passthrough_shapes() {
        check!(Payload::from(Bytes::from_static(b"raw")).is_passthrough());
        check!(Payload::from(Form::new()).is_passthrough());
        check!(Payload::from(QueryPairs::new()).is_passthrough());
        check!(!Payload::from("text").is_passthrough());
        check!(!Payload::Value(json!({})).is_passthrough());
    }
}
