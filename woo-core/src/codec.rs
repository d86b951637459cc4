//! Message Codec
//!
//! Computed binding results leave the worker as MessagePack payloads. The
//! transport itself lives elsewhere; this module only defines the payload
//! and its encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::reactive::{TraceKey, Value};

/// A recomputed binding, ready to be posted to the main thread.
///
/// Built by the `on_changed` callback of a traced binding:
///
/// ```rust
/// use serde_json::json;
/// use woo_core::codec::ChangeMessage;
/// use woo_core::reactive::{Runtime, TraceKey};
///
/// let runtime = Runtime::new();
/// let scope = runtime.create_scope("cid-1", json!({"title": "hi"})).unwrap();
/// let key = TraceKey::new(scope.name().clone(), "title");
///
/// scope
///     .trace_call("title", |s| s.root().get("title"), move |value| {
///         let payload = ChangeMessage::new(&key, &value).encode().unwrap();
///         assert!(!payload.is_empty());
///     })
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub scope: String,
    pub key: String,
    pub value: JsonValue,
}

impl ChangeMessage {
    /// Snapshot `value` as the new result of `key`.
    pub fn new(key: &TraceKey, value: &Value) -> Self {
        Self {
            scope: key.scope().to_string(),
            key: key.name().to_string(),
            value: value.snapshot(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Encode an untracked snapshot of `value`.
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a payload into a detached value.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let json: JsonValue = rmp_serde::from_slice(bytes)?;
    Ok(Value::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScopeError;
    use serde_json::json;

    #[test]
    fn value_payload_decodes_to_detached_graph() {
        let value = Value::from(json!({"title": "hi", "items": [1, 2]}));
        let bytes = encode_value(&value).unwrap();

        let decoded = decode_value(&bytes).unwrap();
        assert_eq!(decoded.snapshot(), value.snapshot());
        assert!(!decoded.as_node().unwrap().is_tracked());
    }

    #[test]
    fn change_message_carries_scope_and_key() {
        let key = TraceKey::new("cid-1".into(), "title");
        let message = ChangeMessage::new(&key, &Value::from("hello"));

        let decoded = ChangeMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded.scope, "cid-1");
        assert_eq!(decoded.key, "title");
        assert_eq!(decoded.value, json!("hello"));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = encode_value(&Value::from(json!({"a": [1, 2, 3]}))).unwrap();
        let err = decode_value(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, ScopeError::Decode(_)));
    }
}
