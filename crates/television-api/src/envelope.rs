//! JSON envelopes exchanged over the connection.
//!
//! Outbound frames are always calls. Inbound frames are decoded into an
//! explicit [`Inbound`] union: a reply, a model update, a generic stream
//! message, or something unrecognized. The order of the checks matters and
//! mirrors the server's conventions: `replyTo` wins over `stream`, and the
//! well-known update stream wins over generic streams.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stream name the server uses for model-update broadcasts.
pub const DEFAULT_UPDATE_STREAM: &str = "television-updates";

// ── Outbound ─────────────────────────────────────────────────────────

/// A call envelope, sent verbatim as one text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbound {
    pub channel: String,
    pub reply_to: String,
    pub error_to: String,
    pub payload: Vec<Value>,
}

impl Outbound {
    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply (or error reply) to a call, addressed to its `replyTo` channel.
    Reply { reply_to: String, payload: Value },

    /// Model-update broadcast, re-addressed to the channel named by `payload.model`.
    ModelUpdate { model: String, payload: Value },

    /// Generic stream broadcast.
    Stream { stream: String, payload: Value },

    /// Valid JSON matching none of the shapes above.
    Unrecognized(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInbound {
    #[serde(default)]
    reply_to: Option<String>,
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl Inbound {
    /// Decode a text frame. Fails only when the frame is not JSON at all.
    pub fn decode(text: &str, update_stream: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value, update_stream))
    }

    /// Classify an already-parsed JSON value.
    pub fn from_value(value: Value, update_stream: &str) -> Self {
        if !value.is_object() {
            return Self::Unrecognized(value);
        }

        let Ok(raw) = RawInbound::deserialize(&value) else {
            return Self::Unrecognized(value);
        };

        match raw {
            RawInbound {
                reply_to: Some(reply_to),
                payload,
                ..
            } => Self::Reply { reply_to, payload },
            RawInbound {
                stream: Some(stream),
                payload,
                ..
            } if stream == update_stream => match payload.get("model").and_then(Value::as_str) {
                Some(model) => Self::ModelUpdate {
                    model: model.to_owned(),
                    payload,
                },
                None => Self::Unrecognized(value),
            },
            RawInbound {
                stream: Some(stream),
                payload,
                ..
            } => Self::Stream { stream, payload },
            RawInbound { .. } => Self::Unrecognized(value),
        }
    }

    /// The event-bus channel this frame should be published on, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Reply { reply_to, .. } => Some(reply_to),
            Self::ModelUpdate { model, .. } => Some(model),
            Self::Stream { stream, .. } => Some(stream),
            Self::Unrecognized(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(value: &Value) -> Inbound {
        Inbound::decode(&value.to_string(), DEFAULT_UPDATE_STREAM).unwrap()
    }

    #[test]
    fn outbound_uses_camel_case_keys() {
        let frame = Outbound {
            channel: "widget.list".into(),
            reply_to: "promise-1".into(),
            error_to: "error-1".into(),
            payload: vec![json!(1), json!("two")],
        }
        .to_frame()
        .unwrap();

        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "channel": "widget.list",
                "replyTo": "promise-1",
                "errorTo": "error-1",
                "payload": [1, "two"]
            })
        );
    }

    #[test]
    fn reply_frame() {
        let inbound = decode(&json!({ "replyTo": "promise-7", "payload": [1, 2] }));
        assert_eq!(
            inbound,
            Inbound::Reply {
                reply_to: "promise-7".into(),
                payload: json!([1, 2]),
            }
        );
        assert_eq!(inbound.channel(), Some("promise-7"));
    }

    #[test]
    fn reply_wins_over_stream() {
        let inbound = decode(&json!({ "replyTo": "error-3", "stream": "chat", "payload": "boom" }));
        assert!(matches!(inbound, Inbound::Reply { ref reply_to, .. } if reply_to == "error-3"));
    }

    #[test]
    fn model_update_is_readdressed_by_model() {
        let payload = json!({ "model": "widget", "action": "create", "pk": 2, "data": { "pk": 2 } });
        let inbound = decode(&json!({ "stream": DEFAULT_UPDATE_STREAM, "payload": payload }));
        assert_eq!(inbound.channel(), Some("widget"));
        assert_eq!(
            inbound,
            Inbound::ModelUpdate {
                model: "widget".into(),
                payload,
            }
        );
    }

    #[test]
    fn model_update_without_model_is_unrecognized() {
        let inbound = decode(&json!({ "stream": DEFAULT_UPDATE_STREAM, "payload": { "action": "create" } }));
        assert!(matches!(inbound, Inbound::Unrecognized(_)));
    }

    #[test]
    fn custom_update_stream_name() {
        let raw = json!({ "stream": "models", "payload": { "model": "gadget" } }).to_string();
        let inbound = Inbound::decode(&raw, "models").unwrap();
        assert_eq!(inbound.channel(), Some("gadget"));
    }

    #[test]
    fn generic_stream_frame() {
        let inbound = decode(&json!({ "stream": "staff.log", "payload": { "message": "hi" } }));
        assert_eq!(
            inbound,
            Inbound::Stream {
                stream: "staff.log".into(),
                payload: json!({ "message": "hi" }),
            }
        );
    }

    #[test]
    fn unrecognized_shapes() {
        assert!(matches!(decode(&json!({ "foo": "bar" })), Inbound::Unrecognized(_)));
        assert!(matches!(decode(&json!([1, 2, 3])), Inbound::Unrecognized(_)));
        assert!(matches!(decode(&json!({ "replyTo": null })), Inbound::Unrecognized(_)));
        assert!(matches!(decode(&json!({ "stream": 5 })), Inbound::Unrecognized(_)));
        assert_eq!(decode(&json!({ "foo": "bar" })).channel(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Inbound::decode("not json at all", DEFAULT_UPDATE_STREAM).is_err());
    }
}
