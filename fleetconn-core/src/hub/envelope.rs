//! Push-frame wire format
//!
//! Every frame exchanged with a push client is a JSON object with a
//! `type` tag and a `payload`. Inbound client frames carry the tag and an
//! optional `server_id` at the top level.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{MetricSnapshot, ServerStatus};

/// Frame type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A metric snapshot push
    ServerMetrics,
    /// A host status change push
    ServerStatus,
    /// Application-level ping from a client
    Ping,
    /// Application-level pong reply
    Pong,
    /// Room subscription request
    Subscribe,
    /// Acknowledgement of a client request
    Ack,
    /// Protocol error reply; the connection stays open
    Error,
}

/// One outbound push frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Frame type tag
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Typed payload; `null` for bare frames like pong
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Wraps a metric snapshot
    #[must_use]
    pub fn metrics(snapshot: &MetricSnapshot) -> Self {
        Self {
            kind: MessageType::ServerMetrics,
            payload: serde_json::to_value(snapshot).unwrap_or(Value::Null),
        }
    }

    /// Wraps a host status change
    #[must_use]
    pub fn status(server_id: u32, status: ServerStatus) -> Self {
        Self {
            kind: MessageType::ServerStatus,
            payload: json!({ "server_id": server_id, "status": status }),
        }
    }

    /// A bare pong reply
    #[must_use]
    pub fn pong() -> Self {
        Self {
            kind: MessageType::Pong,
            payload: Value::Null,
        }
    }

    /// Acknowledges a client action on a host
    #[must_use]
    pub fn ack(action: &str, server_id: u32) -> Self {
        Self {
            kind: MessageType::Ack,
            payload: json!({ "action": action, "server_id": server_id }),
        }
    }

    /// A protocol error reply
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            kind: MessageType::Error,
            payload: json!({ "error": message }),
        }
    }

    /// Serializes the frame to its wire form
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// An inbound client frame
///
/// Unknown tags deserialize fine and are ignored by the endpoint; only
/// malformed JSON is answered with an error envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    /// Frame type tag as sent by the client
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Target host for subscribe requests
    #[serde(default)]
    pub server_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_envelope_shape() {
        let snapshot = MetricSnapshot {
            server_id: 3,
            server_name: "db-1".to_string(),
            cpu_usage: 42.0,
            ..MetricSnapshot::default()
        };
        let value: Value = serde_json::from_str(&Envelope::metrics(&snapshot).to_json()).unwrap();
        assert_eq!(value["type"], "server_metrics");
        assert_eq!(value["payload"]["server_id"], 3);
        assert_eq!(value["payload"]["cpu_usage"], 42.0);
    }

    #[test]
    fn test_status_envelope_shape() {
        let value: Value =
            serde_json::from_str(&Envelope::status(7, ServerStatus::Error).to_json()).unwrap();
        assert_eq!(value["type"], "server_status");
        assert_eq!(value["payload"]["server_id"], 7);
        assert_eq!(value["payload"]["status"], "error");
    }

    #[test]
    fn test_pong_envelope_shape() {
        let value: Value = serde_json::from_str(&Envelope::pong().to_json()).unwrap();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["payload"], Value::Null);
    }

    #[test]
    fn test_ack_envelope_shape() {
        let value: Value =
            serde_json::from_str(&Envelope::ack("subscribed", 5).to_json()).unwrap();
        assert_eq!(value["type"], "ack");
        assert_eq!(value["payload"]["action"], "subscribed");
        assert_eq!(value["payload"]["server_id"], 5);
    }

    #[test]
    fn test_error_envelope_shape() {
        let value: Value =
            serde_json::from_str(&Envelope::error("Invalid message format").to_json()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["error"], "Invalid message format");
    }

    #[test]
    fn test_inbound_subscribe() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"subscribe","server_id":12}"#).unwrap();
        assert_eq!(msg.kind, "subscribe");
        assert_eq!(msg.server_id, 12);
    }

    #[test]
    fn test_inbound_unknown_type_is_tolerated() {
        let msg: InboundMessage = serde_json::from_str(r#"{"type":"wibble"}"#).unwrap();
        assert_eq!(msg.kind, "wibble");
        assert_eq!(msg.server_id, 0);
    }

    #[test]
    fn test_inbound_missing_type_is_tolerated() {
        let msg: InboundMessage = serde_json::from_str(r#"{"server_id":1}"#).unwrap();
        assert_eq!(msg.kind, "");
    }

    #[test]
    fn test_inbound_malformed_json_fails() {
        assert!(serde_json::from_str::<InboundMessage>("not json").is_err());
    }
}
