//! Wire encoding for the transport layer: the inbound/outbound JSON message
//! shapes a client socket actually exchanges, sitting one layer above the
//! core's `CommandEnvelope`/`CommandResult`/`ProjectedEvent` types. Kept
//! separate from `model` because these shapes are a transport concern —
//! serde tagging, client-facing field names — not part of the core's
//! internal contract with the rule engine.

use serde::{Deserialize, Serialize};

use crate::model::{CommandId, ProjectedEvent, RoomId};
use crate::room_actor::SubscriptionId;

/// One message received from a client socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// The command envelope, minus `actor_user_id`, which the transport
    /// layer fills in from the connection's resolved viewer rather than
    /// trusting the client to assert it.
    Command {
        command_id: CommandId,
        room_id: RoomId,
        command_type: String,
        idempotency_key: String,
        last_seen_seq: Option<u64>,
        #[serde(default = "serde_json::Value::default")]
        payload: serde_json::Value,
    },
    /// `subscribe(room_id, last_seq)`. `room_id` is carried here (rather
    /// than only at connection setup) so one socket can subscribe to more
    /// than one room over its lifetime.
    Subscribe { room_id: RoomId, last_seq: u64 },
    Unsubscribe { room_id: RoomId },
}

/// One message sent to a client socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The `command_result` reply to a submitted command.
    CommandResult {
        command_id: CommandId,
        #[serde(flatten)]
        result: crate::model::CommandResult,
    },
    /// The `subscribed` acknowledgment.
    Subscribed { room_id: RoomId },
    /// A projected, post-redaction event delivered to this viewer.
    Event(ProjectedEvent),
    /// An out-of-band control message for subscription-level issues, not
    /// tied to one command.
    Error { room_id: Option<RoomId>, message: String },
}

/// Per-socket bookkeeping the transport layer needs beyond what the room
/// actor tracks: which room a given local subscription id belongs to, so an
/// incoming `Unsubscribe { room_id }` can be translated into the right
/// `RoomActorHandle::unsubscribe` call.
#[derive(Debug, Clone, Copy)]
pub struct ActiveSubscription {
    pub room_id: RoomId,
    pub subscription_id: SubscriptionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_message_round_trips_through_json() {
        let raw = serde_json::json!({
            "type": "command",
            "command_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "room_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "command_type": "send_chat",
            "idempotency_key": "abc",
            "last_seen_seq": 5,
            "payload": {"text": "hi"},
        });
        let parsed: InboundMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(parsed, InboundMessage::Command { command_type, .. } if command_type == "send_chat"));
    }

    #[test]
    fn subscribe_message_parses() {
        let raw = serde_json::json!({
            "type": "subscribe",
            "room_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "last_seq": 0,
        });
        let parsed: InboundMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(parsed, InboundMessage::Subscribe { last_seq: 0, .. }));
    }

    #[test]
    fn outbound_command_result_serializes_with_flattened_status() {
        let msg = OutboundMessage::CommandResult {
            command_id: CommandId::nil(),
            result: crate::model::CommandResult::Rejected {
                code: "not_your_turn".to_string(),
                message: "wait your turn".to_string(),
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "command_result");
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["code"], "not_your_turn");
    }
}
