//! Core protocol types for Roomcast's wire format.
//!
//! Everything here travels on the wire: identities, the opaque payload
//! wrapper, and the two closed event enums (one per direction).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A process-unique identifier for a live connection.
///
/// Assigned by the connection table when a transport connection is
/// registered, never reused within a process. Serializes as a plain number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A caller-chosen room name.
///
/// Rooms are created by the first join, so any string is a valid id;
/// the server never validates or normalizes it.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the room name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Client-supplied content the relay forwards without interpreting.
///
/// Whatever JSON value the client sent (string, object, number, `null`)
/// is carried through untouched, so there is nothing to validate here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// Wraps a JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `null` payload, used when a field is missing.
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Borrows the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Extracts one top-level field, or `null` when the payload is not an
    /// object or has no such field.
    pub fn field(&self, name: &str) -> Payload {
        Self(self.0.get(name).cloned().unwrap_or(Value::Null))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(Value::String(text.to_string()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(Value::String(text))
    }
}

impl From<ConnectionId> for Payload {
    fn from(id: ConnectionId) -> Self {
        Self(Value::from(id.0))
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Every event a client may send.
///
/// Internally tagged on `event`, with the room under `roomId`:
///
/// ```text
/// { "event": "send_message", "message": "hello", "roomId": "r1" }
/// ```
///
/// Payload fields default to `null` when absent, so a frame only fails to
/// decode when its tag is unknown or `roomId` is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a room, creating it if nobody is in it yet.
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// Leave a room.
    LeaveRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// A chat message for everyone else in the room.
    SendMessage {
        #[serde(default)]
        message: Payload,
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// A typing indicator for everyone else in the room.
    UserTyping {
        #[serde(default)]
        data: Payload,
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// A presence announcement; `data.user` is what peers receive.
    NewUser {
        #[serde(default)]
        data: Payload,
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
}

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage { .. } => "send_message",
            Self::UserTyping { .. } => "user_typing",
            Self::NewUser { .. } => "new_user",
        }
    }

    /// The room this event targets.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::SendMessage { room_id, .. }
            | Self::UserTyping { room_id, .. }
            | Self::NewUser { room_id, .. } => room_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every event the server emits.
///
/// Adjacently tagged, so the payload always sits under `data`:
///
/// ```text
/// { "event": "receive_message", "data": "hello" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Presence: either the join acknowledgment sent to the joiner, or a
    /// peer's announcement relayed to the rest of the room.
    NewUser(Payload),

    /// A chat message from another member.
    ReceiveMessage(Payload),

    /// A typing indicator from another member.
    UserTyping(Payload),

    /// A request was refused. Only capacity limits produce this.
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The acknowledgment a connection receives after joining a room:
    /// `{ "user": <its own id>, "roomId": <room> }`.
    pub fn join_ack(conn_id: ConnectionId, room_id: &RoomId) -> Self {
        let mut ack = serde_json::Map::new();
        ack.insert("user".into(), Value::from(conn_id.0));
        ack.insert("roomId".into(), Value::from(room_id.as_str()));
        Self::NewUser(Payload::new(Value::Object(ack)))
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewUser(_) => "new_user",
            Self::ReceiveMessage(_) => "receive_message",
            Self::UserTyping(_) => "user_typing",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes below are what browser clients parse, so they are
    //! asserted field by field rather than only round-tripped.

    use super::*;
    use serde_json::json;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_connection_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ConnectionId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
    }

    #[test]
    fn test_room_id_accepts_any_string() {
        let room: RoomId =
            serde_json::from_str("\"  weird/name ✓ \"").unwrap();
        assert_eq!(room.as_str(), "  weird/name ✓ ");
        assert_eq!(RoomId::from(""), RoomId::new(String::new()));
    }

    // =====================================================================
    // Payload
    // =====================================================================

    #[test]
    fn test_payload_field_extracts_value() {
        let payload = Payload::new(json!({ "user": "alice", "age": 3 }));
        assert_eq!(payload.field("user"), Payload::from("alice"));
    }

    #[test]
    fn test_payload_field_missing_is_null() {
        let payload = Payload::new(json!({ "name": "alice" }));
        assert_eq!(payload.field("user"), Payload::null());
    }

    #[test]
    fn test_payload_field_of_non_object_is_null() {
        assert_eq!(Payload::from("alice").field("user"), Payload::null());
        assert_eq!(Payload::null().field("user"), Payload::null());
    }

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_join_room_decodes() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "join_room",
            "roomId": "r1",
        }))
        .unwrap();
        assert_eq!(event, ClientEvent::JoinRoom { room_id: "r1".into() });
        assert_eq!(event.name(), "join_room");
    }

    #[test]
    fn test_client_send_message_keeps_structured_payload() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "message": { "text": "hello", "at": 1700000000 },
            "roomId": "r1",
        }))
        .unwrap();

        match event {
            ClientEvent::SendMessage { message, room_id } => {
                assert_eq!(room_id.as_str(), "r1");
                assert_eq!(message.as_value()["text"], "hello");
                assert_eq!(message.as_value()["at"], 1700000000);
            }
            other => panic!("expected SendMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_client_missing_payload_defaults_to_null() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "user_typing",
            "roomId": "r1",
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::UserTyping {
                data: Payload::null(),
                room_id: "r1".into(),
            }
        );
    }

    #[test]
    fn test_client_new_user_accepts_non_object_data() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "new_user",
            "data": "just-a-string",
            "roomId": "r1",
        }))
        .unwrap();
        assert_eq!(event.room_id().as_str(), "r1");
    }

    #[test]
    fn test_client_missing_room_id_is_an_error() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "send_message",
            "message": "hello",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_unknown_event_is_an_error() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "fly_to_moon",
            "roomId": "r1",
        }));
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_server_join_ack_json_format() {
        let ack = ServerEvent::join_ack(ConnectionId(9), &RoomId::new("r1"));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "new_user",
                "data": { "user": 9, "roomId": "r1" },
            })
        );
    }

    #[test]
    fn test_server_receive_message_json_format() {
        let event = ServerEvent::ReceiveMessage(Payload::from("hello"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({ "event": "receive_message", "data": "hello" })
        );
    }

    #[test]
    fn test_server_user_typing_json_format() {
        let event =
            ServerEvent::UserTyping(Payload::new(json!({ "typing": true })));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({ "event": "user_typing", "data": { "typing": true } })
        );
    }

    #[test]
    fn test_server_error_json_format() {
        let event = ServerEvent::Error {
            code: 429,
            message: "room full".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "error",
                "data": { "code": 429, "message": "room full" },
            })
        );
        assert_eq!(event.name(), "error");
    }

    #[test]
    fn test_server_null_payload_is_explicit() {
        let event = ServerEvent::NewUser(Payload::null());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({ "event": "new_user", "data": null }));
    }
}
