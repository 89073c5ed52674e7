//! The event relay: dispatches inbound client events and fans them out.
//!
//! | event          | registry change | who receives                         |
//! |----------------|-----------------|--------------------------------------|
//! | `join_room`    | join            | the joiner only (`new_user` ack)     |
//! | `leave_room`   | leave           | nobody                               |
//! | `send_message` | none            | other members (`receive_message`)    |
//! | `user_typing`  | none            | other members (`user_typing`)        |
//! | `new_user`     | none            | other members (`new_user`)           |
//!
//! Disconnects are not client events; the
//! [`LifecycleManager`](crate::LifecycleManager) handles them.

use roomcast_protocol::{
    ClientEvent, ConnectionId, Payload, RoomId, ServerEvent,
};

use crate::config::PresenceIdentity;
use crate::registry::{Registry, SharedRegistry};
use crate::RoomcastError;

/// Error code sent when a join is refused by a room limit.
pub const ROOM_CAPACITY_CODE: u16 = 429;

/// Routes client events to rooms.
///
/// Cheap to clone; every clone shares the same registry.
#[derive(Debug, Clone)]
pub struct EventRelay {
    registry: SharedRegistry,
    presence: PresenceIdentity,
}

impl EventRelay {
    /// Creates a relay over `registry`.
    pub fn new(registry: SharedRegistry, presence: PresenceIdentity) -> Self {
        Self { registry, presence }
    }

    /// Handles one event from `from` and returns how many events were
    /// queued as a result.
    ///
    /// Relaying to a room that doesn't exist, or that `from` is alone in,
    /// queues nothing and is not an error. The sender doesn't have to be a
    /// member of the room it sends to.
    ///
    /// # Errors
    /// Returns [`RoomcastError::Room`] if `from` is no longer registered
    /// when it tries to join or leave.
    pub async fn dispatch(
        &self,
        from: ConnectionId,
        event: ClientEvent,
    ) -> Result<usize, RoomcastError> {
        // Queued under the lock: per-sender order is preserved and nothing
        // reaches a connection whose cleanup has started.
        let mut registry = self.registry.lock().await;

        match event {
            ClientEvent::JoinRoom { room_id } => {
                join(&mut registry, from, room_id)
            }
            ClientEvent::LeaveRoom { room_id } => {
                registry.leave(from, &room_id)?;
                Ok(0)
            }
            ClientEvent::SendMessage { message, room_id } => Ok(registry
                .fan_out(&room_id, from, ServerEvent::ReceiveMessage(message))),
            ClientEvent::UserTyping { data, room_id } => Ok(registry
                .fan_out(&room_id, from, ServerEvent::UserTyping(data))),
            ClientEvent::NewUser { data, room_id } => {
                let user = self.presence_identity(from, &data);
                Ok(registry.fan_out(&room_id, from, ServerEvent::NewUser(user)))
            }
        }
    }

    fn presence_identity(&self, from: ConnectionId, data: &Payload) -> Payload {
        match self.presence {
            PresenceIdentity::ClientSupplied => data.field("user"),
            PresenceIdentity::ConnectionId => Payload::from(from),
        }
    }
}

/// Joins and acknowledges to the joiner. A join refused by a limit is
/// reported to the joiner as an `error` event rather than failing.
fn join(
    registry: &mut Registry,
    from: ConnectionId,
    room_id: RoomId,
) -> Result<usize, RoomcastError> {
    match registry.join(from, room_id.clone()) {
        Ok(_) => {
            let ack = ServerEvent::join_ack(from, &room_id);
            Ok(usize::from(registry.deliver(from, ack)))
        }
        Err(e) if e.is_capacity_exceeded() => {
            tracing::info!(
                conn_id = %from,
                %room_id,
                reason = %e,
                "join refused"
            );
            let refusal = ServerEvent::Error {
                code: ROOM_CAPACITY_CODE,
                message: e.to_string(),
            };
            Ok(usize::from(registry.deliver(from, refusal)))
        }
        Err(e) => Err(e.into()),
    }
}
