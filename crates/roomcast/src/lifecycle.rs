//! Connection lifecycle: registration on connect, cleanup on disconnect.

use std::collections::BTreeSet;

use roomcast_connection::OutboundSender;
use roomcast_protocol::{ConnectionId, RoomId};

use crate::registry::SharedRegistry;
use crate::RoomcastError;

/// Registers connections as they arrive and removes every trace of them
/// when they go.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    registry: SharedRegistry,
    max_connections: Option<usize>,
}

impl LifecycleManager {
    /// Creates a manager over `registry`. `max_connections` caps the number
    /// of live connections; `None` means unlimited.
    pub fn new(
        registry: SharedRegistry,
        max_connections: Option<usize>,
    ) -> Self {
        Self { registry, max_connections }
    }

    /// Registers a new connection with an empty room-set.
    ///
    /// # Errors
    /// Returns [`RoomcastError::CapacityExceeded`] when the connection
    /// limit has been reached. Nothing is registered in that case.
    pub async fn on_connect(
        &self,
        outbound: OutboundSender,
    ) -> Result<ConnectionId, RoomcastError> {
        let mut registry = self.registry.lock().await;

        let live = registry.connections().len();
        if self.max_connections.is_some_and(|max| live >= max) {
            return Err(RoomcastError::CapacityExceeded(live));
        }

        let conn_id = registry.register(outbound);
        tracing::info!(%conn_id, live = live + 1, "connection registered");
        Ok(conn_id)
    }

    /// Removes `conn_id` from every room and from the connection table in
    /// one step, and returns the rooms it was in.
    ///
    /// No fan-out can observe the connection half removed, and nothing is
    /// queued for it afterwards. Calling this again for the same id is a
    /// no-op that returns an empty set.
    pub async fn on_disconnect(
        &self,
        conn_id: ConnectionId,
    ) -> BTreeSet<RoomId> {
        let mut registry = self.registry.lock().await;
        if !registry.connections().contains(conn_id) {
            return BTreeSet::new();
        }

        let rooms = registry.disconnect(conn_id);
        tracing::info!(
            %conn_id,
            rooms = rooms.len(),
            live = registry.connections().len(),
            "connection removed"
        );
        rooms
    }
}
