//! Per-connection handler: registration, event routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the lifecycle manager (or refuse when full)
//!   2. Spawn a writer task draining the connection's outbound queue
//!   3. Loop: receive frames → decode → dispatch to the event relay
//!   4. Remove the connection from every room and the connection table

use std::sync::Arc;

use roomcast_connection::OutboundReceiver;
use roomcast_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use roomcast_transport::{Connection, WebSocketConnection};

use crate::lifecycle::LifecycleManager;
use crate::server::ServerState;
use crate::RoomcastError;

/// Error code sent to a connection refused by the connection limit.
pub const CONNECTION_CAPACITY_CODE: u16 = 503;

/// Drop guard that removes a connection if the handler exits without
/// reaching its own cleanup, for example by panicking.
///
/// `Drop` is synchronous, so the async cleanup is spawned as a
/// fire-and-forget task.
struct DisconnectGuard {
    conn_id: ConnectionId,
    lifecycle: LifecycleManager,
    armed: bool,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn_id = self.conn_id;
        let lifecycle = self.lifecycle.clone();
        // No runtime means the process is shutting down anyway.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                lifecycle.on_disconnect(conn_id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RoomcastError> {
    let peer = conn.peer_addr();
    let conn = Arc::new(conn);
    let (outbound, queue) = tokio::sync::mpsc::unbounded_channel();

    // --- Step 1: Registration ---
    let conn_id = match state.lifecycle.on_connect(outbound).await {
        Ok(id) => id,
        Err(e) if e.is_capacity_exceeded() => {
            tracing::warn!(%peer, reason = %e, "connection refused");
            let refusal = ServerEvent::Error {
                code: CONNECTION_CAPACITY_CODE,
                message: e.to_string(),
            };
            conn.send(&state.codec.encode(&refusal)?).await?;
            conn.close().await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let mut guard = DisconnectGuard {
        conn_id,
        lifecycle: state.lifecycle.clone(),
        armed: true,
    };

    tracing::debug!(%conn_id, %peer, "handling new connection");

    // --- Step 2: Writer ---
    let writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        Arc::clone(&state),
        conn_id,
        queue,
    ));

    // --- Step 3: Event loop ---
    loop {
        let received = match state.idle_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, conn.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        tracing::info!(%conn_id, "connection idle, closing");
                        break;
                    }
                }
            }
            None => conn.recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    %conn_id,
                    error = %e,
                    "skipping undecodable frame"
                );
                continue;
            }
        };

        tracing::trace!(
            %conn_id,
            event = event.name(),
            room_id = %event.room_id(),
            "event received"
        );

        if let Err(e) = state.relay.dispatch(conn_id, event).await {
            tracing::debug!(%conn_id, error = %e, "dispatch failed");
        }
    }

    // --- Step 4: Cleanup ---
    // Dropping the table entry closes the outbound queue, which lets the
    // writer flush what is left and close the socket.
    guard.disarm();
    state.lifecycle.on_disconnect(conn_id).await;

    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, error = %e, "writer task failed");
    }
    Ok(())
}

/// Drains one connection's outbound queue onto its socket until the queue
/// closes or a send fails, then closes the socket.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    conn_id: ConnectionId,
    mut queue: OutboundReceiver,
) {
    while let Some(event) = queue.recv().await {
        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    %conn_id,
                    event = event.name(),
                    error = %e,
                    "failed to encode event"
                );
                continue;
            }
        };

        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(
                %conn_id,
                error = %e,
                "send failed, stopping writer"
            );
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after writer exit");
    }
}
