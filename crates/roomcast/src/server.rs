//! `RelayServer` builder and server loop.
//!
//! This is the entry point for running a Roomcast relay. It ties together
//! all the layers: transport → protocol → connection table → rooms.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::{Codec, JsonCodec};
use roomcast_room::RoomLimits;
use roomcast_transport::{
    Incoming, IncomingWebSocket, OriginPolicy, Transport, TransportError,
    WebSocketTransport,
};

use crate::config::{PresenceIdentity, RelayConfig};
use crate::handler::handle_connection;
use crate::lifecycle::LifecycleManager;
use crate::registry::{Registry, SharedRegistry};
use crate::relay::EventRelay;
use crate::RoomcastError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) relay: EventRelay,
    pub(crate) lifecycle: LifecycleManager,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use roomcast::prelude::*;
///
/// # async fn start() -> Result<(), RoomcastError> {
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:4000")
///     .max_connections(10_000)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting with `config`, typically one loaded by
    /// [`RelayConfig::load`].
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets which browser origins may connect.
    pub fn origins(mut self, origins: OriginPolicy) -> Self {
        self.config.origins = origins;
        self
    }

    /// Sets the room membership limits.
    pub fn room_limits(mut self, limits: RoomLimits) -> Self {
        self.config.room_limits = limits;
        self
    }

    /// Caps the number of live connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = Some(max);
        self
    }

    /// Disconnects clients that send nothing for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Sets the identity used when relaying `new_user`.
    pub fn presence(mut self, presence: PresenceIdentity) -> Self {
        self.config.presence = presence;
        self
    }

    /// Binds the listener and builds a server speaking JSON.
    pub async fn build(
        self,
    ) -> Result<RelayServer<JsonCodec>, RoomcastError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener and builds a server using `codec` for frames.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<RelayServer<C>, RoomcastError> {
        let config = self.config;
        let transport = WebSocketTransport::bind_with_origins(
            &config.bind_addr,
            config.origins.clone(),
        )
        .await?;

        let registry = Registry::shared(config.room_limits);
        let state = Arc::new(ServerState {
            relay: EventRelay::new(registry.clone(), config.presence),
            lifecycle: LifecycleManager::new(
                registry.clone(),
                config.max_connections,
            ),
            codec,
            idle_timeout: config.idle_timeout,
        });

        tracing::debug!(
            bind = %config.bind_addr,
            origins = %config.origins,
            presence = %config.presence,
            max_connections = ?config.max_connections,
            room_limits = ?config.room_limits,
            idle_timeout = ?config.idle_timeout,
            "relay server configured"
        );

        Ok(RelayServer { transport, registry, state })
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<C: Codec> {
    transport: WebSocketTransport,
    registry: SharedRegistry,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> RelayServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the server's connection and room state.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Runs the server accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RoomcastError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server accept loop until `shutdown` completes.
    ///
    /// Accepts incoming connections and spawns a task for each that runs
    /// the WebSocket upgrade and then the handler, so a peer stuck in its
    /// handshake never delays the next accept. Connections already accepted
    /// keep running after the loop stops.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RoomcastError> {
        tokio::pin!(shutdown);

        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "Roomcast relay running"),
            Err(_) => tracing::info!("Roomcast relay running"),
        }

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, stopped accepting");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(serve(incoming, state));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        Ok(())
    }
}

/// Upgrades one accepted connection and runs its handler.
async fn serve<C: Codec>(
    incoming: IncomingWebSocket,
    state: Arc<ServerState<C>>,
) {
    let peer = incoming.peer_addr();
    let conn = match incoming.upgrade().await {
        Ok(conn) => conn,
        Err(e @ TransportError::Handshake { .. }) => {
            tracing::debug!(%peer, error = %e, "handshake rejected");
            return;
        }
        Err(e) => {
            tracing::warn!(%peer, error = %e, "upgrade failed");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(%peer, error = %e, "connection ended with error");
    }
}
