//! # Roomcast
//!
//! Real-time room relay for browser clients.
//!
//! Clients connect over WebSocket, join named rooms, and send chat
//! messages, typing indicators, and presence announcements. The server
//! fans each event out to every other member of the room and forgets a
//! connection completely the moment it goes away. Nothing is persisted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn start() -> Result<(), RoomcastError> {
//! let server = RelayServerBuilder::new()
//!     .config(RelayConfig::load()?)
//!     .build()
//!     .await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod lifecycle;
mod registry;
mod relay;
mod server;

pub use config::{PresenceIdentity, RelayConfig, DEFAULT_PORT};
pub use error::RoomcastError;
pub use handler::CONNECTION_CAPACITY_CODE;
pub use lifecycle::LifecycleManager;
pub use registry::{Registry, SharedRegistry};
pub use relay::{EventRelay, ROOM_CAPACITY_CODE};
pub use server::{RelayServer, RelayServerBuilder};

/// Everything needed to configure and run a relay server.
pub mod prelude {
    pub use crate::{
        EventRelay, LifecycleManager, PresenceIdentity, RelayConfig,
        RelayServer, RelayServerBuilder, RoomcastError, SharedRegistry,
    };
    pub use roomcast_protocol::{
        ClientEvent, ConnectionId, Payload, RoomId, ServerEvent,
    };
    pub use roomcast_room::RoomLimits;
    pub use roomcast_transport::OriginPolicy;
}
