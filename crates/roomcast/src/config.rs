//! Server configuration and environment loading.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use roomcast_room::RoomLimits;
use roomcast_transport::OriginPolicy;

use crate::RoomcastError;

/// Where the identity in a relayed `new_user` announcement comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceIdentity {
    /// Relay the client's own `data.user` value, unverified.
    #[default]
    ClientSupplied,

    /// Ignore `data.user` and announce the sender's connection id.
    ConnectionId,
}

impl FromStr for PresenceIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::ClientSupplied),
            "connection" => Ok(Self::ConnectionId),
            other => Err(format!(
                "unknown presence identity {other:?} \
                 (expected \"client\" or \"connection\")"
            )),
        }
    }
}

impl fmt::Display for PresenceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSupplied => f.write_str("client"),
            Self::ConnectionId => f.write_str("connection"),
        }
    }
}

/// Everything the relay server can be configured with.
///
/// The defaults reproduce the plain behavior: any origin, no limits, no
/// idle timeout, client-supplied presence.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Which browser origins may connect.
    pub origins: OriginPolicy,

    /// Per-room and per-connection membership limits.
    pub room_limits: RoomLimits,

    /// Maximum number of live connections.
    pub max_connections: Option<usize>,

    /// Disconnect a client that sends nothing for this long.
    pub idle_timeout: Option<Duration>,

    /// Identity used when relaying `new_user`.
    pub presence: PresenceIdentity,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            origins: OriginPolicy::Any,
            room_limits: RoomLimits::default(),
            max_connections: None,
            idle_timeout: None,
            presence: PresenceIdentity::default(),
        }
    }
}

/// Listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 4000;

const DEFAULT_HOST: &str = "0.0.0.0";

impl RelayConfig {
    /// Loads the configuration from the process environment, with a `.env`
    /// file (in the working directory or one of its parents) filling in
    /// anything the environment leaves unset. A missing file is fine.
    ///
    /// # Errors
    /// Returns [`RoomcastError::Config`] if the `.env` file can't be read
    /// or parsed, or if a variable fails to parse.
    pub fn load() -> Result<Self, RoomcastError> {
        let file = match dotenvy::dotenv_iter() {
            Ok(entries) => read_dotenv(entries)?,
            Err(e) if e.not_found() => HashMap::new(),
            Err(e) => return Err(RoomcastError::Config(format!(".env: {e}"))),
        };
        if !file.is_empty() {
            tracing::debug!(vars = file.len(), "read .env file");
        }
        Self::layered(|key| std::env::var(key).ok(), &file)
    }

    /// Loads the configuration from process environment variables only.
    ///
    /// | variable | default |
    /// |---|---|
    /// | `PORT` | `4000` |
    /// | `ROOMCAST_HOST` | `0.0.0.0` |
    /// | `ROOMCAST_ALLOWED_ORIGINS` | `*` |
    /// | `ROOMCAST_MAX_CONNECTIONS` | unlimited |
    /// | `ROOMCAST_MAX_ROOM_MEMBERS` | unlimited |
    /// | `ROOMCAST_MAX_ROOMS_PER_CONNECTION` | unlimited |
    /// | `ROOMCAST_IDLE_TIMEOUT_SECS` | none |
    /// | `ROOMCAST_PRESENCE` | `client` |
    ///
    /// # Errors
    /// Returns [`RoomcastError::Config`] naming the first variable that
    /// fails to parse.
    pub fn from_env() -> Result<Self, RoomcastError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `env` first and falls back to the `.env` entries in `file`.
    fn layered(
        env: impl Fn(&str) -> Option<String>,
        file: &HashMap<String, String>,
    ) -> Result<Self, RoomcastError> {
        Self::from_lookup(|key| env(key).or_else(|| file.get(key).cloned()))
    }

    /// Same as [`from_env`](Self::from_env), reading values through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RoomcastError> {
        let port: u16 = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let host = lookup("ROOMCAST_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let origins = lookup("ROOMCAST_ALLOWED_ORIGINS")
            .map(|spec| OriginPolicy::parse(&spec))
            .unwrap_or_default();

        let room_limits = RoomLimits {
            max_members: parse_var(&lookup, "ROOMCAST_MAX_ROOM_MEMBERS")?,
            max_rooms_per_connection: parse_var(
                &lookup,
                "ROOMCAST_MAX_ROOMS_PER_CONNECTION",
            )?,
        };

        let idle_timeout =
            parse_var::<u64>(&lookup, "ROOMCAST_IDLE_TIMEOUT_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs);

        Ok(Self {
            bind_addr: format!("{}:{port}", host.trim()),
            origins,
            room_limits,
            max_connections: parse_var(&lookup, "ROOMCAST_MAX_CONNECTIONS")?,
            idle_timeout,
            presence: parse_var(&lookup, "ROOMCAST_PRESENCE")?
                .unwrap_or_default(),
        })
    }
}

/// Collects `.env` entries, failing on the first malformed line.
fn read_dotenv(
    entries: impl Iterator<Item = dotenvy::Result<(String, String)>>,
) -> Result<HashMap<String, String>, RoomcastError> {
    entries
        .map(|entry| {
            entry.map_err(|e| RoomcastError::Config(format!(".env: {e}")))
        })
        .collect()
}

/// Reads and parses one variable. Unset or blank means `None`.
fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, RoomcastError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RoomcastError::Config(format!("{key}={raw:?}: {e}"))),
        _ => Ok(None),
    }
}
