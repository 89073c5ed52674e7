//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, Incoming, OriginPolicy, Transport, TransportError};

/// Upper bound on how long a peer may take to finish the upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    origins: OriginPolicy,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts any origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_origins(addr, OriginPolicy::Any).await
    }

    /// Binds a new WebSocket transport that enforces `origins` during
    /// the upgrade handshake.
    pub async fn bind_with_origins(
        addr: &str,
        origins: OriginPolicy,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, %origins, "WebSocket transport listening");
        Ok(Self { listener, origins })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Incoming = IncomingWebSocket;
    type Error = TransportError;

    /// Takes the next TCP connection off the listener. The WebSocket
    /// upgrade is left to [`IncomingWebSocket::upgrade`], so a peer that
    /// never finishes its handshake cannot hold up the listener.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        tracing::trace!(%peer, "tcp connection accepted");
        Ok(IncomingWebSocket {
            stream,
            peer,
            origins: self.origins.clone(),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP connection waiting for its WebSocket upgrade.
pub struct IncomingWebSocket {
    stream: TcpStream,
    peer: SocketAddr,
    origins: OriginPolicy,
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the upgrade handshake, checking the `Origin` header against
    /// the transport's policy. Gives up after ten seconds.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            peer,
            origins,
        } = self;

        let check_origin = move |req: &Request, resp: Response| {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .map(|v| v.to_str().unwrap_or_default());
            if origins.allows(origin) {
                Ok(resp)
            } else {
                tracing::debug!(%peer, ?origin, "origin rejected");
                let mut rejection =
                    ErrorResponse::new(Some("origin not allowed".into()));
                *rejection.status_mut() = StatusCode::FORBIDDEN;
                Err(rejection)
            }
        };

        let ws = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            tokio_tungstenite::accept_hdr_async(stream, check_origin),
        )
        .await
        .map_err(|_| TransportError::Handshake {
            peer,
            reason: "timed out".into(),
        })?
        .map_err(|e| TransportError::Handshake {
            peer,
            reason: e.to_string(),
        })?;

        tracing::debug!(%peer, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
///
/// The socket is split so the writer task and the reader loop each lock
/// only their own half.
pub struct WebSocketConnection {
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 data goes out as a text frame, anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
