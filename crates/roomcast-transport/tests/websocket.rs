//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a `tokio-tungstenite` client to check
//! that frames flow both ways and that the origin policy is enforced during
//! the upgrade.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;

    use futures_util::{SinkExt, StreamExt};
    use roomcast_transport::{
        Connection, Incoming, OriginPolicy, Transport, TransportError,
        WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Accepts the next connection and runs its upgrade.
    async fn accept(
        transport: &mut WebSocketTransport,
    ) -> Result<WebSocketConnection, TransportError> {
        transport.accept().await?.upgrade().await
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn connect_with_origin(
        addr: &str,
        origin: &'static str,
    ) -> Result<ClientWs, tokio_tungstenite::tungstenite::Error> {
        let mut request = format!("ws://{addr}")
            .into_client_request()
            .expect("valid request");
        request
            .headers_mut()
            .insert("Origin", HeaderValue::from_static(origin));
        tokio_tungstenite::connect_async(request)
            .await
            .map(|(ws, _)| ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        // Port 0 lets the OS pick; local_addr tells the client where to go.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            accept(&mut transport).await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.peer_addr().ip().is_loopback());

        // Server sends, client receives.
        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "utf-8 payloads go out as text frames");
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // Client sends, server receives.
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            accept(&mut transport).await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection; the client sends nothing yet.
        let reader = {
            let conn = Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        // A send must still go through while the reader is waiting.
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send(b"ping"),
        )
        .await
        .expect("send must not wait for the pending recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client_ws.send(Message::text("pong")).await.unwrap();
        let received = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(received, b"pong");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            accept(&mut transport).await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_allow_list_accepts_listed_origin() {
        let mut transport = WebSocketTransport::bind_with_origins(
            "127.0.0.1:0",
            OriginPolicy::parse("http://app.example"),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle =
            tokio::spawn(async move { accept(&mut transport).await });

        let client = connect_with_origin(&addr, "http://app.example").await;
        assert!(client.is_ok(), "listed origin should upgrade");
        assert!(server_handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_websocket_allow_list_rejects_other_origin() {
        let mut transport = WebSocketTransport::bind_with_origins(
            "127.0.0.1:0",
            OriginPolicy::parse("http://app.example"),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle =
            tokio::spawn(async move { accept(&mut transport).await });

        let client = connect_with_origin(&addr, "http://evil.example").await;
        assert!(client.is_err(), "unlisted origin must be refused");

        let accepted = server_handle.await.unwrap();
        assert!(matches!(
            accepted,
            Err(TransportError::Handshake { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_does_not_wait_for_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        // A peer that opens TCP and never sends its upgrade request.
        let _stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let stalled = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            transport.accept(),
        )
        .await
        .expect("accept must return before the handshake")
        .expect("should accept");
        assert!(stalled.peer_addr().ip().is_loopback());

        // The next client upgrades while the stalled one is still pending.
        let server_handle = tokio::spawn(async move {
            let pending = stalled;
            let conn = accept(&mut transport).await;
            (pending, conn)
        });
        let _client_ws = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            connect_client(&addr),
        )
        .await
        .expect("second client must not wait for the stalled peer");
        let (_pending, conn) = server_handle.await.unwrap();
        assert!(conn.is_ok());
    }
}
