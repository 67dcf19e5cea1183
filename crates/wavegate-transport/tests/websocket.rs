//! Integration tests for the WebSocket client transport.
//!
//! Each test spins up a throwaway `tokio-tungstenite` server on an
//! OS-assigned port and drives it from the client side through the
//! [`Connector`] / [`Connection`] traits.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;
    use wavegate_transport::{Connection, Connector, TransportError, WebSocketConnector};

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on a random port and returns it with its URL.
    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}"))
    }

    async fn accept(listener: TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream).await.expect("handshake should succeed")
    }

    #[tokio::test]
    async fn test_websocket_connect_and_exchange_text() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = WebSocketConnector::new().connect(&url).await.expect("client should connect");
        let mut server_ws = server.await.expect("task should complete");
        assert!(conn.id().into_inner() > 0);

        // --- Server sends, client receives ---
        server_ws
            .send(Message::text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#))
            .await
            .unwrap();
        let received = conn.recv().await.unwrap().unwrap();
        assert_eq!(received, r#"{"op":10,"d":{"heartbeat_interval":41250}}"#);

        // --- Client sends, server receives ---
        conn.send(r#"{"op":1,"d":null}"#).await.unwrap();
        let msg = server_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"op":1,"d":null}"#);
    }

    #[tokio::test]
    async fn test_websocket_close_frame_surfaces_close_code() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = WebSocketConnector::new().connect(&url).await.unwrap();
        let mut server_ws = server.await.unwrap();

        server_ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(4004),
                reason: "Authentication failed.".into(),
            })))
            .await
            .unwrap();

        let err = conn.recv().await.expect_err("close should be an error");
        assert_eq!(err.close_code(), Some(4004));
        assert!(matches!(err, TransportError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        // A heartbeat must go out while the read loop is parked in recv().
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = std::sync::Arc::new(WebSocketConnector::new().connect(&url).await.unwrap());
        let mut server_ws = server.await.unwrap();

        let reader = std::sync::Arc::clone(&conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.send("beat"))
            .await
            .expect("send must not wait for the pending recv")
            .unwrap();
        let msg = server_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "beat");

        pending.abort();
    }

    #[tokio::test]
    async fn test_websocket_close_is_idempotent_and_blocks_send() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = WebSocketConnector::new().connect(&url).await.unwrap();
        let _server_ws = server.await.unwrap();

        conn.close(1000).await.expect("first close should succeed");
        conn.close(1000).await.expect("second close is a no-op");
        assert!(matches!(conn.send("late").await, Err(TransportError::Shutdown)));
    }

    #[tokio::test]
    async fn test_websocket_connect_refused_returns_error() {
        let (listener, url) = bind().await;
        drop(listener);

        let result = WebSocketConnector::new().connect(&url).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
