//! Client transport abstraction layer for Wavegate.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how a gateway session reaches the remote gateway. The session layer only
//! ever sees text frames; whether they travel over a real WebSocket or an
//! in-memory channel (tests) is decided here.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Close code for a normal, intentional shutdown.
///
/// Gateways treat a 1000 close as "the client is done", which invalidates
/// the server-side session. Use [`CLOSE_RECONNECT`] when the client intends
/// to resume.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code used when the client drops a connection to reconnect.
pub const CLOSE_RECONNECT: u16 = 4000;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens outbound connections to a gateway URL.
///
/// Futures are required to be `Send` so callers can drive connections from
/// spawned Tokio tasks while staying generic over the transport.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connects to `url` and completes the transport handshake.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single duplex connection carrying text frames.
///
/// Sending and receiving must not block each other: a task waiting in
/// [`recv`](Connection::recv) must never delay a concurrent
/// [`send`](Connection::send) from another task.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame to the remote peer.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the stream ends without a close frame.
    /// A close frame is reported as [`TransportError::ConnectionClosed`]
    /// so the caller can inspect the close code.
    fn recv(&self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the connection with the given close code.
    fn close(&self, code: u16) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
