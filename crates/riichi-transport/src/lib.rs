//! Frame transport for the Riichi arena server.
//!
//! [`Transport`] accepts connections; a [`Connection`] moves whole frames
//! in both directions. Sending and receiving are independent: a task
//! parked in [`Connection::recv`] never holds up a concurrent
//! [`Connection::send`] on the same connection.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection number.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw connection number.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next connection and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address actually bound. Useful after binding port 0.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One connection carrying whole frames.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed cleanly. Cancel-safe: if the
    /// future is dropped before it resolves, no frame is lost.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the close handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
