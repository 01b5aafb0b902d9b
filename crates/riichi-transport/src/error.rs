use std::io;

/// Errors from the transport layer. Socket-level failures keep their
/// `io::Error`; WebSocket protocol failures are carried as text so the
/// error type does not depend on the `websocket` feature.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone; nothing more can be written.
    #[error("connection closed: {0}")]
    Closed(String),

    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The TCP connection came in but the WebSocket handshake did not finish.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    #[error("frame write failed: {0}")]
    Write(String),

    #[error("frame read failed: {0}")]
    Read(String),
}
