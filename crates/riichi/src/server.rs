//! `RiichiServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → registry → arena.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use riichi_arena::{ArenaConfig, SharedRegistry};
use riichi_protocol::{Codec, JsonCodec};
use riichi_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{RiichiError, ServerConfig};

/// State shared by every connection task.
///
/// `registry` is never held while an arena lock is awaited, and `names`
/// is never held together with either.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: SharedRegistry,
    /// Names claimed by connected clients.
    pub(crate) names: Mutex<HashSet<String>>,
    pub(crate) next_agent: AtomicU64,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for a [`RiichiServer`].
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # async fn run() -> Result<(), riichi::RiichiError> {
/// let server = riichi::RiichiServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(120))
///     .build()
///     .await?;
/// # Ok(()) }
/// ```
pub struct RiichiServerBuilder {
    config: ServerConfig,
}

impl RiichiServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self { config: ServerConfig::default() }
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// How long a new connection has to send `InitialMessage`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Closes connections silent for longer than `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the settings every arena is created with.
    pub fn arena_config(mut self, config: ArenaConfig) -> Self {
        self.config.arena = config;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener. Uses [`JsonCodec`] on WebSocket.
    pub async fn build(self) -> Result<RiichiServer<JsonCodec>, RiichiError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: SharedRegistry::new(self.config.arena.clone()),
            names: Mutex::new(HashSet::new()),
            next_agent: AtomicU64::new(1),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(RiichiServer { transport, state })
    }
}

impl Default for RiichiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Riichi server. Call [`run()`](Self::run) to start accepting.
pub struct RiichiServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RiichiServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> RiichiServerBuilder {
        RiichiServerBuilder::new()
    }
}

impl<C: Codec> RiichiServer<C> {
    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, RiichiError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accepts connections until the process ends, one task per connection.
    pub async fn run(mut self) -> Result<(), RiichiError> {
        tracing::info!(addr = %self.state.config.bind_addr, "Riichi server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
