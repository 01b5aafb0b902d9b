//! Server configuration.

use std::time::Duration;

use riichi_arena::ArenaConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// How long a new connection has to send its `InitialMessage`.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,

    /// Settings for every arena created on this server.
    pub arena: ArenaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            arena: ArenaConfig::default(),
        }
    }
}
