//! # Riichi
//!
//! A Riichi Mahjong arena server. Clients connect over WebSocket, claim a
//! name, create or join an arena, and play four-player rounds that the
//! server referees.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use riichi::RiichiServer;
//!
//! # async fn run() -> Result<(), riichi::RiichiError> {
//! let server = RiichiServer::builder().bind("0.0.0.0:8080").build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::RiichiError;
pub use server::{RiichiServer, RiichiServerBuilder};

pub mod prelude {
    pub use crate::{RiichiError, RiichiServer, RiichiServerBuilder, ServerConfig};
    pub use riichi_arena::ArenaConfig;
    pub use riichi_game::{ActionData, BoardEvent, RoundConfig, Setup, Tile};
    pub use riichi_protocol::{AgentId, ArenaMessage, Codec, JsonCodec, ServerMessage};
}
