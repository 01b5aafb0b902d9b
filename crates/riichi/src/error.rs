//! Unified error type for the server.

use riichi_arena::ArenaError;
use riichi_game::GameError;
use riichi_protocol::ProtocolError;
use riichi_transport::TransportError;

/// Wraps every crate's error so `?` works across layers.
#[derive(Debug, thiserror::Error)]
pub enum RiichiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Game(#[from] GameError),
}
