//! Error types for the arena layer.

use riichi_game::{ErrorClass, GameError};
use riichi_protocol::AgentId;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("arena {0:?} not found")]
    NotFound(String),

    #[error("arena name {0:?} is already taken")]
    NameTaken(String),

    #[error("arena name must not be empty")]
    InvalidName,

    #[error("a round is already running")]
    AlreadyStarted,

    /// Starting needs exactly four seated agents.
    #[error("need 4 seated players, have {0}")]
    WrongPlayerCount(usize),

    /// The agent is not a member of this arena.
    #[error("agent {0} is not in this arena")]
    AgentNotFound(AgentId),

    #[error("agent {0} is already in arena {1:?}")]
    AlreadyInArena(AgentId, String),

    /// The agent is not in any arena.
    #[error("agent {0} is not in an arena")]
    NotInArena(AgentId),

    #[error("arena {0:?} is full")]
    ArenaFull(String),

    #[error("no round is running")]
    NotStarted,

    /// Spectators may not act.
    #[error("agent {0} is spectating")]
    NotSeated(AgentId),

    /// An event variant sent where an action was expected.
    #[error("{0} is not an arena action")]
    NotAnAction(&'static str),

    /// The round engine refused the action.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl ArenaError {
    /// Rule violations are the player's mistake; everything else is a
    /// rejected request.
    pub fn is_rule_violation(&self) -> bool {
        matches!(self, Self::Game(e) if e.class() == ErrorClass::RuleViolation)
    }
}
