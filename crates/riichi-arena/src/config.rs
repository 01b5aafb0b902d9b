//! Arena configuration and lifecycle state.

use std::time::Duration;

use riichi_game::RoundConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ArenaConfig
// ---------------------------------------------------------------------------

/// Settings shared by every arena a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// How long a reaction window stays open before unanswered offers are
    /// skipped on the players' behalf.
    pub reaction_timeout: Duration,

    /// Capacity of each agent's outbound queue. An agent whose queue fills
    /// up is removed from the arena.
    pub outbound_capacity: usize,

    /// Whether agents beyond the four seats may watch.
    pub allow_spectators: bool,

    pub max_spectators: usize,

    /// Table rules for every round played here.
    pub round: RoundConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            reaction_timeout: Duration::from_secs(10),
            outbound_capacity: 256,
            allow_spectators: true,
            max_spectators: 8,
            round: RoundConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ArenaState
// ---------------------------------------------------------------------------

/// Lifecycle of an arena.
///
/// ```text
/// Waiting ──start──▶ InRound ──round ends / seated player leaves──▶ Waiting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaState {
    /// No round is running. New agents take free seats.
    Waiting,
    InRound,
}

impl ArenaState {
    /// Returns `true` while a round is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::InRound)
    }
}

impl std::fmt::Display for ArenaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InRound => write!(f, "InRound"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_state_is_running() {
        assert!(!ArenaState::Waiting.is_running());
        assert!(ArenaState::InRound.is_running());
    }

    #[test]
    fn test_arena_state_display() {
        assert_eq!(ArenaState::InRound.to_string(), "InRound");
    }

    #[test]
    fn test_arena_config_default() {
        let config = ArenaConfig::default();
        assert_eq!(config.reaction_timeout, Duration::from_secs(10));
        assert_eq!(config.outbound_capacity, 256);
        assert!(config.allow_spectators);
        assert_eq!(config.round, RoundConfig::default());
    }
}
