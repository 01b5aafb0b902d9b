//! Error types for the rules layer.
//!
//! Every legality check in this crate returns a [`GameError`]. Callers
//! that need to decide how to react (tell the player their move was
//! illegal, or end the round) look at [`GameError::class`].

use crate::action::ActionType;
use crate::engine::TurnState;
use crate::tile::Tile;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The action was rejected; round state is unchanged and only the
    /// acting player is told.
    RuleViolation,
    /// The round (or the operation) is over. Wall exhaustion lands here,
    /// as an expected end-of-round condition.
    Terminal,
}

/// Errors produced by hands, the win evaluator and the round engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("it is not seat {0}'s turn")]
    NotYourTurn(usize),

    #[error("action not allowed in state {0}")]
    WrongState(TurnState),

    #[error("seat {0} does not exist")]
    UnknownSeat(usize),

    #[error("tile {0} is not in hand")]
    TileNotHeld(Tile),

    #[error("{0} is not a playable tile")]
    InvalidTile(Tile),

    /// The hand already holds its 14th tile.
    #[error("hand already holds a free tile")]
    HasFreeTile,

    /// The action needs the 14th tile and the hand has only 13.
    #[error("hand has no free tile")]
    NoFreeTile,

    #[error("tiles do not form a run")]
    NotASequence,

    #[error("not enough copies of {0}")]
    NotEnoughCopies(Tile),

    #[error("no pon of {0} to upgrade")]
    NoSuchPon(Tile),

    #[error("hand is not waiting on {0}")]
    NotWaiting(Tile),

    #[error("furiten")]
    Furiten,

    #[error("hand has no yaku")]
    NoYaku,

    #[error("hand is open")]
    HandOpen,

    #[error("hand is in riichi")]
    InRiichi,

    #[error("riichi not allowed: {0}")]
    RiichiNotAllowed(&'static str),

    #[error("no kan replacement tiles left")]
    KanLimit,

    #[error("no pending {0} for seat {1}")]
    NoPendingAction(ActionType, usize),

    #[error("{0} is sent by the server only")]
    ServerOnlyAction(ActionType),

    #[error("wall exhausted")]
    WallExhausted,

    #[error("round has ended")]
    GameEnded,

    #[error("round has not started")]
    RoundNotStarted,

    #[error("round is still in progress")]
    RoundInProgress,

    /// An internal bookkeeping invariant broke. Never caused by input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Classifies the error for the caller.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::WallExhausted
            | Self::GameEnded
            | Self::RoundNotStarted
            | Self::RoundInProgress
            | Self::Internal(_) => ErrorClass::Terminal,
            _ => ErrorClass::RuleViolation,
        }
    }
}
