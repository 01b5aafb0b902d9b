//! Riichi Mahjong rules.
//!
//! Everything in this crate is synchronous and free of I/O. It knows how
//! tiles are encoded, what a hand may legally do, how a win scores, and
//! how a round moves from one state to the next.
//!
//! # Key types
//!
//! - [`Tile`]: one-byte tile encoding with red and dora flags
//! - [`Hand`] / [`Player`]: tiles and points, with `test_*`/commit pairs
//! - [`yaku::evaluate`]: yaku, fu and point values of a completed hand
//! - [`RoundEngine`]: the round state machine
//! - [`BoardEvent`] / [`Dispatch`]: what the engine wants delivered, and to whom
//!
//! ```text
//! Tile → Hand/Player → Yaku → RoundEngine → Dispatch (to the arena)
//! ```

mod action;
mod config;
mod engine;
mod error;
mod event;
mod hand;
mod reaction;
mod shape;
pub mod tagged;
mod tile;
pub mod yaku;

pub use action::{ActionData, ActionType};
pub use config::RoundConfig;
pub use engine::{Progress, RoundEngine, TurnState};
pub use error::{ErrorClass, GameError};
pub use event::{BoardEvent, Dispatch, GameResult, Outcome, Setup, Visibility};
pub use hand::{Hand, Meld, MeldKind, Player};
pub use reaction::{PendingAction, ReactionWindow, Resolution};
pub use tile::{Dragon, KIND_COUNT, Suit, TILE_COUNT, Tile, Wind, full_tile_set};
pub use yaku::{WinResult, WinSituation, Yaku};
