//! Round rules configuration.

use serde::{Deserialize, Serialize};

/// Table rules for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Points each seat starts the match with.
    pub starting_points: i32,

    /// Deposit paid when declaring riichi; also the minimum points needed.
    pub riichi_cost: i32,

    /// Riichi needs at least this many tiles left in the live wall.
    pub riichi_min_wall: usize,

    /// Mark one copy of each suited five as red.
    pub red_fives: bool,

    /// Total paid from noten to tenpai seats when the wall runs out.
    pub exhaustive_draw_payment: i32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            starting_points: 25_000,
            riichi_cost: 1_000,
            riichi_min_wall: 4,
            red_fives: true,
            exhaustive_draw_payment: 3_000,
        }
    }
}
