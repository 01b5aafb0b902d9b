//! Tile encoding.
//!
//! A tile is a single byte:
//!
//! ```text
//!   bit 7    bit 6    bits 5-4    bits 3-0
//!   red      dora     suit        rank
//! ```
//!
//! Suits are manzu (`0x00`), pinzu (`0x10`), souzu (`0x20`) and honors
//! (`0x30`). Suited ranks run 1..=9. Honor ranks run 1..=7: the four winds
//! East, South, West, North followed by the three dragons White, Green, Red.
//!
//! Two values outside that space are reserved: [`Tile::HIDDEN`] stands in
//! for a tile the recipient is not allowed to see, and [`Tile::INVALID`]
//! is the "any tile" wildcard used in action prompts.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bit layout
// ---------------------------------------------------------------------------

const SUIT_MASK: u8 = 0b0011_0000;
const RANK_MASK: u8 = 0b0000_1111;
const DORA_FLAG: u8 = 0b0100_0000;
const RED_FLAG: u8 = 0b1000_0000;
const FLAG_MASK: u8 = DORA_FLAG | RED_FLAG;

const MANZU: u8 = 0x00;
const PINZU: u8 = 0x10;
const SOUZU: u8 = 0x20;
const HONOR: u8 = 0x30;

/// Number of distinct tile kinds (9 × 3 suits + 7 honors).
pub const KIND_COUNT: usize = 34;

/// Number of tiles in a full set.
pub const TILE_COUNT: usize = KIND_COUNT * 4;

// ---------------------------------------------------------------------------
// Suit
// ---------------------------------------------------------------------------

/// The family a tile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Manzu,
    Pinzu,
    Souzu,
    Wind,
    Dragon,
}

impl Suit {
    /// Returns `true` for the three numbered suits.
    pub const fn is_numbered(self) -> bool {
        matches!(self, Self::Manzu | Self::Pinzu | Self::Souzu)
    }
}

// ---------------------------------------------------------------------------
// Wind
// ---------------------------------------------------------------------------

/// A wind, used both for seats and for the prevailing round wind.
///
/// On the wire a wind is its turn position: East is 0, North is 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Wind {
    East,
    South,
    West,
    North,
}

impl Wind {
    /// The wind that belongs to a turn position (0 = dealer = East).
    pub const fn from_order(order: usize) -> Self {
        match order % 4 {
            0 => Self::East,
            1 => Self::South,
            2 => Self::West,
            _ => Self::North,
        }
    }

    /// The honor tile for this wind.
    pub const fn tile(self) -> Tile {
        Tile(HONOR | (self as u8 + 1))
    }
}

impl From<Wind> for u8 {
    fn from(wind: Wind) -> Self {
        wind as u8
    }
}

impl TryFrom<u8> for Wind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < 4 {
            Ok(Self::from_order(value as usize))
        } else {
            Err(format!("wind out of range: {value}"))
        }
    }
}

/// The three dragons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dragon {
    White,
    Green,
    Red,
}

impl Dragon {
    /// The honor tile for this dragon.
    pub const fn tile(self) -> Tile {
        Tile(HONOR | (self as u8 + 5))
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// One playing piece.
///
/// Equality compares the raw byte, flags included. Rank and suit logic
/// (runs, copies, waits) goes through [`Tile::kind`] first so that a red
/// five still matches a plain five.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct Tile(u8);

impl Tile {
    /// A tile the recipient may not see.
    pub const HIDDEN: Tile = Tile(0xFE);
    /// Wildcard: "any tile" in a potential-action prompt.
    pub const INVALID: Tile = Tile(0xFF);

    pub const EAST: Tile = Wind::East.tile();
    pub const SOUTH: Tile = Wind::South.tile();
    pub const WEST: Tile = Wind::West.tile();
    pub const NORTH: Tile = Wind::North.tile();
    pub const WHITE: Tile = Dragon::White.tile();
    pub const GREEN: Tile = Dragon::Green.tile();
    pub const RED: Tile = Dragon::Red.tile();

    /// A manzu tile. `rank` must be in 1..=9.
    pub const fn man(rank: u8) -> Tile {
        Tile(MANZU | rank)
    }

    /// A pinzu tile. `rank` must be in 1..=9.
    pub const fn pin(rank: u8) -> Tile {
        Tile(PINZU | rank)
    }

    /// A souzu tile. `rank` must be in 1..=9.
    pub const fn sou(rank: u8) -> Tile {
        Tile(SOUZU | rank)
    }

    /// Builds the plain tile for a kind index in 0..34.
    pub const fn from_index(index: usize) -> Option<Tile> {
        if index >= KIND_COUNT {
            return None;
        }
        let suit = (index / 9) as u8;
        let rank = (index % 9) as u8 + 1;
        Some(Tile((suit << 4) | rank))
    }

    /// The raw encoded byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` unless this is one of the reserved sentinels.
    pub const fn is_real(self) -> bool {
        self.0 != Self::HIDDEN.0 && self.0 != Self::INVALID.0
    }

    /// The same tile with the red and dora flags cleared.
    pub const fn kind(self) -> Tile {
        if self.is_real() {
            Tile(self.0 & !FLAG_MASK)
        } else {
            self
        }
    }

    /// Compares two tiles ignoring flags.
    pub const fn same_kind(self, other: Tile) -> bool {
        self.kind().0 == other.kind().0
    }

    /// Manzu, pinzu, souzu, wind or dragon.
    pub fn suit(self) -> Suit {
        match self.0 & SUIT_MASK {
            MANZU => Suit::Manzu,
            PINZU => Suit::Pinzu,
            SOUZU => Suit::Souzu,
            _ if self.rank() <= 4 => Suit::Wind,
            _ => Suit::Dragon,
        }
    }

    /// Rank within the suit: 1..=9 for numbered suits, 1..=7 for honors.
    pub const fn rank(self) -> u8 {
        self.0 & RANK_MASK
    }

    /// Dense index in 0..34 used by count tables.
    pub const fn index(self) -> usize {
        let suit = ((self.0 & SUIT_MASK) >> 4) as usize;
        suit * 9 + (self.rank() as usize) - 1
    }

    /// Winds and dragons.
    pub const fn is_honor(self) -> bool {
        self.0 & SUIT_MASK == HONOR
    }

    /// 1 or 9 of a numbered suit.
    pub const fn is_terminal(self) -> bool {
        !self.is_honor() && (self.rank() == 1 || self.rank() == 9)
    }

    /// 2..=8 of a numbered suit.
    pub const fn is_simple(self) -> bool {
        !self.is_honor() && !self.is_terminal()
    }

    /// Returns `true` for a red five.
    pub const fn is_red(self) -> bool {
        self.is_real() && self.0 & RED_FLAG != 0
    }

    /// Sets the red flag.
    pub const fn with_red(self) -> Tile {
        Tile(self.0 | RED_FLAG)
    }

    /// Marks the revealed dora indicator.
    pub const fn is_dora(self) -> bool {
        self.is_real() && self.0 & DORA_FLAG != 0
    }

    /// Sets the dora flag.
    pub const fn with_dora(self) -> Tile {
        Tile(self.0 | DORA_FLAG)
    }

    /// The tile `offset` ranks away in the same numbered suit, if any.
    ///
    /// Honors never form runs, so this is always `None` for them.
    pub fn offset(self, offset: i8) -> Option<Tile> {
        if self.is_honor() || !self.is_real() {
            return None;
        }
        let rank = self.rank() as i8 + offset;
        if (1..=9).contains(&rank) {
            Some(Tile((self.kind().0 & SUIT_MASK) | rank as u8))
        } else {
            None
        }
    }

    /// The dora tile indicated by this indicator.
    pub fn dora_from_indicator(self) -> Tile {
        let kind = self.kind();
        let rank = kind.rank();
        let next = match kind.suit() {
            Suit::Wind => (rank % 4) + 1,
            Suit::Dragon => ((rank - 5 + 1) % 3) + 5,
            _ => (rank % 9) + 1,
        };
        Tile((kind.0 & SUIT_MASK) | next)
    }

    fn validate(raw: u8) -> Result<Tile, String> {
        let tile = Tile(raw);
        if !tile.is_real() {
            return Ok(tile);
        }
        let kind = tile.kind();
        let rank = kind.rank();
        let max = if kind.is_honor() { 7 } else { 9 };
        if rank == 0 || rank > max {
            return Err(format!("invalid tile encoding: {raw:#04x}"));
        }
        if tile.is_red() && (kind.is_honor() || rank != 5) {
            return Err(format!("only suited fives can be red: {raw:#04x}"));
        }
        Ok(tile)
    }
}

impl From<Tile> for u8 {
    fn from(tile: Tile) -> Self {
        tile.0
    }
}

impl TryFrom<u8> for Tile {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Tile::validate(raw)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Tile::HIDDEN {
            return write!(f, "??");
        }
        if *self == Tile::INVALID {
            return write!(f, "--");
        }
        let rank = self.rank();
        let suffix = match self.suit() {
            Suit::Manzu => 'm',
            Suit::Pinzu => 'p',
            Suit::Souzu => 's',
            Suit::Wind | Suit::Dragon => {
                let name = ["E", "S", "W", "N", "Wh", "Gr", "Rd"];
                return write!(f, "{}", name[(rank - 1) as usize]);
            }
        };
        // Red fives print as 0, the usual shorthand.
        let shown = if self.is_red() { 0 } else { rank };
        write!(f, "{shown}{suffix}")
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile({self})")
    }
}

/// The full 136-tile set in generation order: manzu, pinzu, souzu, then
/// honors, each kind repeated four times.
///
/// With `red_fives`, the first copy of each suited five carries the red flag.
pub fn full_tile_set(red_fives: bool) -> Vec<Tile> {
    let mut tiles = Vec::with_capacity(TILE_COUNT);
    for index in 0..KIND_COUNT {
        let Some(tile) = Tile::from_index(index) else {
            continue;
        };
        for copy in 0..4 {
            if red_fives && copy == 0 && !tile.is_honor() && tile.rank() == 5 {
                tiles.push(tile.with_red());
            } else {
                tiles.push(tile);
            }
        }
    }
    tiles
}
