//! Player actions.
//!
//! An [`ActionData`] is both what a client sends ("I toss 3p") and what
//! the server echoes or offers ("seat 2 drew a tile", "you may Pon 5p").

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::tagged;
use crate::tile::Tile;

const TAG: &str = "action_type";

/// The numeric tag of each action on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionType {
    Ron = 0,
    Tsumo = 1,
    Riichi = 2,
    Toss = 3,
    Skip = 4,
    Pon = 5,
    Kan = 6,
    Chii = 7,
    Draw = 8,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ron => "RON",
            Self::Tsumo => "TSUMO",
            Self::Riichi => "RIICHI",
            Self::Toss => "TOSS",
            Self::Skip => "SKIP",
            Self::Pon => "PON",
            Self::Kan => "KAN",
            Self::Chii => "CHII",
            Self::Draw => "DRAW",
        };
        f.write_str(name)
    }
}

/// A single action with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionData {
    Ron { tile: Tile },
    Tsumo { tile: Tile },
    /// Declare riichi by discarding `tile`.
    Riichi { tile: Tile },
    Toss { tile: Tile },
    /// Decline an offered reaction.
    Skip { action: Box<ActionData> },
    Pon { tile: Tile },
    /// Ankan or shouminkan on the player's own turn, daiminkan on a discard.
    Kan { tile: Tile },
    Chii { tile: Tile, hand_tiles: [Tile; 2] },
    Draw { tile: Tile },
}

impl ActionData {
    /// The payload-free tag of this action.
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Ron { .. } => ActionType::Ron,
            Self::Tsumo { .. } => ActionType::Tsumo,
            Self::Riichi { .. } => ActionType::Riichi,
            Self::Toss { .. } => ActionType::Toss,
            Self::Skip { .. } => ActionType::Skip,
            Self::Pon { .. } => ActionType::Pon,
            Self::Kan { .. } => ActionType::Kan,
            Self::Chii { .. } => ActionType::Chii,
            Self::Draw { .. } => ActionType::Draw,
        }
    }

    /// The tile the action is about. `None` only for `Skip`.
    pub fn tile(&self) -> Option<Tile> {
        match self {
            Self::Ron { tile }
            | Self::Tsumo { tile }
            | Self::Riichi { tile }
            | Self::Toss { tile }
            | Self::Pon { tile }
            | Self::Kan { tile }
            | Self::Chii { tile, .. }
            | Self::Draw { tile } => Some(*tile),
            Self::Skip { .. } => None,
        }
    }

    /// Same action about `tile` instead. `Skip` comes back unchanged.
    pub fn with_tile(self, tile: Tile) -> ActionData {
        match self {
            Self::Ron { .. } => Self::Ron { tile },
            Self::Tsumo { .. } => Self::Tsumo { tile },
            Self::Riichi { .. } => Self::Riichi { tile },
            Self::Toss { .. } => Self::Toss { tile },
            Self::Pon { .. } => Self::Pon { tile },
            Self::Kan { .. } => Self::Kan { tile },
            Self::Chii { hand_tiles, .. } => Self::Chii { tile, hand_tiles },
            Self::Draw { .. } => Self::Draw { tile },
            skip @ Self::Skip { .. } => skip,
        }
    }

    /// Claims compete in a reaction window: Ron over Kan and Pon over Chii.
    pub fn claim_priority(&self) -> u8 {
        match self {
            Self::Ron { .. } => 3,
            Self::Kan { .. } | Self::Pon { .. } => 2,
            Self::Chii { .. } => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ActionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip { action } => write!(f, "SKIP({action})"),
            Self::Chii { tile, hand_tiles } => {
                write!(f, "CHII({tile} with {} {})", hand_tiles[0], hand_tiles[1])
            }
            other => match other.tile() {
                Some(tile) => write!(f, "{}({tile})", other.action_type()),
                None => write!(f, "{}", other.action_type()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TilePayload {
    tile: Tile,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChiiPayload {
    tile: Tile,
    hand_tiles: [Tile; 2],
}

#[derive(Serialize)]
struct SkipPayloadRef<'a> {
    action: &'a ActionData,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SkipPayload {
    action: ActionData,
}

impl Serialize for ActionData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.action_type() as u8;
        match self {
            Self::Skip { action } => {
                tagged::serialize(serializer, TAG, tag, &SkipPayloadRef { action })
            }
            Self::Chii { tile, hand_tiles } => tagged::serialize(
                serializer,
                TAG,
                tag,
                &ChiiPayload { tile: *tile, hand_tiles: *hand_tiles },
            ),
            Self::Ron { tile }
            | Self::Tsumo { tile }
            | Self::Riichi { tile }
            | Self::Toss { tile }
            | Self::Pon { tile }
            | Self::Kan { tile }
            | Self::Draw { tile } => {
                tagged::serialize(serializer, TAG, tag, &TilePayload { tile: *tile })
            }
        }
    }
}

impl<'de> Deserialize<'de> for ActionData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data) = tagged::deserialize(deserializer, TAG)?;

        let tile = |data: serde_json::Value| -> Result<Tile, D::Error> {
            tagged::payload::<TilePayload, _>(data).map(|p| p.tile)
        };

        match tag {
            0 => tile(data).map(|tile| Self::Ron { tile }),
            1 => tile(data).map(|tile| Self::Tsumo { tile }),
            2 => tile(data).map(|tile| Self::Riichi { tile }),
            3 => tile(data).map(|tile| Self::Toss { tile }),
            4 => {
                let p: SkipPayload = tagged::payload(data)?;
                Ok(Self::Skip { action: Box::new(p.action) })
            }
            5 => tile(data).map(|tile| Self::Pon { tile }),
            6 => tile(data).map(|tile| Self::Kan { tile }),
            7 => {
                let p: ChiiPayload = tagged::payload(data)?;
                Ok(Self::Chii { tile: p.tile, hand_tiles: p.hand_tiles })
            }
            8 => tile(data).map(|tile| Self::Draw { tile }),
            other => Err(tagged::unknown_tag(TAG, other)),
        }
    }
}
