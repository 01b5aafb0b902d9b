//! Board events and their routing.
//!
//! The engine never sends anything itself. Every step returns a list of
//! [`Dispatch`]es: an event plus the [`Visibility`] that says who gets
//! to see it. The arena turns those into per-agent deliveries.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::action::ActionData;
use crate::tagged;
use crate::tile::{Tile, Wind};
use crate::yaku::WinResult;

// ---------------------------------------------------------------------------
// Setup bundle
// ---------------------------------------------------------------------------

const SETUP_TAG: &str = "setup_type";

/// One entry of the private bundle each seat receives at round start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setup {
    InitialTiles { tiles: Vec<Tile> },
    /// The first revealed dora indicator.
    Dora { indicator: Tile },
    StartingPoints { points: [i32; 4] },
    /// The recipient's seat index.
    PlayerNumber { seat: usize },
    /// Turn position of every seat, indexed by seat.
    PlayerOrder { order: [usize; 4] },
    RoundWind { wind: Wind },
    RoundNumber { round: u32 },
}

impl Setup {
    fn tag(&self) -> u8 {
        match self {
            Self::InitialTiles { .. } => 0,
            Self::Dora { .. } => 1,
            Self::StartingPoints { .. } => 2,
            Self::PlayerNumber { .. } => 3,
            Self::PlayerOrder { .. } => 4,
            Self::RoundWind { .. } => 5,
            Self::RoundNumber { .. } => 6,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TilesPayload {
    tiles: Vec<Tile>,
}

#[derive(Serialize)]
struct TilesPayloadRef<'a> {
    tiles: &'a [Tile],
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndicatorPayload {
    indicator: Tile,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PointsPayload {
    points: [i32; 4],
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeatPayload {
    seat: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrderPayload {
    order: [usize; 4],
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindPayload {
    wind: Wind,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoundPayload {
    round: u32,
}

impl Serialize for Setup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.tag();
        match self {
            Self::InitialTiles { tiles } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &TilesPayloadRef { tiles })
            }
            Self::Dora { indicator } => tagged::serialize(
                serializer,
                SETUP_TAG,
                tag,
                &IndicatorPayload { indicator: *indicator },
            ),
            Self::StartingPoints { points } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &PointsPayload { points: *points })
            }
            Self::PlayerNumber { seat } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &SeatPayload { seat: *seat })
            }
            Self::PlayerOrder { order } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &OrderPayload { order: *order })
            }
            Self::RoundWind { wind } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &WindPayload { wind: *wind })
            }
            Self::RoundNumber { round } => {
                tagged::serialize(serializer, SETUP_TAG, tag, &RoundPayload { round: *round })
            }
        }
    }
}

impl<'de> Deserialize<'de> for Setup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data) = tagged::deserialize(deserializer, SETUP_TAG)?;
        match tag {
            0 => tagged::payload::<TilesPayload, _>(data).map(|p| Self::InitialTiles { tiles: p.tiles }),
            1 => tagged::payload::<IndicatorPayload, _>(data)
                .map(|p| Self::Dora { indicator: p.indicator }),
            2 => tagged::payload::<PointsPayload, _>(data)
                .map(|p| Self::StartingPoints { points: p.points }),
            3 => tagged::payload::<SeatPayload, _>(data).map(|p| Self::PlayerNumber { seat: p.seat }),
            4 => tagged::payload::<OrderPayload, _>(data).map(|p| Self::PlayerOrder { order: p.order }),
            5 => tagged::payload::<WindPayload, _>(data).map(|p| Self::RoundWind { wind: p.wind }),
            6 => tagged::payload::<RoundPayload, _>(data).map(|p| Self::RoundNumber { round: p.round }),
            other => Err(tagged::unknown_tag(SETUP_TAG, other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Round result
// ---------------------------------------------------------------------------

/// How a round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Ron { winner: usize, discarder: usize },
    Tsumo { winner: usize },
    /// The live wall ran out. Lists the seats that were tenpai.
    ExhaustiveDraw { tenpai: Vec<usize> },
    Aborted { reason: String },
}

/// Final state of a round, attached to the `GameEnd` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: Outcome,
    /// Scoring details for a win.
    pub win: Option<WinResult>,
    /// Point change per seat for this settlement.
    pub deltas: [i32; 4],
    /// Points per seat after settlement.
    pub points: [i32; 4],
}

// ---------------------------------------------------------------------------
// Board events
// ---------------------------------------------------------------------------

const EVENT_TAG: &str = "event_type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Something happened.
    PlayerAction { action: ActionData, from_player: usize },
    /// Something the recipient may do now.
    PotentialAction { action: ActionData },
    GameSetup { setup: Vec<Setup> },
    GameEnd { result: GameResult },
    DoraRevealed { indicator: Tile },
}

impl BoardEvent {
    /// The rendering shown to agents who may not see the private detail.
    ///
    /// Only draws carry a secret today: the tile becomes [`Tile::HIDDEN`].
    pub fn redacted(&self) -> BoardEvent {
        match self {
            Self::PlayerAction { action: ActionData::Draw { .. }, from_player } => {
                Self::PlayerAction {
                    action: ActionData::Draw { tile: Tile::HIDDEN },
                    from_player: *from_player,
                }
            }
            other => other.clone(),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::PlayerAction { .. } => 0,
            Self::PotentialAction { .. } => 1,
            Self::GameSetup { .. } => 2,
            Self::GameEnd { .. } => 3,
            Self::DoraRevealed { .. } => 4,
        }
    }
}

#[derive(Serialize)]
struct PlayerActionRef<'a> {
    action: &'a ActionData,
    from_player: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PlayerActionPayload {
    action: ActionData,
    from_player: usize,
}

#[derive(Serialize)]
struct PotentialRef<'a> {
    action: &'a ActionData,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PotentialPayload {
    action: ActionData,
}

#[derive(Serialize)]
struct SetupRef<'a> {
    setup: &'a [Setup],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SetupPayload {
    setup: Vec<Setup>,
}

#[derive(Serialize)]
struct ResultRef<'a> {
    result: &'a GameResult,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResultPayload {
    result: GameResult,
}

impl Serialize for BoardEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.tag();
        match self {
            Self::PlayerAction { action, from_player } => tagged::serialize(
                serializer,
                EVENT_TAG,
                tag,
                &PlayerActionRef { action, from_player: *from_player },
            ),
            Self::PotentialAction { action } => {
                tagged::serialize(serializer, EVENT_TAG, tag, &PotentialRef { action })
            }
            Self::GameSetup { setup } => {
                tagged::serialize(serializer, EVENT_TAG, tag, &SetupRef { setup })
            }
            Self::GameEnd { result } => {
                tagged::serialize(serializer, EVENT_TAG, tag, &ResultRef { result })
            }
            Self::DoraRevealed { indicator } => tagged::serialize(
                serializer,
                EVENT_TAG,
                tag,
                &IndicatorPayload { indicator: *indicator },
            ),
        }
    }
}

impl<'de> Deserialize<'de> for BoardEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data) = tagged::deserialize(deserializer, EVENT_TAG)?;
        match tag {
            0 => tagged::payload::<PlayerActionPayload, _>(data).map(|p| Self::PlayerAction {
                action: p.action,
                from_player: p.from_player,
            }),
            1 => tagged::payload::<PotentialPayload, _>(data)
                .map(|p| Self::PotentialAction { action: p.action }),
            2 => tagged::payload::<SetupPayload, _>(data).map(|p| Self::GameSetup { setup: p.setup }),
            3 => tagged::payload::<ResultPayload, _>(data).map(|p| Self::GameEnd { result: p.result }),
            4 => tagged::payload::<IndicatorPayload, _>(data)
                .map(|p| Self::DoraRevealed { indicator: p.indicator }),
            other => Err(tagged::unknown_tag(EVENT_TAG, other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Who receives an event. Seats are player indices, not turn positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only this seat.
    Player(usize),
    /// This seat sees the full event; everyone else sees [`BoardEvent::redacted`].
    Partial(usize),
    /// Everyone except this seat.
    Exclude(usize),
    Global,
}

/// An event paired with its audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub event: BoardEvent,
    pub visibility: Visibility,
}

impl Dispatch {
    /// Delivered to everyone.
    pub fn global(event: BoardEvent) -> Self {
        Self { event, visibility: Visibility::Global }
    }

    /// Delivered to `seat` only.
    pub fn player(seat: usize, event: BoardEvent) -> Self {
        Self { event, visibility: Visibility::Player(seat) }
    }

    /// Full to `seat`, redacted to everyone else.
    pub fn partial(seat: usize, event: BoardEvent) -> Self {
        Self { event, visibility: Visibility::Partial(seat) }
    }

    /// The event as `seat` should see it, or `None` if it is not for them.
    ///
    /// `seat` is `None` for spectators, who only ever get the public side.
    pub fn view_for(&self, seat: Option<usize>) -> Option<BoardEvent> {
        match (self.visibility, seat) {
            (Visibility::Global, _) => Some(self.event.clone()),
            (Visibility::Player(target), Some(s)) if s == target => Some(self.event.clone()),
            (Visibility::Player(_), _) => None,
            (Visibility::Partial(target), Some(s)) if s == target => Some(self.event.clone()),
            (Visibility::Partial(_), _) => Some(self.event.redacted()),
            (Visibility::Exclude(target), Some(s)) if s == target => None,
            (Visibility::Exclude(_), _) => Some(self.event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draw(seat: usize, tile: Tile) -> BoardEvent {
        BoardEvent::PlayerAction {
            action: ActionData::Draw { tile },
            from_player: seat,
        }
    }

    #[test]
    fn test_redacted_hides_drawn_tile() {
        let event = draw(2, Tile::sou(7));
        assert_eq!(event.redacted(), draw(2, Tile::HIDDEN));
    }

    #[test]
    fn test_redacted_keeps_public_events() {
        let event = BoardEvent::PlayerAction {
            action: ActionData::Toss { tile: Tile::sou(7) },
            from_player: 2,
        };
        assert_eq!(event.redacted(), event);
    }

    #[test]
    fn test_view_for_partial() {
        let d = Dispatch::partial(1, draw(1, Tile::man(3)));
        assert_eq!(d.view_for(Some(1)), Some(draw(1, Tile::man(3))));
        assert_eq!(d.view_for(Some(0)), Some(draw(1, Tile::HIDDEN)));
        assert_eq!(d.view_for(None), Some(draw(1, Tile::HIDDEN)));
    }

    #[test]
    fn test_view_for_player_and_exclude() {
        let event = BoardEvent::DoraRevealed { indicator: Tile::EAST };
        let p = Dispatch::player(3, event.clone());
        assert!(p.view_for(Some(3)).is_some());
        assert!(p.view_for(Some(2)).is_none());
        assert!(p.view_for(None).is_none());

        let e = Dispatch { event, visibility: Visibility::Exclude(3) };
        assert!(e.view_for(Some(3)).is_none());
        assert!(e.view_for(Some(0)).is_some());
        assert!(e.view_for(None).is_some());
    }

    #[test]
    fn test_board_event_json_shape() {
        let v = serde_json::to_value(draw(1, Tile::HIDDEN)).unwrap();
        assert_eq!(
            v,
            json!({
                "event_type": 0,
                "data": {
                    "action": { "action_type": 8, "data": { "tile": 254 } },
                    "from_player": 1
                }
            })
        );
    }

    #[test]
    fn test_setup_bundle_decodes() {
        let v = json!({
            "event_type": 2,
            "data": { "setup": [
                { "setup_type": 3, "data": { "seat": 2 } },
                { "setup_type": 4, "data": { "order": [2, 0, 3, 1] } },
                { "setup_type": 5, "data": { "wind": 0 } }
            ]}
        });
        let event: BoardEvent = serde_json::from_value(v).unwrap();
        let BoardEvent::GameSetup { setup } = event else {
            panic!("expected setup");
        };
        assert_eq!(setup[0], Setup::PlayerNumber { seat: 2 });
        assert_eq!(setup[1], Setup::PlayerOrder { order: [2, 0, 3, 1] });
        assert_eq!(setup[2], Setup::RoundWind { wind: Wind::East });
    }

    #[test]
    fn test_setup_rejects_mismatched_payload() {
        let v = json!({ "setup_type": 6, "data": { "seat": 1 } });
        assert!(serde_json::from_value::<Setup>(v).is_err());
    }

    #[test]
    fn test_game_end_carries_outcome() {
        let result = GameResult {
            outcome: Outcome::Aborted { reason: "player left".into() },
            win: None,
            deltas: [0; 4],
            points: [25_000; 4],
        };
        let event = BoardEvent::GameEnd { result: result.clone() };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event_type"], 3);
        assert_eq!(v["data"]["result"]["outcome"]["kind"], "ABORTED");
        let back: BoardEvent = serde_json::from_value(v).unwrap();
        assert_eq!(back, BoardEvent::GameEnd { result });
    }
}
