//! Envelope types for the wire format.
//!
//! Both layers use the same shape:
//!
//! ```json
//! { "message_type": 6, "data": { "arena_message": { "message_type": 5, "data": {} } } }
//! ```
//!
//! [`ServerMessage`] is the outer envelope exchanged with a connection;
//! [`ArenaMessage`] is what travels between an agent and its arena.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use riichi_game::tagged::{self, Empty};
use riichi_game::{ActionData, BoardEvent};

const TAG: &str = "message_type";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A connected agent. Assigned by the server, unique for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// One arena in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArenaListEntry {
    pub name: String,
    /// Agents currently in the arena, spectators included.
    pub agents: usize,
    pub game_started: bool,
}

/// An agent as shown in arena info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentInfo {
    pub name: String,
    pub id: AgentId,
}

// ---------------------------------------------------------------------------
// ArenaMessage
// ---------------------------------------------------------------------------

/// Messages between an agent and the arena it sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaMessage {
    PlayerJoinedEvent { name: String, id: AgentId },
    PlayerQuitEvent { name: String },
    GameStartedEvent,
    ArenaBoardEvent { board_event: BoardEvent },
    ListPlayersResponse { names: Vec<String> },
    StartGameAction,
    PlayerAction { action: ActionData },
    PlayerQuitAction,
    ListPlayersAction,
}

impl ArenaMessage {
    /// Variant name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoinedEvent { .. } => "PlayerJoinedEvent",
            Self::PlayerQuitEvent { .. } => "PlayerQuitEvent",
            Self::GameStartedEvent => "GameStartedEvent",
            Self::ArenaBoardEvent { .. } => "ArenaBoardEvent",
            Self::ListPlayersResponse { .. } => "ListPlayersResponse",
            Self::StartGameAction => "StartGameAction",
            Self::PlayerAction { .. } => "PlayerAction",
            Self::PlayerQuitAction => "PlayerQuitAction",
            Self::ListPlayersAction => "ListPlayersAction",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::PlayerJoinedEvent { .. } => 0,
            Self::PlayerQuitEvent { .. } => 1,
            Self::GameStartedEvent => 2,
            Self::ArenaBoardEvent { .. } => 3,
            Self::ListPlayersResponse { .. } => 4,
            Self::StartGameAction => 5,
            Self::PlayerAction { .. } => 6,
            Self::PlayerQuitAction => 7,
            Self::ListPlayersAction => 8,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct JoinedPayload {
    name: String,
    id: AgentId,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamePayload {
    name: String,
}

#[derive(Serialize)]
struct BoardEventRef<'a> {
    board_event: &'a BoardEvent,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardEventPayload {
    board_event: BoardEvent,
}

#[derive(Serialize)]
struct NamesRef<'a> {
    names: &'a [String],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamesPayload {
    names: Vec<String>,
}

#[derive(Serialize)]
struct ActionRef<'a> {
    action: &'a ActionData,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionPayload {
    action: ActionData,
}

impl Serialize for ArenaMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.tag();
        match self {
            Self::PlayerJoinedEvent { name, id } => tagged::serialize(
                serializer,
                TAG,
                tag,
                &JoinedPayload { name: name.clone(), id: *id },
            ),
            Self::PlayerQuitEvent { name } => {
                tagged::serialize(serializer, TAG, tag, &NamePayload { name: name.clone() })
            }
            Self::ArenaBoardEvent { board_event } => {
                tagged::serialize(serializer, TAG, tag, &BoardEventRef { board_event })
            }
            Self::ListPlayersResponse { names } => {
                tagged::serialize(serializer, TAG, tag, &NamesRef { names })
            }
            Self::PlayerAction { action } => {
                tagged::serialize(serializer, TAG, tag, &ActionRef { action })
            }
            Self::GameStartedEvent
            | Self::StartGameAction
            | Self::PlayerQuitAction
            | Self::ListPlayersAction => tagged::serialize(serializer, TAG, tag, &Empty {}),
        }
    }
}

impl<'de> Deserialize<'de> for ArenaMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data) = tagged::deserialize(deserializer, TAG)?;
        let empty = |data| tagged::payload::<Empty, D::Error>(data);
        match tag {
            0 => tagged::payload::<JoinedPayload, _>(data)
                .map(|p| Self::PlayerJoinedEvent { name: p.name, id: p.id }),
            1 => tagged::payload::<NamePayload, _>(data).map(|p| Self::PlayerQuitEvent { name: p.name }),
            2 => empty(data).map(|_| Self::GameStartedEvent),
            3 => tagged::payload::<BoardEventPayload, _>(data)
                .map(|p| Self::ArenaBoardEvent { board_event: p.board_event }),
            4 => tagged::payload::<NamesPayload, _>(data)
                .map(|p| Self::ListPlayersResponse { names: p.names }),
            5 => empty(data).map(|_| Self::StartGameAction),
            6 => tagged::payload::<ActionPayload, _>(data).map(|p| Self::PlayerAction { action: p.action }),
            7 => empty(data).map(|_| Self::PlayerQuitAction),
            8 => empty(data).map(|_| Self::ListPlayersAction),
            other => Err(tagged::unknown_tag(TAG, other)),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// The outer envelope on a connection, in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Server → client: something happened in the client's arena.
    ArenaEvent { arena_message: ArenaMessage },
    /// Server → client: the answer to every request.
    GenericResponse { success: bool, fail_reason: String },
    ListArenasResponse { arenas: Vec<ArenaListEntry> },
    ArenaInfoResponse { name: String, agents: Vec<AgentInfo>, game_started: bool },
    /// Client → server: the handshake. Must be the first frame.
    InitialMessage { name: String },
    JoinArena { arena_name: String },
    /// Client → server: something for the client's arena.
    ArenaAction { arena_message: ArenaMessage },
    ListArenas,
    CreateArena { arena_name: String },
    ArenaInfo { arena_name: String },
    LeaveArena,
}

impl ServerMessage {
    /// A successful `GenericResponse`.
    pub fn ok() -> Self {
        Self::GenericResponse { success: true, fail_reason: String::new() }
    }

    /// A failed `GenericResponse` carrying `reason`.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::GenericResponse { success: false, fail_reason: reason.into() }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::ArenaEvent { .. } => 0,
            Self::GenericResponse { .. } => 1,
            Self::ListArenasResponse { .. } => 2,
            Self::ArenaInfoResponse { .. } => 3,
            Self::InitialMessage { .. } => 4,
            Self::JoinArena { .. } => 5,
            Self::ArenaAction { .. } => 6,
            Self::ListArenas => 7,
            Self::CreateArena { .. } => 8,
            Self::ArenaInfo { .. } => 9,
            Self::LeaveArena => 10,
        }
    }
}

#[derive(Serialize)]
struct ArenaMessageRef<'a> {
    arena_message: &'a ArenaMessage,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ArenaMessagePayload {
    arena_message: ArenaMessage,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponsePayload {
    success: bool,
    fail_reason: String,
}

#[derive(Serialize)]
struct ArenasRef<'a> {
    arenas: &'a [ArenaListEntry],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ArenasPayload {
    arenas: Vec<ArenaListEntry>,
}

#[derive(Serialize)]
struct InfoRef<'a> {
    name: &'a str,
    agents: &'a [AgentInfo],
    game_started: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InfoPayload {
    name: String,
    agents: Vec<AgentInfo>,
    game_started: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArenaNamePayload {
    arena_name: String,
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.tag();
        match self {
            Self::ArenaEvent { arena_message } | Self::ArenaAction { arena_message } => {
                tagged::serialize(serializer, TAG, tag, &ArenaMessageRef { arena_message })
            }
            Self::GenericResponse { success, fail_reason } => tagged::serialize(
                serializer,
                TAG,
                tag,
                &ResponsePayload { success: *success, fail_reason: fail_reason.clone() },
            ),
            Self::ListArenasResponse { arenas } => {
                tagged::serialize(serializer, TAG, tag, &ArenasRef { arenas })
            }
            Self::ArenaInfoResponse { name, agents, game_started } => tagged::serialize(
                serializer,
                TAG,
                tag,
                &InfoRef { name, agents, game_started: *game_started },
            ),
            Self::InitialMessage { name } => {
                tagged::serialize(serializer, TAG, tag, &NamePayload { name: name.clone() })
            }
            Self::JoinArena { arena_name }
            | Self::CreateArena { arena_name }
            | Self::ArenaInfo { arena_name } => tagged::serialize(
                serializer,
                TAG,
                tag,
                &ArenaNamePayload { arena_name: arena_name.clone() },
            ),
            Self::ListArenas | Self::LeaveArena => {
                tagged::serialize(serializer, TAG, tag, &Empty {})
            }
        }
    }
}

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data) = tagged::deserialize(deserializer, TAG)?;
        let arena_name = |data| {
            tagged::payload::<ArenaNamePayload, D::Error>(data).map(|p| p.arena_name)
        };
        let arena_message = |data| {
            tagged::payload::<ArenaMessagePayload, D::Error>(data).map(|p| p.arena_message)
        };
        match tag {
            0 => arena_message(data).map(|arena_message| Self::ArenaEvent { arena_message }),
            1 => tagged::payload::<ResponsePayload, _>(data).map(|p| Self::GenericResponse {
                success: p.success,
                fail_reason: p.fail_reason,
            }),
            2 => tagged::payload::<ArenasPayload, _>(data)
                .map(|p| Self::ListArenasResponse { arenas: p.arenas }),
            3 => tagged::payload::<InfoPayload, _>(data).map(|p| Self::ArenaInfoResponse {
                name: p.name,
                agents: p.agents,
                game_started: p.game_started,
            }),
            4 => tagged::payload::<NamePayload, _>(data).map(|p| Self::InitialMessage { name: p.name }),
            5 => arena_name(data).map(|arena_name| Self::JoinArena { arena_name }),
            6 => arena_message(data).map(|arena_message| Self::ArenaAction { arena_message }),
            7 => tagged::payload::<Empty, _>(data).map(|_| Self::ListArenas),
            8 => arena_name(data).map(|arena_name| Self::CreateArena { arena_name }),
            9 => arena_name(data).map(|arena_name| Self::ArenaInfo { arena_name }),
            10 => tagged::payload::<Empty, _>(data).map(|_| Self::LeaveArena),
            other => Err(tagged::unknown_tag(TAG, other)),
        }
    }
}
