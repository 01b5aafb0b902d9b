//! Wire protocol for the Riichi arena server.
//!
//! - **Types** ([`ServerMessage`], [`ArenaMessage`], [`AgentId`]): the
//!   envelopes that travel on the wire. Board-level payloads
//!   (`BoardEvent`, `ActionData`) live in `riichi-game` and are nested
//!   inside these.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, messages out.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (ServerMessage) → Arena (ArenaMessage) → Engine (ActionData)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{AgentId, AgentInfo, ArenaListEntry, ArenaMessage, ServerMessage};
