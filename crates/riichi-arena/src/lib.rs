//! Arenas for the Riichi server.
//!
//! An arena is a room of up to four seated agents plus spectators. It owns
//! one [`RoundEngine`](riichi_game::RoundEngine), turns agent requests into
//! engine calls, and fans every resulting event out to the agents' bounded
//! outbound queues according to its visibility.
//!
//! # Key types
//!
//! - [`Arena`]: the synchronous core, one per room
//! - [`ArenaHandle`]: the arena behind a mutex, plus the reaction deadline timer
//! - [`RoomRegistry`]: creates, finds and removes arenas; one arena per agent
//! - [`SharedRegistry`]: the registry behind a lock that never spans an arena lock
//! - [`ArenaConfig`] / [`ArenaState`]: settings and lifecycle

mod agent;
mod arena;
mod config;
mod error;
mod handle;
mod registry;

pub use agent::{AgentReceiver, AgentSender, Role, outbound_queue};
pub use arena::{Arena, ArenaSnapshot};
pub use config::{ArenaConfig, ArenaState};
pub use error::ArenaError;
pub use handle::ArenaHandle;
pub use registry::{RoomRegistry, SharedRegistry};
