//! Agents: arena members and their outbound queues.

use riichi_protocol::{AgentId, ArenaMessage};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Producer side of an agent's outbound queue. The arena is the only writer.
pub type AgentSender = mpsc::Sender<ArenaMessage>;

/// Consumer side, drained by the agent's connection task.
pub type AgentReceiver = mpsc::Receiver<ArenaMessage>;

/// Creates a bounded outbound queue.
pub fn outbound_queue(capacity: usize) -> (AgentSender, AgentReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Whether an agent plays or watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Spectator,
}

#[derive(Debug)]
pub(crate) struct Agent {
    pub(crate) id: AgentId,
    pub(crate) name: String,
    pub(crate) role: Role,
    /// Seat in the current or last round. Always `None` for spectators.
    pub(crate) seat: Option<usize>,
    sender: AgentSender,
    lagging: bool,
}

impl Agent {
    pub(crate) fn new(id: AgentId, name: String, role: Role, sender: AgentSender) -> Self {
        Self { id, name, role, seat: None, sender, lagging: false }
    }

    /// Queues a message without waiting.
    ///
    /// A full or closed queue marks the agent as lagging; later messages
    /// are dropped until the arena removes it.
    pub(crate) fn deliver(&mut self, msg: ArenaMessage) {
        if self.lagging {
            return;
        }
        match self.sender.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(agent = %self.id, name = %self.name, "outbound queue full, dropping agent");
                self.lagging = true;
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(agent = %self.id, "outbound queue closed");
                self.lagging = true;
            }
        }
    }

    pub(crate) fn is_lagging(&self) -> bool {
        self.lagging
    }
}
