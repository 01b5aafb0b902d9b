//! Shared handle to an arena and its reaction deadline timer.

use std::sync::Arc;
use std::time::Duration;

use riichi_game::{ActionData, Tile};
use riichi_protocol::{AgentId, ArenaListEntry, ArenaMessage};
use tokio::sync::Mutex;

use crate::{AgentSender, Arena, ArenaError, ArenaSnapshot, Role};

/// Cheap-to-clone handle to one arena.
///
/// Every method holds the arena lock for its whole call. Opening a
/// reaction window starts a timer task that expires the window after
/// [`ArenaConfig::reaction_timeout`](crate::ArenaConfig::reaction_timeout)
/// unless the players settle it first.
#[derive(Clone)]
pub struct ArenaHandle {
    name: Arc<str>,
    reaction_timeout: Duration,
    inner: Arc<Mutex<Arena>>,
}

impl std::fmt::Debug for ArenaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaHandle").field("name", &self.name).finish_non_exhaustive()
    }
}

impl ArenaHandle {
    /// Wraps an arena so tasks can share it.
    pub fn new(arena: Arena) -> Self {
        Self {
            name: Arc::from(arena.name()),
            reaction_timeout: arena.config().reaction_timeout,
            inner: Arc::new(Mutex::new(arena)),
        }
    }

    /// The arena's name, readable without taking the lock.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if both handles point at the same arena.
    pub fn same_arena(&self, other: &ArenaHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[cfg(test)]
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, Arena> {
        self.inner.lock().await
    }

    pub async fn join(
        &self,
        id: AgentId,
        name: impl Into<String>,
        sender: AgentSender,
    ) -> Result<Role, ArenaError> {
        self.with(|arena| arena.join(id, name, sender)).await
    }

    pub async fn leave(&self, id: AgentId) -> Result<(), ArenaError> {
        self.with(|arena| arena.leave(id)).await
    }

    pub async fn handle_message(&self, id: AgentId, msg: ArenaMessage) -> Result<(), ArenaError> {
        self.with(|arena| arena.handle_message(id, msg)).await
    }

    pub async fn start_game(&self, id: AgentId) -> Result<(), ArenaError> {
        self.with(|arena| arena.start_game(id)).await
    }

    pub async fn start_game_with(
        &self,
        id: AgentId,
        deck: Vec<Tile>,
        player_to_order: [usize; 4],
    ) -> Result<(), ArenaError> {
        self.with(|arena| arena.start_game_with(id, deck, player_to_order)).await
    }

    pub async fn player_action(&self, id: AgentId, action: ActionData) -> Result<(), ArenaError> {
        self.with(|arena| arena.player_action(id, action)).await
    }

    pub async fn snapshot(&self) -> ArenaSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn list_entry(&self) -> ArenaListEntry {
        self.inner.lock().await.list_entry()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Runs `f` under the lock, then arms a deadline for any reaction
    /// window it opened.
    async fn with<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> R {
        let mut arena = self.inner.lock().await;
        let out = f(&mut arena);
        if let Some(window) = arena.take_armed() {
            self.arm(window);
        }
        out
    }

    fn arm(&self, window: u64) {
        let handle = self.clone();
        tracing::debug!(arena = %self.name, window, timeout = ?self.reaction_timeout, "reaction deadline armed");
        tokio::spawn(async move {
            tokio::time::sleep(handle.reaction_timeout).await;
            handle.with(|arena| arena.expire_reactions(window)).await;
        });
    }
}
