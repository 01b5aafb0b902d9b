//! Room registry: creates, finds and removes arenas, and tracks which
//! arena each agent is in.

use std::collections::HashMap;

use riichi_protocol::{AgentId, ArenaListEntry};
use tokio::sync::{Mutex, MutexGuard};

use crate::{AgentSender, Arena, ArenaConfig, ArenaError, ArenaHandle, Role};

/// Every arena on the server, by name.
///
/// Pure bookkeeping: nothing here waits on an arena. The async operations
/// that do live on [`SharedRegistry`].
#[derive(Debug)]
pub struct RoomRegistry {
    config: ArenaConfig,
    arenas: HashMap<String, ArenaHandle>,
    /// An agent is in at most one arena. Entries are made before the
    /// arena is joined, so a half-finished join already counts.
    agent_arenas: HashMap<AgentId, String>,
}

impl RoomRegistry {
    /// An empty registry. New arenas get `config`.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            arenas: HashMap::new(),
            agent_arenas: HashMap::new(),
        }
    }

    /// Settings every new arena is created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Creates an empty arena.
    pub fn create(&mut self, name: &str) -> Result<ArenaHandle, ArenaError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ArenaError::InvalidName);
        }
        if self.arenas.contains_key(name) {
            return Err(ArenaError::NameTaken(name.to_string()));
        }
        let handle = ArenaHandle::new(Arena::new(name, self.config.clone()));
        self.arenas.insert(name.to_string(), handle.clone());
        tracing::info!(arena = %name, "arena created");
        Ok(handle)
    }

    /// Looks an arena up by name. Surrounding whitespace is ignored, as
    /// it is on [`create`](Self::create).
    pub fn get(&self, name: &str) -> Option<ArenaHandle> {
        self.arenas.get(name.trim()).cloned()
    }

    /// Drops an arena from the registry. Its members lose their index
    /// entries; the arena itself lives on while handles to it exist.
    pub fn remove(&mut self, name: &str) -> Option<ArenaHandle> {
        let handle = self.arenas.remove(name)?;
        self.agent_arenas.retain(|_, arena| arena != name);
        tracing::info!(arena = %name, "arena removed");
        Some(handle)
    }

    /// Handles to every arena, in no particular order.
    pub fn handles(&self) -> Vec<ArenaHandle> {
        self.arenas.values().cloned().collect()
    }

    /// The arena `agent` is in.
    pub fn arena_of(&self, agent: AgentId) -> Option<ArenaHandle> {
        self.agent_arenas.get(&agent).and_then(|name| self.get(name))
    }

    /// Number of registered arenas.
    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Books `agent` into the named arena ahead of the actual join.
    fn reserve(&mut self, agent: AgentId, arena_name: &str) -> Result<ArenaHandle, ArenaError> {
        if let Some(current) = self.agent_arenas.get(&agent) {
            return Err(ArenaError::AlreadyInArena(agent, current.clone()));
        }
        let handle = self
            .get(arena_name)
            .ok_or_else(|| ArenaError::NotFound(arena_name.trim().to_string()))?;
        self.agent_arenas.insert(agent, handle.name().to_string());
        Ok(handle)
    }

    /// Drops the agent's index entry and returns its arena, if still
    /// registered.
    fn release(&mut self, agent: AgentId) -> Result<Option<ArenaHandle>, ArenaError> {
        let name = self
            .agent_arenas
            .remove(&agent)
            .ok_or(ArenaError::NotInArena(agent))?;
        Ok(self.arenas.get(&name).cloned())
    }

    /// Removes `handle`'s arena unless it was replaced or somebody is
    /// booked into it.
    fn remove_if_unused(&mut self, handle: &ArenaHandle) {
        let name = handle.name();
        let current = self.arenas.get(name).is_some_and(|h| h.same_arena(handle));
        let booked = self.agent_arenas.values().any(|a| a == name);
        if current && !booked {
            self.remove(name);
        }
    }
}

/// The registry behind its lock.
///
/// The lock guards index bookkeeping only. It is always released before
/// an arena lock is awaited, so a busy arena never stalls the others.
#[derive(Debug)]
pub struct SharedRegistry {
    inner: Mutex<RoomRegistry>,
}

impl SharedRegistry {
    /// An empty registry behind its lock.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            inner: Mutex::new(RoomRegistry::new(config)),
        }
    }

    /// Locks the registry for synchronous lookups and changes.
    pub async fn lock(&self) -> MutexGuard<'_, RoomRegistry> {
        self.inner.lock().await
    }

    /// All arenas, sorted by name.
    pub async fn list(&self) -> Vec<ArenaListEntry> {
        let handles = self.inner.lock().await.handles();
        let mut entries = Vec::with_capacity(handles.len());
        for handle in &handles {
            entries.push(handle.list_entry().await);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Puts an agent into the named arena.
    pub async fn join(
        &self,
        agent: AgentId,
        agent_name: &str,
        arena_name: &str,
        sender: AgentSender,
    ) -> Result<Role, ArenaError> {
        let handle = self.inner.lock().await.reserve(agent, arena_name)?;
        match handle.join(agent, agent_name, sender).await {
            Ok(role) => Ok(role),
            Err(err) => {
                self.inner.lock().await.agent_arenas.remove(&agent);
                Err(err)
            }
        }
    }

    /// Takes an agent out of its arena. The arena is removed once empty.
    ///
    /// The index entry is dropped even if the arena already let the agent
    /// go, as it does for agents whose queue overflowed.
    pub async fn leave(&self, agent: AgentId) -> Result<(), ArenaError> {
        let Some(handle) = self.inner.lock().await.release(agent)? else {
            return Ok(());
        };
        match handle.leave(agent).await {
            Ok(()) | Err(ArenaError::AgentNotFound(_)) => {}
            Err(err) => return Err(err),
        }
        if handle.is_empty().await {
            self.inner.lock().await.remove_if_unused(&handle);
        }
        Ok(())
    }
}
