//! The arena core: membership, seating, and event fan-out.
//!
//! Everything here is synchronous. [`ArenaHandle`](crate::ArenaHandle)
//! wraps an [`Arena`] in a mutex so each request runs its whole
//! validate, mutate, emit sequence without interleaving.

use riichi_game::{ActionData, Dispatch, GameError, Progress, RoundEngine, Tile};
use riichi_protocol::{AgentId, AgentInfo, ArenaListEntry, ArenaMessage};

use crate::agent::{Agent, AgentSender, Role};
use crate::{ArenaConfig, ArenaError, ArenaState};

const SEATS: usize = 4;

/// Point-in-time view of an arena for info requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaSnapshot {
    pub name: String,
    pub agents: Vec<AgentInfo>,
    pub game_started: bool,
}

pub struct Arena {
    name: String,
    config: ArenaConfig,
    state: ArenaState,
    /// Join order. The first four players are seated 0..4 when a round starts.
    agents: Vec<Agent>,
    engine: RoundEngine,
    /// Who sat where in the last dealt round. A different table resets the
    /// engine so points do not carry over to strangers.
    roster: Option<[AgentId; SEATS]>,
    open_window: Option<u64>,
    /// A window that still needs a deadline timer.
    armed: Option<u64>,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("agents", &self.agents.len())
            .finish_non_exhaustive()
    }
}

impl Arena {
    /// Creates an empty arena waiting for players.
    pub fn new(name: impl Into<String>, config: ArenaConfig) -> Self {
        let engine = RoundEngine::new(config.round.clone());
        Self {
            name: name.into(),
            config,
            state: ArenaState::Waiting,
            agents: Vec::new(),
            engine,
            roster: None,
            open_window: None,
            armed: None,
        }
    }

    /// The arena's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings the arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Lifecycle state: waiting or running a round.
    pub fn state(&self) -> ArenaState {
        self.state
    }

    /// The engine of the current or last round.
    pub fn engine(&self) -> &RoundEngine {
        &self.engine
    }

    /// Players and spectators together.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` once the last agent has left.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns `true` if `id` is seated or spectating here.
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.iter().any(|a| a.id == id)
    }

    /// Seat or spectator role of `id`.
    pub fn role_of(&self, id: AgentId) -> Option<Role> {
        self.agent(id).map(|a| a.role)
    }

    /// Seat of a player in the running round.
    pub fn seat_of(&self, id: AgentId) -> Option<usize> {
        if !self.state.is_running() {
            return None;
        }
        self.agent(id).and_then(|a| a.seat)
    }

    /// Names of every agent, in join order.
    pub fn player_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Point-in-time view for `ArenaInfo` replies.
    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            name: self.name.clone(),
            agents: self
                .agents
                .iter()
                .map(|a| AgentInfo { name: a.name.clone(), id: a.id })
                .collect(),
            game_started: self.state.is_running(),
        }
    }

    /// Summary row for `ListArenas`.
    pub fn list_entry(&self) -> ArenaListEntry {
        ArenaListEntry {
            name: self.name.clone(),
            agents: self.agents.len(),
            game_started: self.state.is_running(),
        }
    }

    /// Takes the id of a reaction window that was opened since the last
    /// call and still needs a deadline.
    pub fn take_armed(&mut self) -> Option<u64> {
        self.armed.take()
    }

    fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    fn count(&self, role: Role) -> usize {
        self.agents.iter().filter(|a| a.role == role).count()
    }

    // -- Membership ----------------------------------------------------------

    /// Adds an agent. It takes a free seat if no round is running, and
    /// watches otherwise. Every other agent is told about the newcomer.
    pub fn join(
        &mut self,
        id: AgentId,
        name: impl Into<String>,
        sender: AgentSender,
    ) -> Result<Role, ArenaError> {
        if self.contains(id) {
            return Err(ArenaError::AlreadyInArena(id, self.name.clone()));
        }
        let role = if !self.state.is_running() && self.count(Role::Player) < SEATS {
            Role::Player
        } else if self.config.allow_spectators
            && self.count(Role::Spectator) < self.config.max_spectators
        {
            Role::Spectator
        } else {
            return Err(ArenaError::ArenaFull(self.name.clone()));
        };

        let name = name.into();
        tracing::info!(arena = %self.name, agent = %id, %name, ?role, "agent joined");
        self.broadcast(ArenaMessage::PlayerJoinedEvent { name: name.clone(), id });
        self.agents.push(Agent::new(id, name, role, sender));
        self.reap();
        Ok(role)
    }

    /// Removes an agent. A seated player leaving mid-round aborts the round.
    pub fn leave(&mut self, id: AgentId) -> Result<(), ArenaError> {
        let pos = self
            .agents
            .iter()
            .position(|a| a.id == id)
            .ok_or(ArenaError::AgentNotFound(id))?;
        self.remove_at(pos);
        self.reap();
        Ok(())
    }

    fn remove_at(&mut self, pos: usize) {
        let agent = self.agents.remove(pos);
        tracing::info!(arena = %self.name, agent = %agent.id, name = %agent.name, "agent left");
        self.broadcast(ArenaMessage::PlayerQuitEvent { name: agent.name.clone() });

        if agent.role == Role::Player && self.state.is_running() {
            let dispatches = self.engine.abort(&format!("{} left the table", agent.name));
            self.fan_out(dispatches);
            self.end_round();
        }
        self.fill_seats();
    }

    /// Removes every agent whose outbound queue overflowed or closed.
    /// Removing one can overflow another, hence the loop.
    fn reap(&mut self) {
        while let Some(pos) = self.agents.iter().position(Agent::is_lagging) {
            self.remove_at(pos);
        }
    }

    /// Promotes the longest-waiting spectators into free seats.
    fn fill_seats(&mut self) {
        if self.state.is_running() {
            return;
        }
        let mut players = self.count(Role::Player);
        for agent in &mut self.agents {
            if players >= SEATS {
                break;
            }
            if agent.role == Role::Spectator {
                agent.role = Role::Player;
                players += 1;
                tracing::debug!(arena = %self.name, agent = %agent.id, "spectator takes a seat");
            }
        }
    }

    // -- Requests ------------------------------------------------------------

    /// Routes an inbound arena message from `id`.
    pub fn handle_message(&mut self, id: AgentId, msg: ArenaMessage) -> Result<(), ArenaError> {
        match msg {
            ArenaMessage::StartGameAction => self.start_game(id),
            ArenaMessage::PlayerAction { action } => self.player_action(id, action),
            ArenaMessage::PlayerQuitAction => self.leave(id),
            ArenaMessage::ListPlayersAction => self.list_players(id),
            other => Err(ArenaError::NotAnAction(other.name())),
        }
    }

    fn list_players(&mut self, id: AgentId) -> Result<(), ArenaError> {
        let names = self.player_names();
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(ArenaError::AgentNotFound(id))?;
        agent.deliver(ArenaMessage::ListPlayersResponse { names });
        self.reap();
        Ok(())
    }

    /// Deals a round to the four seated players.
    pub fn start_game(&mut self, id: AgentId) -> Result<(), ArenaError> {
        self.begin_round(id, RoundEngine::start_round)
    }

    /// Deals a round from a fixed deck and seating.
    pub fn start_game_with(
        &mut self,
        id: AgentId,
        deck: Vec<Tile>,
        player_to_order: [usize; SEATS],
    ) -> Result<(), ArenaError> {
        self.begin_round(id, move |engine| engine.start_round_with(deck, player_to_order))
    }

    fn begin_round<F>(&mut self, id: AgentId, deal: F) -> Result<(), ArenaError>
    where
        F: FnOnce(&mut RoundEngine) -> Result<Vec<Dispatch>, GameError>,
    {
        if !self.contains(id) {
            return Err(ArenaError::AgentNotFound(id));
        }
        if self.state.is_running() {
            return Err(ArenaError::AlreadyStarted);
        }
        let players: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| a.role == Role::Player)
            .map(|a| a.id)
            .collect();
        let roster: [AgentId; SEATS] = players
            .as_slice()
            .try_into()
            .map_err(|_| ArenaError::WrongPlayerCount(players.len()))?;

        if self.roster != Some(roster) {
            self.engine = RoundEngine::new(self.config.round.clone());
            self.roster = Some(roster);
        }
        let setup = deal(&mut self.engine)?;

        for agent in &mut self.agents {
            agent.seat = roster.iter().position(|r| *r == agent.id);
        }
        self.state = ArenaState::InRound;
        self.open_window = None;
        tracing::info!(
            arena = %self.name,
            round = self.engine.round_number(),
            dealer = self.engine.dealer(),
            "round started"
        );

        self.broadcast(ArenaMessage::GameStartedEvent);
        self.fan_out(setup);
        self.drive();
        self.reap();
        Ok(())
    }

    /// Forwards a player's action to the engine.
    ///
    /// A rejected action changes nothing and is reported only to the caller
    /// through the returned error.
    pub fn player_action(&mut self, id: AgentId, action: ActionData) -> Result<(), ArenaError> {
        let agent = self.agent(id).ok_or(ArenaError::AgentNotFound(id))?;
        if !self.state.is_running() {
            return Err(ArenaError::NotStarted);
        }
        let seat = match (agent.role, agent.seat) {
            (Role::Player, Some(seat)) => seat,
            _ => return Err(ArenaError::NotSeated(id)),
        };

        let dispatches = self.engine.respond_to_action(seat, action.clone()).map_err(|err| {
            tracing::debug!(arena = %self.name, %seat, %action, %err, "action rejected");
            err
        })?;
        self.fan_out(dispatches);
        self.drive();
        self.reap();
        Ok(())
    }

    /// Auto-skips what is left of reaction window `window`. Ignored if that
    /// window already closed.
    pub fn expire_reactions(&mut self, window: u64) {
        if !self.state.is_running() || self.open_window != Some(window) {
            return;
        }
        tracing::warn!(arena = %self.name, window, "reaction deadline passed, skipping for idle players");
        self.open_window = None;
        let dispatches = self.engine.expire_reactions(window);
        self.fan_out(dispatches);
        self.drive();
        self.reap();
    }

    // -- Driving -------------------------------------------------------------

    /// Pulls events from the engine until it needs outside input.
    fn drive(&mut self) {
        loop {
            let (dispatches, progress) = self.engine.next_event();
            self.fan_out(dispatches);
            match progress {
                Progress::Continue => continue,
                Progress::AwaitInput => {
                    self.open_window = None;
                    break;
                }
                Progress::AwaitReactions(window) => {
                    if self.open_window != Some(window) {
                        self.open_window = Some(window);
                        self.armed = Some(window);
                    }
                    break;
                }
                Progress::Ended => {
                    self.end_round();
                    break;
                }
            }
        }
    }

    fn end_round(&mut self) {
        if let Some(result) = self.engine.result() {
            tracing::info!(arena = %self.name, outcome = ?result.outcome, deltas = ?result.deltas, "round ended");
        }
        self.state = ArenaState::Waiting;
        self.open_window = None;
        self.armed = None;
        self.fill_seats();
    }

    // -- Fan-out -------------------------------------------------------------

    fn broadcast(&mut self, msg: ArenaMessage) {
        for agent in &mut self.agents {
            agent.deliver(msg.clone());
        }
    }

    /// Delivers each dispatch to every agent that may see it, in the
    /// rendering meant for them. Spectators see what an unseated agent
    /// would.
    fn fan_out(&mut self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            for agent in &mut self.agents {
                let seat = match agent.role {
                    Role::Player => agent.seat,
                    Role::Spectator => None,
                };
                if let Some(board_event) = dispatch.view_for(seat) {
                    agent.deliver(ArenaMessage::ArenaBoardEvent { board_event });
                }
            }
        }
    }
}
