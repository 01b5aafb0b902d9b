//! The round state machine.
//!
//! ```text
//!                 toss              nobody claims
//!  CURRENT_TURN ───────▶ CURRENT_TURN_PLAYED ───────▶ POST_TURN_PLAYED
//!       ▲                      │ chii/pon/kan              │ draw
//!       │◀─────────────────────┘                           │
//!       └──────────────────────────────────────────────────┘
//!
//!  ron / tsumo / wall exhausted / abort  ───▶ GAME_ENDED
//! ```
//!
//! The engine is synchronous and owns no I/O. [`RoundEngine::next_event`]
//! advances one step at a time and returns the events to deliver;
//! [`RoundEngine::respond_to_action`] applies a player's action. Both hand
//! back [`Dispatch`]es for the caller to fan out.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::action::{ActionData, ActionType};
use crate::config::RoundConfig;
use crate::error::GameError;
use crate::event::{BoardEvent, Dispatch, GameResult, Outcome, Setup};
use crate::hand::{MeldKind, Player};
use crate::reaction::{PendingAction, ReactionWindow, Resolution};
use crate::tile::{TILE_COUNT, Tile, Wind, full_tile_set};
use crate::yaku::{self, WinResult, WinSituation};

const HAND_SIZE: usize = 13;
const DORA_SLOTS: usize = 5;
const KAN_SLOTS: usize = 4;
const DEAD_WALL: usize = DORA_SLOTS * 2 + KAN_SLOTS;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// The current seat holds a free tile and must act.
    CurrentTurn,
    /// A tile was discarded; other seats may react.
    CurrentTurnPlayed,
    /// Nobody claimed the discard; the next seat draws.
    PostTurnPlayed,
    GameEnded,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CurrentTurn => "CURRENT_TURN",
            Self::CurrentTurnPlayed => "CURRENT_TURN_PLAYED",
            Self::PostTurnPlayed => "POST_TURN_PLAYED",
            Self::GameEnded => "GAME_ENDED",
        };
        f.write_str(name)
    }
}

/// What the caller should do after a [`RoundEngine::next_event`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Call `next_event` again.
    Continue,
    /// Waiting for the current seat to act.
    AwaitInput,
    /// A reaction window with this id is open.
    AwaitReactions(u64),
    Ended,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RoundEngine {
    config: RoundConfig,
    rng: StdRng,
    players: [Player; 4],
    player_to_order: [usize; 4],
    order_to_player: [usize; 4],

    live_wall: Vec<Tile>,
    wall_cursor: usize,
    dora_indicators: Vec<Tile>,
    ura_indicators: Vec<Tile>,
    kan_draws: Vec<Tile>,
    dora_revealed: usize,
    kans_declared: usize,

    state: TurnState,
    current_order: usize,
    prompted: bool,
    last_discard: Option<(usize, Tile)>,
    window: Option<ReactionWindow>,
    next_window_id: u64,

    round_number: u32,
    riichi_deposits: i32,
    ippatsu: [bool; 4],
    double_riichi: [bool; 4],
    draws_taken: [u32; 4],
    no_calls: bool,
    rinshan: bool,

    result: Option<GameResult>,
    started: bool,
}

impl fmt::Debug for RoundEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundEngine")
            .field("state", &self.state)
            .field("round_number", &self.round_number)
            .field("current_order", &self.current_order)
            .field("live_remaining", &self.live_remaining())
            .finish_non_exhaustive()
    }
}

impl RoundEngine {
    /// An engine seeded from the OS. No round is dealt yet.
    pub fn new(config: RoundConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// A deterministic engine for tests and replays.
    pub fn with_seed(config: RoundConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: RoundConfig, rng: StdRng) -> Self {
        let players = std::array::from_fn(|seat| {
            Player::new(&[], config.starting_points, Wind::from_order(seat))
        });
        Self {
            config,
            rng,
            players,
            player_to_order: [0, 1, 2, 3],
            order_to_player: [0, 1, 2, 3],
            live_wall: Vec::new(),
            wall_cursor: 0,
            dora_indicators: Vec::new(),
            ura_indicators: Vec::new(),
            kan_draws: Vec::new(),
            dora_revealed: 0,
            kans_declared: 0,
            state: TurnState::GameEnded,
            current_order: 0,
            prompted: false,
            last_discard: None,
            window: None,
            next_window_id: 1,
            round_number: 0,
            riichi_deposits: 0,
            ippatsu: [false; 4],
            double_riichi: [false; 4],
            draws_taken: [0; 4],
            no_calls: true,
            rinshan: false,
            result: None,
            started: false,
        }
    }

    // -- Accessors -----------------------------------------------------------

    /// Rules this engine was built with.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Where the current turn stands.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Returns `true` once any round has been dealt.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns `true` once the round is over.
    pub fn should_end(&self) -> bool {
        self.started && self.state == TurnState::GameEnded
    }

    /// Seat whose turn it is.
    pub fn current_seat(&self) -> usize {
        self.order_to_player[self.current_order]
    }

    /// Seat of the dealer (turn position 0).
    pub fn dealer(&self) -> usize {
        self.order_to_player[0]
    }

    /// The player at `seat`, or `None` for a seat outside 0..4.
    pub fn player(&self, seat: usize) -> Option<&Player> {
        self.players.get(seat)
    }

    /// Turn position of each seat, indexed by seat. The dealer is at 0.
    pub fn player_to_order(&self) -> [usize; 4] {
        self.player_to_order
    }

    /// Current scores by seat.
    pub fn points(&self) -> [i32; 4] {
        std::array::from_fn(|seat| self.players[seat].points)
    }

    /// Zero-based index of the current round.
    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Prevailing wind, advancing every four rounds.
    pub fn round_wind(&self) -> Wind {
        Wind::from_order((self.round_number / 4) as usize)
    }

    /// Tiles left to draw from the live wall.
    ///
    /// Each kan shortens it by one on top of the replacement draw.
    pub fn live_remaining(&self) -> usize {
        self.live_wall.len().saturating_sub(self.wall_cursor)
    }

    /// Dora indicators revealed so far.
    pub fn dora_indicators(&self) -> &[Tile] {
        &self.dora_indicators[..self.dora_revealed.min(self.dora_indicators.len())]
    }

    /// Riichi sticks on the table, in points.
    pub fn riichi_deposits(&self) -> i32 {
        self.riichi_deposits
    }

    /// Unanswered offers of the open reaction window.
    pub fn pending_reactions(&self) -> &[PendingAction] {
        self.window.as_ref().map(|w| w.offers()).unwrap_or(&[])
    }

    /// How the last round ended. `None` while it is still running.
    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    // -- Round setup ---------------------------------------------------------

    /// Shuffles and deals a new round.
    ///
    /// The first round draws a random seating. Each later round passes the
    /// dealer to the next seat and carries points over.
    pub fn start_round(&mut self) -> Result<Vec<Dispatch>, GameError> {
        if self.started && self.state != TurnState::GameEnded {
            return Err(GameError::RoundInProgress);
        }
        let mut deck = full_tile_set(self.config.red_fives);
        deck.shuffle(&mut self.rng);

        let player_to_order = if self.started {
            self.player_to_order.map(|order| (order + 3) % 4)
        } else {
            let mut order = [0, 1, 2, 3];
            order.shuffle(&mut self.rng);
            order
        };
        self.deal(deck, player_to_order)
    }

    /// Deals a round from a caller-supplied deck and seating.
    pub fn start_round_with(
        &mut self,
        deck: Vec<Tile>,
        player_to_order: [usize; 4],
    ) -> Result<Vec<Dispatch>, GameError> {
        if self.started && self.state != TurnState::GameEnded {
            return Err(GameError::RoundInProgress);
        }
        if deck.len() != TILE_COUNT {
            return Err(GameError::Internal(format!(
                "deck holds {} tiles, expected {TILE_COUNT}",
                deck.len()
            )));
        }
        let mut seen = [false; 4];
        for &order in &player_to_order {
            if order >= 4 || seen[order] {
                return Err(GameError::Internal(format!(
                    "{player_to_order:?} is not a seating permutation"
                )));
            }
            seen[order] = true;
        }
        self.deal(deck, player_to_order)
    }

    fn deal(&mut self, deck: Vec<Tile>, player_to_order: [usize; 4]) -> Result<Vec<Dispatch>, GameError> {
        let carry_over = self.started;
        if carry_over {
            self.round_number += 1;
        } else {
            self.round_number = 0;
            self.riichi_deposits = 0;
        }
        let points = if carry_over {
            self.points()
        } else {
            [self.config.starting_points; 4]
        };

        self.player_to_order = player_to_order;
        for (seat, &order) in player_to_order.iter().enumerate() {
            self.order_to_player[order] = seat;
        }

        for seat in 0..4 {
            let hand = &deck[seat * HAND_SIZE..(seat + 1) * HAND_SIZE];
            self.players[seat] =
                Player::new(hand, points[seat], Wind::from_order(player_to_order[seat]));
        }
        let dead = &deck[4 * HAND_SIZE..4 * HAND_SIZE + DEAD_WALL];
        self.dora_indicators = dead[..DORA_SLOTS].to_vec();
        self.ura_indicators = dead[DORA_SLOTS..DORA_SLOTS * 2].to_vec();
        self.kan_draws = dead[DORA_SLOTS * 2..].to_vec();
        self.live_wall = deck[4 * HAND_SIZE + DEAD_WALL..].to_vec();
        self.wall_cursor = 0;
        self.dora_revealed = 1;
        self.kans_declared = 0;

        // The first advance moves the cursor to order 0, the dealer.
        self.state = TurnState::PostTurnPlayed;
        self.current_order = 3;
        self.prompted = false;
        self.last_discard = None;
        self.window = None;
        self.ippatsu = [false; 4];
        self.double_riichi = [false; 4];
        self.draws_taken = [0; 4];
        self.no_calls = true;
        self.rinshan = false;
        self.result = None;
        self.started = true;

        tracing::info!(
            round = self.round_number,
            dealer = self.dealer(),
            live = self.live_wall.len(),
            "round dealt"
        );

        let dora = self.dora_indicators[0].with_dora();
        let round_wind = self.round_wind();
        Ok((0..4)
            .map(|seat| {
                let setup = vec![
                    Setup::InitialTiles { tiles: self.players[seat].hand.closed().to_vec() },
                    Setup::Dora { indicator: dora },
                    Setup::PlayerNumber { seat },
                    Setup::PlayerOrder { order: player_to_order },
                    Setup::RoundNumber { round: self.round_number },
                    Setup::RoundWind { wind: round_wind },
                    Setup::StartingPoints { points },
                ];
                Dispatch::player(seat, BoardEvent::GameSetup { setup })
            })
            .collect())
    }

    // -- Stepping ------------------------------------------------------------

    /// Advances the round by one step.
    pub fn next_event(&mut self) -> (Vec<Dispatch>, Progress) {
        if !self.started {
            return (Vec::new(), Progress::Ended);
        }
        match self.state {
            TurnState::CurrentTurn if self.prompted => (Vec::new(), Progress::AwaitInput),
            TurnState::CurrentTurn => {
                self.prompted = true;
                (self.turn_prompts(), Progress::AwaitInput)
            }
            TurnState::CurrentTurnPlayed => self.open_reactions(),
            TurnState::PostTurnPlayed => self.advance(),
            TurnState::GameEnded => (Vec::new(), Progress::Ended),
        }
    }

    fn draw_live(&mut self) -> Result<Tile, GameError> {
        let tile = *self
            .live_wall
            .get(self.wall_cursor)
            .ok_or(GameError::WallExhausted)?;
        self.wall_cursor += 1;
        Ok(tile)
    }

    fn advance(&mut self) -> (Vec<Dispatch>, Progress) {
        let tile = match self.draw_live() {
            Ok(tile) => tile,
            Err(GameError::WallExhausted) => {
                return (vec![self.exhaustive_draw()], Progress::Ended);
            }
            Err(err) => return (vec![self.internal_abort(err)], Progress::Ended),
        };

        let order = (self.current_order + 1) % 4;
        let seat = self.order_to_player[order];
        if let Err(err) = self.players[seat].hand.draw(tile) {
            return (vec![self.internal_abort(err)], Progress::Ended);
        }
        self.current_order = order;
        self.draws_taken[seat] += 1;
        self.rinshan = false;
        self.prompted = false;
        self.state = TurnState::CurrentTurn;

        tracing::debug!(%seat, %tile, live = self.live_remaining(), "draw");
        let draw = BoardEvent::PlayerAction {
            action: ActionData::Draw { tile },
            from_player: seat,
        };
        (vec![Dispatch::partial(seat, draw)], Progress::Continue)
    }

    /// Options offered to the seat holding the free tile.
    fn turn_prompts(&self) -> Vec<Dispatch> {
        let seat = self.current_seat();
        let player = &self.players[seat];
        let hand = &player.hand;
        let mut options = Vec::new();

        match (hand.in_riichi(), hand.last_drawn()) {
            (true, Some(drawn)) => options.push(ActionData::Toss { tile: drawn }),
            _ => options.push(ActionData::Toss { tile: Tile::INVALID }),
        }
        if let Some(drawn) = hand.last_drawn() {
            if hand.test_tsumo(drawn, &self.situation(seat)).is_ok() {
                options.push(ActionData::Tsumo { tile: drawn });
            }
        }
        if self.kans_declared < KAN_SLOTS {
            for tile in hand.kan_candidates() {
                options.push(ActionData::Kan { tile });
            }
        }
        for tile in player.riichi_candidates(self.live_remaining(), &self.config) {
            options.push(ActionData::Riichi { tile });
        }

        options
            .into_iter()
            .map(|action| Dispatch::player(seat, BoardEvent::PotentialAction { action }))
            .collect()
    }

    /// Scoring context for `seat` winning right now.
    fn situation(&self, seat: usize) -> WinSituation {
        let revealed = self.dora_revealed.min(DORA_SLOTS);
        let exhausted = self.live_remaining() == 0;
        WinSituation {
            seat_wind: self.players[seat].seat_wind,
            round_wind: self.round_wind(),
            dora_indicators: self.dora_indicators[..revealed].to_vec(),
            ura_indicators: self.ura_indicators[..revealed].to_vec(),
            double_riichi: self.double_riichi[seat],
            ippatsu: self.ippatsu[seat],
            last_tile: exhausted,
            rinshan: self.rinshan && seat == self.current_seat(),
            first_draw: self.no_calls
                && self.draws_taken[seat] == 1
                && self.players[seat].hand.discards().is_empty(),
        }
    }

    /// Every claim other seats can make on the last discard.
    fn enumerate_reactions(&self) -> Vec<PendingAction> {
        let Some((from, tile)) = self.last_discard else {
            return Vec::new();
        };
        let next_seat = self.order_to_player[(self.player_to_order[from] + 1) % 4];
        // No calls on the very last discard, only ron.
        let calls_allowed = self.live_remaining() > 0;
        let mut pending = Vec::new();

        for seat in (0..4).filter(|&s| s != from) {
            let hand = &self.players[seat].hand;
            let mut offer = |action: ActionData| pending.push(PendingAction { seat, action });

            if calls_allowed {
                if seat == next_seat {
                    for (a, b) in [(-2, -1), (-1, 1), (1, 2)] {
                        let (Some(x), Some(y)) = (tile.offset(a), tile.offset(b)) else {
                            continue;
                        };
                        if hand.test_chii(tile, [x, y]).is_ok() {
                            offer(ActionData::Chii { tile, hand_tiles: [x, y] });
                        }
                    }
                }
                if hand.test_pon(tile).is_ok() {
                    offer(ActionData::Pon { tile });
                }
                if self.kans_declared < KAN_SLOTS && hand.test_daiminkan(tile).is_ok() {
                    offer(ActionData::Kan { tile });
                }
            }
            if hand.test_ron(tile, &self.situation(seat)).is_ok() {
                offer(ActionData::Ron { tile });
            }
        }
        pending
    }

    fn open_reactions(&mut self) -> (Vec<Dispatch>, Progress) {
        if let Some(window) = &self.window {
            return (Vec::new(), Progress::AwaitReactions(window.id()));
        }
        let Some((from, tile)) = self.last_discard else {
            self.state = TurnState::PostTurnPlayed;
            return (Vec::new(), Progress::Continue);
        };

        let pending = self.enumerate_reactions();
        if pending.is_empty() {
            self.state = TurnState::PostTurnPlayed;
            return (Vec::new(), Progress::Continue);
        }

        let from_order = self.player_to_order[from];
        let distance = self.player_to_order.map(|order| (order + 4 - from_order) % 4);
        let id = self.next_window_id;
        self.next_window_id += 1;

        let dispatches = pending
            .iter()
            .map(|p| {
                Dispatch::player(p.seat, BoardEvent::PotentialAction { action: p.action.clone() })
            })
            .collect();
        tracing::debug!(window = id, %tile, offers = pending.len(), "reaction window opened");
        self.window = Some(ReactionWindow::new(id, from, tile, distance, pending));
        (dispatches, Progress::AwaitReactions(id))
    }

    // -- Actions -------------------------------------------------------------

    /// Applies an action from `seat`.
    ///
    /// On error nothing changed and nobody but the actor needs to know.
    pub fn respond_to_action(
        &mut self,
        seat: usize,
        action: ActionData,
    ) -> Result<Vec<Dispatch>, GameError> {
        if seat >= 4 {
            return Err(GameError::UnknownSeat(seat));
        }
        if !self.started {
            return Err(GameError::RoundNotStarted);
        }
        if self.state == TurnState::GameEnded {
            return Err(GameError::GameEnded);
        }

        match action {
            ActionData::Draw { .. } => Err(GameError::ServerOnlyAction(ActionType::Draw)),
            ActionData::Toss { tile } => self.on_toss(seat, tile),
            ActionData::Riichi { tile } => self.on_riichi(seat, tile),
            ActionData::Tsumo { tile } => self.on_tsumo(seat, tile),
            ActionData::Kan { tile } if self.state == TurnState::CurrentTurn => {
                self.on_self_kan(seat, tile)
            }
            ActionData::Skip { action } => self.on_skip(seat, *action),
            claim @ (ActionData::Chii { .. }
            | ActionData::Pon { .. }
            | ActionData::Kan { .. }
            | ActionData::Ron { .. }) => self.on_claim(seat, claim),
        }
    }

    fn require_turn(&self, seat: usize) -> Result<(), GameError> {
        if self.state != TurnState::CurrentTurn {
            return Err(GameError::WrongState(self.state));
        }
        if seat != self.current_seat() {
            return Err(GameError::NotYourTurn(seat));
        }
        Ok(())
    }

    fn on_toss(&mut self, seat: usize, tile: Tile) -> Result<Vec<Dispatch>, GameError> {
        self.require_turn(seat)?;
        let tossed = self.players[seat].hand.toss(tile)?;
        Ok(self.after_discard(seat, ActionData::Toss { tile: tossed }, tossed))
    }

    fn on_riichi(&mut self, seat: usize, tile: Tile) -> Result<Vec<Dispatch>, GameError> {
        self.require_turn(seat)?;
        let live = self.live_remaining();
        let double = self.no_calls
            && self.draws_taken[seat] == 1
            && self.players[seat].hand.discards().is_empty();
        let tossed = self.players[seat].riichi(tile, live, &self.config)?;

        self.riichi_deposits += self.config.riichi_cost;
        self.double_riichi[seat] = double;
        let dispatches = self.after_discard(seat, ActionData::Riichi { tile: tossed }, tossed);
        self.ippatsu[seat] = true;
        tracing::info!(%seat, tile = %tossed, double, "riichi declared");
        Ok(dispatches)
    }

    fn after_discard(&mut self, seat: usize, action: ActionData, tile: Tile) -> Vec<Dispatch> {
        self.ippatsu[seat] = false;
        self.rinshan = false;
        self.last_discard = Some((seat, tile));
        self.state = TurnState::CurrentTurnPlayed;
        tracing::debug!(%seat, %action, "discard");
        vec![Dispatch::global(BoardEvent::PlayerAction { action, from_player: seat })]
    }

    fn on_tsumo(&mut self, seat: usize, tile: Tile) -> Result<Vec<Dispatch>, GameError> {
        self.require_turn(seat)?;
        let win = self.players[seat].hand.test_tsumo(tile, &self.situation(seat))?;
        let echo = Dispatch::global(BoardEvent::PlayerAction {
            action: ActionData::Tsumo { tile: win.winning_tile },
            from_player: seat,
        });
        Ok(vec![echo, self.finish_win(seat, None, win)])
    }

    fn on_self_kan(&mut self, seat: usize, tile: Tile) -> Result<Vec<Dispatch>, GameError> {
        self.require_turn(seat)?;
        if self.kans_declared >= KAN_SLOTS {
            return Err(GameError::KanLimit);
        }
        let hand = &mut self.players[seat].hand;
        let upgrades_pon = hand
            .melds()
            .iter()
            .any(|m| m.kind == MeldKind::Pon && m.key().same_kind(tile));
        if upgrades_pon {
            hand.shouminkan(tile)?;
        } else {
            hand.ankan(tile)?;
        }

        self.ippatsu = [false; 4];
        self.no_calls = false;
        let mut out = vec![Dispatch::global(BoardEvent::PlayerAction {
            action: ActionData::Kan { tile: tile.kind() },
            from_player: seat,
        })];
        out.extend(self.kan_replacement(seat));
        Ok(out)
    }

    /// Draws the replacement tile after a kan and flips the next indicator.
    fn kan_replacement(&mut self, seat: usize) -> Vec<Dispatch> {
        let Some(&tile) = self.kan_draws.get(self.kans_declared) else {
            return vec![self.internal_abort(GameError::KanLimit)];
        };
        self.kans_declared += 1;
        if let Err(err) = self.players[seat].hand.draw(tile) {
            return vec![self.internal_abort(err)];
        }
        // The dead wall stays at fourteen: its refill comes off the live tail.
        if self.live_remaining() > 0 {
            self.live_wall.pop();
        }
        self.current_order = self.player_to_order[seat];
        self.rinshan = true;
        self.prompted = false;
        self.state = TurnState::CurrentTurn;

        let mut out = Vec::new();
        if self.dora_revealed < DORA_SLOTS {
            let indicator = self.dora_indicators[self.dora_revealed].with_dora();
            self.dora_revealed += 1;
            out.push(Dispatch::global(BoardEvent::DoraRevealed { indicator }));
        }
        out.push(Dispatch::partial(
            seat,
            BoardEvent::PlayerAction {
                action: ActionData::Draw { tile },
                from_player: seat,
            },
        ));
        tracing::debug!(%seat, kans = self.kans_declared, "kan replacement drawn");
        out
    }

    fn on_claim(&mut self, seat: usize, action: ActionData) -> Result<Vec<Dispatch>, GameError> {
        let offered = match &self.window {
            Some(window) => window.is_offered(seat, &action),
            None => return Err(GameError::WrongState(self.state)),
        };
        if !offered {
            return Err(self.explain_refusal(seat, &action));
        }
        if let Some(window) = self.window.as_mut() {
            window.declare(seat, action.clone())?;
        }
        tracing::debug!(%seat, %action, "claim declared");
        Ok(self.resolve_window())
    }

    /// The most specific reason a claim was not on offer.
    fn explain_refusal(&self, seat: usize, action: &ActionData) -> GameError {
        let fallback = GameError::NoPendingAction(action.action_type(), seat);
        let Some((from, tile)) = self.last_discard else {
            return fallback;
        };
        if seat == from || !action.tile().is_some_and(|t| t.same_kind(tile)) {
            return fallback;
        }
        let hand = &self.players[seat].hand;
        let specific = match action {
            ActionData::Ron { .. } => hand.test_ron(tile, &self.situation(seat)).err(),
            ActionData::Pon { .. } => hand.test_pon(tile).err(),
            ActionData::Kan { .. } => hand.test_daiminkan(tile).err(),
            ActionData::Chii { hand_tiles, .. } => {
                let next_seat = self.order_to_player[(self.player_to_order[from] + 1) % 4];
                if seat != next_seat {
                    Some(GameError::NotYourTurn(seat))
                } else {
                    hand.test_chii(tile, *hand_tiles).err()
                }
            }
            _ => None,
        };
        specific.unwrap_or(fallback)
    }

    fn on_skip(&mut self, seat: usize, skipped: ActionData) -> Result<Vec<Dispatch>, GameError> {
        let state = self.state;
        let Some(window) = self.window.as_mut() else {
            return Err(GameError::WrongState(state));
        };
        window.skip(seat, &skipped)?;
        let mut out = vec![Dispatch::player(
            seat,
            BoardEvent::PlayerAction {
                action: ActionData::Skip { action: Box::new(skipped) },
                from_player: seat,
            },
        )];
        out.extend(self.resolve_window());
        Ok(out)
    }

    /// Auto-skips every unanswered offer of window `id`.
    ///
    /// A stale id (the window already closed) is ignored.
    pub fn expire_reactions(&mut self, id: u64) -> Vec<Dispatch> {
        let Some(window) = self.window.as_mut().filter(|w| w.id() == id) else {
            return Vec::new();
        };
        tracing::debug!(window = id, unanswered = window.offers().len(), "reaction window expired");
        window.expire();
        self.resolve_window()
    }

    fn resolve_window(&mut self) -> Vec<Dispatch> {
        let Some(window) = &self.window else {
            return Vec::new();
        };
        match window.resolution() {
            Resolution::Waiting => Vec::new(),
            Resolution::Pass => {
                self.window = None;
                self.state = TurnState::PostTurnPlayed;
                Vec::new()
            }
            Resolution::Claim(claim) => {
                self.window = None;
                self.execute_claim(claim)
            }
        }
    }

    fn execute_claim(&mut self, claim: PendingAction) -> Vec<Dispatch> {
        let Some((from, tile)) = self.last_discard else {
            return vec![self.internal_abort(GameError::Internal("claim without a discard".into()))];
        };
        let seat = claim.seat;
        // The client may name the tile without its red or dora flags.
        let action = claim.action.with_tile(tile);
        let echo = Dispatch::global(BoardEvent::PlayerAction {
            action: action.clone(),
            from_player: seat,
        });

        if let ActionData::Ron { .. } = action {
            return match self.players[seat].hand.test_ron(tile, &self.situation(seat)) {
                Ok(win) => vec![echo, self.finish_win(seat, Some(from), win)],
                Err(err) => vec![self.internal_abort(err)],
            };
        }

        let hand = &mut self.players[seat].hand;
        let applied = match &action {
            ActionData::Chii { hand_tiles, .. } => hand.chii(tile, *hand_tiles, from),
            ActionData::Pon { .. } => hand.pon(tile, from),
            ActionData::Kan { .. } => hand.daiminkan(tile, from),
            other => Err(GameError::Internal(format!("{other} is not a claim"))),
        };
        if let Err(err) = applied {
            return vec![self.internal_abort(err)];
        }

        tracing::info!(%seat, %action, %from, "claim executed");
        self.ippatsu = [false; 4];
        self.no_calls = false;
        self.last_discard = None;
        self.current_order = self.player_to_order[seat];

        let mut out = vec![echo];
        if matches!(action, ActionData::Kan { .. }) {
            out.extend(self.kan_replacement(seat));
        } else {
            self.rinshan = false;
            self.prompted = false;
            self.state = TurnState::CurrentTurn;
        }
        out
    }

    // -- Ending --------------------------------------------------------------

    fn finish(&mut self, outcome: Outcome, win: Option<WinResult>, deltas: [i32; 4]) -> Dispatch {
        for (player, delta) in self.players.iter_mut().zip(deltas) {
            player.points += delta;
        }
        let result = GameResult {
            outcome,
            win,
            deltas,
            points: self.points(),
        };
        tracing::info!(round = self.round_number, outcome = ?result.outcome, "round ended");
        self.state = TurnState::GameEnded;
        self.window = None;
        self.result = Some(result.clone());
        Dispatch::global(BoardEvent::GameEnd { result })
    }

    fn finish_win(&mut self, winner: usize, discarder: Option<usize>, win: WinResult) -> Dispatch {
        let mut deltas = yaku::payments(win.basic_points(), winner, self.dealer(), discarder);
        deltas[winner] += self.riichi_deposits;
        self.riichi_deposits = 0;
        let outcome = match discarder {
            Some(discarder) => Outcome::Ron { winner, discarder },
            None => Outcome::Tsumo { winner },
        };
        self.finish(outcome, Some(win), deltas)
    }

    fn exhaustive_draw(&mut self) -> Dispatch {
        let tenpai: Vec<usize> = (0..4).filter(|&s| self.players[s].hand.is_tenpai()).collect();
        let mut deltas = [0i32; 4];
        let ready = tenpai.len() as i32;
        if (1..4).contains(&ready) {
            let payment = self.config.exhaustive_draw_payment;
            for (seat, delta) in deltas.iter_mut().enumerate() {
                *delta = if tenpai.contains(&seat) {
                    payment / ready
                } else {
                    -payment / (4 - ready)
                };
            }
        }
        self.finish(Outcome::ExhaustiveDraw { tenpai }, None, deltas)
    }

    fn internal_abort(&mut self, err: GameError) -> Dispatch {
        tracing::error!(%err, state = %self.state, "round aborted on broken invariant");
        self.finish(Outcome::Aborted { reason: err.to_string() }, None, [0; 4])
    }

    /// Ends the round with no point transfer. Does nothing if it already ended.
    pub fn abort(&mut self, reason: &str) -> Vec<Dispatch> {
        if !self.started || self.state == TurnState::GameEnded {
            return Vec::new();
        }
        vec![self.finish(Outcome::Aborted { reason: reason.to_string() }, None, [0; 4])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Visibility;
    use crate::shape::tests::parse;
    use crate::yaku::Yaku;

    /// Builds a deck with fixed hands (empty string = filled from the rest)
    /// and a fixed start of the live wall.
    fn rigged(hands: [&str; 4], live: &str) -> Vec<Tile> {
        let mut pool = full_tile_set(false);
        let mut take = |tile: Tile| {
            let pos = pool
                .iter()
                .position(|t| *t == tile)
                .expect("tile used more than four times");
            pool.remove(pos)
        };

        let fixed: Vec<Vec<Tile>> = hands
            .iter()
            .map(|h| parse(h).into_iter().map(&mut take).collect())
            .collect();
        let live: Vec<Tile> = parse(live).into_iter().map(&mut take).collect();

        let mut deck = Vec::with_capacity(TILE_COUNT);
        for mut hand in fixed {
            while hand.len() < HAND_SIZE {
                hand.push(pool.remove(pool.len() - 1));
            }
            assert_eq!(hand.len(), HAND_SIZE);
            deck.extend(hand);
        }
        for _ in 0..DEAD_WALL {
            deck.push(pool.remove(pool.len() - 1));
        }
        deck.extend(live);
        deck.extend(pool);
        assert_eq!(deck.len(), TILE_COUNT);
        deck
    }

    fn engine(hands: [&str; 4], live: &str) -> RoundEngine {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 7);
        engine.start_round_with(rigged(hands, live), [0, 1, 2, 3]).unwrap();
        engine
    }

    /// Steps until the engine needs outside input.
    fn drive(engine: &mut RoundEngine) -> (Vec<Dispatch>, Progress) {
        let mut all = Vec::new();
        loop {
            let (dispatches, progress) = engine.next_event();
            all.extend(dispatches);
            if progress != Progress::Continue {
                return (all, progress);
            }
        }
    }

    fn potentials_for(dispatches: &[Dispatch], seat: usize) -> Vec<ActionData> {
        dispatches
            .iter()
            .filter(|d| d.visibility == Visibility::Player(seat))
            .filter_map(|d| match &d.event {
                BoardEvent::PotentialAction { action } => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tosses the current seat's drawn tile and steps to the next input.
    fn toss_drawn(engine: &mut RoundEngine) -> (Vec<Dispatch>, Progress) {
        let seat = engine.current_seat();
        let drawn = engine.player(seat).unwrap().hand.last_drawn().unwrap();
        engine.respond_to_action(seat, ActionData::Toss { tile: drawn }).unwrap();
        drive(engine)
    }

    fn assert_seating_consistent(engine: &RoundEngine) {
        for s in 0..4 {
            assert_eq!(engine.order_to_player[engine.player_to_order[s]], s);
            assert_eq!(engine.player_to_order[engine.order_to_player[s]], s);
            let wind = engine.player(s).unwrap().seat_wind;
            assert_eq!(wind, Wind::from_order(engine.player_to_order()[s]));
        }
        assert_eq!(engine.player_to_order()[engine.dealer()], 0);
    }

    // Seat 0 tosses 5p, seat 1 holds a pair of 5p and nothing else reacts.
    const PON_HANDS: [&str; 4] = [
        "5p123m456m789m123z",
        "55p19m19s1234567z",
        "2468m2468p2468s1z",
        "13579s13579m444z",
    ];

    // Seat 0 tosses 5p into seat 1's 4p-6p.
    const CHII_HANDS: [&str; 4] = [
        "5p123m456m789m123z",
        "46p19m19s1234567z",
        "2468m2468p2468s1z",
        "13579s13579m444z",
    ];

    // Seat 2 holds three 5p.
    const DAIMINKAN_HANDS: [&str; 4] = [
        "5p123m456m789m123z",
        "28p19m19s1234567z",
        "555p3p2468m2468s1z",
        "13579s13579m444z",
    ];

    // The dealer holds three concealed quads. Nothing else uses 4z..7z
    // except seat 3's 5z pair, so the dead wall reads
    // 7z7z7z7z6z | 6z6z6z5z5z | 4z4z4z3z.
    const KAN_HANDS: [&str; 4] = [
        "1111m2222m3333m4z",
        "123p456p789p123s1z",
        "456s789s456p789p2z",
        "55z567m789m123p3z9s",
    ];

    // Seat 1 waits on 9s with a closed East triplet. Seat 0 deals it.
    const RON_HANDS: [&str; 4] = [
        "123456789m255p9s",
        "111z234m567p678s9s",
        "2468m2468p2468s1z",
        "13579p13579s234z",
    ];

    #[test]
    fn test_start_round_sends_private_bundle() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 1);
        let dispatches = engine.start_round().unwrap();
        assert_eq!(dispatches.len(), 4);
        for (seat, d) in dispatches.iter().enumerate() {
            assert_eq!(d.visibility, Visibility::Player(seat));
            let BoardEvent::GameSetup { setup } = &d.event else {
                panic!("expected setup bundle");
            };
            assert_eq!(setup.len(), 7);
            let Setup::InitialTiles { tiles } = &setup[0] else {
                panic!("first entry is the hand");
            };
            assert_eq!(tiles.len(), 13);
            assert!(setup.contains(&Setup::PlayerNumber { seat }));
            assert!(setup.contains(&Setup::StartingPoints { points: [25_000; 4] }));
        }
        assert_eq!(engine.live_remaining(), 70);
        assert_eq!(engine.state(), TurnState::PostTurnPlayed);
    }

    #[test]
    fn test_start_round_twice_rejected() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 1);
        engine.start_round().unwrap();
        assert_eq!(engine.start_round(), Err(GameError::RoundInProgress));
    }

    #[test]
    fn test_start_round_with_rejects_bad_deck() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 1);
        let short = full_tile_set(false)[..100].to_vec();
        assert!(matches!(
            engine.start_round_with(short, [0, 1, 2, 3]),
            Err(GameError::Internal(_))
        ));
        assert!(matches!(
            engine.start_round_with(full_tile_set(false), [0, 0, 2, 3]),
            Err(GameError::Internal(_))
        ));
    }

    #[test]
    fn test_turn_order_follows_permutation() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 3);
        engine
            .start_round_with(rigged(["", "", "", ""], ""), [2, 0, 3, 1])
            .unwrap();

        // Order 0 is seat 1, then seats 3, 0, 2.
        let mut seats = Vec::new();
        let (mut dispatches, mut progress) = drive(&mut engine);
        for _ in 0..5 {
            if let Progress::AwaitReactions(id) = progress {
                engine.expire_reactions(id);
                (dispatches, progress) = drive(&mut engine);
            }
            assert_eq!(progress, Progress::AwaitInput);
            let seat = engine.current_seat();
            seats.push(seat);
            assert!(dispatches.iter().any(|d| d.visibility == Visibility::Partial(seat)));
            let drawn = engine.player(seat).unwrap().hand.last_drawn().unwrap();
            engine.respond_to_action(seat, ActionData::Toss { tile: drawn }).unwrap();
            (dispatches, progress) = drive(&mut engine);
        }
        assert_eq!(seats, vec![1, 3, 0, 2, 1]);
    }

    #[test]
    fn test_hand_sizes_alternate() {
        let mut engine = engine(["", "", "", ""], "");
        for _ in 0..8 {
            let (_, progress) = drive(&mut engine);
            if progress != Progress::AwaitInput {
                break;
            }
            let current = engine.current_seat();
            for seat in 0..4 {
                let size = engine.player(seat).unwrap().hand.size();
                assert_eq!(size, if seat == current { 14 } else { 13 });
            }
            let drawn = engine.player(current).unwrap().hand.last_drawn().unwrap();
            engine.respond_to_action(current, ActionData::Toss { tile: drawn }).unwrap();
            for seat in 0..4 {
                assert_eq!(engine.player(seat).unwrap().hand.size(), 13);
            }
            if let (_, Progress::AwaitReactions(id)) = drive(&mut engine) {
                engine.expire_reactions(id);
            }
        }
    }

    #[test]
    fn test_dealer_prompted_once_with_any_toss() {
        let mut engine = engine(PON_HANDS, "9p");
        let (dispatches, progress) = drive(&mut engine);
        assert_eq!(progress, Progress::AwaitInput);

        let draw = &dispatches[0];
        assert_eq!(draw.visibility, Visibility::Partial(0));
        assert_eq!(
            draw.event,
            BoardEvent::PlayerAction {
                action: ActionData::Draw { tile: Tile::pin(9) },
                from_player: 0,
            }
        );
        let offers = potentials_for(&dispatches, 0);
        assert_eq!(offers[0], ActionData::Toss { tile: Tile::INVALID });

        // Asking again does not repeat the prompts.
        assert_eq!(engine.next_event(), (Vec::new(), Progress::AwaitInput));
    }

    #[test]
    fn test_pon_moves_turn_to_claimant() {
        let mut engine = engine(PON_HANDS, "9p");
        drive(&mut engine);

        let echo = engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        assert_eq!(echo[0].visibility, Visibility::Global);
        assert_eq!(engine.state(), TurnState::CurrentTurnPlayed);

        let (dispatches, progress) = drive(&mut engine);
        assert!(matches!(progress, Progress::AwaitReactions(_)));
        assert_eq!(potentials_for(&dispatches, 1), vec![ActionData::Pon { tile: Tile::pin(5) }]);
        assert!(potentials_for(&dispatches, 2).is_empty());

        let live_before = engine.live_remaining();
        let out = engine
            .respond_to_action(1, ActionData::Pon { tile: Tile::pin(5) })
            .unwrap();
        assert_eq!(
            out[0],
            Dispatch::global(BoardEvent::PlayerAction {
                action: ActionData::Pon { tile: Tile::pin(5) },
                from_player: 1,
            })
        );
        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.current_seat(), 1);
        let hand = &engine.player(1).unwrap().hand;
        assert!(hand.has_free_tile());
        assert_eq!(hand.melds().len(), 1);

        // The claimant discards without drawing.
        let (dispatches, progress) = drive(&mut engine);
        assert_eq!(progress, Progress::AwaitInput);
        assert_eq!(potentials_for(&dispatches, 1)[0], ActionData::Toss { tile: Tile::INVALID });
        assert_eq!(engine.live_remaining(), live_before);
    }

    #[test]
    fn test_random_seating_is_a_permutation() {
        for seed in 0..64 {
            let mut engine = RoundEngine::with_seed(RoundConfig::default(), seed);
            engine.start_round().unwrap();
            assert_seating_consistent(&engine);

            let first_dealer = engine.dealer();
            engine.abort("next round");
            engine.start_round().unwrap();
            assert_seating_consistent(&engine);
            assert_eq!(
                engine.player_to_order()[first_dealer],
                3,
                "seed {seed}: old dealer moves to the back"
            );
        }
    }

    #[test]
    fn test_claim_echo_uses_discarded_tile() {
        let red = Tile::pin(5).with_red();
        let mut deck = rigged(PON_HANDS, "9p");
        let five = deck[..HAND_SIZE]
            .iter()
            .position(|t| *t == Tile::pin(5))
            .unwrap();
        deck[five] = red;
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 7);
        engine.start_round_with(deck, [0, 1, 2, 3]).unwrap();
        drive(&mut engine);
        engine.respond_to_action(0, ActionData::Toss { tile: red }).unwrap();
        drive(&mut engine);

        // Claimed by kind; the echo carries the red five actually discarded.
        let out = engine
            .respond_to_action(1, ActionData::Pon { tile: Tile::pin(5) })
            .unwrap();
        assert_eq!(
            out[0],
            Dispatch::global(BoardEvent::PlayerAction {
                action: ActionData::Pon { tile: red },
                from_player: 1,
            })
        );
        assert_eq!(engine.player(1).unwrap().hand.melds()[0].claimed, Some(red));
    }

    #[test]
    fn test_chii_by_next_seat_only() {
        let mut engine = engine(CHII_HANDS, "9p");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        let (dispatches, _) = drive(&mut engine);
        let chii = ActionData::Chii {
            tile: Tile::pin(5),
            hand_tiles: [Tile::pin(4), Tile::pin(6)],
        };
        assert_eq!(potentials_for(&dispatches, 1), vec![chii.clone()]);

        // Seat 2 holds 4p and 6p too but does not follow the discarder.
        assert_eq!(
            engine.respond_to_action(2, chii.clone()),
            Err(GameError::NotYourTurn(2))
        );

        let live_before = engine.live_remaining();
        let out = engine.respond_to_action(1, chii.clone()).unwrap();
        assert_eq!(
            out,
            vec![Dispatch::global(BoardEvent::PlayerAction {
                action: chii,
                from_player: 1,
            })]
        );
        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.current_seat(), 1);
        let hand = &engine.player(1).unwrap().hand;
        assert_eq!(hand.melds()[0].kind, MeldKind::Chii);
        assert_eq!(hand.melds()[0].from_seat, Some(0));
        assert_eq!(hand.last_drawn(), None);
        assert!(hand.has_free_tile());

        drive(&mut engine);
        engine
            .respond_to_action(1, ActionData::Toss { tile: Tile::EAST })
            .unwrap();
        assert_eq!(engine.state(), TurnState::CurrentTurnPlayed);
        assert_eq!(engine.player(1).unwrap().hand.size(), 13);
        assert_eq!(engine.live_remaining(), live_before);
    }

    #[test]
    fn test_ankan_reveals_dora_and_draws_replacement() {
        let mut engine = engine(KAN_HANDS, "9p");
        let (dispatches, _) = drive(&mut engine);
        let offers = potentials_for(&dispatches, 0);
        for rank in 1..=3 {
            assert!(offers.contains(&ActionData::Kan { tile: Tile::man(rank) }));
        }

        let live_before = engine.live_remaining();
        let out = engine
            .respond_to_action(0, ActionData::Kan { tile: Tile::man(1) })
            .unwrap();
        assert_eq!(
            out,
            vec![
                Dispatch::global(BoardEvent::PlayerAction {
                    action: ActionData::Kan { tile: Tile::man(1) },
                    from_player: 0,
                }),
                Dispatch::global(BoardEvent::DoraRevealed { indicator: Tile::RED.with_dora() }),
                Dispatch::partial(
                    0,
                    BoardEvent::PlayerAction {
                        action: ActionData::Draw { tile: Tile::NORTH },
                        from_player: 0,
                    }
                ),
            ]
        );
        assert_eq!(engine.dora_indicators().len(), 2);
        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.current_seat(), 0);
        let hand = &engine.player(0).unwrap().hand;
        assert_eq!(hand.melds()[0].kind, MeldKind::Ankan);
        assert!(!hand.is_open());
        assert_eq!(hand.size(), 14);
        assert_eq!(hand.last_drawn(), Some(Tile::NORTH));
        // The replacement comes from the dead wall, which takes the live tail.
        assert_eq!(engine.live_remaining(), live_before - 1);
    }

    #[test]
    fn test_fifth_kan_refused() {
        let mut engine = engine(KAN_HANDS, "9p");
        drive(&mut engine);
        let mut kans_offered = Vec::new();
        for tile in [Tile::man(1), Tile::man(2), Tile::man(3), Tile::NORTH] {
            engine.respond_to_action(0, ActionData::Kan { tile }).unwrap();
            let (dispatches, progress) = drive(&mut engine);
            assert_eq!(progress, Progress::AwaitInput);
            let offered = potentials_for(&dispatches, 0)
                .into_iter()
                .filter(|a| matches!(a, ActionData::Kan { .. }))
                .count();
            kans_offered.push(offered);
        }
        // Replacements bring in three more 4z; after the fourth kan no
        // further kan is offered.
        assert_eq!(kans_offered, vec![2, 1, 1, 0]);
        assert_eq!(engine.player(0).unwrap().hand.melds().len(), 4);
        assert_eq!(engine.dora_indicators().len(), 5);
        assert_eq!(engine.live_remaining(), 69 - 4);

        assert_eq!(
            engine.respond_to_action(0, ActionData::Kan { tile: Tile::man(1) }),
            Err(GameError::KanLimit)
        );
        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.player(0).unwrap().hand.size(), 14);
    }

    #[test]
    fn test_shouminkan_upgrades_claimed_pon() {
        let mut engine = engine(PON_HANDS, "9p6z6z6z5p");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        drive(&mut engine);
        engine
            .respond_to_action(1, ActionData::Pon { tile: Tile::pin(5) })
            .unwrap();
        drive(&mut engine);
        engine
            .respond_to_action(1, ActionData::Toss { tile: Tile::RED })
            .unwrap();
        drive(&mut engine);
        // Seats 2, 3 and 0 draw and toss 6z.
        for _ in 0..3 {
            toss_drawn(&mut engine);
        }
        assert_eq!(engine.current_seat(), 1);
        assert_eq!(engine.player(1).unwrap().hand.last_drawn(), Some(Tile::pin(5)));

        let live_before = engine.live_remaining();
        let out = engine
            .respond_to_action(1, ActionData::Kan { tile: Tile::pin(5) })
            .unwrap();
        assert_eq!(
            out[0],
            Dispatch::global(BoardEvent::PlayerAction {
                action: ActionData::Kan { tile: Tile::pin(5) },
                from_player: 1,
            })
        );
        assert!(matches!(out[1].event, BoardEvent::DoraRevealed { .. }));
        assert_eq!(out[2].visibility, Visibility::Partial(1));

        let hand = &engine.player(1).unwrap().hand;
        assert_eq!(hand.melds().len(), 1);
        assert_eq!(hand.melds()[0].kind, MeldKind::Shouminkan);
        assert_eq!(hand.melds()[0].tiles.len(), 4);
        assert_eq!(hand.size(), 14);
        assert_eq!(engine.live_remaining(), live_before - 1);
    }

    #[test]
    fn test_daiminkan_on_discard() {
        let mut engine = engine(DAIMINKAN_HANDS, "9p");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        let (dispatches, _) = drive(&mut engine);
        assert_eq!(
            potentials_for(&dispatches, 2),
            vec![
                ActionData::Pon { tile: Tile::pin(5) },
                ActionData::Kan { tile: Tile::pin(5) },
            ]
        );

        let live_before = engine.live_remaining();
        let out = engine
            .respond_to_action(2, ActionData::Kan { tile: Tile::pin(5) })
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[0],
            Dispatch::global(BoardEvent::PlayerAction {
                action: ActionData::Kan { tile: Tile::pin(5) },
                from_player: 2,
            })
        );
        assert!(matches!(out[1].event, BoardEvent::DoraRevealed { .. }));
        assert_eq!(out[2].visibility, Visibility::Partial(2));

        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.current_seat(), 2);
        let hand = &engine.player(2).unwrap().hand;
        assert_eq!(hand.melds()[0].kind, MeldKind::Daiminkan);
        assert_eq!(hand.melds()[0].from_seat, Some(0));
        assert_eq!(hand.size(), 14);
        assert_eq!(engine.live_remaining(), live_before - 1);

        // The kan player discards next, after the replacement.
        let (dispatches, progress) = drive(&mut engine);
        assert_eq!(progress, Progress::AwaitInput);
        assert_eq!(potentials_for(&dispatches, 2)[0], ActionData::Toss { tile: Tile::INVALID });
    }

    #[test]
    fn test_ron_on_discard_ends_round() {
        let mut engine = engine(RON_HANDS, "3p");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::sou(9) })
            .unwrap();
        let (dispatches, progress) = drive(&mut engine);
        assert!(matches!(progress, Progress::AwaitReactions(_)));
        assert!(potentials_for(&dispatches, 1).contains(&ActionData::Ron { tile: Tile::sou(9) }));

        let out = engine
            .respond_to_action(1, ActionData::Ron { tile: Tile::sou(9) })
            .unwrap();
        assert_eq!(
            out[0],
            Dispatch::global(BoardEvent::PlayerAction {
                action: ActionData::Ron { tile: Tile::sou(9) },
                from_player: 1,
            })
        );
        assert_eq!(engine.state(), TurnState::GameEnded);
        let BoardEvent::GameEnd { result } = &out[1].event else {
            panic!("expected game end");
        };
        assert_eq!(result.outcome, Outcome::Ron { winner: 1, discarder: 0 });
        assert_eq!(result.deltas, [-1_300, 1_300, 0, 0]);
        let win = result.win.as_ref().unwrap();
        assert_eq!(win.yaku, vec![Yaku::YakuhaiRoundWind]);
        assert_eq!((win.han, win.fu), (1, 40));
        assert_eq!(engine.points(), [23_700, 26_300, 25_000, 25_000]);
        assert_eq!(engine.next_event(), (Vec::new(), Progress::Ended));
    }

    #[test]
    fn test_ron_collects_riichi_deposits() {
        // The dealer declares riichi on 7z and later tosses the drawn 9s.
        let hands = [
            "123456789m255p7z",
            "111z234m567p678s9s",
            "2468m2468p2468s1z",
            "13579p13579s234z",
        ];
        let mut engine = engine(hands, "3p7z7z6z9s");
        let (dispatches, _) = drive(&mut engine);
        assert!(potentials_for(&dispatches, 0).contains(&ActionData::Riichi { tile: Tile::RED }));
        engine
            .respond_to_action(0, ActionData::Riichi { tile: Tile::RED })
            .unwrap();
        assert_eq!(engine.riichi_deposits(), 1_000);
        drive(&mut engine);

        // Seats 1, 2 and 3 draw and toss; the dealer then draws 9s.
        for _ in 0..3 {
            toss_drawn(&mut engine);
        }
        assert_eq!(engine.current_seat(), 0);
        let (dispatches, _) = toss_drawn(&mut engine);
        assert!(potentials_for(&dispatches, 1).contains(&ActionData::Ron { tile: Tile::sou(9) }));

        let out = engine
            .respond_to_action(1, ActionData::Ron { tile: Tile::sou(9) })
            .unwrap();
        let BoardEvent::GameEnd { result } = &out[1].event else {
            panic!("expected game end");
        };
        assert_eq!(result.outcome, Outcome::Ron { winner: 1, discarder: 0 });
        assert_eq!(result.deltas, [-1_300, 2_300, 0, 0]);
        assert_eq!(engine.riichi_deposits(), 0);
        assert_eq!(engine.points(), [22_700, 27_300, 25_000, 25_000]);
    }

    #[test]
    fn test_skip_passes_turn_to_next_draw() {
        let mut engine = engine(PON_HANDS, "9p1s");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        drive(&mut engine);

        let skip = ActionData::Skip {
            action: Box::new(ActionData::Pon { tile: Tile::pin(5) }),
        };
        let out = engine.respond_to_action(1, skip.clone()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].visibility, Visibility::Player(1));
        assert_eq!(engine.state(), TurnState::PostTurnPlayed);

        let (dispatches, _) = drive(&mut engine);
        assert_eq!(engine.current_seat(), 1);
        assert_eq!(dispatches[0].visibility, Visibility::Partial(1));

        // The window is gone; skipping again is refused.
        assert!(matches!(
            engine.respond_to_action(1, skip),
            Err(GameError::WrongState(TurnState::CurrentTurn))
        ));
    }

    #[test]
    fn test_ron_without_yaku_rejected_and_state_kept() {
        let hands = [
            "9m2468p2468s1234z",
            "99m1357p1357s567z",
            "123m789p123s555s9m",
            "45678m456p6789s7z",
        ];
        let mut engine = engine(hands, "1z");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::man(9) })
            .unwrap();
        let (_, progress) = drive(&mut engine);
        assert!(matches!(progress, Progress::AwaitReactions(_)));
        let pending_before = engine.pending_reactions().to_vec();

        let err = engine
            .respond_to_action(2, ActionData::Ron { tile: Tile::man(9) })
            .unwrap_err();
        assert_eq!(err, GameError::NoYaku);
        assert_eq!(err.class(), crate::error::ErrorClass::RuleViolation);
        assert_eq!(engine.state(), TurnState::CurrentTurnPlayed);
        assert_eq!(engine.pending_reactions(), pending_before.as_slice());
    }

    #[test]
    fn test_wrong_seat_and_server_only_actions() {
        let mut engine = engine(PON_HANDS, "9p");
        drive(&mut engine);
        assert_eq!(
            engine.respond_to_action(2, ActionData::Toss { tile: Tile::man(2) }),
            Err(GameError::NotYourTurn(2))
        );
        assert_eq!(
            engine.respond_to_action(0, ActionData::Draw { tile: Tile::man(2) }),
            Err(GameError::ServerOnlyAction(ActionType::Draw))
        );
        assert_eq!(
            engine.respond_to_action(7, ActionData::Toss { tile: Tile::man(2) }),
            Err(GameError::UnknownSeat(7))
        );
        assert_eq!(
            engine.respond_to_action(0, ActionData::Toss { tile: Tile::sou(9) }),
            Err(GameError::TileNotHeld(Tile::sou(9)))
        );
        // Rejections leave the turn where it was.
        assert_eq!(engine.state(), TurnState::CurrentTurn);
        assert_eq!(engine.player(0).unwrap().hand.size(), 14);
    }

    #[test]
    fn test_tenhou_on_first_draw() {
        let mut engine = engine(["23m456p789s11122z", "", "", ""], "4m");
        let (dispatches, _) = drive(&mut engine);
        assert!(potentials_for(&dispatches, 0).contains(&ActionData::Tsumo { tile: Tile::man(4) }));

        let out = engine
            .respond_to_action(0, ActionData::Tsumo { tile: Tile::man(4) })
            .unwrap();
        assert!(engine.should_end());
        let BoardEvent::GameEnd { result } = &out.last().unwrap().event else {
            panic!("expected game end");
        };
        assert_eq!(result.outcome, Outcome::Tsumo { winner: 0 });
        let win = result.win.as_ref().unwrap();
        assert_eq!(win.yaku, vec![Yaku::Tenhou]);
        assert_eq!(result.deltas, [48_000, -16_000, -16_000, -16_000]);
        assert_eq!(result.points[0], 73_000);
        assert_eq!(engine.next_event(), (Vec::new(), Progress::Ended));
    }

    #[test]
    fn test_riichi_pays_deposit() {
        let mut engine = engine(["23m456p789s11155z", "", "", ""], "7z");
        let (dispatches, _) = drive(&mut engine);
        assert!(potentials_for(&dispatches, 0).contains(&ActionData::Riichi { tile: Tile::RED }));

        let out = engine
            .respond_to_action(0, ActionData::Riichi { tile: Tile::RED })
            .unwrap();
        assert_eq!(out[0].visibility, Visibility::Global);
        assert!(engine.player(0).unwrap().hand.in_riichi());
        assert_eq!(engine.points()[0], 24_000);
        assert_eq!(engine.riichi_deposits(), 1_000);
        assert_eq!(engine.state(), TurnState::CurrentTurnPlayed);
    }

    #[test]
    fn test_wall_exhaustion_ends_round() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 42);
        engine.start_round().unwrap();
        let mut draws = 0;
        loop {
            match drive(&mut engine) {
                (_, Progress::AwaitInput) => {
                    let seat = engine.current_seat();
                    let drawn = engine.player(seat).unwrap().hand.last_drawn().unwrap();
                    engine.respond_to_action(seat, ActionData::Toss { tile: drawn }).unwrap();
                    draws += 1;
                }
                (_, Progress::AwaitReactions(id)) => {
                    engine.expire_reactions(id);
                }
                (dispatches, Progress::Ended) => {
                    assert!(matches!(
                        dispatches.last().map(|d| &d.event),
                        Some(BoardEvent::GameEnd { .. })
                    ));
                    break;
                }
                (_, Progress::Continue) => unreachable!(),
            }
        }
        assert_eq!(draws, 70);
        assert!(engine.should_end());
        let result = engine.result().unwrap();
        assert!(matches!(result.outcome, Outcome::ExhaustiveDraw { .. }));
        assert_eq!(result.deltas.iter().sum::<i32>(), 0);
        assert_eq!(
            engine.respond_to_action(0, ActionData::Toss { tile: Tile::man(1) }),
            Err(GameError::GameEnded)
        );
    }

    #[test]
    fn test_stale_window_expiry_ignored() {
        let mut engine = engine(PON_HANDS, "9p");
        drive(&mut engine);
        engine
            .respond_to_action(0, ActionData::Toss { tile: Tile::pin(5) })
            .unwrap();
        let (_, progress) = drive(&mut engine);
        let Progress::AwaitReactions(id) = progress else {
            panic!("expected a window");
        };
        assert!(engine.expire_reactions(id + 1).is_empty());
        assert_eq!(engine.state(), TurnState::CurrentTurnPlayed);
        engine.expire_reactions(id);
        assert_eq!(engine.state(), TurnState::PostTurnPlayed);
    }

    #[test]
    fn test_abort_then_next_round_rotates_dealer() {
        let mut engine = engine(PON_HANDS, "9p");
        drive(&mut engine);
        let out = engine.abort("player left");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].visibility, Visibility::Global);
        assert!(engine.should_end());
        assert!(engine.abort("again").is_empty());

        engine.start_round().unwrap();
        assert_eq!(engine.round_number(), 1);
        assert_eq!(engine.dealer(), 1);
        assert_eq!(engine.points(), [25_000; 4]);
    }

    #[test]
    fn test_unstarted_engine() {
        let mut engine = RoundEngine::with_seed(RoundConfig::default(), 1);
        assert!(!engine.should_end());
        assert_eq!(engine.next_event(), (Vec::new(), Progress::Ended));
        assert_eq!(
            engine.respond_to_action(0, ActionData::Toss { tile: Tile::man(1) }),
            Err(GameError::RoundNotStarted)
        );
    }
}
