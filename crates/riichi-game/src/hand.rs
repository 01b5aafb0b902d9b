//! Hands, melds and players.
//!
//! Every mutation comes as a pair: `test_*` checks legality without
//! touching the hand, and the matching commit method re-runs the check
//! and then applies it. A failed commit leaves the hand exactly as it was.

use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::error::GameError;
use crate::shape;
use crate::tile::{Tile, Wind};
use crate::yaku::{self, WinContext, WinResult, WinSituation};

// ---------------------------------------------------------------------------
// Melds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeldKind {
    Chii,
    Pon,
    /// Concealed kan from four held tiles.
    Ankan,
    /// Open kan on another player's discard.
    Daiminkan,
    /// Pon upgraded with the fourth tile.
    Shouminkan,
}

impl MeldKind {
    /// Returns `true` for the three kinds of kan.
    pub fn is_kan(self) -> bool {
        matches!(self, Self::Ankan | Self::Daiminkan | Self::Shouminkan)
    }

    /// Only an ankan keeps the hand closed.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Ankan)
    }
}

/// A set of tiles laid face up (or, for an ankan, declared).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub kind: MeldKind,
    pub tiles: Vec<Tile>,
    /// The tile taken from another player, if any.
    pub claimed: Option<Tile>,
    /// Seat the claimed tile came from.
    pub from_seat: Option<usize>,
}

impl Meld {
    /// The lowest tile kind in the meld.
    pub fn key(&self) -> Tile {
        self.tiles
            .iter()
            .map(|t| t.kind())
            .min()
            .unwrap_or(Tile::INVALID)
    }
}

// ---------------------------------------------------------------------------
// Hand
// ---------------------------------------------------------------------------

/// One player's tiles.
///
/// Between turns the hand is 13 tiles counting each meld as three. On the
/// player's turn it holds a 14th, the free tile, until something is tossed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    closed: Vec<Tile>,
    melds: Vec<Meld>,
    discards: Vec<Tile>,
    riichi: bool,
    last_drawn: Option<Tile>,
}

impl Hand {
    /// A closed hand with nothing discarded yet.
    pub fn new(tiles: &[Tile]) -> Self {
        Self {
            closed: tiles.to_vec(),
            ..Self::default()
        }
    }

    /// Tiles still held, free tile included.
    pub fn closed(&self) -> &[Tile] {
        &self.closed
    }

    /// Melds in the order they were made.
    pub fn melds(&self) -> &[Meld] {
        &self.melds
    }

    /// This player's pond. Claimed tiles stay listed.
    pub fn discards(&self) -> &[Tile] {
        &self.discards
    }

    /// Returns `true` after a riichi declaration.
    pub fn in_riichi(&self) -> bool {
        self.riichi
    }

    /// Returns `true` once any meld other than an ankan has been made.
    pub fn is_open(&self) -> bool {
        self.melds.iter().any(|m| m.kind.is_open())
    }

    /// The tile drawn this turn, cleared once it is tossed or a call is made.
    pub fn last_drawn(&self) -> Option<Tile> {
        self.last_drawn
    }

    /// Hand size with each meld counted as three tiles.
    pub fn size(&self) -> usize {
        self.closed.len() + 3 * self.melds.len()
    }

    /// Returns `true` while the hand holds 14 and must toss.
    pub fn has_free_tile(&self) -> bool {
        self.size() == 14
    }

    /// Closed copies of `tile`'s kind.
    pub fn count_of(&self, tile: Tile) -> usize {
        self.closed.iter().filter(|t| t.same_kind(tile)).count()
    }

    /// Prefers the exact byte so a red five is tossed only when asked for.
    fn position_of(&self, tile: Tile) -> Option<usize> {
        self.closed
            .iter()
            .position(|&t| t == tile)
            .or_else(|| self.closed.iter().position(|t| t.same_kind(tile)))
    }

    /// Removes `n` copies of the kind, plain copies first.
    fn take(&mut self, tile: Tile, n: usize) -> Vec<Tile> {
        let mut taken = Vec::with_capacity(n);
        for _ in 0..n {
            let pos = self
                .closed
                .iter()
                .position(|t| t.same_kind(tile) && !t.is_red())
                .or_else(|| self.closed.iter().position(|t| t.same_kind(tile)));
            if let Some(pos) = pos {
                taken.push(self.closed.remove(pos));
            }
        }
        taken
    }

    fn require_real(tile: Tile) -> Result<(), GameError> {
        if tile.is_real() {
            Ok(())
        } else {
            Err(GameError::InvalidTile(tile))
        }
    }

    // -- Draw and toss -----------------------------------------------------

    /// Adds the free tile. Fails if the hand already holds 14.
    pub fn draw(&mut self, tile: Tile) -> Result<(), GameError> {
        Self::require_real(tile)?;
        if self.has_free_tile() {
            return Err(GameError::HasFreeTile);
        }
        self.closed.push(tile);
        self.last_drawn = Some(tile);
        Ok(())
    }

    /// Checks a discard and returns the index the tile would come from.
    pub fn test_toss(&self, tile: Tile) -> Result<usize, GameError> {
        Self::require_real(tile)?;
        if !self.has_free_tile() {
            return Err(GameError::NoFreeTile);
        }
        if self.riichi && self.last_drawn != Some(tile) {
            return Err(GameError::InRiichi);
        }
        self.position_of(tile).ok_or(GameError::TileNotHeld(tile))
    }

    /// Discards `tile` and returns the exact tile that left the hand.
    pub fn toss(&mut self, tile: Tile) -> Result<Tile, GameError> {
        let pos = self.test_toss(tile)?;
        let tossed = self.closed.remove(pos);
        self.discards.push(tossed);
        self.last_drawn = None;
        Ok(tossed)
    }

    // -- Calls on a discard ------------------------------------------------

    /// Checks that `tile` and the two held tiles form a run.
    pub fn test_chii(&self, tile: Tile, hand_tiles: [Tile; 2]) -> Result<(), GameError> {
        Self::require_real(tile)?;
        if self.has_free_tile() {
            return Err(GameError::HasFreeTile);
        }
        if self.riichi {
            return Err(GameError::InRiichi);
        }
        let mut run = [tile.kind(), hand_tiles[0].kind(), hand_tiles[1].kind()];
        run.sort();
        let is_run = !run[0].is_honor()
            && run[0].offset(1) == Some(run[1])
            && run[0].offset(2) == Some(run[2]);
        if !is_run {
            return Err(GameError::NotASequence);
        }
        for (i, &held) in hand_tiles.iter().enumerate() {
            // Both hand tiles must be distinct physical tiles.
            let needed = if i == 1 && hand_tiles[0].same_kind(held) { 2 } else { 1 };
            if self.count_of(held) < needed {
                return Err(GameError::TileNotHeld(held));
            }
        }
        Ok(())
    }

    /// Calls chii on `tile` from `from_seat`.
    pub fn chii(
        &mut self,
        tile: Tile,
        hand_tiles: [Tile; 2],
        from_seat: usize,
    ) -> Result<(), GameError> {
        self.test_chii(tile, hand_tiles)?;
        let mut tiles = vec![tile];
        for held in hand_tiles {
            if let Some(pos) = self.position_of(held) {
                tiles.push(self.closed.remove(pos));
            }
        }
        tiles.sort_by_key(|t| t.kind());
        self.melds.push(Meld {
            kind: MeldKind::Chii,
            tiles,
            claimed: Some(tile),
            from_seat: Some(from_seat),
        });
        self.last_drawn = None;
        Ok(())
    }

    fn test_claim(&self, tile: Tile, copies: usize) -> Result<(), GameError> {
        Self::require_real(tile)?;
        if self.has_free_tile() {
            return Err(GameError::HasFreeTile);
        }
        if self.riichi {
            return Err(GameError::InRiichi);
        }
        if self.count_of(tile) < copies {
            return Err(GameError::NotEnoughCopies(tile));
        }
        Ok(())
    }

    fn claim(&mut self, kind: MeldKind, tile: Tile, copies: usize, from_seat: usize) {
        let mut tiles = self.take(tile, copies);
        tiles.push(tile);
        self.melds.push(Meld {
            kind,
            tiles,
            claimed: Some(tile),
            from_seat: Some(from_seat),
        });
        self.last_drawn = None;
    }

    /// A pon needs two closed copies.
    pub fn test_pon(&self, tile: Tile) -> Result<(), GameError> {
        self.test_claim(tile, 2)
    }

    /// Calls pon on `tile` from `from_seat`.
    pub fn pon(&mut self, tile: Tile, from_seat: usize) -> Result<(), GameError> {
        self.test_pon(tile)?;
        self.claim(MeldKind::Pon, tile, 2, from_seat);
        Ok(())
    }

    /// An open kan on a discard needs three closed copies.
    pub fn test_daiminkan(&self, tile: Tile) -> Result<(), GameError> {
        self.test_claim(tile, 3)
    }

    /// Calls an open kan on `tile` from `from_seat`. The replacement draw is the caller's job.
    pub fn daiminkan(&mut self, tile: Tile, from_seat: usize) -> Result<(), GameError> {
        self.test_daiminkan(tile)?;
        self.claim(MeldKind::Daiminkan, tile, 3, from_seat);
        Ok(())
    }

    // -- Kans on the player's own turn ---------------------------------------

    /// A concealed kan needs all four copies in hand on the player's own turn.
    pub fn test_ankan(&self, tile: Tile) -> Result<(), GameError> {
        Self::require_real(tile)?;
        if !self.has_free_tile() {
            return Err(GameError::NoFreeTile);
        }
        if self.riichi {
            return Err(GameError::InRiichi);
        }
        if self.count_of(tile) < 4 {
            return Err(GameError::NotEnoughCopies(tile));
        }
        Ok(())
    }

    /// Declares a concealed kan.
    pub fn ankan(&mut self, tile: Tile) -> Result<(), GameError> {
        self.test_ankan(tile)?;
        let tiles = self.take(tile, 4);
        self.melds.push(Meld {
            kind: MeldKind::Ankan,
            tiles,
            claimed: None,
            from_seat: None,
        });
        self.last_drawn = None;
        Ok(())
    }

    /// An added kan needs a pon of the kind and the fourth copy in hand.
    pub fn test_shouminkan(&self, tile: Tile) -> Result<(), GameError> {
        Self::require_real(tile)?;
        if !self.has_free_tile() {
            return Err(GameError::NoFreeTile);
        }
        if self.riichi {
            return Err(GameError::InRiichi);
        }
        let has_pon = self
            .melds
            .iter()
            .any(|m| m.kind == MeldKind::Pon && m.key().same_kind(tile));
        if !has_pon {
            return Err(GameError::NoSuchPon(tile));
        }
        if self.count_of(tile) < 1 {
            return Err(GameError::TileNotHeld(tile));
        }
        Ok(())
    }

    /// Upgrades the matching pon to a kan.
    pub fn shouminkan(&mut self, tile: Tile) -> Result<(), GameError> {
        self.test_shouminkan(tile)?;
        let added = self.take(tile, 1);
        if let Some(meld) = self
            .melds
            .iter_mut()
            .find(|m| m.kind == MeldKind::Pon && m.key().same_kind(tile))
        {
            meld.kind = MeldKind::Shouminkan;
            meld.tiles.extend(added);
        }
        self.last_drawn = None;
        Ok(())
    }

    /// Kinds the player could declare a kan on right now.
    pub fn kan_candidates(&self) -> Vec<Tile> {
        let mut out: Vec<Tile> = Vec::new();
        for tile in &self.closed {
            let kind = tile.kind();
            if out.contains(&kind) {
                continue;
            }
            if self.test_ankan(kind).is_ok() || self.test_shouminkan(kind).is_ok() {
                out.push(kind);
            }
        }
        out
    }

    // -- Waits and wins ------------------------------------------------------

    /// Tile kinds that would complete the hand. Empty while holding a free tile.
    pub fn waits(&self) -> Vec<Tile> {
        if self.has_free_tile() {
            return Vec::new();
        }
        shape::waits(&shape::counts(&self.closed), self.melds.len())
    }

    /// Returns `true` if one tile would complete the hand.
    pub fn is_tenpai(&self) -> bool {
        !self.waits().is_empty()
    }

    /// Returns `true` if the player has discarded one of their own waits.
    pub fn is_furiten(&self) -> bool {
        let waits = self.waits();
        self.discards
            .iter()
            .any(|d| waits.iter().any(|w| w.same_kind(*d)))
    }

    /// Discards that would leave the hand tenpai.
    pub fn tenpai_discards(&self) -> Vec<Tile> {
        if !self.has_free_tile() {
            return Vec::new();
        }
        let mut out: Vec<Tile> = Vec::new();
        for (i, tile) in self.closed.iter().enumerate() {
            if out.iter().any(|t| *t == *tile) {
                continue;
            }
            let mut rest = self.closed.clone();
            rest.remove(i);
            if !shape::waits(&shape::counts(&rest), self.melds.len()).is_empty() {
                out.push(*tile);
            }
        }
        out
    }

    /// Checks a win on another player's discard.
    pub fn test_ron(&self, tile: Tile, situation: &WinSituation) -> Result<WinResult, GameError> {
        Self::require_real(tile)?;
        if self.has_free_tile() {
            return Err(GameError::HasFreeTile);
        }
        if !self.waits().iter().any(|w| w.same_kind(tile)) {
            return Err(GameError::NotWaiting(tile));
        }
        if self.is_furiten() {
            return Err(GameError::Furiten);
        }
        let mut closed = self.closed.clone();
        closed.push(tile);
        yaku::evaluate(&WinContext {
            closed: &closed,
            melds: &self.melds,
            winning_tile: tile,
            by_ron: true,
            riichi: self.riichi,
            situation,
        })
        .ok_or(GameError::NoYaku)
    }

    /// Checks a win on the tile the player just drew.
    pub fn test_tsumo(&self, tile: Tile, situation: &WinSituation) -> Result<WinResult, GameError> {
        Self::require_real(tile)?;
        if !self.has_free_tile() {
            return Err(GameError::NoFreeTile);
        }
        let drawn = self.last_drawn.ok_or(GameError::TileNotHeld(tile))?;
        if !drawn.same_kind(tile) {
            return Err(GameError::TileNotHeld(tile));
        }
        if !shape::is_complete(&shape::counts(&self.closed), self.melds.len()) {
            return Err(GameError::NotWaiting(tile));
        }
        yaku::evaluate(&WinContext {
            closed: &self.closed,
            melds: &self.melds,
            winning_tile: drawn,
            by_ron: false,
            riichi: self.riichi,
            situation,
        })
        .ok_or(GameError::NoYaku)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A seated player: hand plus score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub hand: Hand,
    pub points: i32,
    pub seat_wind: Wind,
}

impl Player {
    /// A player holding a fresh hand.
    pub fn new(tiles: &[Tile], points: i32, seat_wind: Wind) -> Self {
        Self {
            hand: Hand::new(tiles),
            points,
            seat_wind,
        }
    }

    /// Checks declaring riichi by discarding `tile`.
    pub fn test_riichi(
        &self,
        tile: Tile,
        live_remaining: usize,
        config: &RoundConfig,
    ) -> Result<(), GameError> {
        if self.hand.in_riichi() {
            return Err(GameError::InRiichi);
        }
        if self.hand.is_open() {
            return Err(GameError::HandOpen);
        }
        if self.points < config.riichi_cost {
            return Err(GameError::RiichiNotAllowed("not enough points"));
        }
        if live_remaining < config.riichi_min_wall {
            return Err(GameError::RiichiNotAllowed("too few tiles left in the wall"));
        }
        let pos = self.hand.test_toss(tile)?;
        let mut rest = self.hand.closed.clone();
        rest.remove(pos);
        if shape::waits(&shape::counts(&rest), self.hand.melds.len()).is_empty() {
            return Err(GameError::RiichiNotAllowed("discard does not leave the hand ready"));
        }
        Ok(())
    }

    /// Declares riichi: pays the deposit and tosses `tile`.
    pub fn riichi(
        &mut self,
        tile: Tile,
        live_remaining: usize,
        config: &RoundConfig,
    ) -> Result<Tile, GameError> {
        self.test_riichi(tile, live_remaining, config)?;
        let tossed = self.hand.toss(tile)?;
        self.hand.riichi = true;
        self.points -= config.riichi_cost;
        Ok(tossed)
    }

    /// Tiles the player could declare riichi with right now.
    pub fn riichi_candidates(&self, live_remaining: usize, config: &RoundConfig) -> Vec<Tile> {
        self.hand
            .tenpai_discards()
            .into_iter()
            .filter(|t| self.test_riichi(*t, live_remaining, config).is_ok())
            .collect()
    }
}
