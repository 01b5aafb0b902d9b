//! The reaction window that follows every discard.
//!
//! When a tile is discarded, every legal claim on it (chii, pon, kan,
//! ron) is offered at once. Seats answer by declaring or skipping. A
//! declared claim wins once no undecided offer could still beat it:
//! ron beats kan and pon, which beat chii, and among equals the seat
//! closest after the discarder wins.

use std::cmp::Reverse;

use crate::action::ActionData;
use crate::error::GameError;
use crate::tile::Tile;

/// A claim that a seat may make, or has made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub seat: usize,
    pub action: ActionData,
}

/// What the window says should happen next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Someone could still declare something that matters.
    Waiting,
    /// Everyone passed; play moves on.
    Pass,
    /// This claim goes through.
    Claim(PendingAction),
}

/// Two actions refer to the same claim if type and tiles match by kind.
fn same_claim(a: &ActionData, b: &ActionData) -> bool {
    match (a, b) {
        (
            ActionData::Chii { tile: t1, hand_tiles: h1 },
            ActionData::Chii { tile: t2, hand_tiles: h2 },
        ) => {
            let mut k1 = [h1[0].kind(), h1[1].kind()];
            let mut k2 = [h2[0].kind(), h2[1].kind()];
            k1.sort();
            k2.sort();
            t1.same_kind(*t2) && k1 == k2
        }
        _ => {
            a.action_type() == b.action_type()
                && match (a.tile(), b.tile()) {
                    (Some(x), Some(y)) => x.same_kind(y),
                    (None, None) => true,
                    _ => false,
                }
        }
    }
}

/// Offers and declarations for one discard.
#[derive(Debug, Clone)]
pub struct ReactionWindow {
    id: u64,
    discarder: usize,
    tile: Tile,
    /// Turn distance of each seat from the discarder, 1..=3.
    distance: [usize; 4],
    offers: Vec<PendingAction>,
    declared: Vec<PendingAction>,
}

impl ReactionWindow {
    /// Opens a window over `offers` for `tile` discarded by `discarder`.
    pub fn new(
        id: u64,
        discarder: usize,
        tile: Tile,
        distance: [usize; 4],
        offers: Vec<PendingAction>,
    ) -> Self {
        Self {
            id,
            discarder,
            tile,
            distance,
            offers,
            declared: Vec::new(),
        }
    }

    /// Identifies this window to expiry timers.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Seat whose discard is up for claims.
    pub fn discarder(&self) -> usize {
        self.discarder
    }

    /// The discarded tile.
    pub fn tile(&self) -> Tile {
        self.tile
    }

    /// Offers nobody has answered yet.
    pub fn offers(&self) -> &[PendingAction] {
        &self.offers
    }

    /// Returns `true` if `seat` still holds an offer matching `action` by kind.
    pub fn is_offered(&self, seat: usize, action: &ActionData) -> bool {
        self.offers
            .iter()
            .any(|o| o.seat == seat && same_claim(&o.action, action))
    }

    /// Records a claim. The seat's other offers are withdrawn.
    pub fn declare(&mut self, seat: usize, action: ActionData) -> Result<(), GameError> {
        if !self.is_offered(seat, &action) {
            return Err(GameError::NoPendingAction(action.action_type(), seat));
        }
        self.offers.retain(|o| o.seat != seat);
        self.declared.push(PendingAction { seat, action });
        Ok(())
    }

    /// Removes exactly one offer.
    pub fn skip(&mut self, seat: usize, action: &ActionData) -> Result<(), GameError> {
        let pos = self
            .offers
            .iter()
            .position(|o| o.seat == seat && same_claim(&o.action, action))
            .ok_or(GameError::NoPendingAction(action.action_type(), seat))?;
        self.offers.remove(pos);
        Ok(())
    }

    /// Treats every unanswered offer as skipped.
    pub fn expire(&mut self) {
        self.offers.clear();
    }

    /// Decides whether the window can close and with which claim.
    pub fn resolution(&self) -> Resolution {
        let best = self.declared.iter().max_by_key(|d| {
            (d.action.claim_priority(), Reverse(self.distance[d.seat]))
        });

        let Some(best) = best else {
            return if self.offers.is_empty() {
                Resolution::Pass
            } else {
                Resolution::Waiting
            };
        };

        let priority = best.action.claim_priority();
        let distance = self.distance[best.seat];
        let outranked = self.offers.iter().any(|o| {
            let p = o.action.claim_priority();
            p > priority || (p == priority && self.distance[o.seat] < distance)
        });
        if outranked {
            Resolution::Waiting
        } else {
            Resolution::Claim(best.clone())
        }
    }
}
