//! Hand shape analysis over 34-entry count tables.
//!
//! Everything here works on kinds (flags ignored). A complete hand is
//! four sets and a pair (minus however many sets are already melded),
//! seven distinct pairs, or the thirteen orphans.

use crate::tile::{KIND_COUNT, Tile};

/// Copies held of each tile kind, indexed by [`Tile::index`].
pub type Counts = [u8; KIND_COUNT];

/// Terminal and honor kinds, the thirteen orphans.
const ORPHANS: [usize; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

/// Copies held of each of the 34 kinds.
pub fn counts(tiles: &[Tile]) -> Counts {
    let mut counts = [0u8; KIND_COUNT];
    for tile in tiles.iter().filter(|t| t.is_real()) {
        counts[tile.index()] += 1;
    }
    counts
}

/// A concealed set found while decomposing the closed tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Set {
    /// Run starting at this kind index.
    Run(usize),
    Triplet(usize),
}

/// One way of reading the closed tiles as sets plus a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    pub pair: usize,
    pub sets: Vec<Set>,
}

/// Returns `true` if the index is the start of a possible run.
fn can_start_run(index: usize) -> bool {
    index < 27 && index % 9 <= 6
}

/// Every standard decomposition of `counts` into `sets_needed` sets and a pair.
pub fn decompose(counts: &Counts, sets_needed: usize) -> Vec<Decomposition> {
    let total: usize = counts.iter().map(|&c| c as usize).sum();
    if total != sets_needed * 3 + 2 {
        return Vec::new();
    }

    let mut found = Vec::new();
    for pair in 0..KIND_COUNT {
        if counts[pair] < 2 {
            continue;
        }
        let mut rest = *counts;
        rest[pair] -= 2;
        let mut sets = Vec::with_capacity(sets_needed);
        extract_sets(&mut rest, 0, &mut sets, &mut |sets| {
            found.push(Decomposition { pair, sets: sets.to_vec() });
        });
    }
    found
}

fn extract_sets(
    counts: &mut Counts,
    from: usize,
    sets: &mut Vec<Set>,
    emit: &mut dyn FnMut(&[Set]),
) {
    let Some(i) = (from..KIND_COUNT).find(|&i| counts[i] > 0) else {
        emit(sets);
        return;
    };

    if counts[i] >= 3 {
        counts[i] -= 3;
        sets.push(Set::Triplet(i));
        extract_sets(counts, i, sets, emit);
        sets.pop();
        counts[i] += 3;
    }

    if can_start_run(i) && counts[i + 1] > 0 && counts[i + 2] > 0 {
        counts[i] -= 1;
        counts[i + 1] -= 1;
        counts[i + 2] -= 1;
        sets.push(Set::Run(i));
        extract_sets(counts, i, sets, emit);
        sets.pop();
        counts[i] += 1;
        counts[i + 1] += 1;
        counts[i + 2] += 1;
    }
}

/// Seven distinct pairs. Only possible with no melds.
pub fn is_seven_pairs(counts: &Counts) -> bool {
    counts.iter().filter(|&&c| c == 2).count() == 7
        && counts.iter().all(|&c| c == 0 || c == 2)
}

/// One of each terminal and honor plus a duplicate of one of them.
pub fn is_thirteen_orphans(counts: &Counts) -> bool {
    let total: u8 = counts.iter().sum();
    total == 14
        && ORPHANS.iter().all(|&i| counts[i] >= 1)
        && ORPHANS.iter().filter(|&&i| counts[i] == 2).count() == 1
}

/// Returns `true` if the closed tiles complete the hand.
pub fn is_complete(counts: &Counts, open_melds: usize) -> bool {
    if open_melds > 4 {
        return false;
    }
    if !decompose(counts, 4 - open_melds).is_empty() {
        return true;
    }
    open_melds == 0 && (is_seven_pairs(counts) || is_thirteen_orphans(counts))
}

/// Every kind that would complete a 13-tile (minus melds) hand.
///
/// A kind the hand already holds all four of can never arrive, so it is
/// not a wait even if it would complete the shape.
pub fn waits(counts: &Counts, open_melds: usize) -> Vec<Tile> {
    let mut result = Vec::new();
    let mut trial = *counts;
    for index in 0..KIND_COUNT {
        if trial[index] >= 4 {
            continue;
        }
        trial[index] += 1;
        if is_complete(&trial, open_melds) {
            if let Some(tile) = Tile::from_index(index) {
                result.push(tile);
            }
        }
        trial[index] -= 1;
    }
    result
}
