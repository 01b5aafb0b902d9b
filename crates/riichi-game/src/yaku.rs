//! Win evaluation: yaku, fu, and point values.
//!
//! [`evaluate`] takes a completed hand and reports every scoring
//! condition it satisfies. A hand with no yaku returns `None`, which is
//! what makes a Ron or Tsumo illegal. Dora are counted into the han total
//! but never count as a yaku on their own.

use serde::{Deserialize, Serialize};

use crate::hand::{Meld, MeldKind};
use crate::shape::{self, Counts, Set};
use crate::tile::{KIND_COUNT, Tile, Wind};

// ---------------------------------------------------------------------------
// Yaku
// ---------------------------------------------------------------------------

/// A named scoring condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Yaku {
    MenzenTsumo,
    Riichi,
    Ippatsu,
    Pinfu,
    Iipeikou,
    Haitei,
    Houtei,
    RinshanKaihou,
    Tanyao,
    YakuhaiSeatWind,
    YakuhaiRoundWind,
    YakuhaiWhite,
    YakuhaiGreen,
    YakuhaiRed,
    DoubleRiichi,
    Chanta,
    SanshokuDoujun,
    Ittsu,
    Toitoi,
    Sanankou,
    SanshokuDoukou,
    Sankantsu,
    Chiitoitsu,
    Honroutou,
    Shousangen,
    Honitsu,
    Junchan,
    Ryanpeikou,
    Chinitsu,
    // Yakuman
    KokushiMusou,
    Kokushi13,
    Suuankou,
    Daisangen,
    Shousuushii,
    Daisuushii,
    Tsuuiisou,
    Chinroutou,
    Ryuuiisou,
    ChuurenPoutou,
    Suukantsu,
    Tenhou,
    Chiihou,
}

impl Yaku {
    /// Han value. Open hands lose one han on the yaku that allow calls.
    pub fn han(self, closed: bool) -> u32 {
        use Yaku::*;
        let open_penalty = u32::from(!closed);
        match self {
            MenzenTsumo | Riichi | Ippatsu | Pinfu | Iipeikou | Haitei | Houtei
            | RinshanKaihou | Tanyao | YakuhaiSeatWind | YakuhaiRoundWind
            | YakuhaiWhite | YakuhaiGreen | YakuhaiRed => 1,
            DoubleRiichi | Toitoi | Sanankou | SanshokuDoukou | Sankantsu
            | Chiitoitsu | Honroutou | Shousangen => 2,
            Chanta | SanshokuDoujun | Ittsu => 2 - open_penalty,
            Honitsu | Junchan => 3 - open_penalty,
            Ryanpeikou => 3,
            Chinitsu => 6 - open_penalty,
            _ => 13 * self.yakuman(),
        }
    }

    /// Yakuman multiplier, zero for ordinary yaku.
    pub fn yakuman(self) -> u32 {
        use Yaku::*;
        match self {
            Kokushi13 | Daisuushii => 2,
            KokushiMusou | Suuankou | Daisangen | Shousuushii | Tsuuiisou
            | Chinroutou | Ryuuiisou | ChuurenPoutou | Suukantsu | Tenhou
            | Chiihou => 1,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Round facts the hand itself does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinSituation {
    pub seat_wind: Wind,
    pub round_wind: Wind,
    /// Revealed dora indicators.
    pub dora_indicators: Vec<Tile>,
    /// Ura dora indicators; only counted for a riichi hand.
    pub ura_indicators: Vec<Tile>,
    pub double_riichi: bool,
    pub ippatsu: bool,
    /// The win is on the last tile of the live wall.
    pub last_tile: bool,
    /// The winning tile is a kan replacement draw.
    pub rinshan: bool,
    /// Self-draw on the player's first uninterrupted draw.
    pub first_draw: bool,
}

impl Default for WinSituation {
    fn default() -> Self {
        Self {
            seat_wind: Wind::East,
            round_wind: Wind::East,
            dora_indicators: Vec::new(),
            ura_indicators: Vec::new(),
            double_riichi: false,
            ippatsu: false,
            last_tile: false,
            rinshan: false,
            first_draw: false,
        }
    }
}

/// Everything needed to score one win.
#[derive(Debug, Clone, Copy)]
pub struct WinContext<'a> {
    /// Closed tiles, winning tile included.
    pub closed: &'a [Tile],
    pub melds: &'a [Meld],
    pub winning_tile: Tile,
    pub by_ron: bool,
    pub riichi: bool,
    pub situation: &'a WinSituation,
}

/// The scored outcome of a legal win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinResult {
    pub yaku: Vec<Yaku>,
    /// Han including dora.
    pub han: u32,
    pub fu: u32,
    pub dora: u32,
    pub yakuman: u32,
    pub winning_tile: Tile,
    pub hand: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub won_by_ron: bool,
}

impl WinResult {
    /// Base points before the payment multipliers.
    pub fn basic_points(&self) -> i32 {
        if self.yakuman > 0 {
            return 8_000 * self.yakuman as i32;
        }
        match self.han {
            13.. => 8_000,
            11..=12 => 6_000,
            8..=10 => 4_000,
            6..=7 => 3_000,
            5 => 2_000,
            han => {
                let raw = self.fu as i64 * (1i64 << (han + 2));
                raw.min(2_000) as i32
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

fn round_up_100(points: i32) -> i32 {
    (points + 99) / 100 * 100
}

/// Point transfer for a win. `discarder` is `None` for tsumo.
pub fn payments(
    basic: i32,
    winner: usize,
    dealer: usize,
    discarder: Option<usize>,
) -> [i32; 4] {
    let mut deltas = [0i32; 4];
    match discarder {
        Some(loser) => {
            let factor = if winner == dealer { 6 } else { 4 };
            let pay = round_up_100(basic * factor);
            deltas[loser] -= pay;
            deltas[winner] += pay;
        }
        None => {
            for seat in (0..4).filter(|&s| s != winner) {
                let factor = if winner == dealer || seat == dealer { 2 } else { 1 };
                let pay = round_up_100(basic * factor);
                deltas[seat] -= pay;
                deltas[winner] += pay;
            }
        }
    }
    deltas
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Run,
    Triplet,
    Kan,
}

#[derive(Debug, Clone, Copy)]
struct Group {
    kind: GroupKind,
    first: usize,
    concealed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Ryanmen,
    Kanchan,
    Penchan,
    Shanpon,
    Tanki,
}

/// A full reading of the hand: four groups, a pair, and how it was won.
struct Reading {
    groups: Vec<Group>,
    pair: usize,
    wait: Wait,
}

const WHITE: usize = 31;
const GREEN: usize = 32;
const RED: usize = 33;

fn is_orphan(index: usize) -> bool {
    index >= 27 || index % 9 == 0 || index % 9 == 8
}

fn wind_index(wind: Wind) -> usize {
    wind.tile().index()
}

fn meld_group(meld: &Meld) -> Group {
    let first = meld.key().index();
    let (kind, concealed) = match meld.kind {
        MeldKind::Chii => (GroupKind::Run, false),
        MeldKind::Pon => (GroupKind::Triplet, false),
        MeldKind::Ankan => (GroupKind::Kan, true),
        MeldKind::Daiminkan | MeldKind::Shouminkan => (GroupKind::Kan, false),
    };
    Group { kind, first, concealed }
}

/// Scores a completed hand. Returns `None` if it is not complete or has
/// no yaku.
pub fn evaluate(ctx: &WinContext<'_>) -> Option<WinResult> {
    let closed_counts = shape::counts(ctx.closed);
    let mut all_tiles: Vec<Tile> = ctx.closed.to_vec();
    for meld in ctx.melds {
        all_tiles.extend_from_slice(&meld.tiles);
    }
    let all = shape::counts(&all_tiles);
    let closed_hand = ctx.melds.iter().all(|m| !m.kind.is_open());

    let mut candidates: Vec<(Vec<Yaku>, u32)> = Vec::new();

    // Standard readings.
    let sets_needed = 4usize.saturating_sub(ctx.melds.len());
    let win = ctx.winning_tile.kind().index();
    for decomposition in shape::decompose(&closed_counts, sets_needed) {
        for reading in readings(&decomposition, ctx, win) {
            let yaku = standard_yaku(&reading, ctx, &all, closed_hand);
            let fu = fu(&reading, ctx, closed_hand, yaku.contains(&Yaku::Pinfu));
            candidates.push((yaku, fu));
        }
    }

    if closed_hand && ctx.melds.is_empty() {
        if shape::is_seven_pairs(&closed_counts) {
            candidates.push((seven_pairs_yaku(ctx, &all), 25));
        }
        if shape::is_thirteen_orphans(&closed_counts) {
            let mut before = closed_counts;
            before[win] -= 1;
            let yaku = if before.iter().filter(|&&c| c == 1).count() == 13 {
                Yaku::Kokushi13
            } else {
                Yaku::KokushiMusou
            };
            let mut list = vec![yaku];
            list.extend(first_draw_yakuman(ctx));
            candidates.push((list, 0));
        }
    }

    let dora = count_dora(ctx, &all_tiles);

    candidates
        .into_iter()
        .filter(|(yaku, _)| !yaku.is_empty())
        .map(|(yaku, fu)| {
            let yakuman: u32 = yaku.iter().map(|y| y.yakuman()).sum();
            let han = if yakuman > 0 {
                0
            } else {
                yaku.iter().map(|y| y.han(closed_hand)).sum::<u32>() + dora
            };
            WinResult {
                yaku,
                han,
                fu,
                dora,
                yakuman,
                winning_tile: ctx.winning_tile,
                hand: ctx.closed.to_vec(),
                melds: ctx.melds.to_vec(),
                won_by_ron: ctx.by_ron,
            }
        })
        .max_by_key(|r| (r.basic_points(), r.han, r.fu))
}

/// Every way to attribute the winning tile within one decomposition.
fn readings(decomposition: &shape::Decomposition, ctx: &WinContext<'_>, win: usize) -> Vec<Reading> {
    let melded: Vec<Group> = ctx.melds.iter().map(meld_group).collect();
    let concealed: Vec<Group> = decomposition
        .sets
        .iter()
        .map(|set| match *set {
            Set::Run(first) => Group { kind: GroupKind::Run, first, concealed: true },
            Set::Triplet(first) => Group { kind: GroupKind::Triplet, first, concealed: true },
        })
        .collect();

    let mut out = Vec::new();
    if decomposition.pair == win {
        let mut groups = melded.clone();
        groups.extend_from_slice(&concealed);
        out.push(Reading { groups, pair: decomposition.pair, wait: Wait::Tanki });
    }

    for (i, group) in concealed.iter().enumerate() {
        let wait = match group.kind {
            GroupKind::Triplet if group.first == win => Wait::Shanpon,
            GroupKind::Run if (group.first..group.first + 3).contains(&win) => {
                let position = win - group.first;
                let start_rank = group.first % 9;
                match position {
                    1 => Wait::Kanchan,
                    0 if start_rank == 6 => Wait::Penchan,
                    2 if start_rank == 0 => Wait::Penchan,
                    _ => Wait::Ryanmen,
                }
            }
            _ => continue,
        };
        let mut groups = melded.clone();
        for (j, g) in concealed.iter().enumerate() {
            let mut g = *g;
            // A triplet finished by someone else's discard counts as open.
            if i == j && wait == Wait::Shanpon && ctx.by_ron {
                g.concealed = false;
            }
            groups.push(g);
        }
        out.push(Reading { groups, pair: decomposition.pair, wait });
    }
    out
}

fn standard_yaku(r: &Reading, ctx: &WinContext<'_>, all: &Counts, closed_hand: bool) -> Vec<Yaku> {
    let sit = ctx.situation;
    let runs: Vec<usize> = r
        .groups
        .iter()
        .filter(|g| g.kind == GroupKind::Run)
        .map(|g| g.first)
        .collect();
    let triplets: Vec<&Group> = r
        .groups
        .iter()
        .filter(|g| g.kind != GroupKind::Run)
        .collect();
    let has_triplet = |index: usize| triplets.iter().any(|g| g.first == index);
    let concealed_triplets = triplets.iter().filter(|g| g.concealed).count();
    let kans = triplets.iter().filter(|g| g.kind == GroupKind::Kan).count();
    let seat = wind_index(sit.seat_wind);
    let round = wind_index(sit.round_wind);

    // Yakuman first; they replace everything else.
    let mut yakuman = Vec::new();
    if concealed_triplets == 4 {
        yakuman.push(Yaku::Suuankou);
    }
    if has_triplet(WHITE) && has_triplet(GREEN) && has_triplet(RED) {
        yakuman.push(Yaku::Daisangen);
    }
    let wind_triplets = (27..31).filter(|&i| has_triplet(i)).count();
    if wind_triplets == 4 {
        yakuman.push(Yaku::Daisuushii);
    } else if wind_triplets == 3 && (27..31).contains(&r.pair) {
        yakuman.push(Yaku::Shousuushii);
    }
    yakuman.extend(colour_yakuman(all));
    if closed_hand && is_nine_gates(all) {
        yakuman.push(Yaku::ChuurenPoutou);
    }
    if kans == 4 {
        yakuman.push(Yaku::Suukantsu);
    }
    if closed_hand {
        yakuman.extend(first_draw_yakuman(ctx));
    }
    if !yakuman.is_empty() {
        return yakuman;
    }

    let mut yaku = situational_yaku(ctx, closed_hand);

    let pair_is_valued = r.pair >= WHITE || r.pair == seat || r.pair == round;
    let pinfu = closed_hand && runs.len() == 4 && !pair_is_valued && r.wait == Wait::Ryanmen;
    if pinfu {
        yaku.push(Yaku::Pinfu);
    }

    if closed_hand {
        let mut starts = [0u8; KIND_COUNT];
        for &first in &runs {
            starts[first] += 1;
        }
        let doubled: u8 = starts.iter().map(|&c| c / 2).sum();
        match doubled {
            2.. => yaku.push(Yaku::Ryanpeikou),
            1 => yaku.push(Yaku::Iipeikou),
            _ => {}
        }
    }

    if (0..KIND_COUNT).all(|i| all[i] == 0 || !is_orphan(i)) {
        yaku.push(Yaku::Tanyao);
    }

    if has_triplet(seat) {
        yaku.push(Yaku::YakuhaiSeatWind);
    }
    if has_triplet(round) {
        yaku.push(Yaku::YakuhaiRoundWind);
    }
    if has_triplet(WHITE) {
        yaku.push(Yaku::YakuhaiWhite);
    }
    if has_triplet(GREEN) {
        yaku.push(Yaku::YakuhaiGreen);
    }
    if has_triplet(RED) {
        yaku.push(Yaku::YakuhaiRed);
    }

    if runs.is_empty() {
        yaku.push(Yaku::Toitoi);
    }
    if concealed_triplets == 3 {
        yaku.push(Yaku::Sanankou);
    }
    if kans == 3 {
        yaku.push(Yaku::Sankantsu);
    }

    if (0..7).any(|rank| [0, 9, 18].iter().all(|s| runs.contains(&(s + rank)))) {
        yaku.push(Yaku::SanshokuDoujun);
    }
    if (0..9).any(|rank| [0, 9, 18].iter().all(|s| has_triplet(s + rank))) {
        yaku.push(Yaku::SanshokuDoukou);
    }
    if [0, 9, 18].iter().any(|s| [0, 3, 6].iter().all(|o| runs.contains(&(s + o)))) {
        yaku.push(Yaku::Ittsu);
    }

    let group_has_orphan = |g: &Group| match g.kind {
        GroupKind::Run => g.first % 9 == 0 || g.first % 9 == 6,
        _ => is_orphan(g.first),
    };
    let has_honor = (27..KIND_COUNT).any(|i| all[i] > 0);
    if r.groups.iter().all(group_has_orphan) && is_orphan(r.pair) {
        if runs.is_empty() {
            yaku.push(Yaku::Honroutou);
        } else if has_honor {
            yaku.push(Yaku::Chanta);
        } else {
            yaku.push(Yaku::Junchan);
        }
    }

    let dragon_triplets = [WHITE, GREEN, RED].iter().filter(|&&i| has_triplet(i)).count();
    if dragon_triplets == 2 && r.pair >= WHITE {
        yaku.push(Yaku::Shousangen);
    }

    yaku.extend(flush_yaku(all));
    yaku
}

fn seven_pairs_yaku(ctx: &WinContext<'_>, all: &Counts) -> Vec<Yaku> {
    if (0..27).all(|i| all[i] == 0) {
        let mut list = vec![Yaku::Tsuuiisou];
        list.extend(first_draw_yakuman(ctx));
        return list;
    }
    if let Some(first) = first_draw_yakuman(ctx) {
        return vec![first];
    }

    let mut yaku = situational_yaku(ctx, true);
    yaku.push(Yaku::Chiitoitsu);
    if (0..KIND_COUNT).all(|i| all[i] == 0 || !is_orphan(i)) {
        yaku.push(Yaku::Tanyao);
    }
    if (0..KIND_COUNT).all(|i| all[i] == 0 || is_orphan(i)) {
        yaku.push(Yaku::Honroutou);
    }
    yaku.extend(flush_yaku(all));
    yaku
}

/// Yaku that depend on how and when the hand won, not on its shape.
fn situational_yaku(ctx: &WinContext<'_>, closed_hand: bool) -> Vec<Yaku> {
    let sit = ctx.situation;
    let mut yaku = Vec::new();
    if ctx.riichi {
        yaku.push(if sit.double_riichi { Yaku::DoubleRiichi } else { Yaku::Riichi });
        if sit.ippatsu {
            yaku.push(Yaku::Ippatsu);
        }
    }
    if closed_hand && !ctx.by_ron {
        yaku.push(Yaku::MenzenTsumo);
    }
    if sit.last_tile && !sit.rinshan {
        yaku.push(if ctx.by_ron { Yaku::Houtei } else { Yaku::Haitei });
    }
    if sit.rinshan && !ctx.by_ron {
        yaku.push(Yaku::RinshanKaihou);
    }
    yaku
}

fn first_draw_yakuman(ctx: &WinContext<'_>) -> Option<Yaku> {
    let sit = ctx.situation;
    if !sit.first_draw || ctx.by_ron {
        return None;
    }
    Some(if sit.seat_wind == Wind::East { Yaku::Tenhou } else { Yaku::Chiihou })
}

fn colour_yakuman(all: &Counts) -> Vec<Yaku> {
    const GREEN_KINDS: [usize; 6] = [19, 20, 21, 23, 25, GREEN];
    let held = |pred: &dyn Fn(usize) -> bool| (0..KIND_COUNT).all(|i| all[i] == 0 || pred(i));

    let mut out = Vec::new();
    if held(&|i| i >= 27) {
        out.push(Yaku::Tsuuiisou);
    }
    if held(&|i| i < 27 && is_orphan(i)) {
        out.push(Yaku::Chinroutou);
    }
    if held(&|i| GREEN_KINDS.contains(&i)) {
        out.push(Yaku::Ryuuiisou);
    }
    out
}

/// 1112345678999 plus any one tile of the same suit.
fn is_nine_gates(all: &Counts) -> bool {
    (0..3).any(|suit| {
        let base = suit * 9;
        let total: u8 = all[base..base + 9].iter().sum();
        total == 14
            && all[base] >= 3
            && all[base + 8] >= 3
            && (1..8).all(|r| all[base + r] >= 1)
    })
}

fn flush_yaku(all: &Counts) -> Option<Yaku> {
    let suits_used = (0..3)
        .filter(|s| all[s * 9..s * 9 + 9].iter().any(|&c| c > 0))
        .count();
    let has_honor = (27..KIND_COUNT).any(|i| all[i] > 0);
    match (suits_used, has_honor) {
        (1, true) => Some(Yaku::Honitsu),
        (1, false) => Some(Yaku::Chinitsu),
        _ => None,
    }
}

fn fu(r: &Reading, ctx: &WinContext<'_>, closed_hand: bool, pinfu: bool) -> u32 {
    if pinfu && !ctx.by_ron {
        return 20;
    }
    let mut fu: u32 = 20;
    if closed_hand && ctx.by_ron {
        fu += 10;
    }
    if !ctx.by_ron {
        fu += 2;
    }
    for g in &r.groups {
        let mut value = match g.kind {
            GroupKind::Run => continue,
            _ if is_orphan(g.first) => 4,
            _ => 2,
        };
        if g.concealed {
            value *= 2;
        }
        if g.kind == GroupKind::Kan {
            value *= 4;
        }
        fu += value;
    }
    let sit = ctx.situation;
    if r.pair >= WHITE {
        fu += 2;
    }
    if r.pair == wind_index(sit.seat_wind) {
        fu += 2;
    }
    if r.pair == wind_index(sit.round_wind) {
        fu += 2;
    }
    if matches!(r.wait, Wait::Kanchan | Wait::Penchan | Wait::Tanki) {
        fu += 2;
    }
    let fu = fu.div_ceil(10) * 10;
    // An open hand with nothing but runs still scores 30.
    fu.max(30)
}

fn count_dora(ctx: &WinContext<'_>, tiles: &[Tile]) -> u32 {
    let sit = ctx.situation;
    let mut indicators: Vec<Tile> = sit.dora_indicators.clone();
    if ctx.riichi {
        indicators.extend_from_slice(&sit.ura_indicators);
    }
    let from_indicators: usize = indicators
        .iter()
        .map(|ind| {
            let dora = ind.dora_from_indicator();
            tiles.iter().filter(|t| t.same_kind(dora)).count()
        })
        .sum();
    let red = tiles.iter().filter(|t| t.is_red()).count();
    (from_indicators + red) as u32
}
