//! Bracket topology as arithmetic.
//!
//! Nothing in here touches storage. Match positions are identified by
//! `(bracket, round, round_pos)` and every edge of the bracket graph is
//! derived from those three numbers, so the propagation rules live in a
//! handful of pure functions that can be tested exhaustively.

use {
    rand::Rng,
    crate::prelude::*,
};

/// Series lengths the result validation understands.
pub const BEST_OF_OPTIONS: [i16; 5] = [1, 3, 5, 7, 9];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    SingleElim,
    DoubleElim,
    RoundRobin,
}

serde_plain::derive_display_from_serialize!(Format);
serde_plain::derive_fromstr_from_deserialize!(Format);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "bracket_kind", rename_all = "snake_case")]
pub enum BracketKind {
    Winners,
    Losers,
    Grand,
    RoundRobin,
}

serde_plain::derive_display_from_serialize!(BracketKind);
serde_plain::derive_fromstr_from_deserialize!(BracketKind);

/// Identifies a match within one tournament. Rounds and positions are
/// 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct MatchKey {
    pub bracket: BracketKind,
    pub round: i16,
    pub round_pos: i16,
}

impl MatchKey {
    pub fn new(bracket: BracketKind, round: i16, round_pos: i16) -> Self {
        Self { bracket, round, round_pos }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bracket, self.round, self.round_pos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    pub fn choose<T>(self, one: T, two: T) -> T {
        match self {
            Self::One => one,
            Self::Two => two,
        }
    }

    pub fn index(self) -> i16 {
        self.choose(1, 2)
    }

    pub fn from_index(index: i16) -> Option<Self> {
        match index {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    /// For settling who acts first in a veto when neither seeding nor
    /// agreement decides it. The flip itself stays outside the engine.
    pub fn coin_toss(rng: &mut impl Rng) -> Self {
        if rng.random() { Self::One } else { Self::Two }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.index())
    }
}

/// Smallest power of two that fits all entrants.
pub fn bracket_size(num_entrants: usize) -> usize {
    num_entrants.next_power_of_two()
}

/// `size` must be a power of two.
pub fn winners_rounds(size: usize) -> i16 {
    size.trailing_zeros() as i16
}

pub fn losers_rounds(size: usize) -> i16 {
    (2 * winners_rounds(size) - 2).max(0)
}

pub fn winners_matches_in_round(size: usize, round: i16) -> i16 {
    (size >> round as u32) as i16
}

pub fn losers_matches_in_round(size: usize, round: i16) -> i16 {
    (size >> (((round as u32) + 1) / 2 + 1)) as i16
}

/// The round-1 seeding permutation, built by recursive mirroring: seed 1 never
/// meets seed 2 before the final, 3 and 4 land in opposite halves, and so on.
/// `seed_positions(size)[i]` is the seed placed into physical slot `i`.
///
/// This is the only legal way entrants may be placed into round 1.
pub fn seed_positions(size: usize) -> Vec<usize> {
    let mut positions = vec![1];
    while positions.len() < size {
        let doubled = positions.len() * 2;
        positions = positions.into_iter().flat_map(|x| [x, doubled + 1 - x]).collect();
    }
    positions
}

/// A downstream slot some entrant is about to be written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub key: MatchKey,
    pub slot: Slot,
}

fn parity_slot(round_pos: i16) -> Slot {
    if round_pos % 2 == 1 { Slot::One } else { Slot::Two }
}

fn half_pos(round_pos: i16) -> i16 {
    (round_pos + 1) / 2
}

/// Where the winner of `key` goes next, or `None` if the result is terminal
/// (single-elim champion, grand final, round robin).
pub fn winner_target(format: Format, size: usize, key: MatchKey) -> Option<Target> {
    match key.bracket {
        BracketKind::RoundRobin => None,
        BracketKind::Grand => None, // round 1 is handled by the advancer (reset vs void), round 2 is final
        BracketKind::Winners => if key.round < winners_rounds(size) {
            Some(Target {
                key: MatchKey::new(BracketKind::Winners, key.round + 1, half_pos(key.round_pos)),
                slot: parity_slot(key.round_pos),
            })
        } else {
            match format {
                Format::SingleElim | Format::RoundRobin => None,
                Format::DoubleElim => Some(Target { key: MatchKey::new(BracketKind::Grand, 1, 1), slot: Slot::One }),
            }
        },
        BracketKind::Losers => if key.round < losers_rounds(size) {
            if key.round % 2 == 1 {
                // odd rounds merge with a fresh winners-bracket drop-in one round later
                Some(Target { key: MatchKey::new(BracketKind::Losers, key.round + 1, key.round_pos), slot: Slot::One })
            } else {
                Some(Target {
                    key: MatchKey::new(BracketKind::Losers, key.round + 1, half_pos(key.round_pos)),
                    slot: parity_slot(key.round_pos),
                })
            }
        } else {
            Some(Target { key: MatchKey::new(BracketKind::Grand, 1, 1), slot: Slot::Two })
        },
    }
}

/// Where the loser of a winners-bracket match drops to in double elimination.
/// `None` for every other bracket; losers of losers-bracket matches are out.
pub fn loser_target(size: usize, key: MatchKey) -> Option<Target> {
    match key.bracket {
        BracketKind::Winners => Some(if losers_rounds(size) == 0 {
            // two-entrant bracket: there is no losers bracket, the loser gets
            // their rematch in the grand final directly
            Target { key: MatchKey::new(BracketKind::Grand, 1, 1), slot: Slot::Two }
        } else if key.round == 1 {
            Target {
                key: MatchKey::new(BracketKind::Losers, 1, half_pos(key.round_pos)),
                slot: parity_slot(key.round_pos),
            }
        } else {
            Target { key: MatchKey::new(BracketKind::Losers, 2 * key.round - 2, key.round_pos), slot: Slot::Two }
        }),
        BracketKind::Losers | BracketKind::Grand | BracketKind::RoundRobin => None,
    }
}

/// The upstream match that will eventually populate one slot of a
/// losers-bracket match. Inverse of [`winner_target`]/[`loser_target`]; used
/// to decide whether a slot can still receive anyone at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LosersFeed {
    /// Filled by the loser of this winners-bracket match.
    WinnersLoser(MatchKey),
    /// Filled by the winner of this earlier losers-bracket match.
    LosersWinner(MatchKey),
}

pub fn losers_feed(key: MatchKey, slot: Slot) -> Option<LosersFeed> {
    if key.bracket != BracketKind::Losers { return None }
    Some(if key.round == 1 {
        let pos = slot.choose(2 * key.round_pos - 1, 2 * key.round_pos);
        LosersFeed::WinnersLoser(MatchKey::new(BracketKind::Winners, 1, pos))
    } else if key.round % 2 == 0 {
        match slot {
            Slot::One => LosersFeed::LosersWinner(MatchKey::new(BracketKind::Losers, key.round - 1, key.round_pos)),
            Slot::Two => LosersFeed::WinnersLoser(MatchKey::new(BracketKind::Winners, key.round / 2 + 1, key.round_pos)),
        }
    } else {
        let pos = slot.choose(2 * key.round_pos - 1, 2 * key.round_pos);
        LosersFeed::LosersWinner(MatchKey::new(BracketKind::Losers, key.round - 1, pos))
    })
}
