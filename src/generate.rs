//! Match skeleton generation.
//!
//! Each generator creates every match of the bracket up front: round 1 from
//! the seed position table, every later round with empty slots. Byes are then
//! confirmed and propagated immediately, so a freshly generated bracket is
//! already in the exact state a caller can act on.

use {
    crate::{
        advance,
        bracket::{
            self,
            BEST_OF_OPTIONS,
        },
        entrant,
        prelude::*,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a bracket needs at least two entrants, got {0}")]
    NotEnoughEntrants(usize),
    #[error("best of {0} is not playable (allowed: 1, 3, 5, 7, 9)")]
    BestOf(i16),
    #[error(transparent)] Seed(#[from] entrant::Error),
    #[error(transparent)] Advance(#[from] advance::Error),
}

/// Generates the full match skeleton for a tournament that has not started.
///
/// `entrants` is the seeded signup list (seeded ascending, then unseeded in
/// join order); `best_of` applies to every generated match and must be one of
/// [`BEST_OF_OPTIONS`].
pub fn generate(state: &mut BracketState, format: Format, entrants: &[(EntrantId, Option<i16>)], best_of: i16) -> Result<(), Error> {
    if !BEST_OF_OPTIONS.contains(&best_of) {
        return Err(Error::BestOf(best_of))
    }
    if entrants.len() < 2 {
        return Err(Error::NotEnoughEntrants(entrants.len()))
    }
    let seeded = entrant::seed_order(entrants)?;
    log::info!("generating {format} bracket for {} entrants in tournament {}", seeded.len(), state.tournament);
    match format {
        Format::SingleElim => {
            generate_winners_bracket(state, &seeded, best_of);
            auto_advance_byes(state, format)?;
        }
        Format::DoubleElim => {
            let size = generate_winners_bracket(state, &seeded, best_of);
            for round in 1..=bracket::losers_rounds(size) {
                for pos in 1..=bracket::losers_matches_in_round(size, round) {
                    state.create_match(MatchKey::new(BracketKind::Losers, round, pos), Some(best_of), None, None);
                }
            }
            // the second grand final is the conditional bracket reset
            state.create_match(MatchKey::new(BracketKind::Grand, 1, 1), Some(best_of), None, None);
            state.create_match(MatchKey::new(BracketKind::Grand, 2, 1), Some(best_of), None, None);
            auto_advance_byes(state, format)?;
            advance::sweep_dead_losers_matches(state);
        }
        Format::RoundRobin => generate_round_robin(state, &seeded, best_of),
    }
    Ok(())
}

/// Creates the winners bracket (round 1 seeded, later rounds empty) and
/// returns the bracket size.
fn generate_winners_bracket(state: &mut BracketState, seeded: &[EntrantId], best_of: i16) -> usize {
    let size = bracket::bracket_size(seeded.len());
    let slots = bracket::seed_positions(size)
        .into_iter()
        .map(|seed| seeded.get(seed - 1).copied())
        .collect_vec();
    for (index, pair) in slots.chunks(2).enumerate() {
        let key = MatchKey::new(BracketKind::Winners, 1, index as i16 + 1);
        state.create_match(key, Some(best_of), pair[0], pair[1]);
    }
    for round in 2..=bracket::winners_rounds(size) {
        for pos in 1..=bracket::winners_matches_in_round(size, round) {
            state.create_match(MatchKey::new(BracketKind::Winners, round, pos), Some(best_of), None, None);
        }
    }
    size
}

/// Confirms every round 1 match with exactly one participant and propagates
/// the free win; propagation itself re-checks whether that created further
/// byes. A bye never produces a losers-bracket entry, there is no loser.
fn auto_advance_byes(state: &mut BracketState, format: Format) -> Result<(), advance::Error> {
    let byes = state
        .matches()
        .filter(|found| {
            found.key.bracket == BracketKind::Winners
                && found.key.round == 1
                && found.status == MatchStatus::Pending
                && found.is_bye()
        })
        .map(|found| (found.key, found.slot1.or(found.slot2)))
        .collect_vec();
    for (key, winner) in byes {
        let Some(winner) = winner else { continue };
        log::debug!("bye at {key}: {winner} advances without playing");
        state.confirm_winner(key, winner);
        advance::advance(state, format, key)?;
    }
    Ok(())
}

/// Circle method: fix the first entry, rotate the rest between rounds. An odd
/// field gets a sentinel empty entry whose pairings are skipped.
fn generate_round_robin(state: &mut BracketState, seeded: &[EntrantId], best_of: i16) {
    let mut ring = seeded.iter().copied().map(Some).collect_vec();
    if ring.len() % 2 == 1 {
        ring.push(None);
    }
    let size = ring.len();
    for round in 1..=(size - 1) as i16 {
        let mut pos = 1;
        for i in 0..size / 2 {
            let (Some(a), Some(b)) = (ring[i], ring[size - 1 - i]) else { continue };
            // home/away alternates every other round, purely for display symmetry
            let (slot1, slot2) = if round % 2 == 0 { (b, a) } else { (a, b) };
            state.create_match(MatchKey::new(BracketKind::RoundRobin, round, pos), Some(best_of), Some(slot1), Some(slot2));
            pos += 1;
        }
        ring[1..].rotate_right(1);
    }
}
