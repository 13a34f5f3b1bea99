//! Winner/loser propagation through the bracket graph.
//!
//! [`advance`] takes a just-confirmed match and writes its winner (and, in
//! double elimination, its loser) into the downstream slot(s) derived in
//! [`crate::bracket`]. Follow-up work created along the way, like a
//! losers-bracket match that can now never fill its other slot, goes onto a
//! worklist processed until empty, so chained byes terminate visibly instead
//! of through re-entrant calls.

use {
    crate::{
        bracket::{
            self,
            LosersFeed,
            Target,
        },
        prelude::*,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bracket is missing match {0}")]
    MissingMatch(MatchKey),
    #[error("match {0} is not confirmed, nothing to advance")]
    NotConfirmed(MatchKey),
    #[error("{slot} of match {key} already holds a different entrant, or the match is already decided; reset the bracket to change history")]
    SlotConflict {
        key: MatchKey,
        slot: Slot,
    },
}

/// Propagates the outcome of the confirmed match at `source` downstream.
///
/// Writing into a slot that already holds a *different* entrant, or into a
/// match that is already confirmed, fails with [`Error::SlotConflict`]: that
/// only happens after a bug or an out-of-band edit, and silently overwriting
/// would corrupt the bracket. The remedy is an explicit [`reset_bracket`].
pub fn advance(state: &mut BracketState, format: Format, source: MatchKey) -> Result<(), Error> {
    let size = 1usize << state.max_round_for_bracket(BracketKind::Winners).max(0) as u32;
    let mut worklist = VecDeque::from([source]);
    while let Some(key) = worklist.pop_front() {
        propagate(state, format, size, key, &mut worklist)?;
    }
    Ok(())
}

fn propagate(state: &mut BracketState, format: Format, size: usize, key: MatchKey, worklist: &mut VecDeque<MatchKey>) -> Result<(), Error> {
    let source = state.find_match(key).ok_or(Error::MissingMatch(key))?;
    if source.status != MatchStatus::Confirmed {
        return Err(Error::NotConfirmed(key))
    }
    let Some(winner) = source.winner else { return Err(Error::NotConfirmed(key)) };
    let loser = source.loser();
    let (slot1, slot2) = (source.slot1, source.slot2);
    match key.bracket {
        BracketKind::RoundRobin => {} // no graph, nothing to propagate
        BracketKind::Grand => if key.round == 1 {
            let reset_key = MatchKey::new(BracketKind::Grand, 2, 1);
            let reset = state.find_match(reset_key).ok_or(Error::MissingMatch(reset_key))?;
            if reset.status == MatchStatus::Confirmed {
                return Err(Error::SlotConflict { key: reset_key, slot: Slot::One })
            }
            if slot1 == Some(winner) {
                // the winners-bracket champion held, the reset is never played
                log::debug!("grand final decided by {key}, voiding {reset_key}");
                state.void_match(reset_key);
            } else if let (Some(slot1), Some(slot2)) = (slot1, slot2) {
                // the losers-bracket champion forced a decider with the same two entrants
                log::debug!("bracket reset: {reset_key} will be played");
                state.reset_for_replay(reset_key, slot1, slot2);
            }
        }, // grand final round 2 is terminal
        BracketKind::Winners | BracketKind::Losers => {
            if let Some(target) = bracket::winner_target(format, size, key) {
                write_slot(state, target, winner)?;
                maybe_short_circuit(state, target.key, worklist)?;
            }
            if format == Format::DoubleElim && key.bracket == BracketKind::Winners {
                if let Some(loser) = loser {
                    if let Some(target) = bracket::loser_target(size, key) {
                        write_slot(state, target, loser)?;
                        maybe_short_circuit(state, target.key, worklist)?;
                    }
                }
                // a bye has no loser: nothing drops, the fed slot stays dead
            }
        }
    }
    Ok(())
}

fn write_slot(state: &mut BracketState, target: Target, entrant: EntrantId) -> Result<(), Error> {
    let found = state.find_match(target.key).ok_or(Error::MissingMatch(target.key))?;
    if let MatchStatus::Confirmed | MatchStatus::Void = found.status {
        log::warn!("refusing to send {entrant} into {} match {}", found.status, target.key);
        return Err(Error::SlotConflict { key: target.key, slot: target.slot })
    }
    match found.slot(target.slot) {
        Some(existing) if existing != entrant => {
            log::warn!("{} of {} already holds {existing}, refusing to overwrite with {entrant}", target.slot, target.key);
            Err(Error::SlotConflict { key: target.key, slot: target.slot })
        }
        Some(_) => Ok(()), // same entrant, idempotent
        None => {
            state.set_slot(target.key, target.slot, entrant);
            Ok(())
        }
    }
}

/// When a losers-bracket match just received a participant and its other slot
/// can never be filled (the would-be occupant was the loser of a bye, who
/// does not exist), the present participant wins immediately and the result
/// propagates further via the worklist.
fn maybe_short_circuit(state: &mut BracketState, key: MatchKey, worklist: &mut VecDeque<MatchKey>) -> Result<(), Error> {
    if key.bracket != BracketKind::Losers {
        return Ok(())
    }
    let found = state.find_match(key).ok_or(Error::MissingMatch(key))?;
    if found.status != MatchStatus::Pending {
        return Ok(())
    }
    let (present, vacant) = match (found.slot1, found.slot2) {
        (Some(entrant), None) => (entrant, Slot::Two),
        (None, Some(entrant)) => (entrant, Slot::One),
        _ => return Ok(()),
    };
    if slot_is_dead(state, key, vacant) {
        log::debug!("{vacant} of {key} can never fill, advancing {present} unopposed");
        state.confirm_winner(key, present);
        worklist.push_back(key);
    }
    Ok(())
}

/// Whether a losers-bracket slot is guaranteed to stay empty forever.
fn slot_is_dead(state: &BracketState, key: MatchKey, slot: Slot) -> bool {
    match bracket::losers_feed(key, slot) {
        // no loser will ever come out of a winners-bracket bye
        Some(LosersFeed::WinnersLoser(feed)) => state
            .find_match(feed)
            .is_some_and(|found| found.status == MatchStatus::Confirmed && found.is_bye()),
        // no winner will ever come out of a voided (or doubly dead) losers match
        Some(LosersFeed::LosersWinner(feed)) => state.find_match(feed).is_some_and(|found| {
            found.status == MatchStatus::Void
                || (found.slot1.is_none()
                    && found.slot2.is_none()
                    && slot_is_dead(state, feed, Slot::One)
                    && slot_is_dead(state, feed, Slot::Two))
        }),
        None => false,
    }
}

/// Voids losers-bracket round 1 matches that can never receive a participant
/// because both feeding winners matches were byes. Run once after generation
/// so no phantom zero-participant match lingers in the bracket.
pub(crate) fn sweep_dead_losers_matches(state: &mut BracketState) {
    let dead = state
        .matches()
        .filter(|found| {
            found.key.bracket == BracketKind::Losers
                && found.key.round == 1
                && found.status == MatchStatus::Pending
                && found.slot1.is_none()
                && found.slot2.is_none()
        })
        .map(|found| found.key)
        .filter(|&key| slot_is_dead(state, key, Slot::One) && slot_is_dead(state, key, Slot::Two))
        .collect_vec();
    for key in dead {
        log::debug!("voiding {key}: both feeding matches were byes");
        state.void_match(key);
    }
}

/// The explicit remedy for [`Error::SlotConflict`]: reopens the match at
/// `key` for replay with its current participants and walks everything
/// strictly downstream of it, clearing the slots this chain had filled and
/// reopening any match that was already decided off the back of them.
/// Confirmed history upstream of `key` is untouched.
pub fn reset_bracket(state: &mut BracketState, format: Format, key: MatchKey) -> Result<(), Error> {
    let size = 1usize << state.max_round_for_bracket(BracketKind::Winners).max(0) as u32;
    let start = state.find_match(key).ok_or(Error::MissingMatch(key))?;
    let (Some(slot1), Some(slot2)) = (start.slot1, start.slot2) else {
        return Err(Error::NotConfirmed(key))
    };
    let mut worklist = VecDeque::from([key]);
    while let Some(current) = worklist.pop_front() {
        let mut targets = Vec::new();
        if let Some(target) = bracket::winner_target(format, size, current) {
            targets.push(target);
        }
        if format == Format::DoubleElim && current.bracket == BracketKind::Winners {
            targets.extend(bracket::loser_target(size, current));
        }
        if current.bracket == BracketKind::Grand && current.round == 1 {
            // the reset match goes back to an empty conditional
            let reset_key = MatchKey::new(BracketKind::Grand, 2, 1);
            if state.find_match(reset_key).is_some() {
                state.clear_slot(reset_key, Slot::One);
                state.clear_slot(reset_key, Slot::Two);
                state.reopen(reset_key);
            }
        }
        for target in targets {
            let Some(found) = state.find_match(target.key) else { continue };
            let was_decided = matches!(found.status, MatchStatus::Confirmed | MatchStatus::Void);
            if found.slot(target.slot).is_some() || was_decided {
                state.clear_slot(target.key, target.slot);
                state.reopen(target.key);
                if was_decided {
                    worklist.push_back(target.key);
                }
            }
        }
    }
    log::info!("bracket reset at {key}, match reopened for replay");
    state.reset_for_replay(key, slot1, slot2);
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        crate::generate,
        super::*,
    };

    fn entrants(n: i64) -> Vec<(EntrantId, Option<i16>)> {
        (1..=n).map(|id| (EntrantId(id), Some(id as i16))).collect()
    }

    fn confirm(state: &mut BracketState, format: Format, key: MatchKey, winner: EntrantId) {
        state.confirm_winner(key, winner);
        advance(state, format, key).unwrap();
    }

    fn winners(round: i16, pos: i16) -> MatchKey {
        MatchKey::new(BracketKind::Winners, round, pos)
    }

    fn losers(round: i16, pos: i16) -> MatchKey {
        MatchKey::new(BracketKind::Losers, round, pos)
    }

    fn grand(round: i16) -> MatchKey {
        MatchKey::new(BracketKind::Grand, round, 1)
    }

    #[test]
    fn single_elim_winner_flows_to_final() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::SingleElim, &entrants(4), 3).unwrap();
        confirm(&mut state, Format::SingleElim, winners(1, 1), EntrantId(1));
        confirm(&mut state, Format::SingleElim, winners(1, 2), EntrantId(2));
        let fin = state.find_match(winners(2, 1)).unwrap();
        assert_eq!(fin.slot1, Some(EntrantId(1)));
        assert_eq!(fin.slot2, Some(EntrantId(2)));
    }

    #[test]
    fn double_elim_loser_drops() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::DoubleElim, &entrants(8), 3).unwrap();
        // seeds at size 8 pair as 1v8, 4v5, 2v7, 3v6
        confirm(&mut state, Format::DoubleElim, winners(1, 1), EntrantId(1));
        confirm(&mut state, Format::DoubleElim, winners(1, 2), EntrantId(4));
        let drop = state.find_match(losers(1, 1)).unwrap();
        assert_eq!(drop.slot1, Some(EntrantId(8)));
        assert_eq!(drop.slot2, Some(EntrantId(5)));
        // a winners round 2 loser lands in losers round 2, slot 2
        confirm(&mut state, Format::DoubleElim, winners(1, 3), EntrantId(2));
        confirm(&mut state, Format::DoubleElim, winners(1, 4), EntrantId(3));
        confirm(&mut state, Format::DoubleElim, winners(2, 1), EntrantId(1));
        let merge = state.find_match(losers(2, 1)).unwrap();
        assert_eq!(merge.slot2, Some(EntrantId(4)));
    }

    #[test]
    fn grand_final_reset_is_played_when_losers_champion_wins() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::DoubleElim, &entrants(2), 3).unwrap();
        confirm(&mut state, Format::DoubleElim, winners(1, 1), EntrantId(1));
        let gf1 = state.find_match(grand(1)).unwrap();
        assert_eq!(gf1.slot1, Some(EntrantId(1)));
        assert_eq!(gf1.slot2, Some(EntrantId(2)));
        // the losers-bracket side takes game 1: reset
        confirm(&mut state, Format::DoubleElim, grand(1), EntrantId(2));
        let gf2 = state.find_match(grand(2)).unwrap();
        assert_eq!(gf2.status, MatchStatus::Pending);
        assert_eq!(gf2.slot1, Some(EntrantId(1)));
        assert_eq!(gf2.slot2, Some(EntrantId(2)));
        confirm(&mut state, Format::DoubleElim, grand(2), EntrantId(2));
        assert_eq!(state.find_match(grand(2)).unwrap().winner, Some(EntrantId(2)));
    }

    #[test]
    fn grand_final_reset_is_voided_when_winners_champion_wins() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::DoubleElim, &entrants(2), 3).unwrap();
        confirm(&mut state, Format::DoubleElim, winners(1, 1), EntrantId(1));
        confirm(&mut state, Format::DoubleElim, grand(1), EntrantId(1));
        assert_eq!(state.find_match(grand(2)).unwrap().status, MatchStatus::Void);
    }

    #[test]
    fn dead_losers_slot_short_circuits() {
        let mut state = BracketState::new(TournamentId(1));
        // 5 entrants in a size 8 bracket: only 4v5 is a real round 1 match
        generate::generate(&mut state, Format::DoubleElim, &entrants(5), 3).unwrap();
        // both feeds of losers 1/2 were byes, so the match was voided at generation
        assert_eq!(state.find_match(losers(1, 2)).unwrap().status, MatchStatus::Void);
        // the 4v5 loser enters losers 1/1 whose other slot is dead (1v8 was a bye)
        // and should fall through losers round 1 unopposed
        confirm(&mut state, Format::DoubleElim, winners(1, 2), EntrantId(4));
        let first = state.find_match(losers(1, 1)).unwrap();
        assert_eq!(first.status, MatchStatus::Confirmed);
        assert_eq!(first.winner, Some(EntrantId(5)));
        let second = state.find_match(losers(2, 1)).unwrap();
        assert_eq!(second.slot1, Some(EntrantId(5)));
        assert_eq!(second.status, MatchStatus::Pending);
    }

    #[test]
    fn conflicting_write_is_rejected() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::SingleElim, &entrants(4), 3).unwrap();
        confirm(&mut state, Format::SingleElim, winners(1, 1), EntrantId(1));
        // rewrite history out of band: now entrant 4 "won" the same match
        state.reset_for_replay(winners(1, 1), EntrantId(1), EntrantId(4));
        state.confirm_winner(winners(1, 1), EntrantId(4));
        assert!(matches!(
            advance(&mut state, Format::SingleElim, winners(1, 1)),
            Err(Error::SlotConflict { .. }),
        ));
    }

    #[test]
    fn advancing_into_confirmed_match_is_rejected() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::SingleElim, &entrants(4), 3).unwrap();
        confirm(&mut state, Format::SingleElim, winners(1, 1), EntrantId(1));
        state.confirm_winner(winners(2, 1), EntrantId(1));
        state.confirm_winner(winners(1, 2), EntrantId(2));
        assert!(matches!(
            advance(&mut state, Format::SingleElim, winners(1, 2)),
            Err(Error::SlotConflict { .. }),
        ));
    }

    #[test]
    fn reset_bracket_clears_downstream() {
        let mut state = BracketState::new(TournamentId(1));
        generate::generate(&mut state, Format::SingleElim, &entrants(4), 3).unwrap();
        confirm(&mut state, Format::SingleElim, winners(1, 1), EntrantId(1));
        confirm(&mut state, Format::SingleElim, winners(1, 2), EntrantId(2));
        confirm(&mut state, Format::SingleElim, winners(2, 1), EntrantId(1));
        reset_bracket(&mut state, Format::SingleElim, winners(1, 1)).unwrap();
        let replayed = state.find_match(winners(1, 1)).unwrap();
        assert_eq!(replayed.status, MatchStatus::Pending);
        assert_eq!(replayed.slot1, Some(EntrantId(1)));
        let fin = state.find_match(winners(2, 1)).unwrap();
        assert_eq!(fin.status, MatchStatus::Pending);
        assert_eq!(fin.slot1, None);
        assert_eq!(fin.slot2, Some(EntrantId(2)));
        // the replay flows through again
        confirm(&mut state, Format::SingleElim, winners(1, 1), EntrantId(4));
        assert_eq!(state.find_match(winners(2, 1)).unwrap().slot1, Some(EntrantId(4)));
    }
}
