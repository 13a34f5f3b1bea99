//! Score reporting and confirmation.
//!
//! Reporting and disputing only annotate the match; [`confirm_and_advance`]
//! is the single path that finalizes a result and runs the bracket forward,
//! and it does so atomically against the in-memory state.

use {
    crate::prelude::*,
    crate::advance,
    crate::draft::{Ruleset, VetoState},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such match: {0}")]
    UnknownMatch(MatchKey),
    #[error("match {0} is already confirmed")]
    AlreadyConfirmed(MatchKey),
    #[error("match {0} is void")]
    VoidMatch(MatchKey),
    #[error("{0} is not a slot, expected 1 or 2")]
    InvalidWinnerSlot(i16),
    #[error("scores {score1}-{score2} out of range, expected 0 to 99")]
    ScoreOutOfRange {
        score1: i16,
        score2: i16,
    },
    #[error("the winner of a {score1}-{score2} match must have the higher score")]
    WinnerScoreNotHighest {
        score1: i16,
        score2: i16,
    },
    #[error("{score1}-{score2} is not a finished best of {best_of}, the winner needs exactly {wins_to_take} map wins")]
    ScoreInconsistent {
        best_of: i16,
        wins_to_take: i16,
        score1: i16,
        score2: i16,
    },
    #[error("match {0} does not have both participants yet")]
    IncompleteMatch(MatchKey),
    #[error("the pick/ban sequence must be locked before the result is confirmed")]
    PickBanRequired,
    #[error(transparent)] Advance(#[from] advance::Error),
}

/// A finalized result, handed back so callers can notify or log without
/// re-reading the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedResult {
    pub key: MatchKey,
    pub winner: EntrantId,
    pub loser: Option<EntrantId>,
}

fn validate_score(best_of: i16, score1: i16, score2: i16, winner_slot: i16) -> Result<Slot, Error> {
    let Some(winner_slot) = Slot::from_index(winner_slot) else {
        return Err(Error::InvalidWinnerSlot(winner_slot))
    };
    if !(0..=99).contains(&score1) || !(0..=99).contains(&score2) {
        return Err(Error::ScoreOutOfRange { score1, score2 })
    }
    let (winner_score, loser_score) = winner_slot.choose((score1, score2), (score2, score1));
    if winner_score <= loser_score {
        return Err(Error::WinnerScoreNotHighest { score1, score2 })
    }
    // scores within the best-of are map counts and must describe a finished
    // series; anything larger is game points (e.g. a single racked map) and
    // only needs the winner on top
    if score1 <= best_of && score2 <= best_of {
        let wins_to_take = best_of / 2 + 1;
        if winner_score != wins_to_take || loser_score >= wins_to_take {
            return Err(Error::ScoreInconsistent { best_of, wins_to_take, score1, score2 })
        }
    }
    Ok(winner_slot)
}

fn checked_match(state: &BracketState, key: MatchKey) -> Result<&Match, Error> {
    let entry = state.find_match(key).ok_or(Error::UnknownMatch(key))?;
    match entry.status {
        MatchStatus::Confirmed => Err(Error::AlreadyConfirmed(key)),
        MatchStatus::Void => Err(Error::VoidMatch(key)),
        MatchStatus::Pending | MatchStatus::Reported | MatchStatus::Disputed => Ok(entry),
    }
}

/// Records a provisional result without advancing anyone. The same score
/// checks apply as at confirmation so junk never enters the record.
pub fn report_result(state: &mut BracketState, key: MatchKey, score1: i16, score2: i16, winner_slot: i16, default_best_of: Option<i16>) -> Result<(), Error> {
    let entry = checked_match(state, key)?;
    let best_of = entry.best_of.or(default_best_of).unwrap_or(3);
    let winner_slot = validate_score(best_of, score1, score2, winner_slot)?;
    if entry.slot(winner_slot).is_none() {
        return Err(Error::IncompleteMatch(key))
    }
    state.record_report(key, score1, score2, MatchStatus::Reported);
    log::info!("match {key}: reported {score1}-{score2}");
    Ok(())
}

/// Flags a reported result for review. Confirmation stays possible, with the
/// correct score, once the dispute is sorted out.
pub fn dispute(state: &mut BracketState, key: MatchKey) -> Result<(), Error> {
    checked_match(state, key)?;
    state.set_status(key, MatchStatus::Disputed);
    log::info!("match {key}: result disputed");
    Ok(())
}

/// Confirms a result and advances the bracket. All or nothing: if anything
/// downstream rejects the advancement, the state is exactly as before.
///
/// When `require_pickban_locked` is set and the tournament ruleset has a veto
/// sequence for this match's best-of, confirmation requires a locked veto.
#[allow(clippy::too_many_arguments)]
pub fn confirm_and_advance(
    state: &mut BracketState,
    format: Format,
    key: MatchKey,
    score1: i16,
    score2: i16,
    winner_slot: i16,
    default_best_of: Option<i16>,
    ruleset: Option<&Ruleset>,
    veto: Option<&VetoState>,
    require_pickban_locked: bool,
) -> Result<ConfirmedResult, Error> {
    let entry = checked_match(state, key)?;
    let best_of = entry.best_of.or(default_best_of).unwrap_or(3);
    let (slot1, slot2) = (entry.slot1, entry.slot2);
    let winner_slot = validate_score(best_of, score1, score2, winner_slot)?;
    if require_pickban_locked
        && ruleset.is_some_and(|ruleset| ruleset.sequence(best_of).is_some())
        && !veto.is_some_and(|veto| veto.locked)
    {
        return Err(Error::PickBanRequired)
    }
    let (Some(slot1), Some(slot2)) = (slot1, slot2) else {
        return Err(Error::IncompleteMatch(key))
    };
    let winner = winner_slot.choose(slot1, slot2);
    let snapshot = state.clone();
    state.confirm_result(key, score1, score2, winner);
    if let Err(e) = advance::advance(state, format, key) {
        *state = snapshot;
        return Err(e.into())
    }
    let loser = Some(winner_slot.other().choose(slot1, slot2)).filter(|&loser| loser != winner);
    log::info!("match {key}: confirmed {score1}-{score2}, {winner} advances");
    Ok(ConfirmedResult { key, winner, loser })
}
