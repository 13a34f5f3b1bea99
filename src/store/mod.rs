//! The match table.
//!
//! [`BracketState`] is the in-memory view of one tournament's matches, keyed
//! by `(bracket, round, round_pos)`. The engine mutates it synchronously; the
//! [`pg`] module loads it from Postgres and writes the dirty rows back inside
//! the caller's transaction, so "confirm result + advance bracket" stays
//! atomic. Mutation only happens through the advancer and the result service,
//! which is why the write operations are crate private.

use crate::prelude::*;

pub mod pg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Reported,
    Disputed,
    Confirmed,
    Void,
}

serde_plain::derive_display_from_serialize!(MatchStatus);
serde_plain::derive_fromstr_from_deserialize!(MatchStatus);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// `None` until the row has been persisted.
    pub id: Option<MatchId>,
    pub key: MatchKey,
    pub best_of: Option<i16>,
    pub slot1: Option<EntrantId>,
    pub slot2: Option<EntrantId>,
    pub status: MatchStatus,
    pub score1: Option<i16>,
    pub score2: Option<i16>,
    pub winner: Option<EntrantId>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Match {
    fn new(key: MatchKey, best_of: Option<i16>, slot1: Option<EntrantId>, slot2: Option<EntrantId>) -> Self {
        Self {
            id: None,
            status: MatchStatus::Pending,
            score1: None,
            score2: None,
            winner: None,
            confirmed_at: None,
            key, best_of, slot1, slot2,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<EntrantId> {
        slot.choose(self.slot1, self.slot2)
    }

    /// The non-winning participant, if the match had two.
    pub fn loser(&self) -> Option<EntrantId> {
        let winner = self.winner?;
        if self.slot1 == Some(winner) {
            self.slot2
        } else if self.slot2 == Some(winner) {
            self.slot1
        } else {
            None
        }
    }

    /// Exactly one participant present.
    pub fn is_bye(&self) -> bool {
        self.slot1.is_some() != self.slot2.is_some()
    }
}

/// One tournament's matches, with dirty tracking for persistence.
#[derive(Debug, Clone)]
pub struct BracketState {
    pub tournament: TournamentId,
    matches: BTreeMap<MatchKey, Match>,
    dirty: BTreeSet<MatchKey>,
}

impl BracketState {
    pub fn new(tournament: TournamentId) -> Self {
        Self {
            tournament,
            matches: BTreeMap::default(),
            dirty: BTreeSet::default(),
        }
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.values()
    }

    pub fn num_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn find_match(&self, key: MatchKey) -> Option<&Match> {
        self.matches.get(&key)
    }

    pub fn max_round_for_bracket(&self, bracket: BracketKind) -> i16 {
        self.matches
            .keys()
            .filter(|key| key.bracket == bracket)
            .map(|key| key.round)
            .max()
            .unwrap_or_default()
    }

    /// Rows with unsaved changes, in key order.
    pub fn dirty_matches(&self) -> impl Iterator<Item = &Match> {
        self.dirty.iter().filter_map(|key| self.matches.get(key))
    }

    pub(crate) fn create_match(&mut self, key: MatchKey, best_of: Option<i16>, slot1: Option<EntrantId>, slot2: Option<EntrantId>) {
        debug_assert!(!self.matches.contains_key(&key), "duplicate match {key}");
        self.matches.insert(key, Match::new(key, best_of, slot1, slot2));
        self.dirty.insert(key);
    }

    fn touch(&mut self, key: MatchKey) -> Option<&mut Match> {
        let found = self.matches.get_mut(&key);
        if found.is_some() {
            self.dirty.insert(key);
        }
        found
    }

    pub(crate) fn set_slot(&mut self, key: MatchKey, slot: Slot, entrant: EntrantId) {
        if let Some(found) = self.touch(key) {
            match slot {
                Slot::One => found.slot1 = Some(entrant),
                Slot::Two => found.slot2 = Some(entrant),
            }
        }
    }

    pub(crate) fn confirm_winner(&mut self, key: MatchKey, winner: EntrantId) {
        if let Some(found) = self.touch(key) {
            found.status = MatchStatus::Confirmed;
            found.winner = Some(winner);
            found.confirmed_at = Some(Utc::now());
        }
    }

    pub(crate) fn confirm_result(&mut self, key: MatchKey, score1: i16, score2: i16, winner: EntrantId) {
        if let Some(found) = self.touch(key) {
            found.status = MatchStatus::Confirmed;
            found.score1 = Some(score1);
            found.score2 = Some(score2);
            found.winner = Some(winner);
            found.confirmed_at = Some(Utc::now());
        }
    }

    pub(crate) fn record_report(&mut self, key: MatchKey, score1: i16, score2: i16, status: MatchStatus) {
        if let Some(found) = self.touch(key) {
            found.status = status;
            found.score1 = Some(score1);
            found.score2 = Some(score2);
        }
    }

    pub(crate) fn set_status(&mut self, key: MatchKey, status: MatchStatus) {
        if let Some(found) = self.touch(key) {
            found.status = status;
        }
    }

    pub(crate) fn void_match(&mut self, key: MatchKey) {
        if let Some(found) = self.touch(key) {
            found.status = MatchStatus::Void;
            found.winner = None;
            found.score1 = None;
            found.score2 = None;
        }
    }

    /// Reopens a match with the given participants, clearing any result.
    pub(crate) fn reset_for_replay(&mut self, key: MatchKey, slot1: EntrantId, slot2: EntrantId) {
        if let Some(found) = self.touch(key) {
            found.slot1 = Some(slot1);
            found.slot2 = Some(slot2);
            found.status = MatchStatus::Pending;
            found.score1 = None;
            found.score2 = None;
            found.winner = None;
            found.confirmed_at = None;
        }
    }

    pub(crate) fn clear_slot(&mut self, key: MatchKey, slot: Slot) {
        if let Some(found) = self.touch(key) {
            match slot {
                Slot::One => found.slot1 = None,
                Slot::Two => found.slot2 = None,
            }
        }
    }

    /// Clears result and status without touching the slots.
    pub(crate) fn reopen(&mut self, key: MatchKey) {
        if let Some(found) = self.touch(key) {
            found.status = MatchStatus::Pending;
            found.score1 = None;
            found.score2 = None;
            found.winner = None;
            found.confirmed_at = None;
        }
    }

    /// For the persistence layer: inserts a freshly loaded row without
    /// marking it dirty.
    pub(crate) fn insert_loaded(&mut self, loaded: Match) {
        self.matches.insert(loaded.key, loaded);
    }

    pub(crate) fn set_match_id(&mut self, key: MatchKey, id: MatchId) {
        if let Some(found) = self.matches.get_mut(&key) {
            found.id = Some(id);
        }
    }

    pub(crate) fn clear_dirty(&mut self) -> Vec<MatchKey> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}
