//! Final standings derived from a finished (or finishing) bracket.

use {
    std::cmp::Reverse,
    crate::prelude::*,
    crate::bracket::{losers_rounds, winners_rounds},
};

/// One entrant's final placement. Ties share a range, so losing
/// semifinalists both get `start: 3, end: 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub entrant: EntrantId,
    pub start: i16,
    pub end: i16,
}

/// Computes placements from confirmed results. Elimination formats place
/// entrants as soon as the final is confirmed, grouping everyone eliminated
/// in the same round; round robin only places once every match is confirmed.
pub fn compute_placements(state: &BracketState, format: Format) -> Vec<Placement> {
    match format {
        Format::SingleElim | Format::DoubleElim => elimination_placements(state, format),
        Format::RoundRobin => round_robin_placements(state),
    }
}

fn elimination_placements(state: &BracketState, format: Format) -> Vec<Placement> {
    let size = 1usize << state.max_round_for_bracket(BracketKind::Winners).max(0) as u32;
    let wr = winners_rounds(size);
    let final_key = match format {
        Format::SingleElim => MatchKey { bracket: BracketKind::Winners, round: wr, round_pos: 1 },
        Format::DoubleElim => {
            // grand final 1 only decides the bracket once the reset is off
            // the table; a pending reset means there is no champion yet
            let reset = MatchKey { bracket: BracketKind::Grand, round: 2, round_pos: 1 };
            if state.find_match(reset).is_some_and(|reset| reset.status != MatchStatus::Void) {
                reset
            } else {
                MatchKey { bracket: BracketKind::Grand, round: 1, round_pos: 1 }
            }
        }
        Format::RoundRobin => unreachable!(),
    };
    let Some(final_match) = state.find_match(final_key) else { return Vec::default() };
    if final_match.status != MatchStatus::Confirmed { return Vec::default() }
    let Some(champion) = final_match.winner else { return Vec::default() };
    let mut placements = vec![Placement { entrant: champion, start: 1, end: 1 }];
    if let Some(runner_up) = final_match.loser() {
        placements.push(Placement { entrant: runner_up, start: 2, end: 2 });
    }
    let mut cursor = 3;
    let blocks: Vec<Vec<EntrantId>> = match format {
        Format::SingleElim => (1..wr).rev()
            .map(|round| losers_of_round(state, BracketKind::Winners, round))
            .collect(),
        Format::DoubleElim => (1..=losers_rounds(size)).rev()
            .map(|round| losers_of_round(state, BracketKind::Losers, round))
            .collect(),
        Format::RoundRobin => unreachable!(),
    };
    for block in blocks {
        if block.is_empty() { continue }
        let start = cursor;
        let end = cursor + block.len() as i16 - 1;
        for entrant in block {
            placements.push(Placement { entrant, start, end });
        }
        cursor = end + 1;
    }
    placements
}

fn losers_of_round(state: &BracketState, bracket: BracketKind, round: i16) -> Vec<EntrantId> {
    state.matches()
        .filter(|entry| entry.key.bracket == bracket && entry.key.round == round && entry.status == MatchStatus::Confirmed)
        .filter_map(|entry| entry.loser())
        .collect()
}

fn round_robin_placements(state: &BracketState) -> Vec<Placement> {
    #[derive(Default)]
    struct Standing {
        wins: i16,
        losses: i16,
        diff: i16,
    }

    let mut standings = BTreeMap::<EntrantId, Standing>::default();
    for entry in state.matches().filter(|entry| entry.key.bracket == BracketKind::RoundRobin) {
        if entry.status != MatchStatus::Confirmed { return Vec::default() }
        let (Some(slot1), Some(slot2), Some(score1), Some(score2), Some(winner)) = (entry.slot1, entry.slot2, entry.score1, entry.score2, entry.winner) else { return Vec::default() };
        for entrant in [slot1, slot2] {
            let standing = standings.entry(entrant).or_default();
            if entrant == winner { standing.wins += 1 } else { standing.losses += 1 }
            standing.diff += if entrant == slot1 { score1 - score2 } else { score2 - score1 };
        }
    }
    let ordered = standings.into_iter()
        .sorted_by_key(|&(entrant, ref standing)| (Reverse(standing.wins), standing.losses, Reverse(standing.diff), entrant))
        .collect_vec();
    let mut placements = Vec::with_capacity(ordered.len());
    let mut cursor = 1;
    for (_, group) in &ordered.iter().chunk_by(|(_, standing)| (standing.wins, standing.losses, standing.diff)) {
        let group = group.collect_vec();
        let start = cursor;
        let end = cursor + group.len() as i16 - 1;
        for &(entrant, _) in group {
            placements.push(Placement { entrant, start, end });
        }
        cursor = end + 1;
    }
    placements
}

#[cfg(test)]
mod tests {
    use {
        crate::{
            generate::generate,
            report::confirm_and_advance,
        },
        super::*,
    };

    fn field(n: i64) -> Vec<(EntrantId, Option<i16>)> {
        (1..=n).map(|id| (EntrantId(id), Some(id as i16))).collect()
    }

    fn confirm_as(state: &mut BracketState, format: Format, key: MatchKey, winner_slot: i16) {
        // the winner takes the series 2-0 regardless of which slot they hold
        let (score1, score2) = if winner_slot == 1 { (2, 0) } else { (0, 2) };
        confirm_and_advance(state, format, key, score1, score2, winner_slot, None, None, None, false).unwrap();
    }

    fn confirm(state: &mut BracketState, key: MatchKey, winner_slot: i16) {
        confirm_as(state, Format::SingleElim, key, winner_slot);
    }

    fn confirm_de(state: &mut BracketState, key: MatchKey, winner_slot: i16) {
        confirm_as(state, Format::DoubleElim, key, winner_slot);
    }

    fn confirm_rr(state: &mut BracketState, key: MatchKey, score1: i16, score2: i16, winner_slot: i16) {
        confirm_and_advance(state, Format::RoundRobin, key, score1, score2, winner_slot, Some(1), None, None, false).unwrap();
    }

    fn key(bracket: BracketKind, round: i16, round_pos: i16) -> MatchKey {
        MatchKey { bracket, round, round_pos }
    }

    #[test]
    fn unfinished_bracket_has_no_placements() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::SingleElim, &field(4), 3).unwrap();
        assert!(compute_placements(&state, Format::SingleElim).is_empty());
        confirm(&mut state, key(BracketKind::Winners, 1, 1), 1);
        assert!(compute_placements(&state, Format::SingleElim).is_empty());
    }

    #[test]
    fn single_elim_groups_by_elimination_round() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::SingleElim, &field(5), 3).unwrap();
        // seeds 1, 4, 3 got byes; 4 plays 5
        confirm(&mut state, key(BracketKind::Winners, 1, 2), 1);
        confirm(&mut state, key(BracketKind::Winners, 2, 1), 1);
        confirm(&mut state, key(BracketKind::Winners, 2, 2), 2);
        confirm(&mut state, key(BracketKind::Winners, 3, 1), 1);
        let placements = compute_placements(&state, Format::SingleElim);
        let find = |id| placements.iter().find(|p| p.entrant == EntrantId(id)).copied().unwrap();
        assert_eq!(find(1), Placement { entrant: EntrantId(1), start: 1, end: 1 });
        assert_eq!(find(3), Placement { entrant: EntrantId(3), start: 2, end: 2 });
        // semifinal losers tie for 3rd-4th
        assert_eq!((find(4).start, find(4).end), (3, 4));
        assert_eq!((find(2).start, find(2).end), (3, 4));
        // the only round-1 loser places 5th
        assert_eq!((find(5).start, find(5).end), (5, 5));
        // recomputing changes nothing
        assert_eq!(compute_placements(&state, Format::SingleElim), placements);
    }

    #[test]
    fn double_elim_places_by_losers_round() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::DoubleElim, &field(4), 3).unwrap();
        confirm_de(&mut state, key(BracketKind::Winners, 1, 1), 1);
        confirm_de(&mut state, key(BracketKind::Winners, 1, 2), 1);
        confirm_de(&mut state, key(BracketKind::Winners, 2, 1), 1);
        confirm_de(&mut state, key(BracketKind::Losers, 1, 1), 1);
        // slot 2 of an even losers round is the fresh winners-bracket drop
        confirm_de(&mut state, key(BracketKind::Losers, 2, 1), 2);
        confirm_de(&mut state, key(BracketKind::Grand, 1, 1), 1);
        let placements = compute_placements(&state, Format::DoubleElim);
        let find = |id| placements.iter().find(|p| p.entrant == EntrantId(id)).copied().unwrap();
        assert_eq!(find(1), Placement { entrant: EntrantId(1), start: 1, end: 1 });
        assert_eq!(find(2), Placement { entrant: EntrantId(2), start: 2, end: 2 });
        assert_eq!((find(4).start, find(4).end), (3, 3));
        assert_eq!((find(3).start, find(3).end), (4, 4));
    }

    #[test]
    fn pending_grand_final_reset_blocks_placements() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::DoubleElim, &field(4), 3).unwrap();
        confirm_de(&mut state, key(BracketKind::Winners, 1, 1), 1);
        confirm_de(&mut state, key(BracketKind::Winners, 1, 2), 1);
        confirm_de(&mut state, key(BracketKind::Winners, 2, 1), 1);
        confirm_de(&mut state, key(BracketKind::Losers, 1, 1), 1);
        confirm_de(&mut state, key(BracketKind::Losers, 2, 1), 2);
        // the losers champion takes grand final 1, forcing the reset: the
        // confirmed grand final 1 must not be treated as decisive
        confirm_de(&mut state, key(BracketKind::Grand, 1, 1), 2);
        assert_eq!(state.find_match(key(BracketKind::Grand, 2, 1)).unwrap().status, MatchStatus::Pending);
        assert!(compute_placements(&state, Format::DoubleElim).is_empty());
        confirm_de(&mut state, key(BracketKind::Grand, 2, 1), 2);
        let placements = compute_placements(&state, Format::DoubleElim);
        let find = |id| placements.iter().find(|p| p.entrant == EntrantId(id)).copied().unwrap();
        assert_eq!(find(2), Placement { entrant: EntrantId(2), start: 1, end: 1 });
        assert_eq!(find(1), Placement { entrant: EntrantId(1), start: 2, end: 2 });
    }

    #[test]
    fn round_robin_orders_by_wins_losses_and_diff() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::RoundRobin, &field(4), 1).unwrap();
        // winner is determined per match by the given slot, so walk every
        // match and decide by entrant id: 1 beats everyone, 2 beats 3 and 4,
        // 3 and 4 split nothing (3 beats 4)
        let keys = state.matches().map(|entry| entry.key).collect::<Vec<_>>();
        for key in keys {
            let entry = state.find_match(key).unwrap();
            let (slot1, slot2) = (entry.slot1.unwrap(), entry.slot2.unwrap());
            let winner_slot = if slot1 < slot2 { 1 } else { 2 };
            let (score1, score2) = if winner_slot == 1 { (13, 7) } else { (7, 13) };
            confirm_rr(&mut state, key, score1, score2, winner_slot);
        }
        let placements = compute_placements(&state, Format::RoundRobin);
        let find = |id| placements.iter().find(|p| p.entrant == EntrantId(id)).copied().unwrap();
        assert_eq!((find(1).start, find(1).end), (1, 1));
        assert_eq!((find(2).start, find(2).end), (2, 2));
        assert_eq!((find(3).start, find(3).end), (3, 3));
        assert_eq!((find(4).start, find(4).end), (4, 4));
    }

    #[test]
    fn partial_round_robin_is_unplaced() {
        let mut state = BracketState::new(TournamentId(1));
        generate(&mut state, Format::RoundRobin, &field(4), 1).unwrap();
        let key = state.matches().next().unwrap().key;
        confirm_rr(&mut state, key, 13, 7, 1);
        assert!(compute_placements(&state, Format::RoundRobin).is_empty());
    }
}
