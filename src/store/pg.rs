//! Postgres persistence for brackets and veto records.
//!
//! Everything here runs inside a caller-provided transaction, so a bracket
//! save and the surrounding tournament bookkeeping commit or roll back as
//! one. The in-memory [`BracketState`] tracks which matches changed and only
//! those are written back.

use {
    sqlx::{
        Postgres,
        Transaction,
        types::Json,
    },
    crate::{
        draft::{ActionKind, MapSide, MatchConfig, Side, SideSource, VetoAction, VetoState},
        entrant::ParticipantKind,
        prelude::*,
    },
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: i64,
    bracket: BracketKind,
    round: i16,
    round_pos: i16,
    best_of: Option<i16>,
    slot1: Option<i64>,
    slot2: Option<i64>,
    status: MatchStatus,
    score1: Option<i16>,
    score2: Option<i16>,
    winner: Option<i64>,
    confirmed_at: Option<DateTime<Utc>>,
}

/// Entrants of a tournament in seeding order. Unseeded entrants come last,
/// by signup time then id, so the fill order is stable.
pub async fn list_seeded_entrants(tx: &mut Transaction<'_, Postgres>, tournament: TournamentId, kind: ParticipantKind) -> sqlx::Result<Vec<(EntrantId, Option<i16>)>> {
    let rows = sqlx::query_as::<_, (i64, Option<i16>)>(
        "SELECT id, seed FROM entrants WHERE tournament = $1 AND kind = $2 ORDER BY seed ASC NULLS LAST, joined ASC, id ASC",
    )
        .bind(tournament.0)
        .bind(kind)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(|(id, seed)| (EntrantId(id), seed)).collect())
}

pub async fn load_bracket(tx: &mut Transaction<'_, Postgres>, tournament: TournamentId) -> sqlx::Result<BracketState> {
    let rows = sqlx::query_as::<_, MatchRow>(
        "SELECT id, bracket, round, round_pos, best_of, slot1, slot2, status, score1, score2, winner, confirmed_at FROM matches WHERE tournament = $1",
    )
        .bind(tournament.0)
        .fetch_all(&mut **tx)
        .await?;
    let mut state = BracketState::new(tournament);
    for row in rows {
        state.insert_loaded(Match {
            id: Some(MatchId(row.id)),
            key: MatchKey { bracket: row.bracket, round: row.round, round_pos: row.round_pos },
            best_of: row.best_of,
            slot1: row.slot1.map(EntrantId),
            slot2: row.slot2.map(EntrantId),
            status: row.status,
            score1: row.score1,
            score2: row.score2,
            winner: row.winner.map(EntrantId),
            confirmed_at: row.confirmed_at,
        });
    }
    Ok(state)
}

/// Writes every match the state has touched since it was loaded and assigns
/// database ids to newly created ones.
pub async fn save_bracket(tx: &mut Transaction<'_, Postgres>, state: &mut BracketState) -> sqlx::Result<()> {
    for key in state.clear_dirty() {
        let Some(entry) = state.find_match(key).cloned() else { continue };
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO matches (tournament, bracket, round, round_pos, best_of, slot1, slot2, status, score1, score2, winner, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tournament, bracket, round, round_pos) DO UPDATE SET
                best_of = EXCLUDED.best_of,
                slot1 = EXCLUDED.slot1,
                slot2 = EXCLUDED.slot2,
                status = EXCLUDED.status,
                score1 = EXCLUDED.score1,
                score2 = EXCLUDED.score2,
                winner = EXCLUDED.winner,
                confirmed_at = EXCLUDED.confirmed_at
            RETURNING id",
        )
            .bind(state.tournament.0)
            .bind(key.bracket)
            .bind(key.round)
            .bind(key.round_pos)
            .bind(entry.best_of)
            .bind(entry.slot1.map(|EntrantId(id)| id))
            .bind(entry.slot2.map(|EntrantId(id)| id))
            .bind(entry.status)
            .bind(entry.score1)
            .bind(entry.score2)
            .bind(entry.winner.map(|EntrantId(id)| id))
            .bind(entry.confirmed_at)
            .fetch_one(&mut **tx)
            .await?;
        state.set_match_id(key, MatchId(id));
    }
    Ok(())
}

pub async fn find_veto(tx: &mut Transaction<'_, Postgres>, match_id: MatchId) -> sqlx::Result<Option<VetoState>> {
    let Some((config, first_turn, locked)) = sqlx::query_as::<_, (Json<MatchConfig>, Option<i16>, bool)>(
        "SELECT config, first_turn, locked FROM veto_states WHERE match_id = $1",
    )
        .bind(match_id.0)
        .fetch_optional(&mut **tx)
        .await?
    else { return Ok(None) };
    let actions = sqlx::query_as::<_, (i16, Option<i16>, ActionKind, String)>(
        "SELECT step_index, slot, kind, map_key FROM veto_actions WHERE match_id = $1 ORDER BY step_index ASC",
    )
        .bind(match_id.0)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|(step_index, slot, kind, map_key)| VetoAction {
            step_index: step_index as usize,
            slot: slot.and_then(Slot::from_index),
            kind, map_key,
        })
        .collect();
    let sides = sqlx::query_as::<_, (String, Side, Option<i16>, SideSource)>(
        "SELECT map_key, slot1_side, chosen_by, source FROM veto_sides WHERE match_id = $1 ORDER BY map_key ASC",
    )
        .bind(match_id.0)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|(map_key, slot1_side, chosen_by, source)| MapSide {
            chosen_by: chosen_by.and_then(Slot::from_index),
            map_key, slot1_side, source,
        })
        .collect();
    Ok(Some(VetoState {
        match_id,
        config: config.0,
        first_turn: first_turn.and_then(Slot::from_index),
        actions, sides,
        locked,
    }))
}

pub async fn create_veto(tx: &mut Transaction<'_, Postgres>, veto: &VetoState) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO veto_states (match_id, config, first_turn, locked) VALUES ($1, $2, $3, $4)")
        .bind(veto.match_id.0)
        .bind(Json(&veto.config))
        .bind(veto.first_turn.map(Slot::index))
        .bind(veto.locked)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The action list is append-only and short, so a delete and reinsert is
/// simpler than diffing against what is stored.
pub async fn save_veto(tx: &mut Transaction<'_, Postgres>, veto: &VetoState) -> sqlx::Result<()> {
    sqlx::query("UPDATE veto_states SET first_turn = $2, locked = $3 WHERE match_id = $1")
        .bind(veto.match_id.0)
        .bind(veto.first_turn.map(Slot::index))
        .bind(veto.locked)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM veto_actions WHERE match_id = $1").bind(veto.match_id.0).execute(&mut **tx).await?;
    for action in &veto.actions {
        sqlx::query("INSERT INTO veto_actions (match_id, step_index, slot, kind, map_key) VALUES ($1, $2, $3, $4, $5)")
            .bind(veto.match_id.0)
            .bind(action.step_index as i16)
            .bind(action.slot.map(Slot::index))
            .bind(action.kind)
            .bind(&action.map_key)
            .execute(&mut **tx)
            .await?;
    }
    sqlx::query("DELETE FROM veto_sides WHERE match_id = $1").bind(veto.match_id.0).execute(&mut **tx).await?;
    for side in &veto.sides {
        sqlx::query("INSERT INTO veto_sides (match_id, map_key, slot1_side, chosen_by, source) VALUES ($1, $2, $3, $4, $5)")
            .bind(veto.match_id.0)
            .bind(&side.map_key)
            .bind(side.slot1_side)
            .bind(side.chosen_by.map(Slot::index))
            .bind(side.source)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
