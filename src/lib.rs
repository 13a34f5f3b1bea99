//! Bracket and pick/ban engine for tournament operations.
//!
//! This crate owns the algorithmic core of a tournament backend: match
//! skeleton generation for single elimination, double elimination and round
//! robin, deterministic winner/loser propagation through the bracket graph
//! (byes, losers-bracket dead slots, the grand final bracket reset), the map
//! veto turn machine, and placement ranges derived from confirmed results.
//!
//! The engine is synchronous and stateless between calls. All match and veto
//! state lives in a [`store::BracketState`] (and [`draft::VetoState`]), which
//! the [`store::pg`] module loads from and saves to Postgres inside a
//! caller-supplied transaction. Routing, rendering, sessions and chat
//! integrations are the consumer's problem, not this crate's.

pub mod advance;
pub mod bracket;
pub mod config;
pub mod draft;
pub mod entrant;
pub mod generate;
pub mod id;
pub mod placement;
mod prelude;
pub mod report;
pub mod store;

pub use crate::{
    advance::{advance, reset_bracket},
    bracket::{BracketKind, Format, MatchKey, Slot},
    draft::{MatchConfig, Ruleset, VetoState, build_match_config, compute, normalize_tournament_ruleset},
    entrant::{ParticipantKind, seed_order},
    generate::generate,
    id::{EntrantId, MatchId, TournamentId},
    placement::{Placement, compute_placements},
    report::{ConfirmedResult, confirm_and_advance},
    store::{BracketState, Match, MatchStatus},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)] Advance(#[from] advance::Error),
    #[error(transparent)] Config(#[from] config::Error),
    #[error(transparent)] Draft(#[from] draft::Error),
    #[error(transparent)] Generate(#[from] generate::Error),
    #[error(transparent)] Report(#[from] report::Error),
    #[error(transparent)] Ruleset(#[from] draft::RulesetError),
    #[error(transparent)] Seed(#[from] entrant::Error),
    #[error(transparent)] Sql(#[from] sqlx::Error),
}
