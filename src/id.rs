//! Strongly typed ids.
//!
//! The engine never cares whether an entrant is a solo player or a team; both
//! are rows in the same signup table and both travel through the bracket as an
//! [`EntrantId`]. Separate newtypes keep tournament, entrant and match ids
//! from being swapped by accident.

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, derive_more::Display, derive_more::From, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TournamentId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, derive_more::Display, derive_more::From, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct EntrantId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, derive_more::Display, derive_more::From, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct MatchId(pub i64);
