//! Seed assignment.
//!
//! Signups arrive as `(entrant, optional seed)` pairs, ordered seeded first
//! (ascending), then unseeded in join order. [`seed_order`] turns that into
//! the definitive seed list the generators consume.

use crate::prelude::*;

/// Whether a tournament's entrants are solo players or teams. Resolved once
/// at the service boundary; past that point everything is an [`EntrantId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "participant_kind", rename_all = "snake_case")]
pub enum ParticipantKind {
    Player,
    Team,
}

serde_plain::derive_display_from_serialize!(ParticipantKind);
serde_plain::derive_fromstr_from_deserialize!(ParticipantKind);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("seed {seed} for entrant {entrant} is outside 1..={num_entrants}")]
    SeedOutOfRange {
        entrant: EntrantId,
        seed: i16,
        num_entrants: usize,
    },
    #[error("seed {seed} is assigned to both entrant {first} and entrant {second}")]
    DuplicateSeed {
        seed: i16,
        first: EntrantId,
        second: EntrantId,
    },
    #[error("entrant {0} appears more than once in the signup list")]
    DuplicateEntrant(EntrantId),
}

/// Orders entrants by seed: explicitly seeded entrants take their rank,
/// everyone else fills the remaining ranks in signup order. Index 0 of the
/// result is seed 1.
pub fn seed_order(entrants: &[(EntrantId, Option<i16>)]) -> Result<Vec<EntrantId>, Error> {
    let num_entrants = entrants.len();
    let mut seen = HashSet::new();
    for &(entrant, _) in entrants {
        if !seen.insert(entrant) {
            return Err(Error::DuplicateEntrant(entrant))
        }
    }
    let mut by_rank: Vec<Option<EntrantId>> = vec![None; num_entrants];
    for &(entrant, seed) in entrants {
        let Some(seed) = seed else { continue };
        if seed < 1 || seed as usize > num_entrants {
            return Err(Error::SeedOutOfRange { entrant, seed, num_entrants })
        }
        if let Some(first) = by_rank[seed as usize - 1] {
            return Err(Error::DuplicateSeed { seed, first, second: entrant })
        }
        by_rank[seed as usize - 1] = Some(entrant);
    }
    // exactly as many unseeded entrants as empty ranks remain
    let mut unseeded = entrants.iter().filter(|(_, seed)| seed.is_none()).map(|&(entrant, _)| entrant);
    let order = by_rank.into_iter().map(|rank| rank.or_else(|| unseeded.next())).flatten().collect_vec();
    debug_assert_eq!(order.len(), num_entrants);
    Ok(order)
}
