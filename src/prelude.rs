pub(crate) use {
    std::{
        collections::{
            BTreeMap,
            BTreeSet,
            HashSet,
            VecDeque,
        },
        fmt,
    },
    chrono::prelude::*,
    itertools::Itertools as _,
    serde::{
        Deserialize,
        Serialize,
    },
    crate::{
        bracket::{
            BracketKind,
            Format,
            MatchKey,
            Slot,
        },
        id::{
            EntrantId,
            MatchId,
            TournamentId,
        },
        store::{
            BracketState,
            Match,
            MatchStatus,
        },
    },
};
