//! The map veto (pick/ban) turn machine.
//!
//! Everything here is replayable: a veto's persistent record is its config
//! snapshot, who acts first, an append-only action list and the side choices,
//! and [`compute`] derives the entire current situation from those alone. The
//! mutating operations on [`VetoState`] just validate against the computed
//! state and append.
//!
//! A side choice interleaves with the sequence: after every pick (and after
//! the decider) the sequence stops until the opponent of whoever picked
//! (for the decider: the side that did not start the veto) has chosen their
//! starting side. The decider itself is never chosen by anyone; once a single
//! map remains it is appended automatically.

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Always the side that acts first in the veto.
    Starter,
    /// Always the other side.
    Other,
    /// Flips once per previous ban or pick, whoever made it.
    Alternate,
    /// Either side may act; sequences use this for mutually agreed steps.
    Any,
}

/// A step of a veto sequence. The decider carries no actor: nobody chooses
/// it, which makes an "actor on a decider" unrepresentable rather than a
/// runtime validation case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", content = "actor", rename_all = "snake_case")]
pub enum Step {
    Ban(Actor),
    Pick(Actor),
    Decider,
}

impl Step {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Ban(_) => ActionKind::Ban,
            Self::Pick(_) => ActionKind::Pick,
            Self::Decider => ActionKind::Decider,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "veto_action_kind", rename_all = "snake_case")]
pub enum ActionKind {
    Ban,
    Pick,
    Decider,
}

serde_plain::derive_display_from_serialize!(ActionKind);
serde_plain::derive_fromstr_from_deserialize!(ActionKind);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MapInfo {
    pub key: String,
    pub name: String,
}

/// A tournament's veto rules: one map pool shared by step sequences keyed by
/// the best-of they apply to. Stored as JSON; run it through
/// [`normalize_tournament_ruleset`] before accepting it from anywhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Ruleset {
    pub pool: Vec<MapInfo>,
    pub sequences: BTreeMap<i16, Vec<Step>>,
}

impl Ruleset {
    pub fn sequence(&self, best_of: i16) -> Option<&[Step]> {
        self.sequences.get(&best_of).map(|steps| &**steps)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RulesetError {
    #[error("map pool needs at least 3 maps, got {0}")]
    PoolTooSmall(usize),
    #[error("{0:?} is not a valid map key (lowercase letters, digits and dashes, 64 characters at most)")]
    BadMapKey(String),
    #[error("map key {0:?} appears more than once in the pool")]
    DuplicateMapKey(String),
    #[error("best of {best_of}: expected exactly one decider step, got {count}")]
    DeciderCount {
        best_of: i16,
        count: usize,
    },
    #[error("best of {best_of}: the decider step must be the last one")]
    DeciderNotLast {
        best_of: i16,
    },
    #[error("best of {best_of}: {picks} picks plus the decider make a best of {}", .picks + 1)]
    PickCount {
        best_of: i16,
        picks: usize,
    },
    #[error("best of {best_of}: {bans} bans and {picks} picks must use up all but one of the {pool_size} maps")]
    StepCount {
        best_of: i16,
        bans: usize,
        picks: usize,
        pool_size: usize,
    },
}

/// Full structural validation of a ruleset. No partial acceptance: the first
/// violation is an error with enough context to fix it.
pub fn normalize_tournament_ruleset(ruleset: Ruleset) -> Result<Ruleset, RulesetError> {
    if ruleset.pool.len() < 3 {
        return Err(RulesetError::PoolTooSmall(ruleset.pool.len()))
    }
    let mut keys = HashSet::new();
    for map in &ruleset.pool {
        if !lazy_regex::regex_is_match!("^[a-z0-9][a-z0-9-]{0,63}$", &map.key) {
            return Err(RulesetError::BadMapKey(map.key.clone()))
        }
        if !keys.insert(map.key.as_str()) {
            return Err(RulesetError::DuplicateMapKey(map.key.clone()))
        }
    }
    for (&best_of, steps) in &ruleset.sequences {
        let deciders = steps.iter().filter(|step| step.kind() == ActionKind::Decider).count();
        if deciders != 1 {
            return Err(RulesetError::DeciderCount { best_of, count: deciders })
        }
        if steps.last().map(Step::kind) != Some(ActionKind::Decider) {
            return Err(RulesetError::DeciderNotLast { best_of })
        }
        let picks = steps.iter().filter(|step| step.kind() == ActionKind::Pick).count();
        let bans = steps.iter().filter(|step| step.kind() == ActionKind::Ban).count();
        if picks as i16 + 1 != best_of {
            return Err(RulesetError::PickCount { best_of, picks })
        }
        if bans + picks != ruleset.pool.len() - 1 {
            return Err(RulesetError::StepCount { best_of, bans, picks, pool_size: ruleset.pool.len() })
        }
    }
    Ok(ruleset)
}

/// The per-match snapshot of pool and sequence. Frozen when the veto starts,
/// so a later ruleset edit can't shift a running sequence under the players.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatchConfig {
    pub pool: Vec<MapInfo>,
    pub steps: Vec<Step>,
    pub best_of: i16,
}

/// Snapshots the ruleset for one match, or `None` if the ruleset has no
/// sequence for this best-of.
pub fn build_match_config(ruleset: &Ruleset, best_of: i16) -> Option<MatchConfig> {
    Some(MatchConfig {
        pool: ruleset.pool.clone(),
        steps: ruleset.sequence(best_of)?.to_vec(),
        best_of,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "map_side", rename_all = "snake_case")]
pub enum Side {
    Attack,
    Defense,
}

serde_plain::derive_display_from_serialize!(Side);
serde_plain::derive_fromstr_from_deserialize!(Side);

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Attack => Self::Defense,
            Self::Defense => Self::Attack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "side_source", rename_all = "snake_case")]
pub enum SideSource {
    Choice,
    Coin,
}

serde_plain::derive_display_from_serialize!(SideSource);
serde_plain::derive_fromstr_from_deserialize!(SideSource);

/// The starting side for one map that will be played.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MapSide {
    pub map_key: String,
    /// The side slot 1 starts on; slot 2 gets the other one.
    pub slot1_side: Side,
    pub chosen_by: Option<Slot>,
    pub source: SideSource,
}

/// One recorded veto action. `slot` is `None` for the auto-appended decider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VetoAction {
    pub step_index: usize,
    pub slot: Option<Slot>,
    pub kind: ActionKind,
    pub map_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the pick/ban sequence for this match has not started")]
    NotStarted,
    #[error("the pick/ban sequence is locked")]
    Locked,
    #[error("it is not {0}'s turn")]
    NotYourTurn(Slot),
    #[error("map {0:?} is not available")]
    MapUnavailable(String),
    #[error("a side choice for {0:?} is still pending")]
    SideChoicePending(String),
    #[error("the recorded pick/ban history is inconsistent: {0}")]
    InvalidSequence(String),
}

/// What has to happen next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredStep {
    /// Who acts first has to be settled (coin toss or higher seed) before
    /// anything else. That resolution happens outside the engine.
    FirstTurn,
    /// A ban or pick by `slot`, or by either side when `slot` is `None`.
    Veto {
        step_index: usize,
        kind: ActionKind,
        slot: Option<Slot>,
    },
    /// Exactly one map is left; it is played without anyone choosing it.
    Decider {
        map_key: String,
    },
    /// `slot` chooses the starting side on `map_key`.
    Side {
        map_key: String,
        slot: Slot,
    },
}

/// A map that will be played, in playing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMap {
    pub map_key: String,
    /// `None` for the decider.
    pub picked_by: Option<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedState {
    /// `None` once everything, side choices included, is settled: a caller
    /// observing this finalizes the lock.
    pub next: Option<RequiredStep>,
    /// Map keys not acted on yet, pool order preserved.
    pub available: Vec<String>,
    /// Picks in order, decider last.
    pub maps: Vec<PlayedMap>,
    /// Every sequence step has an action (side choices may still be open).
    pub complete: bool,
}

/// Replays a veto from its persistent record. Pure: same inputs, same result.
pub fn compute(config: &MatchConfig, first_turn: Option<Slot>, actions: &[VetoAction], sides: &[MapSide]) -> Result<ComputedState, Error> {
    let mut used = HashSet::new();
    let mut maps = Vec::new();
    let mut turns_taken = 0usize;
    for (position, action) in actions.iter().enumerate() {
        if action.step_index != position {
            return Err(Error::InvalidSequence(format!("action {position} carries step index {}", action.step_index)))
        }
        let Some(step) = config.steps.get(position) else {
            return Err(Error::InvalidSequence(format!("action {position} is past the end of the sequence")))
        };
        if step.kind() != action.kind {
            return Err(Error::InvalidSequence(format!("action {position} is a {} where the sequence expects a {}", action.kind, step.kind())))
        }
        if !config.pool.iter().any(|map| map.key == action.map_key) {
            return Err(Error::InvalidSequence(format!("map {:?} is not in the pool", action.map_key)))
        }
        if !used.insert(action.map_key.as_str()) {
            return Err(Error::InvalidSequence(format!("map {:?} was acted on twice", action.map_key)))
        }
        match action.kind {
            ActionKind::Ban => turns_taken += 1,
            ActionKind::Pick => {
                maps.push(PlayedMap { map_key: action.map_key.clone(), picked_by: action.slot });
                turns_taken += 1;
            }
            ActionKind::Decider => maps.push(PlayedMap { map_key: action.map_key.clone(), picked_by: None }),
        }
    }
    let mut sided = HashSet::new();
    for side in sides {
        if !maps.iter().any(|map| map.map_key == side.map_key) {
            return Err(Error::InvalidSequence(format!("side recorded for map {:?} which will not be played", side.map_key)))
        }
        if !sided.insert(side.map_key.as_str()) {
            return Err(Error::InvalidSequence(format!("two sides recorded for map {:?}", side.map_key)))
        }
    }
    let available = config.pool.iter().filter(|map| !used.contains(map.key.as_str())).map(|map| map.key.clone()).collect_vec();
    let complete = actions.len() == config.steps.len();

    let pending_side = actions
        .iter()
        .find(|action| matches!(action.kind, ActionKind::Pick | ActionKind::Decider) && !sided.contains(action.map_key.as_str()));
    let next = if let Some(action) = pending_side {
        let Some(first_turn) = first_turn else {
            return Err(Error::InvalidSequence("actions recorded before the first turn was settled".to_owned()))
        };
        let slot = match action.kind {
            ActionKind::Pick => match action.slot {
                // the opponent of whoever picked chooses their side
                Some(slot) => slot.other(),
                None => return Err(Error::InvalidSequence(format!("pick of {:?} carries no slot", action.map_key))),
            },
            // on the decider, the side that did not start the veto chooses
            _ => first_turn.other(),
        };
        Some(RequiredStep::Side { map_key: action.map_key.clone(), slot })
    } else if complete {
        None
    } else if let Some(first_turn) = first_turn {
        match config.steps[actions.len()] {
            Step::Decider => {
                // structurally guaranteed by ruleset validation; a mismatch
                // means the stored history is broken
                if available.len() != 1 {
                    return Err(Error::InvalidSequence(format!("decider step reached with {} maps still available", available.len())))
                }
                Some(RequiredStep::Decider { map_key: available[0].clone() })
            }
            Step::Ban(actor) | Step::Pick(actor) => {
                let slot = match actor {
                    Actor::Starter => Some(first_turn),
                    Actor::Other => Some(first_turn.other()),
                    Actor::Alternate => Some(if turns_taken % 2 == 0 { first_turn } else { first_turn.other() }),
                    Actor::Any => None,
                };
                Some(RequiredStep::Veto {
                    step_index: actions.len(),
                    kind: config.steps[actions.len()].kind(),
                    slot,
                })
            }
        }
    } else {
        Some(RequiredStep::FirstTurn)
    };
    Ok(ComputedState { next, available, maps, complete })
}

/// One match's veto record: the config snapshot plus everything that has
/// happened so far, replayable through [`compute`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VetoState {
    pub match_id: MatchId,
    pub config: MatchConfig,
    pub first_turn: Option<Slot>,
    pub actions: Vec<VetoAction>,
    pub sides: Vec<MapSide>,
    pub locked: bool,
}

impl VetoState {
    pub fn new(match_id: MatchId, config: MatchConfig) -> Self {
        Self {
            match_id, config,
            first_turn: None,
            actions: Vec::default(),
            sides: Vec::default(),
            locked: false,
        }
    }

    pub fn compute(&self) -> Result<ComputedState, Error> {
        compute(&self.config, self.first_turn, &self.actions, &self.sides)
    }

    /// Resolves who acts first. How that was decided (coin toss, higher
    /// seed, agreement) is the caller's business.
    pub fn set_first_turn(&mut self, slot: Slot) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked)
        }
        if !self.actions.is_empty() {
            return Err(Error::InvalidSequence("the first turn is already in effect".to_owned()))
        }
        self.first_turn = Some(slot);
        Ok(())
    }

    /// A ban or pick of `map_key` by `slot`, matching the current step.
    pub fn act(&mut self, slot: Slot, map_key: &str) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked)
        }
        let computed = self.compute()?;
        match computed.next {
            None => return Err(Error::Locked),
            Some(RequiredStep::FirstTurn) => return Err(Error::NotStarted),
            Some(RequiredStep::Side { map_key, .. }) => return Err(Error::SideChoicePending(map_key)),
            Some(RequiredStep::Decider { .. }) => return Err(Error::InvalidSequence("the decider is selected automatically".to_owned())),
            Some(RequiredStep::Veto { step_index, kind, slot: expected }) => {
                if expected.is_some_and(|expected| expected != slot) {
                    return Err(Error::NotYourTurn(slot))
                }
                if !computed.available.iter().any(|key| key == map_key) {
                    return Err(Error::MapUnavailable(map_key.to_owned()))
                }
                log::debug!("match {}: {slot} plays {kind} on {map_key:?}", self.match_id);
                self.actions.push(VetoAction { step_index, slot: Some(slot), kind, map_key: map_key.to_owned() });
            }
        }
        self.settle()
    }

    /// `slot` chooses the starting side for the pending map.
    pub fn choose_side(&mut self, slot: Slot, side: Side) -> Result<(), Error> {
        let map_key = self.pending_side(slot)?;
        let slot1_side = slot.choose(side, side.other());
        self.sides.push(MapSide { map_key, slot1_side, chosen_by: Some(slot), source: SideSource::Choice });
        self.settle()
    }

    /// Side settled by coin flip rather than choice; the flip itself happens
    /// at the caller.
    pub fn coin_side(&mut self, slot1_side: Side) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked)
        }
        let Some(RequiredStep::Side { map_key, .. }) = self.compute()?.next else {
            return Err(Error::InvalidSequence("no side choice is pending".to_owned()))
        };
        self.sides.push(MapSide { map_key, slot1_side, chosen_by: None, source: SideSource::Coin });
        self.settle()
    }

    fn pending_side(&self, slot: Slot) -> Result<String, Error> {
        if self.locked {
            return Err(Error::Locked)
        }
        match self.compute()?.next {
            Some(RequiredStep::Side { map_key, slot: chooser }) => if slot == chooser {
                Ok(map_key)
            } else {
                Err(Error::NotYourTurn(slot))
            },
            Some(RequiredStep::FirstTurn) => Err(Error::NotStarted),
            Some(_) | None => Err(Error::InvalidSequence("no side choice is pending".to_owned())),
        }
    }

    /// Appends decider actions as soon as they become due and locks the
    /// record once nothing is left to do.
    fn settle(&mut self) -> Result<(), Error> {
        loop {
            match self.compute()?.next {
                Some(RequiredStep::Decider { map_key }) => {
                    let step_index = self.actions.len();
                    log::debug!("match {}: {map_key:?} is the decider", self.match_id);
                    self.actions.push(VetoAction { step_index, slot: None, kind: ActionKind::Decider, map_key });
                }
                Some(_) => return Ok(()),
                None => {
                    self.locked = true;
                    log::debug!("match {}: pick/ban locked", self.match_id);
                    return Ok(())
                }
            }
        }
    }
}
