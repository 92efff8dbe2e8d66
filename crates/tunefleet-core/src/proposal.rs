//! Proposal, trial result, and trial lifecycle types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::knob::Knobs;
use crate::{TunefleetError, TunefleetResult};

/// Which previously trained parameters a worker loads before training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamsType {
    /// Latest result-bearing trial of this job
    LocalRecent,
    /// Best-scoring trial of this job
    LocalBest,
    /// Latest persisted trial across jobs sharing the model class
    GlobalRecent,
    /// Best persisted trial across jobs sharing the model class
    GlobalBest,
    /// Train from scratch
    None,
}

impl std::fmt::Display for ParamsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamsType::LocalRecent => write!(f, "LOCAL_RECENT"),
            ParamsType::LocalBest => write!(f, "LOCAL_BEST"),
            ParamsType::GlobalRecent => write!(f, "GLOBAL_RECENT"),
            ParamsType::GlobalBest => write!(f, "GLOBAL_BEST"),
            ParamsType::None => write!(f, "NONE"),
        }
    }
}

/// Search strategy selector
///
/// All strategies of the wire protocol are declared; only FIXED and RANDOM
/// are implemented here. Selecting an unimplemented one fails fast at
/// advisor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisorType {
    Fixed,
    Random,
    BayesOpt,
    BayesOptWithParamSharing,
    Enas,
}

impl std::fmt::Display for AdvisorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorType::Fixed => write!(f, "FIXED"),
            AdvisorType::Random => write!(f, "RANDOM"),
            AdvisorType::BayesOpt => write!(f, "BAYES_OPT"),
            AdvisorType::BayesOptWithParamSharing => write!(f, "BAYES_OPT_WITH_PARAM_SHARING"),
            AdvisorType::Enas => write!(f, "ENAS"),
        }
    }
}

/// An advisor's instruction for one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Trial number within the job, strictly increasing
    pub trial_no: u64,
    /// Knob configuration to train with
    pub knobs: Knobs,
    /// Which prior parameters to load before training
    pub params_type: ParamsType,
    /// Whether to evaluate and report a score after training
    pub to_eval: bool,
    /// Whether to keep the trained parameters in the worker-side cache
    pub to_cache_params: bool,
    /// Whether to persist the trained parameters to the param store
    pub to_save_params: bool,
    /// Opaque strategy-specific annotations, passed through untouched
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Identifier of the trial that executed this proposal, set by the worker
    #[serde(default)]
    pub trial_id: Option<String>,
}

impl Proposal {
    /// Create a proposal with the default flags: train from scratch,
    /// evaluate, persist parameters, skip the cache.
    pub fn new(trial_no: u64, knobs: Knobs) -> Self {
        Self {
            trial_no,
            knobs,
            params_type: ParamsType::None,
            to_eval: true,
            to_cache_params: false,
            to_save_params: true,
            meta: BTreeMap::new(),
            trial_id: None,
        }
    }
}

/// Outcome of one executed trial, as reported back to the advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// The proposal that was executed
    pub proposal: Proposal,
    /// Evaluation score; present iff the proposal asked for evaluation and
    /// training completed without error
    pub score: Option<f64>,
}

impl TrialResult {
    pub fn new(proposal: Proposal, score: Option<f64>) -> Self {
        Self { proposal, score }
    }
}

/// Trial lifecycle state
///
/// `Proposed → Running → { Scored, Errored }`; terminal exactly once, the
/// running stage is never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialStatus {
    /// Proposal issued, execution not yet begun
    Proposed,
    /// Training in progress on a worker
    Running,
    /// Finished without error (score may still be absent for
    /// train-only trials)
    Scored,
    /// Failed during execution
    Errored,
}

impl TrialStatus {
    /// Whether the state machine allows moving to `next` from here.
    pub fn can_transition_to(self, next: TrialStatus) -> bool {
        matches!(
            (self, next),
            (TrialStatus::Proposed, TrialStatus::Running)
                | (TrialStatus::Running, TrialStatus::Scored)
                | (TrialStatus::Running, TrialStatus::Errored)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TrialStatus::Scored | TrialStatus::Errored)
    }
}

impl std::fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialStatus::Proposed => write!(f, "PROPOSED"),
            TrialStatus::Running => write!(f, "RUNNING"),
            TrialStatus::Scored => write!(f, "SCORED"),
            TrialStatus::Errored => write!(f, "ERRORED"),
        }
    }
}

/// Bookkeeping record for one trial of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Unique trial identifier
    pub trial_id: String,
    /// Trial number within the job
    pub trial_no: u64,
    /// Knob configuration the trial ran with
    pub knobs: Knobs,
    /// Current lifecycle state
    pub status: TrialStatus,
    /// Evaluation score, once scored
    pub score: Option<f64>,
    /// Param store id of the persisted parameters, if any
    pub params_id: Option<String>,
}

impl TrialRecord {
    /// Create a record in the `Proposed` state.
    pub fn new(trial_id: String, trial_no: u64, knobs: Knobs) -> Self {
        Self {
            trial_id,
            trial_no,
            knobs,
            status: TrialStatus::Proposed,
            score: None,
            params_id: None,
        }
    }

    /// Advance the lifecycle state, rejecting transitions the state machine
    /// does not allow.
    pub fn transition(&mut self, next: TrialStatus) -> TunefleetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TunefleetError::Internal(format!(
                "invalid trial transition {} -> {} for trial {}",
                self.status, next, self.trial_id
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knob::KnobValue;

    fn knobs() -> Knobs {
        let mut k = Knobs::new();
        k.insert("C".to_string(), KnobValue::Int(2));
        k
    }

    #[test]
    fn test_proposal_defaults() {
        let proposal = Proposal::new(0, knobs());
        assert_eq!(proposal.params_type, ParamsType::None);
        assert!(proposal.to_eval);
        assert!(!proposal.to_cache_params);
        assert!(proposal.to_save_params);
        assert!(proposal.trial_id.is_none());
    }

    #[test]
    fn test_params_type_wire_values() {
        assert_eq!(
            serde_json::to_string(&ParamsType::LocalRecent).unwrap(),
            "\"LOCAL_RECENT\""
        );
        let parsed: ParamsType = serde_json::from_str("\"GLOBAL_BEST\"").unwrap();
        assert_eq!(parsed, ParamsType::GlobalBest);
    }

    #[test]
    fn test_advisor_type_wire_values() {
        assert_eq!(serde_json::to_string(&AdvisorType::Fixed).unwrap(), "\"FIXED\"");
        let parsed: AdvisorType = serde_json::from_str("\"BAYES_OPT_WITH_PARAM_SHARING\"").unwrap();
        assert_eq!(parsed, AdvisorType::BayesOptWithParamSharing);
    }

    #[test]
    fn test_trial_lifecycle() {
        let mut record = TrialRecord::new("t-1".to_string(), 0, knobs());
        assert_eq!(record.status, TrialStatus::Proposed);
        record.transition(TrialStatus::Running).unwrap();
        record.transition(TrialStatus::Scored).unwrap();
        assert!(record.status.is_terminal());
    }

    #[test]
    fn test_trial_cannot_skip_running() {
        let mut record = TrialRecord::new("t-1".to_string(), 0, knobs());
        assert!(record.transition(TrialStatus::Scored).is_err());
        assert!(record.transition(TrialStatus::Errored).is_err());
    }

    #[test]
    fn test_trial_terminal_once() {
        let mut record = TrialRecord::new("t-1".to_string(), 0, knobs());
        record.transition(TrialStatus::Running).unwrap();
        record.transition(TrialStatus::Errored).unwrap();
        assert!(record.transition(TrialStatus::Scored).is_err());
        assert!(record.transition(TrialStatus::Running).is_err());
    }
}
