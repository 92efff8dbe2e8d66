//! Tuning job types: spec, budget, status, and the external job record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::proposal::AdvisorType;
use crate::{TunefleetError, TunefleetResult};

/// How much work a job is allowed to spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBudget {
    /// Total number of trials to run
    pub max_trials: u64,
}

impl Default for TrialBudget {
    fn default() -> Self {
        Self { max_trials: 10 }
    }
}

/// Description of a tuning job to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique job identifier
    pub id: String,
    /// Application this job tunes models for
    pub app_name: String,
    /// Model class the trainable units belong to; scopes GLOBAL params
    /// resolution across jobs
    pub model_class: String,
    /// Search strategy to drive the job with
    pub advisor: AdvisorType,
    /// Trial budget
    pub budget: TrialBudget,
    /// Number of worker services to provision; also the concurrent-trial
    /// limit
    pub worker_count: u32,
    /// Whether each worker requires an exclusive GPU
    pub gpu_required: bool,
    /// Whether a failed prior-params load degrades to training from scratch
    /// (true) or errors the trial (false)
    pub params_fallback: bool,
    /// Wall-clock limit for a single trial's train + evaluate, in seconds;
    /// 0 disables the limit
    pub trial_timeout_secs: u64,
    /// Training dataset location, passed through to the trainable unit
    pub train_dataset_uri: String,
    /// Validation dataset location, used when a proposal asks for evaluation
    pub val_dataset_uri: String,
    /// Feature columns to train on; empty means all
    #[serde(default)]
    pub features: Vec<String>,
    /// Target column
    #[serde(default)]
    pub target: Option<String>,
}

impl JobSpec {
    /// Create a job spec with default knobs-agnostic settings.
    pub fn new(app_name: String, model_class: String, advisor: AdvisorType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            app_name,
            model_class,
            advisor,
            budget: TrialBudget::default(),
            worker_count: 1,
            gpu_required: false,
            params_fallback: true,
            trial_timeout_secs: 600,
            train_dataset_uri: String::new(),
            val_dataset_uri: String::new(),
            features: Vec::new(),
            target: None,
        }
    }

    pub fn validate(&self) -> TunefleetResult<()> {
        if self.app_name.is_empty() {
            return Err(TunefleetError::Configuration(
                "job app_name must not be empty".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(TunefleetError::Configuration(
                "job worker_count must be at least 1".to_string(),
            ));
        }
        if self.budget.max_trials == 0 {
            return Err(TunefleetError::Configuration(
                "job budget must allow at least 1 trial".to_string(),
            ));
        }
        Ok(())
    }
}

/// Train job lifecycle state, surfaced to external observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainJobStatus {
    /// Record created, workers being provisioned
    Started,
    /// Workers provisioned, trials executing
    Running,
    /// Stopped on external request
    Stopped,
    /// Aborted by the failure policy or failed provisioning
    Errored,
    /// Budget spent, wound down cleanly
    Completed,
}

impl TrainJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrainJobStatus::Stopped | TrainJobStatus::Errored | TrainJobStatus::Completed
        )
    }

    /// Whether the lifecycle allows moving to `next` from here. A job may
    /// reach a terminal state straight from `Started` (provisioning failed
    /// or stop arrived early).
    pub fn can_transition_to(self, next: TrainJobStatus) -> bool {
        match self {
            TrainJobStatus::Started => next != TrainJobStatus::Started,
            TrainJobStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TrainJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainJobStatus::Started => write!(f, "STARTED"),
            TrainJobStatus::Running => write!(f, "RUNNING"),
            TrainJobStatus::Stopped => write!(f, "STOPPED"),
            TrainJobStatus::Errored => write!(f, "ERRORED"),
            TrainJobStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Persistence shape of a job, read and written through `JobRecordStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub app_name: String,
    pub status: TrainJobStatus,
    pub datetime_started: Option<DateTime<Utc>>,
    pub datetime_completed: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a record in the `Started` state, stamped now.
    pub fn new(id: String, app_name: String) -> Self {
        Self {
            id,
            app_name,
            status: TrainJobStatus::Started,
            datetime_started: Some(Utc::now()),
            datetime_completed: None,
        }
    }

    /// Advance the lifecycle state; terminal states also stamp
    /// `datetime_completed`.
    pub fn transition(&mut self, next: TrainJobStatus) -> TunefleetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TunefleetError::Internal(format!(
                "invalid job transition {} -> {} for job {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.datetime_completed = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_new() {
        let spec = JobSpec::new(
            "fraud-detection".to_string(),
            "SVCClf".to_string(),
            AdvisorType::Random,
        );
        assert_eq!(spec.worker_count, 1);
        assert_eq!(spec.budget.max_trials, 10);
        assert!(spec.params_fallback);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_job_spec_rejects_zero_workers() {
        let mut spec = JobSpec::new("app".to_string(), "M".to_string(), AdvisorType::Fixed);
        spec.worker_count = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_job_record_lifecycle() {
        let mut record = JobRecord::new("job-1".to_string(), "app".to_string());
        assert_eq!(record.status, TrainJobStatus::Started);
        assert!(record.datetime_started.is_some());
        assert!(record.datetime_completed.is_none());

        record.transition(TrainJobStatus::Running).unwrap();
        record.transition(TrainJobStatus::Completed).unwrap();
        assert!(record.datetime_completed.is_some());
    }

    #[test]
    fn test_job_record_terminal_once() {
        let mut record = JobRecord::new("job-1".to_string(), "app".to_string());
        record.transition(TrainJobStatus::Errored).unwrap();
        assert!(record.transition(TrainJobStatus::Running).is_err());
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&TrainJobStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }
}
