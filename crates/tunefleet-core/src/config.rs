//! Configuration types for tunefleet

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{JobSpec, TrialBudget};
use crate::knob::{KnobSpace, Knobs};
use crate::proposal::AdvisorType;
use crate::{TunefleetError, TunefleetResult};

/// Main orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Cluster and placement configuration
    pub cluster: ClusterConfig,
    /// Param storage configuration
    pub storage: StorageConfig,
    /// Coordinator configuration
    pub coordinator: CoordinatorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> TunefleetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TunefleetError::Configuration(format!("failed to read config file: {}", e))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Cluster and placement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Network the worker services are attached to
    pub network: String,
    /// Attempts for a versioned ledger claim before giving up
    pub claim_retries: u32,
    /// Nodes to seed the in-memory directory with (local / test runs)
    pub nodes: Vec<NodeSeed>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            network: "tunefleet".to_string(),
            claim_retries: 3,
            nodes: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Network name, overridable via the `TUNEFLEET_NETWORK` environment
    /// variable.
    pub fn network_name(&self) -> String {
        std::env::var("TUNEFLEET_NETWORK").unwrap_or_else(|_| self.network.clone())
    }
}

/// A node entry for seeding the in-memory directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSeed {
    /// Node identifier
    pub id: String,
    /// GPU indices the node starts out with
    #[serde(default)]
    pub gpus: Vec<u32>,
}

/// Param storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the file-backed param store writes to
    pub params_dir: PathBuf,
    /// In-memory params cache capacity in bytes
    pub cache_capacity_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            params_dir: PathBuf::from("/var/lib/tunefleet/params"),
            cache_capacity_bytes: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Image the worker services run
    pub worker_image: String,
    /// Provisioning attempts per worker when the cluster backend is
    /// unavailable
    pub provision_retries: u32,
    /// Initial backoff between provisioning attempts, in milliseconds
    /// (doubles per retry)
    pub provision_backoff_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_image: "tunefleet/worker:latest".to_string(),
            provision_retries: 3,
            provision_backoff_ms: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Tuning job submission file format (TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job settings
    pub job: JobSettings,
    /// Knob space the advisor searches over
    #[serde(default)]
    pub knobs: KnobSpace,
    /// Literal configurations for the FIXED strategy
    #[serde(default)]
    pub fixed_configs: Vec<Knobs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    pub app_name: String,
    pub model_class: String,
    pub advisor: AdvisorType,
    pub max_trials: Option<u64>,
    pub workers: Option<u32>,
    pub gpu: Option<bool>,
    pub params_fallback: Option<bool>,
    pub trial_timeout_secs: Option<u64>,
    pub train_dataset: Option<String>,
    pub val_dataset: Option<String>,
    pub features: Option<Vec<String>>,
    pub target: Option<String>,
}

impl JobConfig {
    /// Load a job submission from a TOML file
    pub fn from_file(path: &std::path::Path) -> TunefleetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TunefleetError::Configuration(format!("failed to read job file: {}", e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Materialize the runtime job spec, applying defaults for omitted
    /// settings.
    pub fn to_spec(&self) -> TunefleetResult<JobSpec> {
        let settings = &self.job;
        let mut spec = JobSpec::new(
            settings.app_name.clone(),
            settings.model_class.clone(),
            settings.advisor,
        );
        if let Some(max_trials) = settings.max_trials {
            spec.budget = TrialBudget { max_trials };
        }
        if let Some(workers) = settings.workers {
            spec.worker_count = workers;
        }
        if let Some(gpu) = settings.gpu {
            spec.gpu_required = gpu;
        }
        if let Some(fallback) = settings.params_fallback {
            spec.params_fallback = fallback;
        }
        if let Some(timeout) = settings.trial_timeout_secs {
            spec.trial_timeout_secs = timeout;
        }
        if let Some(uri) = &settings.train_dataset {
            spec.train_dataset_uri = uri.clone();
        }
        if let Some(uri) = &settings.val_dataset {
            spec.val_dataset_uri = uri.clone();
        }
        if let Some(features) = &settings.features {
            spec.features = features.clone();
        }
        spec.target = settings.target.clone();
        spec.validate()?;
        Ok(spec)
    }
}
