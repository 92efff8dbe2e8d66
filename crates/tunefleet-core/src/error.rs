//! Error types for tunefleet

use thiserror::Error;

/// Main error type for tunefleet
#[derive(Error, Debug)]
pub enum TunefleetError {
    /// Malformed knob space, advisor setup, or config file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No node in the cluster could ever satisfy the request
    #[error("Invalid service request: {0}")]
    InvalidServiceRequest(String),

    /// Nodes exist but none has the free resources right now
    #[error("No capacity: {0}")]
    NoCapacity(String),

    /// Cluster backend unreachable or returned unusable state
    #[error("Cluster backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unknown params id
    #[error("Params not found: {0}")]
    NotFound(String),

    /// Param store read failure
    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// Param store write failure
    #[error("Storage write error: {0}")]
    StorageWrite(String),

    /// Failure inside the trainable unit (train/evaluate/dump/load)
    #[error("Training error: {0}")]
    Training(String),

    /// Job record not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TunefleetError {
    /// Whether this error came from the infrastructure (scheduler, param
    /// store, cluster backend) rather than from model code. The coordinator
    /// aborts a job after three consecutive infrastructure failures while
    /// training errors only fail their own trial.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            TunefleetError::InvalidServiceRequest(_)
                | TunefleetError::NoCapacity(_)
                | TunefleetError::BackendUnavailable(_)
                | TunefleetError::NotFound(_)
                | TunefleetError::StorageRead(_)
                | TunefleetError::StorageWrite(_)
        )
    }
}

/// Result type for tunefleet operations
pub type TunefleetResult<T> = Result<T, TunefleetError>;

impl From<serde_json::Error> for TunefleetError {
    fn from(err: serde_json::Error) -> Self {
        TunefleetError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TunefleetError {
    fn from(err: toml::de::Error) -> Self {
        TunefleetError::Configuration(err.to_string())
    }
}
