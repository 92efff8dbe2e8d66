//! Trial coordination for tunefleet
//!
//! This crate drives tuning jobs end to end:
//! - The `Trainable`/`TrainableFactory` seam model integrations implement
//! - A cross-trial parameter registry backing `params_type` resolution
//! - Job record persistence
//! - The coordinator running propose → train → evaluate → persist loops
//!   across provisioned workers, with the job failure policy

pub mod coordinator;
pub mod jobs;
pub mod registry;
pub mod trainable;

pub use coordinator::{JobContext, JobOutcome, TrialCoordinator};
pub use jobs::{InMemoryJobStore, JobRecordStore};
pub use registry::{ParamsEntry, ParamsRegistry};
pub use trainable::{Trainable, TrainableFactory};
