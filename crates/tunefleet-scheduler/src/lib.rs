//! Cluster scheduling for tunefleet
//!
//! This crate decides where training services run and keeps the cluster's
//! resource ledger honest:
//! - A node directory exposing per-node GPU and service-count labels
//! - Placement strategies choosing the least-loaded eligible node
//! - A container runtime seam for launching and removing services
//! - The scheduler tying these together with launch-then-claim ordering

pub mod directory;
pub mod placement;
pub mod runtime;
pub mod scheduler;

pub use directory::{
    decode_gpus, encode_gpus, InMemoryNodeDirectory, LedgerUpdate, NodeDirectory,
    LABEL_AVAILABLE_GPUS, LABEL_NUM_SERVICES,
};
pub use placement::{FewestServicesPlacement, PlacementDecision, PlacementStrategy};
pub use runtime::{ContainerRuntime, LaunchedService, RestartPolicy, ServiceLaunch, StubRuntime};
pub use scheduler::ClusterScheduler;
