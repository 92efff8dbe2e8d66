//! Cluster node and container service types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A node of the cluster as seen through the node directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Backend-assigned node identifier
    pub id: String,
    /// GPU indices currently free for exclusive assignment
    pub available_gpus: BTreeSet<u32>,
    /// Number of services currently placed on this node
    pub num_services: u32,
    /// Ledger version for compare-and-swap updates; 0 when the backend
    /// does not version its records
    pub revision: u64,
}

impl ClusterNode {
    pub fn new(id: String, available_gpus: BTreeSet<u32>, num_services: u32) -> Self {
        Self {
            id,
            available_gpus,
            num_services,
            revision: 0,
        }
    }

    pub fn has_free_gpu(&self) -> bool {
        !self.available_gpus.is_empty()
    }
}

/// Hardware a service must be placed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRequirement {
    /// Any node will do
    Cpu,
    /// Needs one exclusively assigned GPU
    Gpu,
}

impl std::fmt::Display for ServiceRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceRequirement::Cpu => write!(f, "cpu"),
            ServiceRequirement::Gpu => write!(f, "gpu"),
        }
    }
}

/// What to run and where it may be placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name, unique within the cluster
    pub name: String,
    /// Container image reference
    pub image: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Host path to container path mounts
    pub mounts: BTreeMap<String, String>,
    /// Container port to publish, if any
    pub publish_port: Option<u16>,
    /// Number of replicas
    pub replicas: u32,
    /// Hardware requirement
    pub requirement: ServiceRequirement,
}

impl ServiceSpec {
    /// Create a spec with default values: one CPU replica, nothing published.
    pub fn new(name: String, image: String) -> Self {
        Self {
            name,
            image,
            args: Vec::new(),
            env: BTreeMap::new(),
            mounts: BTreeMap::new(),
            publish_port: None,
            replicas: 1,
            requirement: ServiceRequirement::Cpu,
        }
    }

    pub fn with_gpu(mut self) -> Self {
        self.requirement = ServiceRequirement::Gpu;
        self
    }
}

/// The exact allocation a service was created with; teardown releases
/// precisely these resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementInfo {
    /// Node the service was placed on
    pub node_id: String,
    /// GPU index assigned exclusively to this service, if any
    pub gpu_no: Option<u32>,
    /// Service name used at launch
    pub service_name: String,
    /// Replica count at creation
    pub replicas: u32,
}

/// A running service handle returned by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerService {
    /// Runtime-assigned service identifier
    pub id: String,
    /// Hostname the service is reachable at
    pub hostname: String,
    /// Published port, if one was requested
    pub port: Option<u16>,
    /// Allocation recorded at creation
    pub info: PlacementInfo,
}
