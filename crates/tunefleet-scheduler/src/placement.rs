//! Worker placement decisions

use tunefleet_core::{ClusterNode, ServiceRequirement, TunefleetError, TunefleetResult};

/// Placement decision for a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    /// Node to place the service on
    pub node_id: String,
    /// GPU index to assign exclusively, when one is required
    pub gpu_no: Option<u32>,
}

/// Strategy for making placement decisions
pub trait PlacementStrategy: Send + Sync {
    /// Pick a node (and GPU, if required) for a new service.
    fn place(
        &self,
        nodes: &[ClusterNode],
        requirement: ServiceRequirement,
    ) -> TunefleetResult<PlacementDecision>;
}

/// Default placement: fewest services first
///
/// GPU-requiring services only consider nodes with a free GPU. Among the
/// eligible nodes the one with the fewest placed services wins, ties broken
/// by ascending node id; the smallest free GPU index is taken.
pub struct FewestServicesPlacement;

impl PlacementStrategy for FewestServicesPlacement {
    fn place(
        &self,
        nodes: &[ClusterNode],
        requirement: ServiceRequirement,
    ) -> TunefleetResult<PlacementDecision> {
        if nodes.is_empty() {
            return Err(TunefleetError::InvalidServiceRequest(
                "there are no nodes to deploy the service on".to_string(),
            ));
        }

        let mut eligible: Vec<&ClusterNode> = match requirement {
            ServiceRequirement::Gpu => nodes.iter().filter(|n| n.has_free_gpu()).collect(),
            ServiceRequirement::Cpu => nodes.iter().collect(),
        };
        if eligible.is_empty() {
            return Err(TunefleetError::NoCapacity(
                "no node has a free GPU".to_string(),
            ));
        }

        eligible.sort_by(|a, b| (a.num_services, &a.id).cmp(&(b.num_services, &b.id)));
        let node = eligible[0];

        let gpu_no = match requirement {
            ServiceRequirement::Gpu => node.available_gpus.iter().next().copied(),
            ServiceRequirement::Cpu => None,
        };

        Ok(PlacementDecision {
            node_id: node.id.clone(),
            gpu_no,
        })
    }
}
