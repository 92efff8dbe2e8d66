//! Main cluster scheduling logic

use std::sync::Arc;
use tracing::{debug, info, warn};
use tunefleet_core::{
    ContainerService, PlacementInfo, ServiceSpec, TunefleetError, TunefleetResult,
};

use crate::directory::{LedgerUpdate, NodeDirectory};
use crate::placement::{FewestServicesPlacement, PlacementDecision, PlacementStrategy};
use crate::runtime::{ContainerRuntime, RestartPolicy, ServiceLaunch};

/// Places worker services on cluster nodes and keeps the shared resource
/// ledger consistent with what is running
///
/// Creation launches first and claims the ledger after, mirroring the
/// backend's ordering; a claim lost to a concurrent scheduler removes the
/// just-launched service again. Teardown releases exactly the resources
/// recorded at creation.
pub struct ClusterScheduler {
    directory: Arc<dyn NodeDirectory>,
    runtime: Arc<dyn ContainerRuntime>,
    placement: Arc<dyn PlacementStrategy>,
    /// Network the services are attached to
    network: String,
    /// Attempts for a versioned ledger update before giving up
    claim_retries: u32,
}

impl ClusterScheduler {
    /// Create a new scheduler
    pub fn new(
        directory: Arc<dyn NodeDirectory>,
        runtime: Arc<dyn ContainerRuntime>,
        network: String,
        claim_retries: u32,
    ) -> Self {
        info!(
            directory = directory.name(),
            runtime = runtime.name(),
            network = %network,
            "Cluster scheduler initialized"
        );

        Self {
            directory,
            runtime,
            placement: Arc::new(FewestServicesPlacement),
            network,
            claim_retries: claim_retries.max(1),
        }
    }

    /// Place and launch a new service, then claim its resources in the
    /// ledger.
    pub async fn create_service(&self, spec: &ServiceSpec) -> TunefleetResult<ContainerService> {
        let nodes = self.directory.list_nodes().await?;
        let decision = self.placement.place(&nodes, spec.requirement)?;

        let launch = self.build_launch(spec, &decision);
        let launched = self.runtime.launch(&launch).await?;

        if let Err(e) = self.claim_ledger(&decision.node_id, decision.gpu_no).await {
            warn!(
                service_id = %launched.service_id,
                node_id = %decision.node_id,
                error = %e,
                "Removing service after failed ledger claim"
            );
            if let Err(remove_err) = self.runtime.remove(&launched.service_id).await {
                warn!(
                    service_id = %launched.service_id,
                    error = %remove_err,
                    "Failed to remove service after failed claim"
                );
            }
            return Err(e);
        }

        let service = ContainerService {
            id: launched.service_id,
            hostname: launched.hostname,
            port: launched.port,
            info: PlacementInfo {
                node_id: decision.node_id,
                gpu_no: decision.gpu_no,
                service_name: spec.name.clone(),
                replicas: spec.replicas,
            },
        };

        info!(
            service_id = %service.id,
            service_name = %spec.name,
            node_id = %service.info.node_id,
            gpu_no = ?service.info.gpu_no,
            "Created service"
        );

        Ok(service)
    }

    /// Change a service's replica count. Node assignment, GPU assignment,
    /// and the ledger are immutable after creation.
    pub async fn update_service(
        &self,
        service: &mut ContainerService,
        replicas: u32,
    ) -> TunefleetResult<()> {
        self.runtime.scale(&service.id, replicas).await?;
        service.info.replicas = replicas;

        info!(service_id = %service.id, replicas = replicas, "Updated service");
        Ok(())
    }

    /// Remove a service and release the resources recorded at its creation.
    pub async fn destroy_service(&self, service: &ContainerService) -> TunefleetResult<()> {
        self.runtime.remove(&service.id).await?;
        self.release_ledger(&service.info.node_id, service.info.gpu_no)
            .await?;

        info!(service_id = %service.id, "Destroyed service");
        Ok(())
    }

    fn build_launch(&self, spec: &ServiceSpec, decision: &PlacementDecision) -> ServiceLaunch {
        let mut env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        match decision.gpu_no {
            Some(gpu_no) => env.push(format!("CUDA_VISIBLE_DEVICES={}", gpu_no)),
            // -1 is the conventional "no GPU" sentinel
            None => env.push("CUDA_VISIBLE_DEVICES=-1".to_string()),
        }

        let mounts = spec
            .mounts
            .iter()
            .map(|(host, container)| format!("{}:{}:rw", host, container))
            .collect();

        ServiceLaunch {
            service_name: spec.name.clone(),
            image: spec.image.clone(),
            args: spec.args.clone(),
            env,
            mounts,
            publish_port: spec.publish_port,
            replicas: spec.replicas,
            node_constraint: format!("node.id={}", decision.node_id),
            restart: RestartPolicy::OnFailure,
            network: self.network.clone(),
        }
    }

    /// Record an allocation in the ledger: drop the assigned GPU from the
    /// node's free set and bump its service count.
    async fn claim_ledger(&self, node_id: &str, gpu_no: Option<u32>) -> TunefleetResult<()> {
        for attempt in 0..self.claim_retries {
            let node = self.directory.get_node(node_id).await?;

            // Re-validate against fresh state on every attempt: a lost race
            // for the GPU must not double-assign it.
            if let Some(gpu) = gpu_no {
                if !node.available_gpus.contains(&gpu) {
                    return Err(TunefleetError::NoCapacity(format!(
                        "GPU {} on node {} was claimed concurrently",
                        gpu, node_id
                    )));
                }
            }

            let mut gpus = node.available_gpus.clone();
            if let Some(gpu) = gpu_no {
                gpus.remove(&gpu);
            }
            let num_services = node.num_services + 1;

            match self
                .directory
                .update_node_if(node_id, node.revision, &gpus, num_services)
                .await?
            {
                LedgerUpdate::Applied => return Ok(()),
                LedgerUpdate::Conflict => {
                    debug!(
                        node_id = node_id,
                        attempt = attempt,
                        "Ledger claim conflicted, retrying"
                    );
                }
                LedgerUpdate::Unsupported => {
                    // Unversioned backend: plain read-modify-write, with the
                    // short window between read and write that entails.
                    self.directory
                        .update_node(node_id, &gpus, num_services)
                        .await?;
                    return Ok(());
                }
            }
        }

        Err(TunefleetError::NoCapacity(format!(
            "could not claim resources on node {} after {} attempts",
            node_id, self.claim_retries
        )))
    }

    /// Return an allocation to the ledger. The GPU comes back with set-union
    /// semantics and the service count floors at zero, so a duplicate or
    /// drifted release cannot corrupt the node's state.
    async fn release_ledger(&self, node_id: &str, gpu_no: Option<u32>) -> TunefleetResult<()> {
        for _ in 0..self.claim_retries {
            let node = self.directory.get_node(node_id).await?;

            let mut gpus = node.available_gpus.clone();
            if let Some(gpu) = gpu_no {
                gpus.insert(gpu);
            }
            let num_services = node.num_services.saturating_sub(1);

            match self
                .directory
                .update_node_if(node_id, node.revision, &gpus, num_services)
                .await?
            {
                LedgerUpdate::Applied => return Ok(()),
                LedgerUpdate::Conflict => continue,
                LedgerUpdate::Unsupported => {
                    self.directory
                        .update_node(node_id, &gpus, num_services)
                        .await?;
                    return Ok(());
                }
            }
        }

        Err(TunefleetError::BackendUnavailable(format!(
            "could not release resources on node {} after {} attempts",
            node_id, self.claim_retries
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryNodeDirectory, LABEL_AVAILABLE_GPUS, LABEL_NUM_SERVICES};
    use crate::runtime::StubRuntime;

    async fn cluster(
        nodes: &[(&str, &[u32])],
    ) -> (Arc<InMemoryNodeDirectory>, Arc<StubRuntime>, ClusterScheduler) {
        let directory = Arc::new(InMemoryNodeDirectory::new());
        for (id, gpus) in nodes {
            directory
                .add_node(id, gpus.iter().copied().collect())
                .await;
        }
        let runtime = Arc::new(StubRuntime::new());
        let scheduler = ClusterScheduler::new(
            directory.clone(),
            runtime.clone(),
            "tunefleet".to_string(),
            3,
        );
        (directory, runtime, scheduler)
    }

    fn gpu_spec(name: &str) -> ServiceSpec {
        ServiceSpec::new(name.to_string(), "tunefleet/worker".to_string()).with_gpu()
    }

    fn cpu_spec(name: &str) -> ServiceSpec {
        ServiceSpec::new(name.to_string(), "tunefleet/worker".to_string())
    }

    #[tokio::test]
    async fn test_create_gpu_service_claims_ledger() {
        let (directory, runtime, scheduler) =
            cluster(&[("node-a", &[0u32, 1] as &[u32]), ("node-b", &[])]).await;

        let service = scheduler.create_service(&gpu_spec("trainer-0")).await.unwrap();
        assert_eq!(service.info.node_id, "node-a");
        assert_eq!(service.info.gpu_no, Some(0));
        assert_eq!(service.hostname, "trainer-0");

        let stub = runtime.get(&service.id).await.unwrap();
        assert_eq!(stub.launch.env_value("CUDA_VISIBLE_DEVICES"), Some("0"));
        assert_eq!(stub.launch.node_constraint, "node.id=node-a");
        assert_eq!(stub.launch.network, "tunefleet");

        let labels = directory.raw_labels("node-a").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "1");
        assert_eq!(labels[LABEL_NUM_SERVICES], "1");
    }

    #[tokio::test]
    async fn test_create_cpu_service_gets_no_gpu_sentinel() {
        let (directory, runtime, scheduler) = cluster(&[("node-a", &[0u32] as &[u32])]).await;

        let service = scheduler.create_service(&cpu_spec("frontend")).await.unwrap();
        assert_eq!(service.info.gpu_no, None);

        let stub = runtime.get(&service.id).await.unwrap();
        assert_eq!(stub.launch.env_value("CUDA_VISIBLE_DEVICES"), Some("-1"));

        // GPU set untouched, only the service count moved
        let labels = directory.raw_labels("node-a").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "0");
        assert_eq!(labels[LABEL_NUM_SERVICES], "1");
    }

    #[tokio::test]
    async fn test_empty_cluster_rejects_request() {
        let (_, runtime, scheduler) = cluster(&[]).await;
        let err = scheduler.create_service(&cpu_spec("x")).await.unwrap_err();
        assert!(matches!(err, TunefleetError::InvalidServiceRequest(_)));
        assert_eq!(runtime.service_count().await, 0);
    }

    #[tokio::test]
    async fn test_gpu_exhaustion_is_no_capacity() {
        let (_, runtime, scheduler) =
            cluster(&[("node-a", &[] as &[u32]), ("node-b", &[])]).await;
        let err = scheduler.create_service(&gpu_spec("x")).await.unwrap_err();
        assert!(matches!(err, TunefleetError::NoCapacity(_)));
        assert_eq!(runtime.service_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_destroy_round_trips_labels() {
        let (directory, runtime, scheduler) = cluster(&[("node-a", &[0u32, 2] as &[u32])]).await;
        let before = directory.raw_labels("node-a").await.unwrap();

        let service = scheduler.create_service(&gpu_spec("trainer-0")).await.unwrap();
        let claimed = directory.raw_labels("node-a").await.unwrap();
        assert_eq!(claimed[LABEL_AVAILABLE_GPUS], "2");
        assert_eq!(claimed[LABEL_NUM_SERVICES], "1");

        scheduler.destroy_service(&service).await.unwrap();
        let after = directory.raw_labels("node-a").await.unwrap();
        assert_eq!(after, before);
        assert_eq!(runtime.service_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_clamps_and_unions_under_drift() {
        let (directory, _, scheduler) = cluster(&[("node-a", &[0u32] as &[u32])]).await;
        let service = scheduler.create_service(&gpu_spec("trainer-0")).await.unwrap();

        // external tooling reset the ledger behind our back
        directory
            .set_label("node-a", LABEL_NUM_SERVICES, "0")
            .await;
        directory
            .set_label("node-a", LABEL_AVAILABLE_GPUS, "0")
            .await;

        scheduler.destroy_service(&service).await.unwrap();

        let labels = directory.raw_labels("node-a").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "0");
        assert_eq!(labels[LABEL_NUM_SERVICES], "0");
    }

    #[tokio::test]
    async fn test_concurrent_claims_on_single_gpu() {
        let (directory, runtime, scheduler) = cluster(&[("node-0", &[0u32] as &[u32])]).await;

        let spec_0 = gpu_spec("trainer-0");
        let spec_1 = gpu_spec("trainer-1");
        let (r1, r2) = tokio::join!(
            scheduler.create_service(&spec_0),
            scheduler.create_service(&spec_1)
        );

        let results = [r1, r2];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, TunefleetError::NoCapacity(_)));
            }
        }

        // the loser's launch was rolled back
        assert_eq!(runtime.service_count().await, 1);
        let labels = directory.raw_labels("node-0").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "");
        assert_eq!(labels[LABEL_NUM_SERVICES], "1");
    }

    #[tokio::test]
    async fn test_update_service_scales_runtime_only() {
        let (directory, runtime, scheduler) = cluster(&[("node-a", &[] as &[u32])]).await;
        let mut service = scheduler.create_service(&cpu_spec("trainer-0")).await.unwrap();
        let labels_after_create = directory.raw_labels("node-a").await.unwrap();

        scheduler.update_service(&mut service, 3).await.unwrap();

        assert_eq!(service.info.replicas, 3);
        assert_eq!(runtime.get(&service.id).await.unwrap().replicas, 3);
        assert_eq!(
            directory.raw_labels("node-a").await.unwrap(),
            labels_after_create
        );
    }
}
