//! Container runtime seam

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tunefleet_core::{TunefleetError, TunefleetResult};
use uuid::Uuid;

/// Restart behavior of a service's replicas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Replicas stay down once they exit
    Never,
    /// Replicas are restarted when they exit with an error
    OnFailure,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "none"),
            RestartPolicy::OnFailure => write!(f, "on-failure"),
        }
    }
}

/// Fully resolved launch request handed to the runtime
///
/// Placement has already happened: the node constraint and the GPU
/// environment are baked in.
#[derive(Debug, Clone)]
pub struct ServiceLaunch {
    /// Service name; also the hostname replicas are reachable at
    pub service_name: String,
    /// Container image reference
    pub image: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment as `KEY=value` pairs
    pub env: Vec<String>,
    /// Mounts as `host:container:rw` strings
    pub mounts: Vec<String>,
    /// Container port to publish, if any
    pub publish_port: Option<u16>,
    /// Replica count
    pub replicas: u32,
    /// Scheduling constraint pinning the service, `node.id=<id>`
    pub node_constraint: String,
    /// Restart policy
    pub restart: RestartPolicy,
    /// Network to attach the service to
    pub network: String,
}

impl ServiceLaunch {
    /// Value of an environment entry, if set.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        let prefix = format!("{}=", key);
        self.env
            .iter()
            .find_map(|entry| entry.strip_prefix(&prefix))
    }
}

/// Handle to a launched service
#[derive(Debug, Clone)]
pub struct LaunchedService {
    /// Runtime-assigned service identifier
    pub service_id: String,
    /// Hostname the service is reachable at
    pub hostname: String,
    /// Published port, if one was requested
    pub port: Option<u16>,
}

/// Manages service lifecycles on the cluster backend
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Launch a new service.
    async fn launch(&self, launch: &ServiceLaunch) -> TunefleetResult<LaunchedService>;

    /// Change a service's replica count.
    async fn scale(&self, service_id: &str, replicas: u32) -> TunefleetResult<()>;

    /// Delete the service definition. Deleting (rather than stopping) means
    /// restart-on-failure cannot reinstate an intentionally destroyed
    /// service.
    async fn remove(&self, service_id: &str) -> TunefleetResult<()>;

    /// Runtime name for logs
    fn name(&self) -> &'static str;
}

/// A service as recorded by the stub runtime
#[derive(Debug, Clone)]
pub struct StubService {
    pub launch: ServiceLaunch,
    pub replicas: u32,
}

/// Runtime that records launches without running anything
///
/// Used for local runs and tests. Mirrors the backend's conventions:
/// synthesized service ids, hostname = service name.
#[derive(Default)]
pub struct StubRuntime {
    services: RwLock<HashMap<String, StubService>>,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a recorded service.
    pub async fn get(&self, service_id: &str) -> Option<StubService> {
        self.services.read().await.get(service_id).cloned()
    }

    /// Number of services currently defined.
    pub async fn service_count(&self) -> usize {
        self.services.read().await.len()
    }
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn launch(&self, launch: &ServiceLaunch) -> TunefleetResult<LaunchedService> {
        let service_id = format!("svc-{}", Uuid::new_v4());
        let hostname = launch.service_name.clone();

        let mut services = self.services.write().await;
        services.insert(
            service_id.clone(),
            StubService {
                launch: launch.clone(),
                replicas: launch.replicas,
            },
        );

        debug!(
            service_id = %service_id,
            service_name = %launch.service_name,
            constraint = %launch.node_constraint,
            "Stub service launched"
        );

        Ok(LaunchedService {
            service_id,
            hostname,
            port: launch.publish_port,
        })
    }

    async fn scale(&self, service_id: &str, replicas: u32) -> TunefleetResult<()> {
        let mut services = self.services.write().await;
        let service = services.get_mut(service_id).ok_or_else(|| {
            TunefleetError::BackendUnavailable(format!("unknown service {}", service_id))
        })?;
        service.replicas = replicas;
        Ok(())
    }

    async fn remove(&self, service_id: &str) -> TunefleetResult<()> {
        let mut services = self.services.write().await;
        services.remove(service_id).ok_or_else(|| {
            TunefleetError::BackendUnavailable(format!("unknown service {}", service_id))
        })?;
        info!(service_id = %service_id, "Stub service removed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch() -> ServiceLaunch {
        ServiceLaunch {
            service_name: "trainer-0".to_string(),
            image: "tunefleet/worker".to_string(),
            args: vec![],
            env: vec!["CUDA_VISIBLE_DEVICES=0".to_string()],
            mounts: vec![],
            publish_port: None,
            replicas: 1,
            node_constraint: "node.id=node-0".to_string(),
            restart: RestartPolicy::OnFailure,
            network: "tunefleet".to_string(),
        }
    }

    #[tokio::test]
    async fn test_launch_and_remove() {
        let runtime = StubRuntime::new();
        let launched = runtime.launch(&launch()).await.unwrap();
        assert_eq!(launched.hostname, "trainer-0");
        assert_eq!(runtime.service_count().await, 1);

        runtime.remove(&launched.service_id).await.unwrap();
        assert_eq!(runtime.service_count().await, 0);

        let err = runtime.remove(&launched.service_id).await.unwrap_err();
        assert!(matches!(err, TunefleetError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_scale() {
        let runtime = StubRuntime::new();
        let launched = runtime.launch(&launch()).await.unwrap();
        runtime.scale(&launched.service_id, 3).await.unwrap();
        assert_eq!(runtime.get(&launched.service_id).await.unwrap().replicas, 3);
    }

    #[test]
    fn test_env_value() {
        let launch = launch();
        assert_eq!(launch.env_value("CUDA_VISIBLE_DEVICES"), Some("0"));
        assert_eq!(launch.env_value("MISSING"), None);
    }
}
