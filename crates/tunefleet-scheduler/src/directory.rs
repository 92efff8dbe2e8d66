//! Node directory: the shared cluster resource ledger
//!
//! Node resource state lives in the cluster backend as two string labels
//! per node, a wire contract shared with external tooling:
//! - `available_gpus`: comma-separated GPU indices, ascending, `""` when none
//! - `num_services`: decimal count of services placed on the node
//!
//! The label codec lives here and only here; everything above this module
//! works with `ClusterNode`.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tunefleet_core::{ClusterNode, NodeSeed, TunefleetError, TunefleetResult};

/// Label key holding the free GPU indices of a node
pub const LABEL_AVAILABLE_GPUS: &str = "available_gpus";
/// Label key holding the number of services placed on a node
pub const LABEL_NUM_SERVICES: &str = "num_services";

/// Outcome of a versioned ledger update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// The update was applied
    Applied,
    /// The node changed since it was read; nothing was written
    Conflict,
    /// The backend does not version its records
    Unsupported,
}

/// Directory of cluster nodes and their resource labels
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// All nodes currently in the cluster.
    async fn list_nodes(&self) -> TunefleetResult<Vec<ClusterNode>>;

    /// A single node by id.
    async fn get_node(&self, node_id: &str) -> TunefleetResult<ClusterNode>;

    /// Overwrite a node's resource labels.
    async fn update_node(
        &self,
        node_id: &str,
        available_gpus: &BTreeSet<u32>,
        num_services: u32,
    ) -> TunefleetResult<()>;

    /// Overwrite a node's resource labels only if its revision still equals
    /// `expected_revision`. Backends without versioning keep this default.
    async fn update_node_if(
        &self,
        _node_id: &str,
        _expected_revision: u64,
        _available_gpus: &BTreeSet<u32>,
        _num_services: u32,
    ) -> TunefleetResult<LedgerUpdate> {
        Ok(LedgerUpdate::Unsupported)
    }

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Encode a GPU set into its label form.
pub fn encode_gpus(gpus: &BTreeSet<u32>) -> String {
    gpus.iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode the `available_gpus` label. The empty string is the empty set.
pub fn decode_gpus(raw: &str) -> Option<BTreeSet<u32>> {
    if raw.is_empty() {
        return Some(BTreeSet::new());
    }
    raw.split(',')
        .map(|token| token.trim().parse::<u32>().ok())
        .collect()
}

fn parse_node(
    node_id: &str,
    labels: &BTreeMap<String, String>,
    revision: u64,
) -> TunefleetResult<ClusterNode> {
    let gpus_raw = labels
        .get(LABEL_AVAILABLE_GPUS)
        .map(String::as_str)
        .unwrap_or("");
    let available_gpus = decode_gpus(gpus_raw).ok_or_else(|| {
        TunefleetError::BackendUnavailable(format!(
            "node {} has unusable {} label {:?}",
            node_id, LABEL_AVAILABLE_GPUS, gpus_raw
        ))
    })?;

    let services_raw = labels
        .get(LABEL_NUM_SERVICES)
        .map(String::as_str)
        .unwrap_or("0");
    let num_services = services_raw.parse::<u32>().map_err(|_| {
        TunefleetError::BackendUnavailable(format!(
            "node {} has unusable {} label {:?}",
            node_id, LABEL_NUM_SERVICES, services_raw
        ))
    })?;

    let mut node = ClusterNode::new(node_id.to_string(), available_gpus, num_services);
    node.revision = revision;
    Ok(node)
}

struct NodeEntry {
    labels: BTreeMap<String, String>,
    revision: u64,
}

impl NodeEntry {
    fn seeded(gpus: &BTreeSet<u32>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_AVAILABLE_GPUS.to_string(), encode_gpus(gpus));
        labels.insert(LABEL_NUM_SERVICES.to_string(), "0".to_string());
        Self { labels, revision: 1 }
    }
}

/// In-memory node directory
///
/// Stores raw label maps exactly as a cluster backend would and parses them
/// on every read, so codec behavior is identical to a real backend. Records
/// are versioned, enabling the compare-and-swap update path.
#[derive(Default)]
pub struct InMemoryNodeDirectory {
    nodes: RwLock<BTreeMap<String, NodeEntry>>,
}

impl InMemoryNodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from configured node seeds.
    pub fn from_seeds(seeds: &[NodeSeed]) -> Self {
        let mut nodes = BTreeMap::new();
        for seed in seeds {
            let gpus: BTreeSet<u32> = seed.gpus.iter().copied().collect();
            nodes.insert(seed.id.clone(), NodeEntry::seeded(&gpus));
        }
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Add a node with the given free GPUs and no services.
    pub async fn add_node(&self, node_id: &str, gpus: BTreeSet<u32>) {
        let mut nodes = self.nodes.write().await;
        nodes.insert(node_id.to_string(), NodeEntry::seeded(&gpus));
    }

    /// Raw labels of a node, as external tooling would read them.
    pub async fn raw_labels(&self, node_id: &str) -> Option<BTreeMap<String, String>> {
        let nodes = self.nodes.read().await;
        nodes.get(node_id).map(|entry| entry.labels.clone())
    }

    /// Overwrite a single label, bypassing the codec. Simulates an external
    /// writer sharing the ledger.
    pub async fn set_label(&self, node_id: &str, key: &str, value: &str) {
        let mut nodes = self.nodes.write().await;
        if let Some(entry) = nodes.get_mut(node_id) {
            entry.labels.insert(key.to_string(), value.to_string());
            entry.revision += 1;
        }
    }
}

#[async_trait]
impl NodeDirectory for InMemoryNodeDirectory {
    async fn list_nodes(&self) -> TunefleetResult<Vec<ClusterNode>> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .map(|(id, entry)| parse_node(id, &entry.labels, entry.revision))
            .collect()
    }

    async fn get_node(&self, node_id: &str) -> TunefleetResult<ClusterNode> {
        let nodes = self.nodes.read().await;
        let entry = nodes.get(node_id).ok_or_else(|| {
            TunefleetError::BackendUnavailable(format!("unknown node {}", node_id))
        })?;
        parse_node(node_id, &entry.labels, entry.revision)
    }

    async fn update_node(
        &self,
        node_id: &str,
        available_gpus: &BTreeSet<u32>,
        num_services: u32,
    ) -> TunefleetResult<()> {
        let mut nodes = self.nodes.write().await;
        let entry = nodes.get_mut(node_id).ok_or_else(|| {
            TunefleetError::BackendUnavailable(format!("unknown node {}", node_id))
        })?;
        entry
            .labels
            .insert(LABEL_AVAILABLE_GPUS.to_string(), encode_gpus(available_gpus));
        entry
            .labels
            .insert(LABEL_NUM_SERVICES.to_string(), num_services.to_string());
        entry.revision += 1;
        Ok(())
    }

    async fn update_node_if(
        &self,
        node_id: &str,
        expected_revision: u64,
        available_gpus: &BTreeSet<u32>,
        num_services: u32,
    ) -> TunefleetResult<LedgerUpdate> {
        let mut nodes = self.nodes.write().await;
        let entry = nodes.get_mut(node_id).ok_or_else(|| {
            TunefleetError::BackendUnavailable(format!("unknown node {}", node_id))
        })?;
        if entry.revision != expected_revision {
            return Ok(LedgerUpdate::Conflict);
        }
        entry
            .labels
            .insert(LABEL_AVAILABLE_GPUS.to_string(), encode_gpus(available_gpus));
        entry
            .labels
            .insert(LABEL_NUM_SERVICES.to_string(), num_services.to_string());
        entry.revision += 1;
        Ok(LedgerUpdate::Applied)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_label_codec() {
        let gpus: BTreeSet<u32> = [2, 0, 3].into_iter().collect();
        assert_eq!(encode_gpus(&gpus), "0,2,3");
        assert_eq!(encode_gpus(&BTreeSet::new()), "");

        assert_eq!(decode_gpus("0,2,3").unwrap(), gpus);
        assert_eq!(decode_gpus("").unwrap(), BTreeSet::new());
        assert!(decode_gpus("0,x").is_none());
    }

    #[tokio::test]
    async fn test_seeded_node_labels() {
        let directory = InMemoryNodeDirectory::new();
        directory
            .add_node("node-0", [1, 0].into_iter().collect())
            .await;

        let labels = directory.raw_labels("node-0").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "0,1");
        assert_eq!(labels[LABEL_NUM_SERVICES], "0");

        let node = directory.get_node("node-0").await.unwrap();
        assert_eq!(node.available_gpus.len(), 2);
        assert_eq!(node.num_services, 0);
    }

    #[tokio::test]
    async fn test_update_round_trips_through_labels() {
        let directory = InMemoryNodeDirectory::new();
        directory
            .add_node("node-0", [0, 1].into_iter().collect())
            .await;

        let gpus: BTreeSet<u32> = [1].into_iter().collect();
        directory.update_node("node-0", &gpus, 3).await.unwrap();

        let labels = directory.raw_labels("node-0").await.unwrap();
        assert_eq!(labels[LABEL_AVAILABLE_GPUS], "1");
        assert_eq!(labels[LABEL_NUM_SERVICES], "3");

        let node = directory.get_node("node-0").await.unwrap();
        assert_eq!(node.available_gpus, gpus);
        assert_eq!(node.num_services, 3);
    }

    #[tokio::test]
    async fn test_versioned_update() {
        let directory = InMemoryNodeDirectory::new();
        directory.add_node("node-0", BTreeSet::new()).await;

        let node = directory.get_node("node-0").await.unwrap();
        let outcome = directory
            .update_node_if("node-0", node.revision, &node.available_gpus, 1)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerUpdate::Applied);

        // the old revision is now stale
        let outcome = directory
            .update_node_if("node-0", node.revision, &node.available_gpus, 2)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerUpdate::Conflict);
        assert_eq!(directory.get_node("node-0").await.unwrap().num_services, 1);
    }

    #[tokio::test]
    async fn test_unusable_labels_surface_backend_error() {
        let directory = InMemoryNodeDirectory::new();
        directory.add_node("node-0", BTreeSet::new()).await;
        directory
            .set_label("node-0", LABEL_AVAILABLE_GPUS, "0,oops")
            .await;

        let err = directory.list_nodes().await.unwrap_err();
        assert!(matches!(err, TunefleetError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unknown_node() {
        let directory = InMemoryNodeDirectory::new();
        let err = directory.get_node("nope").await.unwrap_err();
        assert!(matches!(err, TunefleetError::BackendUnavailable(_)));
    }
}
