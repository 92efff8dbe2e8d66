//! In-memory param store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tunefleet_core::{TunefleetError, TunefleetResult};
use uuid::Uuid;

use crate::store::ParamStore;

/// Keeps parameter blobs in process memory
///
/// Honors the same contract as the file backend; stands in for a shared
/// distributed cache in local runs and tests.
#[derive(Default)]
pub struct MemoryParamStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ParamStore for MemoryParamStore {
    async fn save(&self, blob: &[u8]) -> TunefleetResult<String> {
        let params_id = Uuid::new_v4().to_string();
        let mut blobs = self.blobs.write().await;
        blobs.insert(params_id.clone(), blob.to_vec());
        Ok(params_id)
    }

    async fn load(&self, params_id: &str) -> TunefleetResult<Vec<u8>> {
        let blobs = self.blobs.read().await;
        blobs
            .get(params_id)
            .cloned()
            .ok_or_else(|| TunefleetError::NotFound(params_id.to_string()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
