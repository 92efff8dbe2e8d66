//! Job record persistence seam

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tunefleet_core::{JobRecord, TunefleetError, TunefleetResult};

/// Opaque read/write of job records
///
/// The coordinator writes the record on every lifecycle transition so an
/// external observer always sees the current state.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Fetch a job record by id.
    async fn get(&self, job_id: &str) -> TunefleetResult<JobRecord>;

    /// Insert or replace a job record.
    async fn put(&self, record: JobRecord) -> TunefleetResult<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// In-memory reference implementation
#[derive(Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRecordStore for InMemoryJobStore {
    async fn get(&self, job_id: &str) -> TunefleetResult<JobRecord> {
        self.records
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| TunefleetError::JobNotFound(job_id.to_string()))
    }

    async fn put(&self, record: JobRecord) -> TunefleetResult<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
