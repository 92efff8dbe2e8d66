//! Cross-trial parameter registry
//!
//! The substrate behind `params_type`: each result-bearing trial records
//! what it produced here, and later proposals resolve their
//! LOCAL_*/GLOBAL_* references into a concrete params id. LOCAL lookups are
//! scoped to one job and may return cache-only entries; GLOBAL lookups span
//! jobs sharing a model class and only ever return persisted entries,
//! because another job's worker cache is not reachable from here.

use tokio::sync::RwLock;
use tracing::debug;
use tunefleet_core::ParamsType;

/// One stored-parameters record
#[derive(Debug, Clone)]
pub struct ParamsEntry {
    /// Job that produced the parameters
    pub job_id: String,
    /// Model class they belong to
    pub model_class: String,
    /// Producing trial's number within its job
    pub trial_no: u64,
    /// Evaluation score, when the trial was evaluated
    pub score: Option<f64>,
    /// Id the blob is retrievable under
    pub params_id: String,
    /// Whether the blob lives in the param store, as opposed to a
    /// worker-side cache only
    pub persisted: bool,
}

/// Registry of produced parameters, shared across coordinators via `Arc`
#[derive(Default)]
pub struct ParamsRegistry {
    entries: RwLock<Vec<ParamsEntry>>,
}

impl ParamsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trial's produced parameters. Insertion order defines
    /// recency.
    pub async fn record(&self, entry: ParamsEntry) {
        debug!(
            job_id = %entry.job_id,
            trial_no = entry.trial_no,
            params_id = %entry.params_id,
            persisted = entry.persisted,
            "Recorded trial parameters"
        );
        self.entries.write().await.push(entry);
    }

    /// Resolve a `params_type` reference to a params id, or `None` when
    /// nothing matches yet.
    pub async fn resolve(
        &self,
        params_type: ParamsType,
        job_id: &str,
        model_class: &str,
    ) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = match params_type {
            ParamsType::None => None,
            ParamsType::LocalRecent => entries.iter().rev().find(|e| e.job_id == job_id),
            ParamsType::LocalBest => best_of(entries.iter().filter(|e| e.job_id == job_id)),
            ParamsType::GlobalRecent => entries
                .iter()
                .rev()
                .find(|e| e.persisted && e.model_class == model_class),
            ParamsType::GlobalBest => best_of(
                entries
                    .iter()
                    .filter(|e| e.persisted && e.model_class == model_class),
            ),
        };
        entry.map(|e| e.params_id.clone())
    }

    /// Number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Highest-scoring entry among `entries`; later entries win ties.
fn best_of<'a>(entries: impl Iterator<Item = &'a ParamsEntry>) -> Option<&'a ParamsEntry> {
    entries.filter(|e| e.score.is_some()).max_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}
