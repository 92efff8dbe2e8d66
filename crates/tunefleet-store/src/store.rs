//! Param store trait definition

use async_trait::async_trait;
use tunefleet_core::TunefleetResult;

/// Storage of trained-parameter blobs
///
/// Entries are opaque bytes filed under a store-generated, globally unique
/// string id. Entries are write-once: nothing is mutated in place, and
/// identical blobs saved twice receive distinct ids (no deduplication).
#[async_trait]
pub trait ParamStore: Send + Sync {
    /// Persist a blob and return its newly minted params id.
    ///
    /// On failure no caller-visible state advances; the returned id is only
    /// valid once `save` has returned it.
    async fn save(&self, blob: &[u8]) -> TunefleetResult<String>;

    /// Fetch the blob stored under `params_id`.
    ///
    /// Unknown ids fail with `NotFound`.
    async fn load(&self, params_id: &str) -> TunefleetResult<Vec<u8>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
