//! Filesystem-backed param store

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use tunefleet_core::{TunefleetError, TunefleetResult};
use uuid::Uuid;

use crate::store::ParamStore;

/// Stores parameter blobs as files in a local directory
///
/// The params id doubles as the file name:
/// `{model_class}_{uuid}.params`. Loading accepts any id previously minted
/// against the same directory, including ids minted by stores built for
/// other model classes.
pub struct FileParamStore {
    /// Directory the blobs live in
    params_dir: PathBuf,
    /// Model class prefix baked into minted ids
    model_class: String,
}

impl FileParamStore {
    /// Create a store over `params_dir`, minting ids for `model_class`.
    pub fn new(params_dir: PathBuf, model_class: String) -> Self {
        Self {
            params_dir,
            model_class,
        }
    }

    /// Ids are plain file names; anything that could escape the params
    /// directory is treated as unknown.
    fn is_valid_id(params_id: &str) -> bool {
        !params_id.is_empty()
            && !params_id.contains('/')
            && !params_id.contains('\\')
            && !params_id.contains("..")
    }
}

#[async_trait]
impl ParamStore for FileParamStore {
    async fn save(&self, blob: &[u8]) -> TunefleetResult<String> {
        let file_name = format!("{}_{}.params", self.model_class, Uuid::new_v4());
        let dest_path = self.params_dir.join(&file_name);

        if !self.params_dir.exists() {
            tokio::fs::create_dir_all(&self.params_dir)
                .await
                .map_err(|e| {
                    TunefleetError::StorageWrite(format!(
                        "failed to create params dir {}: {}",
                        self.params_dir.display(),
                        e
                    ))
                })?;
        }

        tokio::fs::write(&dest_path, blob).await.map_err(|e| {
            TunefleetError::StorageWrite(format!(
                "failed to write params file {}: {}",
                dest_path.display(),
                e
            ))
        })?;

        debug!(params_id = %file_name, size = blob.len(), "Saved params");
        Ok(file_name)
    }

    async fn load(&self, params_id: &str) -> TunefleetResult<Vec<u8>> {
        if !Self::is_valid_id(params_id) {
            return Err(TunefleetError::NotFound(params_id.to_string()));
        }

        let file_path = self.params_dir.join(params_id);
        match tokio::fs::read(&file_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TunefleetError::NotFound(params_id.to_string()))
            }
            Err(e) => Err(TunefleetError::StorageRead(format!(
                "failed to read params file {}: {}",
                file_path.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> FileParamStore {
        FileParamStore::new(dir.to_path_buf(), "SVCClf".to_string())
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for blob in [vec![], b"weights".to_vec(), vec![0xA7; 1024 * 1024]] {
            let params_id = store.save(&blob).await.unwrap();
            let loaded = store.load(&params_id).await.unwrap();
            assert_eq!(loaded, blob);
        }
    }

    #[tokio::test]
    async fn test_identical_blobs_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let a = store.save(b"same").await.unwrap();
        let b = store.save(b"same").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.load(&a).await.unwrap(), b"same");
        assert_eq!(store.load(&b).await.unwrap(), b"same");
    }

    #[tokio::test]
    async fn test_id_carries_model_class() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let params_id = store.save(b"x").await.unwrap();
        assert!(params_id.starts_with("SVCClf_"));
        assert!(params_id.ends_with(".params"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let err = store.load("SVCClf_nope.params").await.unwrap_err();
        assert!(matches!(err, TunefleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_ids_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for bad in ["../etc/passwd", "a/b.params", "..", ""] {
            let err = store.load(bad).await.unwrap_err();
            assert!(matches!(err, TunefleetError::NotFound(_)), "id: {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_save_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("params");
        let store = FileParamStore::new(nested.clone(), "M".to_string());

        let params_id = store.save(b"blob").await.unwrap();
        assert!(nested.join(&params_id).exists());
    }

    #[tokio::test]
    async fn test_cross_class_load() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileParamStore::new(dir.path().to_path_buf(), "ClassA".to_string());
        let b = FileParamStore::new(dir.path().to_path_buf(), "ClassB".to_string());

        let params_id = a.save(b"shared").await.unwrap();
        assert_eq!(b.load(&params_id).await.unwrap(), b"shared");
    }
}
