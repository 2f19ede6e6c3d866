//! State persistence to JSON files, one file per key

use super::{StateKey, StateStore, StoreError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Durable state store surviving coordinator restarts
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Default location under the user's config directory
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formfill")
    }

    pub fn file_path(&self, key: StateKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

#[async_trait::async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, key: StateKey) -> Result<Option<Value>, StoreError> {
        let path = self.file_path(key);
        if !path.exists() {
            debug!("No stored value for '{}'", key.as_str());
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn save(&self, key: StateKey, value: Value) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&value)?;

        // Create parent directory if it doesn't exist
        fs::create_dir_all(&self.dir).await?;

        fs::write(self.file_path(key), json).await?;
        debug!("Saved '{}' to {}", key.as_str(), self.dir.display());

        Ok(())
    }

    async fn delete(&self, key: StateKey) -> Result<(), StoreError> {
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path).await?;
            info!("Deleted state file: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        store
            .save(StateKey::RunningWorkflow, json!({"currentStep": 1, "steps": ["A", "B"]}))
            .await
            .unwrap();
        assert!(store.file_path(StateKey::RunningWorkflow).exists());

        // A second store over the same directory sees the value
        let reopened = JsonFileStore::new(temp_dir.path());
        let value = reopened.load(StateKey::RunningWorkflow).await.unwrap();
        assert_eq!(value, Some(json!({"currentStep": 1, "steps": ["A", "B"]})));
    }

    #[tokio::test]
    async fn test_load_missing_key() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        assert!(store.load(StateKey::Settings).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        store.save(StateKey::ErrorLog, json!([])).await.unwrap();
        store.delete(StateKey::ErrorLog).await.unwrap();
        assert!(!store.file_path(StateKey::ErrorLog).exists());

        // Second delete is a no-op
        store.delete(StateKey::ErrorLog).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_parent_directories() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("dir"));

        store.save(StateKey::TabConfig, json!([])).await.unwrap();
        assert!(store.file_path(StateKey::TabConfig).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path());
        std::fs::write(store.file_path(StateKey::Settings), "{not json").unwrap();

        let result = store.load(StateKey::Settings).await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }
}
