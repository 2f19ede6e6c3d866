use super::{StateKey, StateStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local state store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StateKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: StateKey) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().await.get(&key).cloned())
    }

    async fn save(&self, key: StateKey, value: Value) -> Result<(), StoreError> {
        self.values.lock().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: StateKey) -> Result<(), StoreError> {
        self.values.lock().await.remove(&key);
        Ok(())
    }
}
