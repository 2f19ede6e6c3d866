//! Storage collaborators used by the engine
//!
//! This module provides:
//! - Rule and workflow lookup (`RuleStore`, `WorkflowStore`) backed by an in-memory `RuleBook`
//! - A persisted key-value state store (`StateStore`) with JSON file and in-memory backends
//! - Hot reloading of rule definitions from the config file

pub mod hot_reload;
pub mod json_file;
pub mod memory;
pub mod rule_book;

pub use hot_reload::HotReloader;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use rule_book::{Definitions, RuleBook};

use crate::rule::{Rule, Workflow};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys of the persisted state store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Settings,
    RunningWorkflow,
    TabConfig,
    ErrorLog,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Settings => "settings",
            StateKey::RunningWorkflow => "running-workflow",
            StateKey::TabConfig => "tab-config",
            StateKey::ErrorLog => "error-log",
        }
    }
}

#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    async fn all(&self) -> Result<Vec<Rule>, StoreError>;
    /// Rules whose URL matcher accepts `url`
    async fn match_url(&self, url: &str) -> Result<Vec<Rule>, StoreError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Rule>, StoreError>;
    /// Write-through cache read by the picker UI
    async fn set_last_matching_rules(&self, rules: &[Rule]);
}

#[async_trait::async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Workflows with at least one step naming one of `rules`
    async fn matches_for_rules(&self, rules: &[Rule]) -> Result<Vec<Workflow>, StoreError>;
    async fn save_matches(&self, workflows: &[Workflow]);
    async fn find_by_id(&self, id: &str) -> Result<Option<Workflow>, StoreError>;
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: StateKey) -> Result<Option<Value>, StoreError>;
    async fn save(&self, key: StateKey, value: Value) -> Result<(), StoreError>;
    async fn delete(&self, key: StateKey) -> Result<(), StoreError>;
}

/// Load a value and deserialize it into `T`
pub async fn load_as<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: StateKey,
) -> Result<Option<T>, StoreError> {
    match store.load(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and save it under `key`
pub async fn save_as<T: Serialize>(
    store: &dyn StateStore,
    key: StateKey,
    value: &T,
) -> Result<(), StoreError> {
    store.save(key, serde_json::to_value(value)?).await
}
