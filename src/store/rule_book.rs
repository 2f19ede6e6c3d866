use super::{RuleStore, StoreError, WorkflowStore};
use crate::rule::{Rule, Workflow};
use tokio::sync::RwLock;
use tracing::debug;

/// Compiled rule and workflow definitions
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub rules: Vec<Rule>,
    pub workflows: Vec<Workflow>,
}

/// In-memory rule and workflow store, swappable on hot reload
#[derive(Debug, Default)]
pub struct RuleBook {
    definitions: RwLock<Definitions>,
    last_matching_rules: RwLock<Vec<Rule>>,
    matching_workflows: RwLock<Vec<Workflow>>,
}

impl RuleBook {
    pub fn new(definitions: Definitions) -> Self {
        Self {
            definitions: RwLock::new(definitions),
            last_matching_rules: RwLock::new(Vec::new()),
            matching_workflows: RwLock::new(Vec::new()),
        }
    }

    pub async fn replace(&self, definitions: Definitions) {
        let mut guard = self.definitions.write().await;
        debug!(
            "Replacing {} rules and {} workflows",
            guard.rules.len(),
            guard.workflows.len()
        );
        *guard = definitions;
    }

    pub async fn last_matching_rules(&self) -> Vec<Rule> {
        self.last_matching_rules.read().await.clone()
    }

    pub async fn matching_workflows(&self) -> Vec<Workflow> {
        self.matching_workflows.read().await.clone()
    }
}

#[async_trait::async_trait]
impl RuleStore for RuleBook {
    async fn all(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.definitions.read().await.rules.clone())
    }

    async fn match_url(&self, url: &str) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .definitions
            .read()
            .await
            .rules
            .iter()
            .filter(|rule| rule.matches_url(url))
            .cloned()
            .collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Rule>, StoreError> {
        Ok(self
            .definitions
            .read()
            .await
            .rules
            .iter()
            .find(|rule| rule.name == name)
            .cloned())
    }

    async fn set_last_matching_rules(&self, rules: &[Rule]) {
        *self.last_matching_rules.write().await = rules.to_vec();
    }
}

#[async_trait::async_trait]
impl WorkflowStore for RuleBook {
    async fn matches_for_rules(&self, rules: &[Rule]) -> Result<Vec<Workflow>, StoreError> {
        Ok(self
            .definitions
            .read()
            .await
            .workflows
            .iter()
            .filter(|workflow| {
                workflow
                    .steps
                    .iter()
                    .any(|step| rules.iter().any(|rule| &rule.name == step))
            })
            .cloned()
            .collect())
    }

    async fn save_matches(&self, workflows: &[Workflow]) {
        *self.matching_workflows.write().await = workflows.to_vec();
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(self
            .definitions
            .read()
            .await
            .workflows
            .iter()
            .find(|workflow| workflow.id == id)
            .cloned())
    }
}
