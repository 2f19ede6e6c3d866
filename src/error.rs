use crate::channel::ChannelError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule '{rule}' imports unknown rules: {}", imports.join(", "))]
    MissingImport { rule: String, imports: Vec<String> },
    #[error("{count} before functions failed in rule '{rule}'")]
    BeforeHook { rule: String, count: usize },
    #[error("{count} fields could not be filled by rule '{rule}'")]
    FieldFill { rule: String, count: usize },
    #[error("workflow step '{step}' does not name a known rule")]
    WorkflowStepUnresolvable { step: String },
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),
    #[error("no target tab to apply rule '{0}'")]
    NoTargetTab(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Text shown to the user in a notification
    pub fn notification(&self) -> String {
        match self {
            EngineError::MissingImport { .. } => {
                "A rule imports another rule that does not exist. Click here to view details."
                    .to_string()
            }
            EngineError::BeforeHook { .. } => {
                "An error occurred while executing a before function. Click here to view it."
                    .to_string()
            }
            EngineError::FieldFill { count, .. } => format!(
                "There were {} errors while filling this form. Click here to view them.",
                count
            ),
            EngineError::WorkflowStepUnresolvable { .. } => {
                "Workflow error: rule not found!".to_string()
            }
            other => other.to_string(),
        }
    }
}
