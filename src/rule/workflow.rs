use serde::{Deserialize, Serialize};

/// Ordered sequence of rule names executed across page loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub flags: WorkflowFlags,
}

/// Overrides applied to every step of a workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFlags {
    #[serde(default)]
    pub screenshot: bool,
}

/// Persisted progress of the one workflow that may be running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningWorkflowState {
    pub current_step: usize,
    pub steps: Vec<String>,
    #[serde(default)]
    pub flags: WorkflowFlags,
}

impl RunningWorkflowState {
    pub fn start(workflow: &Workflow) -> Self {
        Self {
            current_step: 0,
            steps: workflow.steps.clone(),
            flags: workflow.flags,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_step >= self.steps.len()
    }

    pub fn current_rule_name(&self) -> Option<&str> {
        self.steps.get(self.current_step).map(String::as_str)
    }

    pub fn advanced(&self) -> Self {
        Self {
            current_step: self.current_step + 1,
            steps: self.steps.clone(),
            flags: self.flags,
        }
    }
}
