use crate::rule::{Workflow, WorkflowFlags};
use anyhow::{Result, bail};
use serde::Deserialize;

// YAML structure for loading workflows
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub flags: WorkflowFlags,
}

impl WorkflowConfig {
    /// Compile into a workflow; workflows without an explicit id get their position
    pub fn compile(&self, index: usize) -> Result<Workflow> {
        if self.steps.is_empty() {
            bail!("Workflow '{}' must have at least one step", self.name);
        }

        Ok(Workflow {
            id: self.id.clone().unwrap_or_else(|| (index + 1).to_string()),
            name: self.name.clone(),
            steps: self.steps.clone(),
            flags: self.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_compile() {
        let yaml = r#"
name: Checkout
steps: [Login, Submit]
flags:
  screenshot: true
"#;
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        let workflow = config.compile(2).unwrap();
        assert_eq!(workflow.id, "3");
        assert_eq!(workflow.steps, vec!["Login", "Submit"]);
        assert!(workflow.flags.screenshot);
    }

    #[test]
    fn test_workflow_without_steps() {
        let config: WorkflowConfig = serde_yaml::from_str("name: Empty\nsteps: []\n").unwrap();
        assert!(config.compile(0).is_err());
    }
}
