pub mod bridge_config;
pub mod helper;
pub mod rules_config;
pub mod settings;
pub mod workflows_config;

pub use bridge_config::BridgeConfig;
pub use settings::Settings;

use crate::config::helper::deserialize_duration;
use crate::config::rules_config::RuleConfig;
use crate::config::workflows_config::WorkflowConfig;
use crate::store::Definitions;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure matching config.yaml format
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Settings used until the options page sends its own
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(
        default = "default_recheck_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub recheck_interval: Duration,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            bridge: BridgeConfig::default(),
            recheck_interval: default_recheck_interval(),
            state_dir: None,
            rules: Vec::new(),
            workflows: Vec::new(),
        }
    }
}

fn default_recheck_interval() -> Duration {
    Duration::from_secs(2)
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML config file")
    }

    /// Compile rules and workflows, rejecting duplicate rule names or ids
    pub fn definitions(&self) -> Result<Definitions> {
        let mut rules = Vec::new();
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for (index, rule_config) in self.rules.iter().enumerate() {
            let rule = rule_config
                .compile(index)
                .with_context(|| format!("Failed to compile rule: {}", rule_config.name))?;
            if !names.insert(rule.name.clone()) {
                bail!("Duplicate rule name: {}", rule.name);
            }
            if !ids.insert(rule.id.clone()) {
                bail!("Duplicate rule id: {}", rule.id);
            }
            rules.push(rule);
        }

        let mut workflows = Vec::new();
        for (index, workflow_config) in self.workflows.iter().enumerate() {
            let workflow = workflow_config
                .compile(index)
                .with_context(|| format!("Failed to compile workflow: {}", workflow_config.name))?;
            workflows.push(workflow);
        }

        Ok(Definitions { rules, workflows })
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(crate::store::JsonFileStore::default_dir)
    }
}

/// Load a config file and compile its definitions in one step
pub fn load_definitions(path: &Path) -> Result<Definitions> {
    Config::from_file(path)?.definitions()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
settings:
  alwaysShowPopup: true
bridge:
  port: 9100
recheck_interval: 500ms
rules:
  - name: Login
    url: "/login"
    autorun: true
    fields:
      - selector: "#u"
        value: bob
  - name: SharedAddress
    fields:
      - selector: "#street"
        value: Main St
workflows:
  - name: Checkout
    steps: [Login, Submit]
"##;

    #[test]
    fn test_config_from_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(config.settings.always_show_popup);
        assert_eq!(config.bridge.port, 9100);
        assert_eq!(config.recheck_interval, Duration::from_millis(500));

        let definitions = config.definitions().unwrap();
        assert_eq!(definitions.rules.len(), 2);
        assert_eq!(definitions.rules[1].id, "1-2");
        assert_eq!(definitions.workflows[0].id, "1");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.recheck_interval, Duration::from_secs(2));
        assert!(config.rules.is_empty());
        assert!(config.state_dir().ends_with("formfill"));
    }

    #[test]
    fn test_duplicate_rule_names() {
        let yaml = r#"
rules:
  - name: Login
  - name: Login
"#;
        let error = Config::from_yaml(yaml).unwrap().definitions().unwrap_err();
        assert!(error.to_string().contains("Duplicate rule name: Login"));
    }

    #[test]
    fn test_invalid_yaml() {
        let error = Config::from_yaml("rules: [").unwrap_err();
        assert!(error.to_string().contains("parse"));
    }
}
