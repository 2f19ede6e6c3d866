use crate::config::helper::deserialize_one_or_many;
use crate::rule::{Field, HookSpec, Rule};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

// YAML structure for loading rules
#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, deserialize_with = "deserialize_one_or_many")]
    pub before: Vec<HookSpec>,
    #[serde(default)]
    pub autorun: bool,
    #[serde(default)]
    pub screenshot: bool,
}

impl RuleConfig {
    /// Compile into a runtime rule; rules without an explicit id get `1-<position>`
    pub fn compile(&self, index: usize) -> Result<Rule> {
        let url = compile_pattern(self.url.as_deref())
            .with_context(|| format!("Invalid url pattern in rule '{}'", self.name))?;
        let content = compile_pattern(self.content.as_deref())
            .with_context(|| format!("Invalid content pattern in rule '{}'", self.name))?;

        Ok(Rule {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| format!("1-{}", index + 1)),
            name: self.name.clone(),
            fields: self.fields.clone(),
            url,
            content,
            before: self.before.clone(),
            autorun: self.autorun,
            screenshot: self.screenshot,
        })
    }
}

fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|pattern| {
            Regex::new(pattern).with_context(|| format!("Invalid regex pattern: {}", pattern))
        })
        .transpose()
}
