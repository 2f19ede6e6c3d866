pub mod match_set;
pub mod workflow;

pub use match_set::MatchSet;
pub use workflow::{RunningWorkflowState, Workflow, WorkflowFlags};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a rule's field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    /// Placeholder replaced by the fields of another rule
    Import { import: String },
    Fill {
        selector: String,
        #[serde(default)]
        value: Value,
    },
}

impl Field {
    pub fn fill(selector: &str, value: impl Into<Value>) -> Self {
        Field::Fill {
            selector: selector.to_string(),
            value: value.into(),
        }
    }

    pub fn import(name: &str) -> Self {
        Field::Import {
            import: name.to_string(),
        }
    }

    pub fn import_name(&self) -> Option<&str> {
        match self {
            Field::Import { import } => Some(import),
            Field::Fill { .. } => None,
        }
    }
}

/// Part of the tab URL a `url` hook resolves with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlPart {
    Href,
    Host,
    Path,
    Query,
}

/// Declarative form of a before hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookSpec {
    /// Hook registered in the hook registry under this name
    Named(String),
    /// Resolves with the page content matching a selector
    Grab { grab: String },
    /// Resolves with part of the tab URL
    UrlPart { url: UrlPart },
    /// Resolves with a constant
    Const { value: Value },
}

// Compiled rule used at runtime
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub fields: Vec<Field>,
    pub url: Option<Regex>,
    pub content: Option<Regex>,
    pub before: Vec<HookSpec>,
    pub autorun: bool,
    pub screenshot: bool,
}

impl Rule {
    pub fn new(id: &str, name: &str, fields: Vec<Field>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fields,
            url: None,
            content: None,
            before: Vec::new(),
            autorun: false,
            screenshot: false,
        }
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.url.as_ref().is_some_and(|regex| regex.is_match(url))
    }

    /// Serializable form of the content matcher, evaluated inside the page
    pub fn content_matcher(&self) -> Option<ContentMatcher> {
        self.content.as_ref().map(|regex| ContentMatcher {
            id: self.id.clone(),
            content: regex.as_str().to_string(),
        })
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMatcher {
    pub id: String,
    pub content: String,
}

/// Identity of a rule stored alongside its error reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_deserialization() {
        let fields: Vec<Field> = serde_json::from_value(json!([
            {"selector": "#user", "value": "bob"},
            {"import": "SharedAddress"},
            {"selector": "#remember"}
        ]))
        .unwrap();

        assert_eq!(fields[0], Field::fill("#user", "bob"));
        assert_eq!(fields[1], Field::import("SharedAddress"));
        assert_eq!(fields[2], Field::fill("#remember", Value::Null));
        assert_eq!(fields[1].import_name(), Some("SharedAddress"));
        assert_eq!(fields[0].import_name(), None);
    }

    #[test]
    fn test_hook_spec_deserialization() {
        let specs: Vec<HookSpec> = serde_json::from_value(json!([
            "lookup_user",
            {"grab": "h1.title"},
            {"url": "host"},
            {"value": [1, 2]}
        ]))
        .unwrap();

        assert_eq!(specs[0], HookSpec::Named("lookup_user".to_string()));
        assert_eq!(
            specs[1],
            HookSpec::Grab {
                grab: "h1.title".to_string()
            }
        );
        assert_eq!(specs[2], HookSpec::UrlPart { url: UrlPart::Host });
        assert_eq!(specs[3], HookSpec::Const { value: json!([1, 2]) });
    }

    #[test]
    fn test_url_and_content_matchers() {
        let mut rule = Rule::new("1-1", "Login", vec![]);
        assert!(!rule.matches_url("https://example.com/login"));
        assert!(rule.content_matcher().is_none());

        rule.url = Some(Regex::new(r"example\.com/login").unwrap());
        rule.content = Some(Regex::new("Sign in").unwrap());
        assert!(rule.matches_url("https://example.com/login"));
        assert!(!rule.matches_url("https://example.com/about"));
        assert_eq!(
            rule.content_matcher(),
            Some(ContentMatcher {
                id: "1-1".to_string(),
                content: "Sign in".to_string()
            })
        );
    }
}
