use super::{Rule, Workflow};
use crate::tab::TabId;

/// Rules and workflows applicable to one tab, replaced wholesale on every pass
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    pub tab: Option<TabId>,
    pub rules: Vec<Rule>,
    pub workflows: Vec<Workflow>,
}

impl MatchSet {
    pub fn new(tab: TabId, rules: Vec<Rule>, workflows: Vec<Workflow>) -> Self {
        Self {
            tab: Some(tab),
            rules,
            workflows,
        }
    }

    pub fn total_count(&self) -> usize {
        self.rules.len() + self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    pub fn find_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_count_and_lookup() {
        let empty = MatchSet::default();
        assert!(empty.is_empty());
        assert_eq!(empty.tab, None);

        let set = MatchSet::new(
            TabId(3),
            vec![Rule::new("1-1", "Login", vec![]), Rule::new("1-2", "Search", vec![])],
            vec![Workflow {
                id: "1".to_string(),
                name: "Flow".to_string(),
                steps: vec!["Login".to_string()],
                flags: Default::default(),
            }],
        );
        assert_eq!(set.total_count(), 3);
        assert_eq!(set.find_rule("1-2").map(|r| r.name.as_str()), Some("Search"));
        assert!(set.find_rule("9-9").is_none());
    }
}
