//! Computes the rules and workflows applicable to a tab
//!
//! Matching is best-effort: a page that cannot be reached contributes no
//! content matches and a failing store contributes no rules, but a pass
//! always produces a complete `MatchSet`.

use crate::channel::{PageChannel, match_content};
use crate::rule::{ContentMatcher, MatchSet, Rule};
use crate::store::{RuleStore, WorkflowStore};
use crate::tab::Tab;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do with a freshly computed match set
#[derive(Debug, Clone)]
pub enum MatchDecision {
    /// Exactly one autorun rule matched: fill right away
    AutoRun(Rule),
    /// Several or no matches, or the picker is forced by settings
    OfferPicker,
    /// A single match waiting for a click on the badge
    AwaitClick,
}

pub fn decide(matches: &MatchSet, always_show_popup: bool) -> MatchDecision {
    if matches.total_count() != 1 || always_show_popup {
        return MatchDecision::OfferPicker;
    }
    match matches.rules.first() {
        Some(rule) if rule.autorun => MatchDecision::AutoRun(rule.clone()),
        _ => MatchDecision::AwaitClick,
    }
}

pub struct RuleMatcher {
    rules: Arc<dyn RuleStore>,
    workflows: Arc<dyn WorkflowStore>,
    channel: Arc<dyn PageChannel>,
}

impl RuleMatcher {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        workflows: Arc<dyn WorkflowStore>,
        channel: Arc<dyn PageChannel>,
    ) -> Self {
        Self {
            rules,
            workflows,
            channel,
        }
    }

    /// Content matches first, in rule order, followed by URL matches
    pub async fn compute(&self, tab: &Tab) -> MatchSet {
        let all = self.rules.all().await.unwrap_or_else(|e| {
            warn!("Failed to load rules: {}", e);
            Vec::new()
        });
        let matchers: Vec<ContentMatcher> = all.iter().filter_map(Rule::content_matcher).collect();

        let (content_ids, url_rules) =
            tokio::join!(self.match_content(tab, matchers), self.match_url(tab));

        let mut rules: Vec<Rule> = all
            .into_iter()
            .filter(|rule| rule.content.is_some() && content_ids.contains(&rule.id))
            .collect();
        info!("Got {} rules matching the content of the page", rules.len());
        info!("Got {} rules matching the url of the page", url_rules.len());
        rules.extend(url_rules);

        self.rules.set_last_matching_rules(&rules).await;

        let workflows = self
            .workflows
            .matches_for_rules(&rules)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to match workflows: {}", e);
                Vec::new()
            });
        self.workflows.save_matches(&workflows).await;

        MatchSet::new(tab.id, rules, workflows)
    }

    async fn match_content(&self, tab: &Tab, matchers: Vec<ContentMatcher>) -> Vec<String> {
        if matchers.is_empty() {
            return Vec::new();
        }
        match match_content(self.channel.as_ref(), tab.id, matchers).await {
            Ok(ids) => ids,
            Err(e) => {
                debug!("No content matches from tab {}: {}", tab.id, e);
                Vec::new()
            }
        }
    }

    async fn match_url(&self, tab: &Tab) -> Vec<Rule> {
        self.rules.match_url(&tab.url).await.unwrap_or_else(|e| {
            warn!("Failed to match rules against {}: {}", tab.url, e);
            Vec::new()
        })
    }
}
