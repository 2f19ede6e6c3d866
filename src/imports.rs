//! Splices the fields of shared rules into rules that import them

use crate::error::EngineError;
use crate::report::{ErrorReporter, FillError};
use crate::rule::{Field, Rule};
use crate::store::RuleStore;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Rule with resolvable imports replaced
#[derive(Debug, Clone)]
pub struct Resolution {
    pub rule: Rule,
    /// One entry per import occurrence that named no known rule
    pub missing: Vec<String>,
}

pub struct ImportResolver {
    rules: Arc<dyn RuleStore>,
    reporter: ErrorReporter,
}

impl ImportResolver {
    pub fn new(rules: Arc<dyn RuleStore>, reporter: ErrorReporter) -> Self {
        Self { rules, reporter }
    }

    /// Replace every import with the fields of the rule it names.
    ///
    /// Resolution is a single pass: fields brought in by an import are not
    /// themselves resolved.
    pub async fn resolve(&self, rule: Rule) -> Resolution {
        let requested: Vec<String> = rule
            .fields
            .iter()
            .filter_map(Field::import_name)
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Resolution {
                rule,
                missing: Vec::new(),
            };
        }

        let mut distinct: Vec<&String> = Vec::new();
        for name in &requested {
            if !distinct.contains(&name) {
                distinct.push(name);
            }
        }

        let found = join_all(distinct.into_iter().map(|name| async move {
            match self.rules.find_by_name(name).await {
                Ok(rule) => (name.clone(), rule),
                Err(e) => {
                    warn!("Failed to look up imported rule '{}': {}", name, e);
                    (name.clone(), None)
                }
            }
        }))
        .await;

        let lookup: HashMap<String, Vec<Field>> = found
            .into_iter()
            .filter_map(|(name, rule)| rule.map(|rule| (name, rule.fields)))
            .collect();
        if !lookup.is_empty() {
            info!(
                "Found importable rules: {:?}",
                lookup.keys().collect::<Vec<_>>()
            );
        }

        let missing: Vec<String> = requested
            .into_iter()
            .filter(|name| !lookup.contains_key(name))
            .collect();
        if !missing.is_empty() {
            self.report_missing(&rule, &missing).await;
        }

        if lookup.is_empty() {
            return Resolution { rule, missing };
        }

        let mut rule = rule;
        rule.fields = splice_imports(rule.fields, &lookup);
        Resolution { rule, missing }
    }

    async fn report_missing(&self, rule: &Rule, missing: &[String]) {
        let errors = missing
            .iter()
            .map(|name| {
                FillError::new(
                    "import",
                    name,
                    &format!("Missing rule is named '{}'", name),
                )
            })
            .collect();
        let error = EngineError::MissingImport {
            rule: rule.name.clone(),
            imports: missing.to_vec(),
        };
        self.reporter.report(&error, errors, rule.summary()).await;
    }
}

/// Each resolvable import is replaced in place; unresolvable ones stay
pub fn splice_imports(fields: Vec<Field>, lookup: &HashMap<String, Vec<Field>>) -> Vec<Field> {
    let mut spliced = Vec::with_capacity(fields.len());
    for field in fields {
        match field.import_name().and_then(|name| lookup.get(name)) {
            Some(imported) => spliced.extend(imported.iter().cloned()),
            None => spliced.push(field),
        }
    }
    spliced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ErrorReport, RecordingNotifier};
    use crate::store::{Definitions, MemoryStore, RuleBook, StateKey, load_as};

    fn resolver(rules: Vec<Rule>) -> (ImportResolver, Arc<RecordingNotifier>, Arc<MemoryStore>) {
        let book = Arc::new(RuleBook::new(Definitions {
            rules,
            workflows: Vec::new(),
        }));
        let notifier = Arc::new(RecordingNotifier::new());
        let state = Arc::new(MemoryStore::new());
        let reporter = ErrorReporter::new(notifier.clone(), state.clone());
        (ImportResolver::new(book, reporter), notifier, state)
    }

    #[tokio::test]
    async fn test_import_is_spliced_in_place() {
        let shared = Rule::new(
            "1-1",
            "SharedAddress",
            vec![Field::fill("#street", "Main St"), Field::fill("#city", "Springfield")],
        );
        let login = Rule::new(
            "1-2",
            "Login",
            vec![
                Field::fill("#user", "bob"),
                Field::import("SharedAddress"),
                Field::fill("#submit", true),
            ],
        );
        let (resolver, notifier, _) = resolver(vec![shared, login.clone()]);

        let resolution = resolver.resolve(login).await;
        assert!(resolution.missing.is_empty());
        assert_eq!(
            resolution.rule.fields,
            vec![
                Field::fill("#user", "bob"),
                Field::fill("#street", "Main St"),
                Field::fill("#city", "Springfield"),
                Field::fill("#submit", true),
            ]
        );
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_missing_import_is_reported_per_occurrence() {
        let rule = Rule::new(
            "1-1",
            "Login",
            vec![
                Field::import("Nowhere"),
                Field::fill("#user", "bob"),
                Field::import("Nowhere"),
            ],
        );
        let (resolver, notifier, state) = resolver(vec![rule.clone()]);

        let resolution = resolver.resolve(rule.clone()).await;
        assert_eq!(resolution.missing, vec!["Nowhere", "Nowhere"]);
        assert_eq!(resolution.rule.fields, rule.fields);
        assert_eq!(notifier.messages().len(), 1);

        let report: ErrorReport = load_as(state.as_ref(), StateKey::ErrorLog)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].message, "Missing rule is named 'Nowhere'");
        assert_eq!(report.rule.name, "Login");
    }

    #[tokio::test]
    async fn test_nested_import_stays_literal() {
        let inner = Rule::new("1-1", "Inner", vec![Field::fill("#deep", 1)]);
        let outer = Rule::new(
            "1-2",
            "Outer",
            vec![Field::fill("#outer", 2), Field::import("Inner")],
        );
        let top = Rule::new("1-3", "Top", vec![Field::import("Outer")]);
        let (resolver, _, _) = resolver(vec![inner, outer, top.clone()]);

        let resolution = resolver.resolve(top).await;
        assert_eq!(
            resolution.rule.fields,
            vec![Field::fill("#outer", 2), Field::import("Inner")]
        );
    }

    #[tokio::test]
    async fn test_rule_without_imports_is_untouched() {
        let rule = Rule::new("1-1", "Plain", vec![Field::fill("#a", "b")]);
        let (resolver, notifier, _) = resolver(vec![rule.clone()]);
        let resolution = resolver.resolve(rule.clone()).await;
        assert_eq!(resolution.rule.fields, rule.fields);
        assert!(notifier.messages().is_empty());
    }
}
