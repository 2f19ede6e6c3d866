use anyhow::anyhow;
use formfill::channel::mock::ScriptedPage;
use formfill::config::Settings;
use formfill::engine::{Engine, EngineOptions, PassOutcome, Services};
use formfill::fill::HookRegistry;
use formfill::imports::ImportResolver;
use formfill::indicator::RecordingIndicator;
use formfill::matcher::MatchDecision;
use formfill::report::{ErrorReport, ErrorReporter, RecordingNotifier};
use formfill::rule::{Field, HookSpec, Rule, RunningWorkflowState, Workflow, WorkflowFlags};
use formfill::store::{
    Definitions, JsonFileStore, MemoryStore, RuleBook, StateKey, StateStore, load_as, save_as,
};
use formfill::workflow::WorkflowStatus;
use formfill::{HostEvent, Tab};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

struct Harness {
    page: Arc<ScriptedPage>,
    state: Arc<dyn StateStore>,
    indicator: Arc<RecordingIndicator>,
    notifier: Arc<RecordingNotifier>,
    engine: Engine,
}

fn harness(
    rules: Vec<Rule>,
    workflows: Vec<Workflow>,
    state: Arc<dyn StateStore>,
    hooks: HookRegistry,
    settings: Settings,
) -> Harness {
    let book = Arc::new(RuleBook::new(Definitions { rules, workflows }));
    let page = Arc::new(ScriptedPage::new());
    let indicator = Arc::new(RecordingIndicator::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let services = Services {
        rules: book.clone(),
        workflows: book,
        state: state.clone(),
        channel: page.clone(),
        indicator: indicator.clone(),
        notifier: notifier.clone(),
        capture: None,
        hooks: Arc::new(hooks),
    };
    let options = EngineOptions {
        recheck_interval: Duration::from_secs(60),
        response_timeout: Duration::from_millis(20),
        settings,
    };
    let (engine, _events) = Engine::new(services, options);
    Harness {
        page,
        state,
        indicator,
        notifier,
        engine,
    }
}

fn simple(rules: Vec<Rule>, workflows: Vec<Workflow>) -> Harness {
    harness(
        rules,
        workflows,
        Arc::new(MemoryStore::new()),
        HookRegistry::new(),
        Settings::default(),
    )
}

fn url_rule(id: &str, name: &str, pattern: &str, fields: Vec<Field>) -> Rule {
    let mut rule = Rule::new(id, name, fields);
    rule.url = Some(Regex::new(pattern).unwrap());
    rule
}

fn workflow(steps: &[&str]) -> Workflow {
    Workflow {
        id: "1".to_string(),
        name: "Checkout".to_string(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        flags: WorkflowFlags::default(),
    }
}

fn tab() -> Tab {
    Tab::new(1, "https://shop.test/login")
}

async fn running_state(state: &dyn StateStore) -> Option<RunningWorkflowState> {
    load_as(state, StateKey::RunningWorkflow).await.unwrap()
}

#[tokio::test]
async fn test_single_autorun_rule_fills_without_interaction() {
    let mut login = url_rule("1-1", "Login", "login", vec![Field::fill("#u", "bob")]);
    login.autorun = true;
    let mut h = simple(vec![login], vec![]);

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    assert!(matches!(
        outcome,
        PassOutcome::Matched {
            total: 1,
            decision: MatchDecision::AutoRun(_)
        }
    ));

    let results = h.engine.settle().await;
    assert_eq!(results.len(), 1);

    let fills = h.page.fill_fields();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].0, "#u");
    assert_eq!(serde_json::from_str::<String>(&fills[0].1).unwrap(), "bob");
    assert_eq!(
        h.indicator.last_badge().map(|(text, _)| text),
        Some("1".to_string())
    );
}

#[tokio::test]
async fn test_multiple_matches_offer_picker_instead_of_autorun() {
    let mut first = url_rule("1-1", "Login", "login", vec![Field::fill("#u", "bob")]);
    first.autorun = true;
    let mut second = url_rule("1-2", "Other", "shop", vec![Field::fill("#o", 1)]);
    second.autorun = true;
    let mut h = simple(vec![first, second], vec![]);

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    assert!(matches!(
        outcome,
        PassOutcome::Matched {
            total: 2,
            decision: MatchDecision::OfferPicker
        }
    ));
    assert!(h.engine.settle().await.is_empty());
    assert!(h.page.fill_fields().is_empty());
    assert_eq!(h.indicator.picker_enabled(), Some(true));

    // the picker selects one of the matches
    h.engine
        .handle_event(HostEvent::FillWithRule {
            id: "1-2".to_string(),
        })
        .await;
    h.engine.settle().await;
    assert_eq!(h.page.fill_fields()[0].0, "#o");
}

#[tokio::test]
async fn test_always_show_popup_blocks_autorun() {
    let mut login = url_rule("1-1", "Login", "login", vec![Field::fill("#u", "bob")]);
    login.autorun = true;
    let settings = Settings {
        always_show_popup: true,
        ..Settings::default()
    };
    let mut h = harness(
        vec![login],
        vec![],
        Arc::new(MemoryStore::new()),
        HookRegistry::new(),
        settings,
    );

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    assert!(matches!(
        outcome,
        PassOutcome::Matched {
            total: 1,
            decision: MatchDecision::OfferPicker
        }
    ));
    assert!(h.engine.settle().await.is_empty());
    assert_eq!(h.indicator.picker_enabled(), Some(true));
}

#[tokio::test]
async fn test_workflow_runs_step_by_step_then_falls_back() {
    let rules = vec![
        Rule::new("1-1", "Login", vec![Field::fill("#u", "bob")]),
        url_rule("1-2", "Submit", "login", vec![Field::fill("#go", true)]),
    ];
    let mut h = simple(rules, vec![workflow(&["Login", "Submit"])]);

    h.engine
        .handle_event(HostEvent::TabActivated { tab: tab() })
        .await;
    h.engine
        .handle_event(HostEvent::FillWithWorkflow {
            id: "1".to_string(),
        })
        .await;
    h.engine.settle().await;
    assert_eq!(
        running_state(h.state.as_ref()).await.unwrap().current_step,
        1
    );

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    assert!(matches!(
        outcome,
        PassOutcome::Workflow {
            status: WorkflowStatus::Running { step: 1 },
            fallback: None
        }
    ));
    h.engine.settle().await;
    assert_eq!(
        running_state(h.state.as_ref()).await.unwrap().current_step,
        2
    );

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    match outcome {
        PassOutcome::Workflow {
            status: WorkflowStatus::Finished,
            fallback: Some(fallback),
        } => assert!(matches!(*fallback, PassOutcome::Matched { total: 2, .. })),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(running_state(h.state.as_ref()).await, None);

    let selectors: Vec<String> = h.page.fill_fields().into_iter().map(|f| f.0).collect();
    assert_eq!(selectors, vec!["#u", "#go"]);
}

#[tokio::test]
async fn test_workflow_finishes_after_exactly_k_steps() {
    let rules = vec![
        Rule::new("1-1", "A", vec![Field::fill("#a", 1)]),
        Rule::new("1-2", "B", vec![Field::fill("#b", 2)]),
        Rule::new("1-3", "C", vec![Field::fill("#c", 3)]),
    ];
    let mut h = simple(rules, vec![workflow(&["A", "B", "C"])]);
    save_as(
        h.state.as_ref(),
        StateKey::RunningWorkflow,
        &RunningWorkflowState::start(&workflow(&["A", "B", "C"])),
    )
    .await
    .unwrap();
    h.engine
        .handle_event(HostEvent::TabActivated { tab: tab() })
        .await;
    let mut advances = 0;

    loop {
        match h.engine.run_workflow_or_rule(Some(tab())).await {
            PassOutcome::Workflow {
                status: WorkflowStatus::Running { .. },
                ..
            } => advances += 1,
            PassOutcome::Workflow {
                status: WorkflowStatus::Finished,
                ..
            } => break,
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(advances <= 3);
    }

    h.engine.settle().await;
    assert_eq!(advances, 3);
    assert_eq!(running_state(h.state.as_ref()).await, None);
    assert_eq!(h.page.fill_fields().len(), 3);
}

#[tokio::test]
async fn test_workflow_with_unknown_step_self_heals() {
    let mut h = simple(
        vec![url_rule("1-1", "Login", "login", vec![])],
        vec![workflow(&["Missing"])],
    );
    h.engine
        .handle_event(HostEvent::TabActivated { tab: tab() })
        .await;

    h.engine
        .handle_event(HostEvent::FillWithWorkflow {
            id: "1".to_string(),
        })
        .await;
    assert_eq!(running_state(h.state.as_ref()).await, None);
    assert_eq!(h.notifier.messages(), vec!["Workflow error: rule not found!"]);
    // matching runs again right away, so the step badge is replaced
    assert_eq!(
        h.indicator.last_badge().map(|(text, _)| text),
        Some("1".to_string())
    );
    assert_eq!(h.engine.matches().total_count(), 1);

    let outcome = h.engine.run_workflow_or_rule(Some(tab())).await;
    assert!(matches!(outcome, PassOutcome::Matched { total: 1, .. }));
}

#[tokio::test]
async fn test_workflow_resume_is_identical_after_restart() {
    let rules = vec![
        Rule::new("1-1", "Login", vec![Field::fill("#u", "bob")]),
        Rule::new("1-2", "Submit", vec![Field::fill("#go", true)]),
    ];
    let flow = workflow(&["Login", "Submit"]);
    let dir = tempdir().unwrap();
    let stored = RunningWorkflowState::start(&flow).advanced();

    let mut observed = Vec::new();
    for _ in 0..2 {
        // a fresh store and engine stand in for a restarted process
        let state: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(dir.path()));
        save_as(state.as_ref(), StateKey::RunningWorkflow, &stored)
            .await
            .unwrap();

        let mut h = harness(
            rules.clone(),
            vec![flow.clone()],
            state,
            HookRegistry::new(),
            Settings::default(),
        );
        h.engine
            .handle_event(HostEvent::TabActivated { tab: tab() })
            .await;
        h.engine.run_workflow_or_rule(Some(tab())).await;
        h.engine.settle().await;

        observed.push((
            h.page.fill_fields(),
            running_state(h.state.as_ref()).await,
        ));
    }

    assert_eq!(observed[0], observed[1]);
    assert_eq!(observed[0].0.len(), 1);
    assert_eq!(observed[0].0[0].0, "#go");
    assert_eq!(observed[0].1.as_ref().unwrap().current_step, 2);
}

#[tokio::test]
async fn test_missing_import_is_reported_and_left_unexpanded() {
    let mut rule = url_rule(
        "1-1",
        "Address",
        "login",
        vec![Field::import("SharedAddress")],
    );
    rule.autorun = true;
    let mut h = simple(vec![rule], vec![]);

    h.engine.run_workflow_or_rule(Some(tab())).await;
    let results = h.engine.settle().await;
    let report = results[0].as_ref().unwrap();

    assert_eq!(report.missing_imports, vec!["SharedAddress"]);
    assert_eq!(report.fields_sent, 0);
    assert!(h.page.fill_fields().is_empty());

    let log: ErrorReport = load_as(h.state.as_ref(), StateKey::ErrorLog)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.errors[0].value, "SharedAddress");
    assert_eq!(log.rule.name, "Address");
}

#[tokio::test]
async fn test_nested_import_remains_literal() {
    let inner = Rule::new("1-1", "Inner", vec![Field::fill("#deep", 1)]);
    let outer = Rule::new(
        "1-2",
        "Outer",
        vec![Field::import("Inner"), Field::fill("#outer", 2)],
    );
    let top = Rule::new("1-3", "Top", vec![Field::import("Outer")]);
    let book = Arc::new(RuleBook::new(Definitions {
        rules: vec![inner, outer, top.clone()],
        workflows: vec![],
    }));
    let reporter = ErrorReporter::new(
        Arc::new(RecordingNotifier::new()),
        Arc::new(MemoryStore::new()),
    );

    let resolution = ImportResolver::new(book, reporter).resolve(top).await;
    assert_eq!(
        resolution.rule.fields,
        vec![Field::import("Inner"), Field::fill("#outer", 2)]
    );
    assert!(resolution.missing.is_empty());
}

#[tokio::test]
async fn test_failing_before_hook_does_not_stop_fill() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("boom", |_| Err(anyhow!("boom")));

    let mut rule = url_rule(
        "1-1",
        "Login",
        "login",
        vec![Field::fill("#u", "bob"), Field::fill("#p", "secret")],
    );
    rule.autorun = true;
    rule.before = vec![
        HookSpec::Named("boom".to_string()),
        HookSpec::Const { value: json!("x") },
    ];
    let mut h = harness(
        vec![rule],
        vec![],
        Arc::new(MemoryStore::new()),
        hooks,
        Settings::default(),
    );

    h.engine.run_workflow_or_rule(Some(tab())).await;
    let results = h.engine.settle().await;
    let report = results[0].as_ref().unwrap();

    assert_eq!(report.fields_sent, 2);
    assert_eq!(report.hook_failures.len(), 1);
    assert_eq!(report.hook_failures[0].message, "boom");

    let before: Vec<Value> = h.page.fill_fields().into_iter().map(|f| f.2).collect();
    assert_eq!(before, vec![json!([null, "x"]), json!([null, "x"])]);

    let log: ErrorReport = load_as(h.state.as_ref(), StateKey::ErrorLog)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.errors.len(), 1);
    assert_eq!(log.errors[0].selector, "Inside before function");
    assert_eq!(log.errors[0].message, "boom");
    assert_eq!(h.notifier.messages().len(), 1);
}
