//! Single-owner coordinator
//!
//! All coordination state (last active tab, current match set, settings and
//! the recheck timer) is owned by one `Engine` value driven by one task.
//! Events are handled strictly one after another, so a later pass always
//! overwrites the results of an earlier one.

use crate::channel::{HostEvent, PageChannel};
use crate::config::{Config, Settings};
use crate::error::EngineError;
use crate::fill::screenshot::screenshot_filename;
use crate::fill::{
    FillHandle, FillPipeline, FillReport, HookRegistry, ScreenCapture, ScreenshotFlag,
    ScreenshotMeta,
};
use crate::indicator::Indicator;
use crate::matcher::{MatchDecision, RuleMatcher, decide};
use crate::recheck::RecheckScheduler;
use crate::report::{ErrorReporter, Notifier};
use crate::rule::{MatchSet, Rule};
use crate::store::{RuleStore, StateKey, StateStore, WorkflowStore, load_as, save_as};
use crate::tab::Tab;
use crate::workflow::{WorkflowRunner, WorkflowStatus};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const WELCOME_MESSAGE: &str =
    "Thanks for installing! Click here to learn how to write your first rule.";

#[derive(Debug)]
pub enum EngineEvent {
    Host {
        event: HostEvent,
        reply: Option<oneshot::Sender<Value>>,
    },
    /// Tick of the recheck timer
    Recheck,
}

/// Collaborators the engine talks to
#[derive(Clone)]
pub struct Services {
    pub rules: Arc<dyn RuleStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub state: Arc<dyn StateStore>,
    pub channel: Arc<dyn PageChannel>,
    pub indicator: Arc<dyn Indicator>,
    pub notifier: Arc<dyn Notifier>,
    pub capture: Option<Arc<dyn ScreenCapture>>,
    pub hooks: Arc<HookRegistry>,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub recheck_interval: Duration,
    pub response_timeout: Duration,
    /// Used when no settings were persisted yet
    pub settings: Settings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            recheck_interval: Duration::from_secs(2),
            response_timeout: Duration::from_millis(1500),
            settings: Settings::default(),
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            recheck_interval: config.recheck_interval,
            response_timeout: config.bridge.response_timeout,
            settings: config.settings.clone(),
        }
    }
}

/// What a trigger led to
#[derive(Debug)]
pub enum PassOutcome {
    /// No tab to work on, or the tab cannot be matched
    Skipped,
    Workflow {
        status: WorkflowStatus,
        /// Matching pass run after the workflow ended
        fallback: Option<Box<PassOutcome>>,
    },
    Matched {
        total: usize,
        decision: MatchDecision,
    },
}

/// Sending side of the engine's event queue
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { events }
    }

    /// Queue an event, returns false once the engine stopped
    pub fn send(&self, event: HostEvent) -> bool {
        self.events
            .send(EngineEvent::Host { event, reply: None })
            .is_ok()
    }

    /// Queue an event now and hand back where its answer will arrive
    pub fn queue_request(&self, event: HostEvent) -> Option<oneshot::Receiver<Value>> {
        let (reply, answer) = oneshot::channel();
        self.events
            .send(EngineEvent::Host {
                event,
                reply: Some(reply),
            })
            .ok()?;
        Some(answer)
    }

    /// Queue an event and wait for its answer
    pub async fn request(&self, event: HostEvent) -> Option<Value> {
        self.queue_request(event)?.await.ok()
    }
}

pub struct Engine {
    state: Arc<dyn StateStore>,
    indicator: Arc<dyn Indicator>,
    capture: Option<Arc<dyn ScreenCapture>>,
    reporter: ErrorReporter,
    matcher: RuleMatcher,
    runner: WorkflowRunner,
    pipeline: Arc<FillPipeline>,
    scheduler: RecheckScheduler,
    events: mpsc::UnboundedSender<EngineEvent>,
    defaults: Settings,
    settings: Settings,
    last_active_tab: Option<Tab>,
    matches: MatchSet,
    in_flight: Vec<FillHandle>,
}

impl Engine {
    pub fn new(
        services: Services,
        options: EngineOptions,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let reporter = ErrorReporter::new(services.notifier.clone(), services.state.clone());
        let pipeline = Arc::new(FillPipeline::new(
            services.channel.clone(),
            services.rules.clone(),
            reporter.clone(),
            services.hooks.clone(),
            services.capture.clone(),
            options.response_timeout,
        ));
        let matcher = RuleMatcher::new(
            services.rules.clone(),
            services.workflows.clone(),
            services.channel.clone(),
        );
        let runner = WorkflowRunner::new(
            services.rules.clone(),
            services.workflows.clone(),
            services.state.clone(),
            services.channel.clone(),
            services.indicator.clone(),
            reporter.clone(),
            pipeline.clone(),
        );

        let engine = Self {
            state: services.state,
            indicator: services.indicator,
            capture: services.capture,
            reporter,
            matcher,
            runner,
            pipeline,
            scheduler: RecheckScheduler::new(options.recheck_interval, events.clone()),
            events,
            defaults: options.settings.clone(),
            settings: options.settings,
            last_active_tab: None,
            matches: MatchSet::default(),
            in_flight: Vec::new(),
        };
        (engine, receiver)
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.events.clone())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn last_active_tab(&self) -> Option<&Tab> {
        self.last_active_tab.as_ref()
    }

    pub fn matches(&self) -> &MatchSet {
        &self.matches
    }

    pub fn is_rechecking(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Load persisted settings, falling back to the configured ones, and arm the timer
    pub async fn bootstrap(&mut self) {
        self.settings = match load_as::<Settings>(self.state.as_ref(), StateKey::Settings).await {
            Ok(Some(settings)) => settings,
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                self.defaults.clone()
            }
        };
        self.scheduler.set_enabled(self.settings.reeval_rules);
        info!("Settings set to {:?}", self.settings);
    }

    /// Handle queued events one at a time until the task is aborted
    pub async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<EngineEvent>) {
        info!("Engine started");
        while let Some(event) = receiver.recv().await {
            match event {
                EngineEvent::Host { event, reply } => {
                    let answer = self.handle_event(event).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(answer.unwrap_or(Value::Null));
                    }
                }
                EngineEvent::Recheck => {
                    self.recheck().await;
                }
            }
            self.in_flight.retain(|handle| !handle.is_finished());
        }
        self.scheduler.disable();
        info!("Engine stopped");
    }

    /// Wait for every fill started so far
    pub async fn settle(&mut self) -> Vec<Result<FillReport, EngineError>> {
        let mut results = Vec::new();
        for handle in self.in_flight.drain(..) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => warn!("Fill task failed: {}", e),
            }
        }
        results
    }

    pub async fn handle_event(&mut self, event: HostEvent) -> Option<Value> {
        debug!("Received event {:?}", event);
        match event {
            HostEvent::TabActivated { tab } => {
                self.run_workflow_or_rule(Some(tab)).await;
                None
            }
            HostEvent::TabUpdated { tab, status } => {
                if status.as_deref() == Some("complete") {
                    self.run_workflow_or_rule(Some(tab)).await;
                } else if let Some(last) = self
                    .last_active_tab
                    .as_mut()
                    .filter(|last| last.id == tab.id)
                {
                    *last = tab;
                }
                None
            }
            HostEvent::BadgeClicked => {
                self.apply_single_match().await;
                None
            }
            HostEvent::FillWithRule { id } => {
                match self.matches.find_rule(&id).cloned() {
                    Some(rule) => {
                        info!("Filling with rule {} ({})", id, rule.name);
                        self.dispatch(rule);
                    }
                    None => warn!("Rule {} is not among the current matches", id),
                }
                Some(Value::Bool(true))
            }
            HostEvent::FillWithWorkflow { id } => {
                self.start_workflow(&id).await;
                Some(Value::Bool(true))
            }
            HostEvent::SetSettings { settings } => {
                self.settings = settings;
                self.persist_settings().await;
                self.scheduler.set_enabled(self.settings.reeval_rules);
                info!("Settings set to {:?}", self.settings);
                None
            }
            HostEvent::ToggleSetting { name } => {
                let value = self.settings.toggle(&name)?;
                self.persist_settings().await;
                if name == "reevalRules" {
                    self.scheduler.set_enabled(value);
                }
                Some(Value::Bool(value))
            }
            HostEvent::LastActiveTabId => self.last_active_tab.as_ref().map(|tab| json!(tab.id)),
            HostEvent::TakeScreenshot { flag, value } => {
                self.take_screenshot(&flag, value.as_ref()).await;
                None
            }
            HostEvent::Installed { reason } => {
                self.on_installed(&reason).await;
                None
            }
        }
    }

    /// Re-run the pass against the last reported snapshot of the active tab.
    /// The url is whatever the host last sent for that tab, so in-page
    /// navigation that produced no tab update is not seen here.
    pub async fn recheck(&mut self) -> PassOutcome {
        match self.last_active_tab.clone() {
            Some(tab) => self.run_workflow_or_rule(Some(tab)).await,
            None => PassOutcome::Skipped,
        }
    }

    /// Continue a running workflow, or match rules when none is running
    pub async fn run_workflow_or_rule(&mut self, tab: Option<Tab>) -> PassOutcome {
        if let (Some(tab), Some(last)) = (&tab, &mut self.last_active_tab) {
            if tab.id == last.id {
                *last = tab.clone();
            }
        }

        let step = match self
            .runner
            .on_trigger(
                self.last_active_tab.as_ref(),
                self.scheduler.badge_color(),
                self.settings.jpeg_quality,
            )
            .await
        {
            Ok(step) => step,
            Err(e) => {
                warn!("Failed to check running workflow: {}", e);
                return PassOutcome::Skipped;
            }
        };
        if let Some(handle) = step.dispatch {
            self.in_flight.push(handle);
        }

        if step.status.run_rules() {
            return self.match_tab(tab).await;
        }

        let fallback = if step.status.ended() {
            let last = self.last_active_tab.clone();
            Some(Box::new(self.match_tab(last).await))
        } else {
            None
        };
        PassOutcome::Workflow {
            status: step.status,
            fallback,
        }
    }

    async fn match_tab(&mut self, tab: Option<Tab>) -> PassOutcome {
        let Some(tab) = tab else {
            return PassOutcome::Skipped;
        };

        self.indicator.set_picker(tab.id, false).await;
        if !tab.active || tab.is_restricted() {
            debug!("Not matching inactive or restricted tab {}", tab.id);
            return PassOutcome::Skipped;
        }

        info!("Matching rules on tab {}", tab.id);
        self.last_active_tab = Some(tab.clone());

        let matches = self.matcher.compute(&tab).await;
        let total = matches.total_count();
        let text = if total > 0 {
            total.to_string()
        } else {
            String::new()
        };
        self.indicator
            .set_badge(tab.id, &text, self.scheduler.badge_color())
            .await;

        let decision = decide(&matches, self.settings.always_show_popup);
        self.matches = matches;
        match &decision {
            MatchDecision::OfferPicker => self.indicator.set_picker(tab.id, true).await,
            MatchDecision::AutoRun(rule) => {
                info!("Rule '{}' is set to autorun", rule.name);
                self.dispatch(rule.clone());
            }
            MatchDecision::AwaitClick => {}
        }

        PassOutcome::Matched { total, decision }
    }

    fn dispatch(&mut self, rule: Rule) {
        let handle = self.pipeline.spawn(
            rule,
            self.last_active_tab.clone(),
            self.settings.jpeg_quality,
        );
        self.in_flight.push(handle);
    }

    async fn apply_single_match(&mut self) {
        if let Some(rule) = self.matches.rules.first().cloned() {
            self.dispatch(rule);
        } else if let Some(workflow) = self.matches.workflows.first() {
            let id = workflow.id.clone();
            self.start_workflow(&id).await;
        } else {
            debug!("Badge clicked without matches");
        }
    }

    async fn start_workflow(&mut self, id: &str) {
        let result = self
            .runner
            .start(
                id,
                self.last_active_tab.as_ref(),
                self.scheduler.badge_color(),
                self.settings.jpeg_quality,
            )
            .await;
        match result {
            Ok(step) => {
                if let Some(handle) = step.dispatch {
                    self.in_flight.push(handle);
                }
                if step.status.ended() {
                    let last = self.last_active_tab.clone();
                    self.match_tab(last).await;
                }
            }
            Err(e) => warn!("Failed to start workflow {}: {}", id, e),
        }
    }

    async fn persist_settings(&self) {
        if let Err(e) = save_as(self.state.as_ref(), StateKey::Settings, &self.settings).await {
            warn!("Failed to store settings: {}", e);
        }
    }

    async fn take_screenshot(
        &self,
        flag: &ScreenshotFlag,
        meta: Option<&ScreenshotMeta>,
    ) {
        let (Some(capture), Some(tab)) = (&self.capture, &self.last_active_tab) else {
            debug!("No screenshot without capture support and an active tab");
            return;
        };
        let Some(filename) = screenshot_filename(flag, meta) else {
            return;
        };
        info!("Taking a screenshot of window {}", tab.window_id);
        if let Err(e) = capture
            .capture(tab.window_id, self.settings.jpeg_quality, &filename)
            .await
        {
            warn!("Failed to take screenshot {}: {:#}", filename, e);
        }
    }

    async fn on_installed(&self, reason: &str) {
        info!("Installed ({})", reason);
        if reason == "install" {
            self.reporter.notify(WELCOME_MESSAGE).await;
        }

        match self.state.load(StateKey::TabConfig).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("Creating default tab setting");
                let tabs = json!([{"id": 1, "name": "Default"}]);
                if let Err(e) = self.state.save(StateKey::TabConfig, tabs).await {
                    warn!("Failed to store tab config: {}", e);
                }
            }
            Err(e) => warn!("Failed to load tab config: {}", e),
        }

        if let Err(e) = self.state.delete(StateKey::ErrorLog).await {
            warn!("Failed to clear error log: {}", e);
        }
    }
}
