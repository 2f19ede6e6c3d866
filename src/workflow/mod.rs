//! Persisted multi-page workflow execution
//!
//! The running state lives only in the state store and is re-read on every
//! trigger, so a restarted process resumes exactly where it stopped.

use crate::channel::{PageChannel, PageRequest};
use crate::error::EngineError;
use crate::fill::{FillHandle, FillPipeline};
use crate::indicator::{BadgeColor, Indicator};
use crate::report::{ErrorReporter, FillError};
use crate::rule::{RuleSummary, RunningWorkflowState};
use crate::store::{RuleStore, StateKey, StateStore, StoreError, WorkflowStore, load_as, save_as};
use crate::tab::Tab;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    NotRunning,
    /// Step `step` (zero based) was dispatched
    Running { step: usize },
    Finished,
    RuleNotFound { name: String },
}

impl WorkflowStatus {
    /// Only a workflow that is not running lets ordinary matching run
    pub fn run_rules(&self) -> bool {
        matches!(self, WorkflowStatus::NotRunning)
    }

    /// The workflow just ended and the badge needs a fresh match
    pub fn ended(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Finished | WorkflowStatus::RuleNotFound { .. }
        )
    }
}

/// Result of one trigger
#[derive(Debug)]
pub struct StepOutcome {
    pub status: WorkflowStatus,
    /// Fill of the dispatched step, still running in the background
    pub dispatch: Option<FillHandle>,
}

impl StepOutcome {
    fn status(status: WorkflowStatus) -> Self {
        Self {
            status,
            dispatch: None,
        }
    }
}

pub struct WorkflowRunner {
    rules: Arc<dyn RuleStore>,
    workflows: Arc<dyn WorkflowStore>,
    state: Arc<dyn StateStore>,
    channel: Arc<dyn PageChannel>,
    indicator: Arc<dyn Indicator>,
    reporter: ErrorReporter,
    pipeline: Arc<FillPipeline>,
}

impl WorkflowRunner {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        workflows: Arc<dyn WorkflowStore>,
        state: Arc<dyn StateStore>,
        channel: Arc<dyn PageChannel>,
        indicator: Arc<dyn Indicator>,
        reporter: ErrorReporter,
        pipeline: Arc<FillPipeline>,
    ) -> Self {
        Self {
            rules,
            workflows,
            state,
            channel,
            indicator,
            reporter,
            pipeline,
        }
    }

    /// Persist step 0 of a workflow and run it right away
    pub async fn start(
        &self,
        workflow_id: &str,
        tab: Option<&Tab>,
        color: BadgeColor,
        jpeg_quality: u8,
    ) -> Result<StepOutcome, EngineError> {
        let workflow = self
            .workflows
            .find_by_id(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        info!(
            "Starting workflow '{}' with {} steps",
            workflow.name,
            workflow.steps.len()
        );
        save_as(
            self.state.as_ref(),
            StateKey::RunningWorkflow,
            &RunningWorkflowState::start(&workflow),
        )
        .await?;

        self.on_trigger(tab, color, jpeg_quality).await
    }

    /// Advance the running workflow, if any, by one step
    pub async fn on_trigger(
        &self,
        tab: Option<&Tab>,
        color: BadgeColor,
        jpeg_quality: u8,
    ) -> Result<StepOutcome, EngineError> {
        let Some(tab) = tab else {
            return Ok(StepOutcome::status(WorkflowStatus::NotRunning));
        };
        let Some(state) = self.load_state().await? else {
            return Ok(StepOutcome::status(WorkflowStatus::NotRunning));
        };

        let Some(name) = state.current_rule_name() else {
            self.show_message(tab, "Workflow finished!").await;
            self.state.delete(StateKey::RunningWorkflow).await?;
            info!("Workflow finished after {} steps", state.steps.len());
            return Ok(StepOutcome::status(WorkflowStatus::Finished));
        };

        let step = state.current_step;
        info!("Using workflow step # {} ({})", step + 1, name);
        self.indicator
            .set_badge(tab.id, &format!("#{}", step + 1), color)
            .await;

        let Some(mut rule) = self.rules.find_by_name(name).await? else {
            self.show_message(tab, "Workflow error: rule not found!").await;
            self.state.delete(StateKey::RunningWorkflow).await?;

            let error = EngineError::WorkflowStepUnresolvable {
                step: name.to_string(),
            };
            let errors = vec![FillError::new(
                "workflow",
                name,
                &format!("No rule is named '{}'", name),
            )];
            let summary = RuleSummary {
                id: String::new(),
                name: name.to_string(),
            };
            self.reporter.report(&error, errors, summary).await;

            return Ok(StepOutcome::status(WorkflowStatus::RuleNotFound {
                name: name.to_string(),
            }));
        };

        if state.flags.screenshot {
            info!("Setting screenshot on rule '{}' because the workflow says so", rule.name);
            rule.screenshot = true;
        }

        self.show_message(
            tab,
            &format!("Workflow step {}/{}", step + 1, state.steps.len()),
        )
        .await;
        let dispatch = self.pipeline.spawn(rule, Some(tab.clone()), jpeg_quality);

        save_as(self.state.as_ref(), StateKey::RunningWorkflow, &state.advanced()).await?;

        Ok(StepOutcome {
            status: WorkflowStatus::Running { step },
            dispatch: Some(dispatch),
        })
    }

    /// Unreadable state is discarded rather than blocking every trigger
    async fn load_state(&self) -> Result<Option<RunningWorkflowState>, EngineError> {
        match load_as(self.state.as_ref(), StateKey::RunningWorkflow).await {
            Ok(state) => Ok(state),
            Err(StoreError::Json(e)) => {
                warn!("Discarding unreadable workflow state: {}", e);
                self.state.delete(StateKey::RunningWorkflow).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn show_message(&self, tab: &Tab, message: &str) {
        let request = PageRequest::ShowMessage {
            message: message.to_string(),
        };
        if let Err(e) = self.channel.post(tab.id, request).await {
            debug!("Could not show '{}' on tab {}: {}", message, tab.id, e);
        }
    }
}
