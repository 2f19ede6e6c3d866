//! Application of one rule to one tab
//!
//! A pass opens a connection to the tab, runs the rule's before hooks,
//! resolves imports, posts one `fillField` per field and finally collects the
//! errors the page ran into.

pub mod hooks;
pub mod screenshot;

pub use hooks::{BeforeHook, HookContext, HookFailure, HookRegistry};
pub use screenshot::{ScreenCapture, ScreenshotFlag, ScreenshotMeta};

use crate::channel::{ChannelError, PageChannel, PageConnection, PagePush, PageRequest};
use crate::error::EngineError;
use crate::imports::ImportResolver;
use crate::report::{ErrorReporter, FillError};
use crate::rule::{Field, Rule, RuleSummary};
use crate::store::RuleStore;
use crate::tab::Tab;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a finished application did
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub rule: RuleSummary,
    pub fields_sent: usize,
    pub before_data: Value,
    pub hook_failures: Vec<HookFailure>,
    pub fill_errors: Vec<FillError>,
    pub missing_imports: Vec<String>,
    pub screenshot: Option<String>,
}

pub type FillHandle = JoinHandle<Result<FillReport, EngineError>>;

pub struct FillPipeline {
    channel: Arc<dyn PageChannel>,
    resolver: ImportResolver,
    reporter: ErrorReporter,
    hooks: Arc<HookRegistry>,
    capture: Option<Arc<dyn ScreenCapture>>,
    response_timeout: Duration,
}

impl FillPipeline {
    pub fn new(
        channel: Arc<dyn PageChannel>,
        rules: Arc<dyn RuleStore>,
        reporter: ErrorReporter,
        hooks: Arc<HookRegistry>,
        capture: Option<Arc<dyn ScreenCapture>>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            resolver: ImportResolver::new(rules, reporter.clone()),
            reporter,
            hooks,
            capture,
            response_timeout,
        }
    }

    /// Start an application in the background
    pub fn spawn(self: &Arc<Self>, rule: Rule, tab: Option<Tab>, jpeg_quality: u8) -> FillHandle {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let name = rule.name.clone();
            let result = pipeline.apply(rule, tab, jpeg_quality).await;
            if let Err(e) = &result {
                warn!("Failed to apply rule '{}': {}", name, e);
            }
            result
        })
    }

    pub async fn apply(
        &self,
        rule: Rule,
        tab: Option<Tab>,
        jpeg_quality: u8,
    ) -> Result<FillReport, EngineError> {
        let Some(tab) = tab else {
            info!("Target tab has gone away, not applying rule '{}'", rule.name);
            return Err(EngineError::NoTargetTab(rule.name));
        };

        let mut connection = self.channel.connect(tab.id).await?;
        connection.post(PageRequest::ShowWorkingOverlay)?;

        let result = self
            .fill(&mut connection, rule, &tab, jpeg_quality)
            .await;

        if let Err(e) = connection.post(PageRequest::HideWorkingOverlay) {
            debug!("Could not hide working overlay: {}", e);
        }
        result
    }

    async fn fill(
        &self,
        connection: &mut PageConnection,
        rule: Rule,
        tab: &Tab,
        jpeg_quality: u8,
    ) -> Result<FillReport, EngineError> {
        info!(
            "Applying rule '{}' ({} fields) to tab {}",
            rule.name,
            rule.fields.len(),
            tab.id
        );

        let context = HookContext::new(tab, Arc::clone(&self.channel));
        let outcomes = hooks::run_hooks(&self.hooks.build_all(&rule.before), &context).await;
        let hook_failures = hooks::failures(&outcomes);

        let hook_report = if hook_failures.is_empty() {
            None
        } else {
            let reporter = self.reporter.clone();
            let error = EngineError::BeforeHook {
                rule: rule.name.clone(),
                count: hook_failures.len(),
            };
            let errors = hook_failures
                .iter()
                .map(|failure| {
                    FillError::new("Inside before function", &failure.before_function, &failure.message)
                })
                .collect();
            let summary = rule.summary();
            Some(tokio::spawn(async move {
                reporter.report(&error, errors, summary).await;
            }))
        };

        let before_data = hooks::before_data(&outcomes);
        debug!("Got before data: {}", before_data);

        let resolution = self.resolver.resolve(rule).await;
        let rule = resolution.rule;

        let mut fields_sent = 0;
        for field in &rule.fields {
            match field {
                Field::Fill { selector, value } => {
                    connection.post(PageRequest::FillField {
                        selector: selector.clone(),
                        value: value.to_string(),
                        before_data: before_data.clone(),
                    })?;
                    fields_sent += 1;
                    debug!("Posted: Fill {} with {}", selector, value);
                }
                Field::Import { import } => {
                    debug!("Skipping unresolved import '{}'", import);
                }
            }
        }

        connection.post(PageRequest::GetErrors)?;
        let fill_errors = self.collect_errors(connection).await;
        if !fill_errors.is_empty() {
            let error = EngineError::FieldFill {
                rule: rule.name.clone(),
                count: fill_errors.len(),
            };
            self.reporter
                .report(&error, fill_errors.clone(), rule.summary())
                .await;
        }

        let screenshot = if rule.screenshot {
            self.take_screenshot(tab, &rule, fields_sent, jpeg_quality)
                .await
        } else {
            None
        };

        if let Some(handle) = hook_report {
            if let Err(e) = handle.await {
                warn!("Before function error report did not complete: {}", e);
            }
        }

        Ok(FillReport {
            rule: rule.summary(),
            fields_sent,
            before_data,
            hook_failures,
            fill_errors,
            missing_imports: resolution.missing,
            screenshot,
        })
    }

    /// Errors pushed in reply to `getErrors`; no answer counts as none
    async fn collect_errors(&self, connection: &mut PageConnection) -> Vec<FillError> {
        loop {
            match connection.next_push(self.response_timeout).await {
                Ok(PagePush::Errors { errors }) => {
                    info!("Received 'getErrors' with {} errors", errors.len());
                    return errors;
                }
                Ok(PagePush::Unknown) => continue,
                Err(ChannelError::Timeout(..)) => {
                    debug!("No 'getErrors' reply from tab {}", connection.tab());
                    return Vec::new();
                }
                Err(e) => {
                    debug!("Connection ended before 'getErrors' reply: {}", e);
                    return Vec::new();
                }
            }
        }
    }

    async fn take_screenshot(
        &self,
        tab: &Tab,
        rule: &Rule,
        field_index: usize,
        jpeg_quality: u8,
    ) -> Option<String> {
        let capture = self.capture.as_ref()?;
        let meta = ScreenshotMeta {
            name: rule.name.clone(),
            rule_id: rule.id.clone(),
            field_index,
        };
        let filename = screenshot::generated_filename(&meta);
        match capture.capture(tab.window_id, jpeg_quality, &filename).await {
            Ok(()) => {
                info!("Saved screenshot {}", filename);
                Some(filename)
            }
            Err(e) => {
                warn!("Failed to take screenshot {}: {:#}", filename, e);
                None
            }
        }
    }
}
