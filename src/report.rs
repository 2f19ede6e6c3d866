//! Error reporting to the user and to the error log

use crate::error::EngineError;
use crate::rule::RuleSummary;
use crate::store::{StateKey, StateStore, save_as};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One failed step of a rule application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillError {
    pub selector: String,
    #[serde(default)]
    pub value: String,
    pub message: String,
}

impl FillError {
    pub fn new(selector: &str, value: &str, message: &str) -> Self {
        Self {
            selector: selector.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors persisted together with the rule that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub errors: Vec<FillError>,
    pub rule: RuleSummary,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Notifier writing to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        info!("🔔 {}", message);
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Surfaces recoverable errors and stores their details for inspection
#[derive(Clone)]
pub struct ErrorReporter {
    notifier: Arc<dyn Notifier>,
    state: Arc<dyn StateStore>,
}

impl ErrorReporter {
    pub fn new(notifier: Arc<dyn Notifier>, state: Arc<dyn StateStore>) -> Self {
        Self { notifier, state }
    }

    pub async fn report(&self, error: &EngineError, errors: Vec<FillError>, rule: RuleSummary) {
        warn!("{} ({} entries)", error, errors.len());

        let report = ErrorReport { errors, rule };
        if let Err(e) = save_as(self.state.as_ref(), StateKey::ErrorLog, &report).await {
            warn!("Failed to store error report: {}", e);
        }

        self.notifier.notify(&error.notification()).await;
    }

    /// Message without stored details
    pub async fn notify(&self, message: &str) {
        self.notifier.notify(message).await;
    }
}
