use crate::tab::TabId;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

/// RGBA badge background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeColor(pub [u8; 4]);

impl BadgeColor {
    pub const DEFAULT: BadgeColor = BadgeColor([0, 136, 255, 200]);
    /// Signals that periodic rechecking is active
    pub const INTERVAL: BadgeColor = BadgeColor([43, 206, 7, 255]);
}

/// Toolbar badge and picker of the browser UI
#[async_trait::async_trait]
pub trait Indicator: Send + Sync {
    async fn set_badge(&self, tab: TabId, text: &str, color: BadgeColor);
    /// Enable or disable the disambiguation picker for a tab
    async fn set_picker(&self, tab: TabId, enabled: bool);
}

/// Indicator writing to the log only
#[derive(Debug, Default)]
pub struct LogIndicator;

#[async_trait::async_trait]
impl Indicator for LogIndicator {
    async fn set_badge(&self, tab: TabId, text: &str, color: BadgeColor) {
        debug!("Badge of tab {} → '{}' {:?}", tab, text, color.0);
    }

    async fn set_picker(&self, tab: TabId, enabled: bool) {
        debug!("Picker of tab {} → {}", tab, enabled);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorCall {
    Badge {
        tab: TabId,
        text: String,
        color: BadgeColor,
    },
    Picker {
        tab: TabId,
        enabled: bool,
    },
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    calls: Mutex<Vec<IndicatorCall>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<IndicatorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_badge(&self) -> Option<(String, BadgeColor)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            IndicatorCall::Badge { text, color, .. } => Some((text, color)),
            IndicatorCall::Picker { .. } => None,
        })
    }

    /// Latest picker state, if the picker was ever touched
    pub fn picker_enabled(&self) -> Option<bool> {
        self.calls().into_iter().rev().find_map(|call| match call {
            IndicatorCall::Picker { enabled, .. } => Some(enabled),
            IndicatorCall::Badge { .. } => None,
        })
    }
}

#[async_trait::async_trait]
impl Indicator for RecordingIndicator {
    async fn set_badge(&self, tab: TabId, text: &str, color: BadgeColor) {
        self.calls.lock().unwrap().push(IndicatorCall::Badge {
            tab,
            text: text.to_string(),
            color,
        });
    }

    async fn set_picker(&self, tab: TabId, enabled: bool) {
        self.calls
            .lock()
            .unwrap()
            .push(IndicatorCall::Picker { tab, enabled });
    }
}
