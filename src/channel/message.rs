//! Messages exchanged with the page process and the browser host

use crate::config::Settings;
use crate::fill::screenshot::{ScreenshotFlag, ScreenshotMeta};
use crate::report::FillError;
use crate::rule::ContentMatcher;
use crate::tab::Tab;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instructions sent to the page process of a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageRequest {
    /// Evaluate content matchers against the page; answered with `matchContent`
    MatchContent { rules: Vec<ContentMatcher> },
    /// Extract content for a selector; answered with `grabContentBySelector`
    GrabContentBySelector { selector: String },
    FillField {
        selector: String,
        /// JSON-encoded field value
        value: String,
        #[serde(rename = "beforeData")]
        before_data: Value,
    },
    /// Ask for fill-time errors; answered with a `getErrors` push on the same port
    GetErrors,
    ShowWorkingOverlay,
    HideWorkingOverlay,
    ShowMessage { message: String },
}

impl PageRequest {
    pub fn action(&self) -> &'static str {
        match self {
            PageRequest::MatchContent { .. } => "matchContent",
            PageRequest::GrabContentBySelector { .. } => "grabContentBySelector",
            PageRequest::FillField { .. } => "fillField",
            PageRequest::GetErrors => "getErrors",
            PageRequest::ShowWorkingOverlay => "showWorkingOverlay",
            PageRequest::HideWorkingOverlay => "hideWorkingOverlay",
            PageRequest::ShowMessage { .. } => "showMessage",
        }
    }
}

/// Replies to `PageChannel::request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageReply {
    #[serde(rename = "matchContent")]
    MatchingRules { ids: Vec<String> },
    #[serde(rename = "grabContentBySelector")]
    Content {
        #[serde(default)]
        content: Value,
    },
}

/// Messages pushed by the page on an open connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PagePush {
    #[serde(rename = "getErrors")]
    Errors {
        #[serde(default)]
        errors: Vec<FillError>,
    },
    #[serde(other)]
    Unknown,
}

/// Browser-side events delivered to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostEvent {
    TabActivated {
        tab: Tab,
    },
    /// Only a `complete` status starts a matching pass
    TabUpdated {
        tab: Tab,
        #[serde(default)]
        status: Option<String>,
    },
    /// The toolbar icon was clicked while no picker was set
    BadgeClicked,
    FillWithRule {
        id: String,
    },
    FillWithWorkflow {
        id: String,
    },
    SetSettings {
        settings: Settings,
    },
    /// Answered with the new value of the setting
    ToggleSetting {
        name: String,
    },
    /// Answered with the id of the last active tab
    LastActiveTabId,
    TakeScreenshot {
        flag: ScreenshotFlag,
        #[serde(default)]
        value: Option<ScreenshotMeta>,
    },
    Installed {
        reason: String,
    },
}
