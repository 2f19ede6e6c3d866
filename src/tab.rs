use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser tab identifier as assigned by the host browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a tab as reported with a lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub window_id: u32,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Tab {
    pub fn new(id: u32, url: &str) -> Self {
        Self {
            id: TabId(id),
            window_id: 0,
            url: url.to_string(),
            active: true,
        }
    }

    /// Browser-internal pages cannot host the page process
    pub fn is_restricted(&self) -> bool {
        self.url.starts_with("chrome")
    }
}
