//! JSON frames exchanged with the browser shim over the WebSocket

use crate::channel::{HostEvent, PagePush, PageRequest};
use crate::indicator::BadgeColor;
use crate::tab::TabId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent to the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outbound {
    /// Expects a `reply` frame with the same id
    Request {
        id: u64,
        tab: TabId,
        body: PageRequest,
    },
    /// One-way message, on a port when `port` is set
    Post {
        tab: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u64>,
        body: PageRequest,
    },
    /// Open a port to the page process of `tab`
    Connect { port: u64, tab: TabId },
    Disconnect { port: u64 },
    Host { command: HostCommand },
    /// Answer to an `event` frame carrying an id
    Reply { id: u64, body: Value },
}

/// Frames received from the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Inbound {
    /// Page answer to a `request`; `null` when the page did not answer
    Reply {
        id: u64,
        #[serde(default)]
        body: Value,
    },
    Push { port: u64, body: PagePush },
    /// The page side of a port went away
    PortClosed { port: u64 },
    Event {
        #[serde(default)]
        id: Option<u64>,
        event: HostEvent,
    },
}

/// Browser UI operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostCommand {
    SetBadge {
        tab: TabId,
        text: String,
        color: BadgeColor,
    },
    SetPopup {
        tab: TabId,
        enabled: bool,
    },
    Notify {
        message: String,
    },
    CaptureScreenshot {
        window: u32,
        quality: u8,
        filename: String,
    },
}
