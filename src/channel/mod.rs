//! Messaging channel to the page process of a tab
//!
//! Three styles of exchange are supported:
//! - one-way posts (`PageChannel::post`)
//! - request/response with a bounded wait (`PageChannel::request`)
//! - a per-operation connection carrying sequential posts and asynchronous pushes

pub mod message;
pub mod mock;

pub use message::{HostEvent, PagePush, PageReply, PageRequest};

use crate::rule::ContentMatcher;
use crate::tab::TabId;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error("page process of tab {0} is unreachable")]
    Unreachable(TabId),
    #[error("no response from tab {0} within {1:?}")]
    Timeout(TabId, Duration),
    #[error("connection to tab {0} closed")]
    Closed(TabId),
    #[error("unexpected reply to '{request}': {reply}")]
    UnexpectedReply {
        request: &'static str,
        reply: String,
    },
}

impl ChannelError {
    /// Unanswered requests are expected for restricted pages
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            ChannelError::Unreachable(_) | ChannelError::Timeout(..) | ChannelError::Closed(_)
        )
    }
}

#[async_trait::async_trait]
pub trait PageChannel: Send + Sync {
    /// Fire-and-forget message
    async fn post(&self, tab: TabId, request: PageRequest) -> Result<(), ChannelError>;
    /// Single reply, or an error once the response timeout elapses
    async fn request(&self, tab: TabId, request: PageRequest) -> Result<PageReply, ChannelError>;
    /// Open a connection scoped to one tab
    async fn connect(&self, tab: TabId) -> Result<PageConnection, ChannelError>;
}

/// Outgoing half of a connection
pub trait PortSink: Send + Sync {
    fn post(&self, request: PageRequest) -> Result<(), ChannelError>;
}

/// Long-lived connection to one tab, opened per rule application
pub struct PageConnection {
    tab: TabId,
    sink: Box<dyn PortSink>,
    incoming: mpsc::UnboundedReceiver<PagePush>,
}

impl PageConnection {
    pub fn new(
        tab: TabId,
        sink: impl PortSink + 'static,
        incoming: mpsc::UnboundedReceiver<PagePush>,
    ) -> Self {
        Self {
            tab,
            sink: Box::new(sink),
            incoming,
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn post(&self, request: PageRequest) -> Result<(), ChannelError> {
        self.sink.post(request)
    }

    /// Wait for the next pushed message, bounded by `within`
    pub async fn next_push(&mut self, within: Duration) -> Result<PagePush, ChannelError> {
        match tokio::time::timeout(within, self.incoming.recv()).await {
            Ok(Some(push)) => Ok(push),
            Ok(None) => Err(ChannelError::Closed(self.tab)),
            Err(_) => Err(ChannelError::Timeout(self.tab, within)),
        }
    }
}

impl std::fmt::Debug for PageConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageConnection")
            .field("tab", &self.tab)
            .finish()
    }
}

/// Ask the page which content matchers apply
pub async fn match_content(
    channel: &dyn PageChannel,
    tab: TabId,
    rules: Vec<ContentMatcher>,
) -> Result<Vec<String>, ChannelError> {
    match channel.request(tab, PageRequest::MatchContent { rules }).await? {
        PageReply::MatchingRules { ids } => Ok(ids),
        other => Err(ChannelError::UnexpectedReply {
            request: "matchContent",
            reply: format!("{:?}", other),
        }),
    }
}

/// Fetch the content of the first element matching `selector`
pub async fn grab_content(
    channel: &dyn PageChannel,
    tab: TabId,
    selector: &str,
) -> Result<Value, ChannelError> {
    let request = PageRequest::GrabContentBySelector {
        selector: selector.to_string(),
    };
    match channel.request(tab, request).await? {
        PageReply::Content { content } => Ok(content),
        other => Err(ChannelError::UnexpectedReply {
            request: "grabContentBySelector",
            reply: format!("{:?}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ScriptedPage;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_match_content_helper() {
        let page = ScriptedPage::new().with_content_matches(&["1-2"]);
        let ids = match_content(&page, TabId(1), vec![]).await.unwrap();
        assert_eq!(ids, vec!["1-2"]);

        let silent = ScriptedPage::new();
        let error = match_content(&silent, TabId(1), vec![]).await.unwrap_err();
        assert!(error.is_no_response());
    }

    #[tokio::test]
    async fn test_grab_content_helper() {
        let page = ScriptedPage::new().with_content("h1", json!("Welcome"));
        assert_eq!(
            grab_content(&page, TabId(1), "h1").await.unwrap(),
            json!("Welcome")
        );
        assert_eq!(
            grab_content(&page, TabId(1), "h2").await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_connection_push_timeout() {
        let page = ScriptedPage::new().silent_on_errors();
        let mut connection = page.connect(TabId(5)).await.unwrap();
        assert_eq!(connection.tab(), TabId(5));

        connection.post(PageRequest::GetErrors).unwrap();
        let result = connection.next_push(Duration::from_millis(20)).await;
        assert_eq!(
            result,
            Err(ChannelError::Timeout(TabId(5), Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(ChannelError::Unreachable(TabId(1)).is_no_response());
        assert!(!ChannelError::UnexpectedReply {
            request: "matchContent",
            reply: "x".to_string()
        }
        .is_no_response());
    }
}
