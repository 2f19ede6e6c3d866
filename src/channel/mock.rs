//! Scripted page process for exercising the engine without a browser

use super::{ChannelError, PageChannel, PageConnection, PagePush, PageReply, PageRequest, PortSink};
use crate::report::FillError;
use crate::tab::TabId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type SentLog = Arc<Mutex<Vec<(TabId, PageRequest)>>>;

/// Mock implementation for testing
pub struct ScriptedPage {
    content_matches: Option<Vec<String>>,
    content: HashMap<String, Value>,
    fill_errors: Vec<FillError>,
    answer_errors: bool,
    reachable: bool,
    sent: SentLog,
}

impl Default for ScriptedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPage {
    /// Reachable page that never answers content matching
    pub fn new() -> Self {
        Self {
            content_matches: None,
            content: HashMap::new(),
            fill_errors: Vec::new(),
            answer_errors: true,
            reachable: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Page whose process cannot be reached at all
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    pub fn with_content_matches(mut self, ids: &[&str]) -> Self {
        self.content_matches = Some(ids.iter().map(|id| id.to_string()).collect());
        self
    }

    pub fn with_content(mut self, selector: &str, content: Value) -> Self {
        self.content.insert(selector.to_string(), content);
        self
    }

    pub fn with_fill_errors(mut self, errors: Vec<FillError>) -> Self {
        self.fill_errors = errors;
        self
    }

    /// Never answer `getErrors`
    pub fn silent_on_errors(mut self) -> Self {
        self.answer_errors = false;
        self
    }

    /// Everything sent to the page so far, in order
    pub fn sent(&self) -> Vec<(TabId, PageRequest)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_actions(&self) -> Vec<&'static str> {
        self.sent().iter().map(|(_, request)| request.action()).collect()
    }

    /// `(selector, value, beforeData)` of every `fillField` sent
    pub fn fill_fields(&self) -> Vec<(String, String, Value)> {
        self.sent()
            .into_iter()
            .filter_map(|(_, request)| match request {
                PageRequest::FillField {
                    selector,
                    value,
                    before_data,
                } => Some((selector, value, before_data)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, tab: TabId, request: PageRequest) {
        self.sent.lock().unwrap().push((tab, request));
    }
}

#[async_trait::async_trait]
impl PageChannel for ScriptedPage {
    async fn post(&self, tab: TabId, request: PageRequest) -> Result<(), ChannelError> {
        if !self.reachable {
            return Err(ChannelError::Unreachable(tab));
        }
        self.record(tab, request);
        Ok(())
    }

    async fn request(&self, tab: TabId, request: PageRequest) -> Result<PageReply, ChannelError> {
        if !self.reachable {
            return Err(ChannelError::Unreachable(tab));
        }
        self.record(tab, request.clone());

        match request {
            PageRequest::MatchContent { .. } => match &self.content_matches {
                Some(ids) => Ok(PageReply::MatchingRules { ids: ids.clone() }),
                None => Err(ChannelError::Timeout(tab, Duration::ZERO)),
            },
            PageRequest::GrabContentBySelector { selector } => Ok(PageReply::Content {
                content: self.content.get(&selector).cloned().unwrap_or(Value::Null),
            }),
            other => Err(ChannelError::UnexpectedReply {
                request: other.action(),
                reply: "no reply expected".to_string(),
            }),
        }
    }

    async fn connect(&self, tab: TabId) -> Result<PageConnection, ChannelError> {
        if !self.reachable {
            return Err(ChannelError::Unreachable(tab));
        }
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let port = ScriptedPort {
            tab,
            sent: Arc::clone(&self.sent),
            push: push_tx,
            fill_errors: self.fill_errors.clone(),
            answer_errors: self.answer_errors,
        };
        Ok(PageConnection::new(tab, port, push_rx))
    }
}

struct ScriptedPort {
    tab: TabId,
    sent: SentLog,
    push: mpsc::UnboundedSender<PagePush>,
    fill_errors: Vec<FillError>,
    answer_errors: bool,
}

impl PortSink for ScriptedPort {
    fn post(&self, request: PageRequest) -> Result<(), ChannelError> {
        let is_get_errors = request == PageRequest::GetErrors;
        self.sent.lock().unwrap().push((self.tab, request));

        if is_get_errors && self.answer_errors {
            let _ = self.push.send(PagePush::Errors {
                errors: self.fill_errors.clone(),
            });
        }
        Ok(())
    }
}
