//! Before hooks run ahead of field dispatch
//!
//! Every hook runs concurrently and in isolation: an error or a panic inside
//! one hook becomes a `HookFailure` and never aborts the pipeline.

use crate::channel::{ChannelError, PageChannel, grab_content};
use crate::rule::{HookSpec, UrlPart};
use crate::tab::{Tab, TabId};
use anyhow::{Result, anyhow};
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Read-only environment handed to every hook
#[derive(Clone)]
pub struct HookContext {
    tab: TabId,
    url: Option<Url>,
    channel: Arc<dyn PageChannel>,
}

impl HookContext {
    pub fn new(tab: &Tab, channel: Arc<dyn PageChannel>) -> Self {
        Self {
            tab: tab.id,
            url: Url::parse(&tab.url).ok(),
            channel,
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Parsed tab URL, `None` when the tab URL is not a valid URL
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Round trip into the page for the content matching `selector`
    pub async fn find_html(&self, selector: &str) -> Result<Value, ChannelError> {
        let content = grab_content(self.channel.as_ref(), self.tab, selector).await?;
        debug!("Received content from grabber: '{}'", content);
        Ok(content)
    }
}

#[async_trait::async_trait]
pub trait BeforeHook: Send + Sync {
    /// Human readable description stored with failure reports
    fn source(&self) -> String;
    async fn run(&self, context: &HookContext) -> Result<Value>;
}

/// Default hook of rules without `before`
pub struct NoopHook;

#[async_trait::async_trait]
impl BeforeHook for NoopHook {
    fn source(&self) -> String {
        "noop".to_string()
    }

    async fn run(&self, _context: &HookContext) -> Result<Value> {
        Ok(Value::Null)
    }
}

struct GrabHook {
    selector: String,
}

#[async_trait::async_trait]
impl BeforeHook for GrabHook {
    fn source(&self) -> String {
        format!("grab: {}", self.selector)
    }

    async fn run(&self, context: &HookContext) -> Result<Value> {
        Ok(context.find_html(&self.selector).await?)
    }
}

struct UrlPartHook {
    part: UrlPart,
}

#[async_trait::async_trait]
impl BeforeHook for UrlPartHook {
    fn source(&self) -> String {
        format!("url: {:?}", self.part).to_lowercase()
    }

    async fn run(&self, context: &HookContext) -> Result<Value> {
        let url = context
            .url()
            .ok_or_else(|| anyhow!("tab URL could not be parsed"))?;
        let part = match self.part {
            UrlPart::Href => Some(url.as_str()),
            UrlPart::Host => url.host_str(),
            UrlPart::Path => Some(url.path()),
            UrlPart::Query => url.query(),
        };
        Ok(part.map_or(Value::Null, |part| Value::String(part.to_string())))
    }
}

struct ConstHook {
    value: Value,
}

#[async_trait::async_trait]
impl BeforeHook for ConstHook {
    fn source(&self) -> String {
        format!("value: {}", self.value)
    }

    async fn run(&self, _context: &HookContext) -> Result<Value> {
        Ok(self.value.clone())
    }
}

struct UnknownHook {
    name: String,
}

#[async_trait::async_trait]
impl BeforeHook for UnknownHook {
    fn source(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, _context: &HookContext) -> Result<Value> {
        Err(anyhow!("no before hook registered under '{}'", self.name))
    }
}

/// Hook backed by a plain closure
pub struct FnHook<F> {
    name: String,
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(&HookContext) -> Result<Value> + Send + Sync,
{
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

#[async_trait::async_trait]
impl<F> BeforeHook for FnHook<F>
where
    F: Fn(&HookContext) -> Result<Value> + Send + Sync,
{
    fn source(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, context: &HookContext) -> Result<Value> {
        (self.func)(context)
    }
}

/// Named hooks available to rules
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn BeforeHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, hook: impl BeforeHook + 'static) {
        self.hooks.insert(name.to_string(), Arc::new(hook));
    }

    pub fn register_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&HookContext) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(name, FnHook::new(name, func));
    }

    pub fn build(&self, spec: &HookSpec) -> Arc<dyn BeforeHook> {
        match spec {
            HookSpec::Named(name) => self.hooks.get(name).cloned().unwrap_or_else(|| {
                Arc::new(UnknownHook {
                    name: name.clone(),
                })
            }),
            HookSpec::Grab { grab } => Arc::new(GrabHook {
                selector: grab.clone(),
            }),
            HookSpec::UrlPart { url } => Arc::new(UrlPartHook { part: *url }),
            HookSpec::Const { value } => Arc::new(ConstHook {
                value: value.clone(),
            }),
        }
    }

    /// Hooks for a rule; a rule without hooks gets the no-op hook
    pub fn build_all(&self, specs: &[HookSpec]) -> Vec<Arc<dyn BeforeHook>> {
        if specs.is_empty() {
            return vec![Arc::new(NoopHook)];
        }
        specs.iter().map(|spec| self.build(spec)).collect()
    }
}

/// Structured record of a hook that failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookFailure {
    pub before_function: String,
    pub message: String,
    pub stack: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Value(Value),
    Failed(HookFailure),
}

/// Run all hooks concurrently, one outcome per hook in hook order
pub async fn run_hooks(hooks: &[Arc<dyn BeforeHook>], context: &HookContext) -> Vec<HookOutcome> {
    join_all(hooks.iter().map(|hook| run_isolated(hook.as_ref(), context))).await
}

async fn run_isolated(hook: &dyn BeforeHook, context: &HookContext) -> HookOutcome {
    match AssertUnwindSafe(hook.run(context)).catch_unwind().await {
        Ok(Ok(value)) => HookOutcome::Value(value),
        Ok(Err(error)) => {
            let stack = error
                .chain()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" → ");
            warn!("Got an exception executing before function: {}", hook.source());
            warn!("Original exception: {}", error);
            HookOutcome::Failed(HookFailure {
                before_function: hook.source(),
                message: error.to_string(),
                stack,
            })
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Before function panicked: {} ({})", hook.source(), message);
            HookOutcome::Failed(HookFailure {
                before_function: hook.source(),
                message,
                stack: "panicked".to_string(),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn failures(outcomes: &[HookOutcome]) -> Vec<HookFailure> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            HookOutcome::Failed(failure) => Some(failure.clone()),
            HookOutcome::Value(_) => None,
        })
        .collect()
}

/// Data shared by every field: the single hook's value, or one entry per
/// hook with failed hooks contributing `null`
pub fn before_data(outcomes: &[HookOutcome]) -> Value {
    let mut values: Vec<Value> = outcomes
        .iter()
        .map(|outcome| match outcome {
            HookOutcome::Value(value) => value.clone(),
            HookOutcome::Failed(_) => Value::Null,
        })
        .collect();

    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}
