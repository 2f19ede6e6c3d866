//! Screenshots of the visible tab area

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};

/// `screenshot` argument sent by the page: on/off, or a user chosen name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreenshotFlag {
    Enabled(bool),
    Named(String),
}

/// Position of a screenshot within a rule application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotMeta {
    #[serde(default)]
    pub name: String,
    pub rule_id: String,
    #[serde(default)]
    pub field_index: usize,
}

#[async_trait::async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture the visible area of `window_id` as JPEG and save it under `filename`
    async fn capture(&self, window_id: u32, quality: u8, filename: &str) -> anyhow::Result<()>;
}

fn unsafe_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid file name pattern"))
}

/// Replace everything but `[a-z0-9-_]` (any case) with `_`
pub fn sanitize(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").into_owned()
}

fn rule_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)-(\d+)").expect("valid rule id pattern"))
}

/// `fof-screenshot-tab-<t>-rule-<r>-field-<i>_<name>.jpg` for rule id `<t>-<r>`
pub fn generated_filename(meta: &ScreenshotMeta) -> String {
    let position = rule_id_pattern().replace(&meta.rule_id, "tab-${1}-rule-${2}-field-");
    format!(
        "fof-screenshot-{}{}_{}.jpg",
        position,
        meta.field_index,
        sanitize(&meta.name)
    )
}

/// Name to save under, `None` when no screenshot should be taken
pub fn screenshot_filename(flag: &ScreenshotFlag, meta: Option<&ScreenshotMeta>) -> Option<String> {
    match (flag, meta) {
        (ScreenshotFlag::Named(name), _) => Some(format!("{}.jpg", sanitize(name))),
        (ScreenshotFlag::Enabled(true), Some(meta)) => Some(generated_filename(meta)),
        _ => None,
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct RecordingCapture {
    captured: Mutex<Vec<(u32, u8, String)>>,
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(window_id, quality, filename)` of every capture
    pub fn captured(&self) -> Vec<(u32, u8, String)> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ScreenCapture for RecordingCapture {
    async fn capture(&self, window_id: u32, quality: u8, filename: &str) -> anyhow::Result<()> {
        self.captured
            .lock()
            .unwrap()
            .push((window_id, quality, filename.to_string()));
        Ok(())
    }
}
