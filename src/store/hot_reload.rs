use super::RuleBook;
use crate::config::load_definitions;
use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Delay letting editors finish writing before the file is re-read
const RELOAD_DEBOUNCE_MS: u64 = 500;

/// Reloads rule and workflow definitions when the config file changes
pub struct HotReloader {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for HotReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloader")
            .field("_watcher", &"<watcher>")
            .finish()
    }
}

impl HotReloader {
    /// Must be called from within the tokio runtime that performs the reloads
    pub fn new(config_path: &Path, book: Arc<RuleBook>) -> Result<Self> {
        let path_clone = config_path.to_path_buf();
        // notify calls back on its own thread, outside the runtime
        let runtime = tokio::runtime::Handle::try_current()
            .context("Hot reloading requires a running tokio runtime")?;

        let mut watcher = notify::recommended_watcher(move |res: NotifyResult<notify::Event>| {
            if res.is_ok() {
                let book = Arc::clone(&book);
                let path = path_clone.clone();
                runtime.spawn(async move {
                    reload_definitions(book, path).await;
                });
            }
        })?;

        watcher.watch(config_path, RecursiveMode::NonRecursive)?;

        Ok(HotReloader { _watcher: watcher })
    }
}

async fn reload_definitions(book: Arc<RuleBook>, path: PathBuf) {
    tokio::time::sleep(tokio::time::Duration::from_millis(RELOAD_DEBOUNCE_MS)).await;

    match load_definitions(&path) {
        Ok(definitions) => {
            let rule_count = definitions.rules.len();
            let workflow_count = definitions.workflows.len();
            book.replace(definitions).await;
            info!(
                "Reloaded {} rules and {} workflows from {}",
                rule_count,
                workflow_count,
                path.display()
            );
        }
        Err(e) => {
            warn!("Failed to reload {}: {:#}", path.display(), e);
            warn!("Keeping existing rules active");
        }
    }
}
