//! One-shot background warm-up of the image cache at process start.
//!
//! The task runs detached from startup and readiness; its [`WarmupHandle`]
//! lets callers observe (or await) the outcome without blocking on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::service::SiteImageCache;
use crate::config::AppConfig;

/// When and whether to warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupOptions {
    /// Delay before the first build, giving the repository time to come up.
    pub grace: Duration,

    /// A bulk site import is pending; warming now would cache a transitional state.
    pub import_pending: bool,
}

impl From<&AppConfig> for WarmupOptions {
    fn from(config: &AppConfig) -> Self {
        Self { grace: config.warmup_grace(), import_pending: config.import_on_boot }
    }
}

/// How the warm-up ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupOutcome {
    Skipped,
    Warmed { images: usize, sites: usize },
    Failed(String),
}

/// Completion signal for a spawned warm-up.
#[derive(Debug)]
pub struct WarmupHandle {
    task: JoinHandle<WarmupOutcome>,
}

impl WarmupHandle {
    /// Wait for the warm-up to finish.
    pub async fn wait(self) -> WarmupOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => WarmupOutcome::Failed("warm-up cancelled".into()),
            Err(e) => WarmupOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the warm-up on the current tokio runtime and return immediately.
pub fn spawn_warmup(cache: Arc<SiteImageCache>, options: WarmupOptions) -> WarmupHandle {
    let task = tokio::spawn(async move { warm(&cache, &options).await });
    WarmupHandle { task }
}

async fn warm(cache: &SiteImageCache, options: &WarmupOptions) -> WarmupOutcome {
    if options.import_pending {
        tracing::info!("Site import pending; skipping image cache warm-up");
        return WarmupOutcome::Skipped;
    }

    tokio::time::sleep(options.grace).await;

    tracing::info!("Warming up site image cache");
    match cache.refresh().await {
        Ok(snapshot) => {
            tracing::info!(
                images = snapshot.total_images(),
                sites = snapshot.total_sites(),
                "Site image cache warmed up"
            );
            WarmupOutcome::Warmed { images: snapshot.total_images(), sites: snapshot.total_sites() }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Site image cache warm-up skipped");
            WarmupOutcome::Failed(e.to_string())
        }
    }
}
