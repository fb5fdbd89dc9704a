pub mod message;
pub mod normalize;
pub mod orchestrator;

pub use message::{
    RefreshPolicy, RefreshRequest, RefreshTrigger, TasksRefreshed, refresh_message, spawn_refresh,
};
pub use normalize::{DEFAULT_GROUP_ID, DEFAULT_GROUP_TITLE, aggregate_status, normalize};
pub use orchestrator::{TaskOrchestrator, dedup_by_project_dir};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::models::{CoreError, GlobalConfig, ProviderResult, TaskGroup};
use crate::providers::ProviderOutcome;

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// Largest `max_concurrency` honoured as given; bigger limits are clamped to it.
pub const MAX_CONCURRENCY: usize = tokio::sync::Semaphore::MAX_PERMITS;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefreshOptions {
    pub freshness_window: Duration,
    /// Per-execution timeout; `None` or zero falls back to the global default.
    pub timeout: Option<Duration>,
    /// Upper bound on providers running at once; `None` runs every cache miss concurrently.
    pub max_concurrency: Option<usize>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            timeout: None,
            max_concurrency: None,
        }
    }
}

impl RefreshOptions {
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn effective_timeout(&self, global: &GlobalConfig) -> Duration {
        self.timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(global.default_timeout)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RefreshStats {
    pub cache_hits: Vec<PathBuf>,
    pub executed: Vec<PathBuf>,
}

/// Consistent per-project cut produced by one refresh.
///
/// Every deduplicated input directory appears in exactly one of
/// `results_by_project` and `errors`; `groups_by_project` mirrors the successes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RefreshSnapshot {
    pub results_by_project: BTreeMap<PathBuf, ProviderResult>,
    pub groups_by_project: BTreeMap<PathBuf, Vec<TaskGroup>>,
    pub errors: BTreeMap<PathBuf, CoreError>,
    pub stats: RefreshStats,
}

impl RefreshSnapshot {
    pub(crate) fn record(&mut self, project_dir: PathBuf, outcome: ProviderOutcome) {
        match outcome {
            Ok(result) => {
                self.errors.remove(&project_dir);
                self.groups_by_project
                    .insert(project_dir.clone(), normalize(&result));
                self.results_by_project.insert(project_dir, result);
            }
            Err(error) => {
                self.results_by_project.remove(&project_dir);
                self.groups_by_project.remove(&project_dir);
                self.errors.insert(project_dir, error);
            }
        }
    }

    pub fn project_count(&self) -> usize {
        self.results_by_project.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.project_count() == 0
    }
}
