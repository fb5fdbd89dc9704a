use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::execution::{ProcessExecutor, TokioProcessExecutor};
use crate::models::{CoreError, CoreErrorKind, GlobalConfig, ProjectConfig};
use crate::orchestration::{MAX_CONCURRENCY, RefreshOptions, RefreshSnapshot};
use crate::providers::{ProcessProviderExecutor, ProviderExecutor, ProviderOutcome};

/// Fans provider executions out across projects and folds them into one snapshot.
#[derive(Clone)]
pub struct TaskOrchestrator {
    executor: Arc<dyn ProviderExecutor>,
}

impl TaskOrchestrator {
    pub fn new(executor: Arc<dyn ProviderExecutor>) -> Self {
        Self { executor }
    }

    pub fn with_process_executor(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self::new(Arc::new(ProcessProviderExecutor::new(executor)))
    }

    pub fn with_tokio_processes() -> Self {
        Self::with_process_executor(Arc::new(TokioProcessExecutor))
    }

    /// Produces a snapshot covering every distinct `project_dir` in `configs`.
    ///
    /// Fresh cache entries (per `options.freshness_window`) are reused as-is,
    /// including cached errors. Every other project runs its provider in its own
    /// task; each outcome is written to `cache` before it is merged. One project's
    /// failure never affects another's entry.
    pub async fn refresh(
        &self,
        cache: &ResultCache,
        configs: &[ProjectConfig],
        global: &GlobalConfig,
        options: &RefreshOptions,
    ) -> RefreshSnapshot {
        let unique = dedup_by_project_dir(configs);
        let mut snapshot = RefreshSnapshot::default();
        let mut misses = Vec::new();

        for config in unique {
            match cache.get(&config.project_dir, options.freshness_window) {
                Some(outcome) => {
                    snapshot.stats.cache_hits.push(config.project_dir.clone());
                    snapshot.record(config.project_dir, outcome);
                }
                None => misses.push(config),
            }
        }

        let timeout = options.effective_timeout(global);
        let limiter = options
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.clamp(1, MAX_CONCURRENCY))));

        tracing::debug!(
            projects = snapshot.stats.cache_hits.len() + misses.len(),
            cache_hits = snapshot.stats.cache_hits.len(),
            misses = misses.len(),
            timeout_ms = timeout.as_millis() as u64,
            max_concurrency = ?options.max_concurrency,
            "refreshing task providers"
        );

        let units: Vec<(PathBuf, JoinHandle<ProviderOutcome>)> = misses
            .into_iter()
            .map(|config| {
                let project_dir = config.project_dir.clone();
                let executor = self.executor.clone();
                let global = global.clone();
                let limiter = limiter.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    executor.execute_provider(&config, &global, timeout).await
                });
                (project_dir, handle)
            })
            .collect();

        for (project_dir, handle) in units {
            let outcome = match handle.await {
                Ok(outcome) => outcome.map_err(|error| error.attribute(&project_dir)),
                Err(join_error) => {
                    tracing::error!(
                        project_dir = %project_dir.display(),
                        error = %join_error,
                        "provider task did not complete"
                    );
                    Err(CoreError::for_project(
                        &project_dir,
                        CoreErrorKind::Internal,
                        format!("provider task did not complete: {join_error}"),
                    ))
                }
            };

            cache.set(&project_dir, outcome.clone());
            snapshot.stats.executed.push(project_dir.clone());
            snapshot.record(project_dir, outcome);
        }

        if !snapshot.errors.is_empty() {
            tracing::info!(
                succeeded = snapshot.results_by_project.len(),
                failed = snapshot.errors.len(),
                "task refresh finished with errors"
            );
        }

        snapshot
    }
}

/// Keeps the first config seen for each `project_dir`, preserving input order.
pub fn dedup_by_project_dir(configs: &[ProjectConfig]) -> Vec<ProjectConfig> {
    let mut seen = HashSet::new();
    configs
        .iter()
        .filter(|config| seen.insert(config.project_dir.clone()))
        .cloned()
        .collect()
}
