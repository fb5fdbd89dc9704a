use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::models::{CoreError, CoreErrorKind, GlobalConfig, ProjectConfig};
use crate::orchestration::{
    RefreshOptions, RefreshSnapshot, TaskOrchestrator, dedup_by_project_dir,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RefreshTrigger {
    /// Unattended timer tick.
    Poll,
    /// User asked for a refresh.
    Manual,
}

/// Freshness windows per trigger plus the execution limits shared by both.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefreshPolicy {
    pub poll_max_age: Duration,
    pub manual_max_age: Duration,
    pub timeout: Option<Duration>,
    pub max_concurrency: Option<usize>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            poll_max_age: Duration::from_secs(30),
            manual_max_age: Duration::from_secs(60),
            timeout: None,
            max_concurrency: None,
        }
    }
}

impl RefreshPolicy {
    pub fn options_for(&self, trigger: RefreshTrigger) -> RefreshOptions {
        let freshness_window = match trigger {
            RefreshTrigger::Poll => self.poll_max_age,
            RefreshTrigger::Manual => self.manual_max_age,
        };
        RefreshOptions {
            freshness_window,
            timeout: self.timeout,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RefreshRequest {
    pub generation: u64,
    pub trigger: RefreshTrigger,
    pub configs: Vec<ProjectConfig>,
    pub global: GlobalConfig,
    pub options: RefreshOptions,
}

/// Message delivered to the render loop once a refresh has joined.
#[derive(Clone, Debug)]
pub struct TasksRefreshed {
    pub generation: u64,
    pub trigger: RefreshTrigger,
    pub snapshot: RefreshSnapshot,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
}

/// The deferred unit of work behind one refresh.
pub async fn refresh_message(
    orchestrator: Arc<TaskOrchestrator>,
    cache: Arc<ResultCache>,
    request: RefreshRequest,
) -> TasksRefreshed {
    let started_at = SystemTime::now();
    let snapshot = orchestrator
        .refresh(&cache, &request.configs, &request.global, &request.options)
        .await;

    TasksRefreshed {
        generation: request.generation,
        trigger: request.trigger,
        snapshot,
        started_at,
        finished_at: SystemTime::now(),
    }
}

/// Runs a refresh in the background and posts the result to `sender`.
///
/// Exactly one message is posted per call, even when the refresh itself panics, so the
/// receiver can keep an accurate in-flight count. A closed receiver just drops it.
pub fn spawn_refresh(
    orchestrator: Arc<TaskOrchestrator>,
    cache: Arc<ResultCache>,
    request: RefreshRequest,
    sender: mpsc::UnboundedSender<TasksRefreshed>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let generation = request.generation;
        let trigger = request.trigger;
        let project_dirs: Vec<PathBuf> = dedup_by_project_dir(&request.configs)
            .into_iter()
            .map(|config| config.project_dir)
            .collect();
        let started_at = SystemTime::now();

        let unit = tokio::spawn(refresh_message(orchestrator, cache, request));
        let message = settle_refresh(unit, generation, trigger, project_dirs, started_at).await;
        if sender.send(message).is_err() {
            tracing::debug!(generation, "refresh receiver closed before delivery");
        }
    })
}

/// Joins a refresh unit. If it died, every project it covered is reported as `Internal`.
async fn settle_refresh(
    unit: JoinHandle<TasksRefreshed>,
    generation: u64,
    trigger: RefreshTrigger,
    project_dirs: Vec<PathBuf>,
    started_at: SystemTime,
) -> TasksRefreshed {
    match unit.await {
        Ok(message) => message,
        Err(join_error) => {
            tracing::error!(generation, error = %join_error, "refresh did not complete");
            let mut snapshot = RefreshSnapshot::default();
            for project_dir in project_dirs {
                let error = CoreError::for_project(
                    &project_dir,
                    CoreErrorKind::Internal,
                    format!("refresh did not complete: {join_error}"),
                );
                snapshot.record(project_dir, Err(error));
            }
            TasksRefreshed {
                generation,
                trigger,
                snapshot,
                started_at,
                finished_at: SystemTime::now(),
            }
        }
    }
}
