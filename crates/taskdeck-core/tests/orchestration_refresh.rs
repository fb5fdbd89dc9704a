use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use taskdeck_core::models::{
    CoreError, CoreErrorKind, GlobalConfig, ProjectConfig, ProviderResult, Task,
};
use taskdeck_core::providers::{ProviderExecutor, ProviderFuture};
use taskdeck_core::{RefreshOptions, ResultCache, TaskOrchestrator};

#[derive(Clone)]
enum Behavior {
    Succeed { delay: Duration, tasks: Vec<Task> },
    Fail(CoreErrorKind),
    Panic,
}

#[derive(Default)]
struct ScriptedExecutor {
    behaviors: Mutex<HashMap<PathBuf, Behavior>>,
    calls: Mutex<Vec<(PathBuf, Duration)>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedExecutor {
    fn script(&self, project_dir: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(PathBuf::from(project_dir), behavior);
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(dir, _)| dir.clone())
            .collect()
    }

    fn timeouts(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, timeout)| *timeout)
            .collect()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ProviderExecutor for ScriptedExecutor {
    fn execute_provider(
        &self,
        config: &ProjectConfig,
        _global: &GlobalConfig,
        timeout: Duration,
    ) -> ProviderFuture {
        let project_dir = config.project_dir.clone();
        self.calls
            .lock()
            .unwrap()
            .push((project_dir.clone(), timeout));
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&project_dir)
            .cloned()
            .unwrap_or(Behavior::Succeed {
                delay: Duration::ZERO,
                tasks: Vec::new(),
            });
        let in_flight = self.in_flight.clone();
        let max_in_flight = self.max_in_flight.clone();

        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);

            let outcome = match behavior {
                Behavior::Succeed { delay, tasks } => {
                    tokio::time::sleep(delay).await;
                    Ok(ProviderResult::from_tasks(tasks))
                }
                Behavior::Fail(kind) => Err(CoreError::for_project(
                    &project_dir,
                    kind,
                    "scripted failure",
                )),
                Behavior::Panic => {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    panic!("scripted provider panic");
                }
            };

            in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}

fn tasks(title: &str) -> Vec<Task> {
    vec![Task::new("t1", title, "todo")]
}

fn succeed(title: &str) -> Behavior {
    Behavior::Succeed {
        delay: Duration::ZERO,
        tasks: tasks(title),
    }
}

fn slow(delay: Duration) -> Behavior {
    Behavior::Succeed {
        delay,
        tasks: tasks("slow"),
    }
}

fn project(dir: &str) -> ProjectConfig {
    ProjectConfig::new(dir, "provider")
}

fn setup() -> (Arc<ScriptedExecutor>, TaskOrchestrator, ResultCache) {
    let executor = Arc::new(ScriptedExecutor::default());
    let orchestrator = TaskOrchestrator::new(executor.clone());
    (executor, orchestrator, ResultCache::new())
}

#[tokio::test]
async fn second_refresh_within_window_reuses_cache() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", succeed("alpha"));
    executor.script("/srv/b", Behavior::Fail(CoreErrorKind::ProviderExecutionFailed));
    let configs = vec![project("/srv/a"), project("/srv/b")];
    let options = RefreshOptions::default().freshness_window(Duration::from_secs(60));

    let first = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &options)
        .await;
    let second = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &options)
        .await;

    assert_eq!(executor.calls().len(), 2);
    assert_eq!(first.results_by_project, second.results_by_project);
    assert_eq!(first.errors, second.errors);
    assert!(second.stats.executed.is_empty());
    assert_eq!(second.stats.cache_hits.len(), 2);
}

#[tokio::test]
async fn duplicate_project_dirs_execute_once() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", slow(Duration::from_millis(50)));
    let configs = vec![project("/srv/a"), project("/srv/a"), project("/srv/a")];

    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    assert_eq!(executor.calls(), vec![PathBuf::from("/srv/a")]);
    assert_eq!(snapshot.project_count(), 1);
    assert!(snapshot.results_by_project.contains_key(Path::new("/srv/a")));
}

#[tokio::test]
async fn failures_are_isolated_per_project() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/ok", succeed("fine"));
    executor.script("/srv/broken", Behavior::Fail(CoreErrorKind::ResultParseError));
    executor.script("/srv/gone", Behavior::Fail(CoreErrorKind::ProviderNotFound));
    let configs = vec![project("/srv/ok"), project("/srv/broken"), project("/srv/gone")];

    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    assert_eq!(snapshot.results_by_project.len(), 1);
    assert_eq!(
        snapshot.results_by_project[Path::new("/srv/ok")].tasks,
        tasks("fine")
    );
    assert_eq!(
        snapshot.errors[Path::new("/srv/broken")].kind,
        CoreErrorKind::ResultParseError
    );
    assert_eq!(
        snapshot.errors[Path::new("/srv/gone")].kind,
        CoreErrorKind::ProviderNotFound
    );
    assert_eq!(
        snapshot.errors[Path::new("/srv/gone")].project.as_deref(),
        Some(Path::new("/srv/gone"))
    );
}

#[tokio::test]
async fn every_project_lands_in_exactly_one_map() {
    let (executor, orchestrator, cache) = setup();
    let dirs: Vec<String> = (0..8).map(|index| format!("/srv/p{index}")).collect();
    for (index, dir) in dirs.iter().enumerate() {
        let behavior = if index % 3 == 0 {
            Behavior::Fail(CoreErrorKind::ProviderTimeout)
        } else {
            succeed(dir)
        };
        executor.script(dir, behavior);
    }
    // Pre-seed a fresh error and a fresh success to mix cache hits in.
    cache.set(
        Path::new("/srv/p1"),
        Err(CoreError::for_project(
            "/srv/p1",
            CoreErrorKind::ProviderExecutionFailed,
            "cached",
        )),
    );
    cache.set(Path::new("/srv/p3"), Ok(ProviderResult::from_tasks(tasks("cached"))));
    let configs: Vec<ProjectConfig> = dirs.iter().map(|dir| project(dir)).collect();

    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    assert_eq!(snapshot.project_count(), dirs.len());
    for dir in &dirs {
        let dir = Path::new(dir);
        let in_results = snapshot.results_by_project.contains_key(dir);
        let in_errors = snapshot.errors.contains_key(dir);
        assert!(in_results ^ in_errors, "{} must be in exactly one map", dir.display());
        assert_eq!(in_results, snapshot.groups_by_project.contains_key(dir));
    }
    assert_eq!(
        snapshot.errors[Path::new("/srv/p1")].message,
        "cached",
        "fresh cached error is reused rather than re-executed"
    );
    assert_eq!(
        snapshot.results_by_project[Path::new("/srv/p3")].tasks,
        tasks("cached")
    );
}

#[tokio::test]
async fn independent_projects_run_concurrently() {
    let (executor, orchestrator, cache) = setup();
    let delay = Duration::from_millis(300);
    let dirs = ["/srv/a", "/srv/b", "/srv/c", "/srv/d"];
    for dir in dirs {
        executor.script(dir, slow(delay));
    }
    let configs: Vec<ProjectConfig> = dirs.iter().map(|dir| project(dir)).collect();

    let started = Instant::now();
    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(snapshot.results_by_project.len(), dirs.len());
    assert!(
        elapsed < delay * 2,
        "expected roughly one provider delay, took {elapsed:?}"
    );
    assert_eq!(executor.max_in_flight(), dirs.len());
}

#[tokio::test]
async fn max_concurrency_bounds_in_flight_providers() {
    let (executor, orchestrator, cache) = setup();
    let delay = Duration::from_millis(100);
    let dirs = ["/srv/a", "/srv/b", "/srv/c"];
    for dir in dirs {
        executor.script(dir, slow(delay));
    }
    let configs: Vec<ProjectConfig> = dirs.iter().map(|dir| project(dir)).collect();
    let options = RefreshOptions::default().max_concurrency(1);

    let started = Instant::now();
    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &options)
        .await;

    assert_eq!(snapshot.results_by_project.len(), dirs.len());
    assert_eq!(executor.max_in_flight(), 1);
    assert!(started.elapsed() >= delay * dirs.len() as u32);
}

#[tokio::test]
async fn oversized_concurrency_limit_is_clamped() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", succeed("a"));
    executor.script("/srv/b", succeed("b"));
    let configs = vec![project("/srv/a"), project("/srv/b")];
    let options = RefreshOptions::default().max_concurrency(usize::MAX);

    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &options)
        .await;

    assert_eq!(snapshot.results_by_project.len(), 2);
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn zero_concurrency_limit_still_runs_providers() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", succeed("a"));
    let options = RefreshOptions::default().max_concurrency(0);

    let snapshot = orchestrator
        .refresh(&cache, &[project("/srv/a")], &GlobalConfig::default(), &options)
        .await;

    assert_eq!(snapshot.results_by_project.len(), 1);
}

#[tokio::test]
async fn panicking_provider_becomes_internal_error() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/panics", Behavior::Panic);
    executor.script("/srv/fine", succeed("fine"));
    let configs = vec![project("/srv/panics"), project("/srv/fine")];

    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    let error = &snapshot.errors[Path::new("/srv/panics")];
    assert_eq!(error.kind, CoreErrorKind::Internal);
    assert_eq!(error.project.as_deref(), Some(Path::new("/srv/panics")));
    assert!(snapshot.results_by_project.contains_key(Path::new("/srv/fine")));

    let cached = cache
        .get(Path::new("/srv/panics"), Duration::from_secs(60))
        .expect("panic outcome is cached");
    assert_eq!(cached.unwrap_err().kind, CoreErrorKind::Internal);
}

#[tokio::test]
async fn executed_outcomes_are_written_through_to_cache() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", succeed("alpha"));
    executor.script("/srv/b", Behavior::Fail(CoreErrorKind::ProviderTimeout));
    let configs = vec![project("/srv/a"), project("/srv/b")];

    orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    assert_eq!(cache.len(), 2);
    let a = cache
        .get(Path::new("/srv/a"), Duration::from_secs(60))
        .expect("a cached")
        .expect("a succeeded");
    assert_eq!(a.tasks, tasks("alpha"));
    let b = cache
        .get(Path::new("/srv/b"), Duration::from_secs(60))
        .expect("b cached")
        .expect_err("b failed");
    assert_eq!(b.kind, CoreErrorKind::ProviderTimeout);
}

#[tokio::test]
async fn narrow_freshness_window_forces_reexecution() {
    let (executor, orchestrator, cache) = setup();
    executor.script("/srv/a", succeed("alpha"));
    let configs = vec![project("/srv/a")];

    let lenient = RefreshOptions::default().freshness_window(Duration::from_secs(3600));
    orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &lenient)
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &lenient)
        .await;
    assert_eq!(executor.calls().len(), 1);

    let strict = RefreshOptions::default().freshness_window(Duration::from_millis(5));
    let snapshot = orchestrator
        .refresh(&cache, &configs, &GlobalConfig::default(), &strict)
        .await;
    assert_eq!(executor.calls().len(), 2);
    assert_eq!(snapshot.stats.executed, vec![PathBuf::from("/srv/a")]);
}

#[tokio::test]
async fn timeout_falls_back_to_global_default() {
    let (executor, orchestrator, cache) = setup();
    let global = GlobalConfig::default().default_timeout(Duration::from_secs(7));
    let configs = vec![project("/srv/a")];

    orchestrator
        .refresh(&cache, &configs, &global, &RefreshOptions::default())
        .await;
    cache.clear();
    orchestrator
        .refresh(
            &cache,
            &configs,
            &global,
            &RefreshOptions::default().timeout(Duration::from_secs(2)),
        )
        .await;

    assert_eq!(
        executor.timeouts(),
        vec![Duration::from_secs(7), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn empty_config_list_yields_empty_snapshot() {
    let (executor, orchestrator, cache) = setup();

    let snapshot = orchestrator
        .refresh(&cache, &[], &GlobalConfig::default(), &RefreshOptions::default())
        .await;

    assert!(snapshot.is_empty());
    assert!(executor.calls().is_empty());
}
