use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use taskdeck_core::models::{DEFAULT_PROVIDER_TIMEOUT, GlobalConfig, ProjectConfig};
use taskdeck_core::orchestration::{MAX_CONCURRENCY, RefreshPolicy};

pub const CONFIG_PATH_ENV: &str = "TASKDECK_CONFIG_PATH";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    #[serde(default)]
    search_paths: Vec<PathBuf>,
    default_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    poll_max_age_ms: Option<u64>,
    manual_max_age_ms: Option<u64>,
    max_concurrency: Option<usize>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    hide_done: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectEntry {
    project_dir: PathBuf,
    provider_command: String,
    #[serde(default)]
    args: Vec<String>,
    label: Option<String>,
}

/// Everything the dashboard needs, resolved from one config file.
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub path: PathBuf,
    pub projects: Vec<ProjectConfig>,
    pub global: GlobalConfig,
    pub policy: RefreshPolicy,
    pub poll_interval: Duration,
    pub hide_done: bool,
}

/// Picks the config file: explicit flag, then `$TASKDECK_CONFIG_PATH`, then the XDG location.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve_config_path(explicit, |key| std::env::var(key).ok())
}

fn resolve_config_path(
    explicit: Option<PathBuf>,
    var: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Some(path) = var(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        return PathBuf::from(path);
    }
    config_dir(&var).join("taskdeck").join("config.json")
}

fn config_dir(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = var("XDG_CONFIG_HOME").filter(|value| !value.trim().is_empty()) {
        return PathBuf::from(path);
    }
    match var("HOME") {
        Some(home) => PathBuf::from(home).join(".config"),
        None => PathBuf::from(".config"),
    }
}

pub fn load_config(path: &Path) -> Result<DashboardConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &contents)
}

fn parse_config(path: &Path, contents: &str) -> Result<DashboardConfig, ConfigError> {
    let file: ConfigFile = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let invalid = |message: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    let base_dir = path.parent().unwrap_or(Path::new("."));
    let projects = file
        .projects
        .into_iter()
        .map(|entry| {
            let project_dir = if entry.project_dir.is_absolute() {
                entry.project_dir
            } else {
                base_dir.join(entry.project_dir)
            };
            let mut config = ProjectConfig::new(project_dir, entry.provider_command);
            config.args = entry.args;
            config.label = entry.label;
            config
                .validate()
                .map_err(|error| invalid(error.message.clone()))?;
            Ok(config)
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let default_timeout = millis(file.default_timeout_ms).unwrap_or(DEFAULT_PROVIDER_TIMEOUT);
    if default_timeout.is_zero() {
        return Err(invalid("default_timeout_ms must be greater than zero".to_string()));
    }
    match file.max_concurrency {
        Some(0) => return Err(invalid("max_concurrency must be greater than zero".to_string())),
        Some(limit) if limit > MAX_CONCURRENCY => {
            return Err(invalid(format!(
                "max_concurrency must be at most {MAX_CONCURRENCY}"
            )));
        }
        _ => {}
    }
    let poll_interval = millis(file.poll_interval_ms).unwrap_or(DEFAULT_POLL_INTERVAL);
    if poll_interval.is_zero() {
        return Err(invalid("poll_interval_ms must be greater than zero".to_string()));
    }

    let search_paths = file
        .search_paths
        .into_iter()
        .map(|dir| if dir.is_absolute() { dir } else { base_dir.join(dir) })
        .collect();

    let defaults = RefreshPolicy::default();
    let policy = RefreshPolicy {
        poll_max_age: millis(file.poll_max_age_ms).unwrap_or(defaults.poll_max_age),
        manual_max_age: millis(file.manual_max_age_ms).unwrap_or(defaults.manual_max_age),
        timeout: None,
        max_concurrency: file.max_concurrency,
    };

    Ok(DashboardConfig {
        path: path.to_path_buf(),
        projects,
        global: GlobalConfig {
            search_paths,
            default_timeout,
            env: file.env,
        },
        policy,
        poll_interval,
        hide_done: file.hide_done,
    })
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_millis)
}
