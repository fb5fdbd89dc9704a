use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{CoreError, CoreErrorKind};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectConfig {
    pub project_dir: PathBuf,
    pub provider_command: String,
    pub args: Vec<String>,
    pub label: Option<String>,
}

impl ProjectConfig {
    pub fn new(project_dir: impl Into<PathBuf>, provider_command: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            provider_command: provider_command.into(),
            args: Vec::new(),
            label: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label shown in panels; falls back to the directory's final component.
    pub fn display_name(&self) -> String {
        if let Some(label) = self.label.as_deref().filter(|label| !label.trim().is_empty()) {
            return label.to_string();
        }
        self.project_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.project_dir.to_string_lossy().to_string())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.project_dir.as_os_str().is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "project directory must not be empty",
            ));
        }

        if !self.project_dir.is_absolute() {
            return Err(CoreError::for_project(
                &self.project_dir,
                CoreErrorKind::InvalidInput,
                format!(
                    "project directory '{}' must be an absolute path",
                    self.project_dir.display()
                ),
            ));
        }

        if self.provider_command.trim().is_empty() {
            return Err(CoreError::for_project(
                &self.project_dir,
                CoreErrorKind::InvalidInput,
                "provider command must not be empty",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalConfig {
    pub search_paths: Vec<PathBuf>,
    pub default_timeout: Duration,
    pub env: BTreeMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            default_timeout: DEFAULT_PROVIDER_TIMEOUT,
            env: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
