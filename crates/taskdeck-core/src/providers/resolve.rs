use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{CoreError, CoreErrorKind, GlobalConfig, ProjectConfig};

/// Finds the provider executable for a project.
///
/// Commands containing a path separator are taken relative to the project directory.
/// Bare names are looked up in the project directory, the configured search paths,
/// then `PATH`.
pub fn resolve_provider(config: &ProjectConfig, global: &GlobalConfig) -> Result<PathBuf, CoreError> {
    let command = config.provider_command.trim();

    if command.contains('/') {
        let candidate = config.project_dir.join(command);
        if is_executable_file(&candidate) {
            return Ok(candidate);
        }
        return Err(not_found(
            config,
            format!("provider '{}' is not an executable file", candidate.display()),
        ));
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    push_candidate_path(config.project_dir.join(command), &mut candidates, &mut seen);

    for dir in &global.search_paths {
        push_candidate_path(dir.join(command), &mut candidates, &mut seen);
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            push_candidate_path(dir.join(command), &mut candidates, &mut seen);
        }
    }

    candidates
        .into_iter()
        .find(|candidate| is_executable_file(candidate))
        .ok_or_else(|| {
            not_found(
                config,
                format!("provider '{command}' not found in project directory, search paths, or PATH"),
            )
        })
}

fn push_candidate_path(
    candidate: PathBuf,
    candidates: &mut Vec<PathBuf>,
    seen: &mut HashSet<PathBuf>,
) {
    if candidate.as_os_str().is_empty() {
        return;
    }

    if seen.insert(candidate.clone()) {
        candidates.push(candidate);
    }
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn not_found(config: &ProjectConfig, message: String) -> CoreError {
    CoreError::for_project(&config.project_dir, CoreErrorKind::ProviderNotFound, message)
}
