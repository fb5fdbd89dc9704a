use std::collections::HashSet;

use serde::Deserialize;

use crate::models::{CoreError, CoreErrorKind, ProviderGroup, ProviderResult, Task};

pub const WIRE_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireDocument {
    version: Option<u32>,
    tasks: Option<Vec<WireTask>>,
    groups: Option<Vec<WireGroup>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireTask {
    id: String,
    title: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireGroup {
    id: String,
    title: String,
    status: Option<String>,
    tasks: Vec<WireTask>,
}

/// Parses a provider's stdout into a [`ProviderResult`].
///
/// Unknown fields, missing required fields, an unsupported `version`, empty or
/// duplicated task ids are all rejected rather than defaulted.
pub fn parse_provider_output(stdout: &str) -> Result<ProviderResult, CoreError> {
    if stdout.trim().is_empty() {
        return Err(parse_error("provider produced no output"));
    }

    let document: WireDocument = serde_json::from_str(stdout)
        .map_err(|e| parse_error(&format!("invalid provider JSON: {e}")))?;

    if let Some(version) = document.version
        && version != WIRE_VERSION
    {
        return Err(parse_error(&format!(
            "unsupported provider output version {version} (expected {WIRE_VERSION})"
        )));
    }

    if document.tasks.is_none() && document.groups.is_none() {
        return Err(parse_error(
            "provider output must contain a 'tasks' or 'groups' array",
        ));
    }

    let mut seen_ids = HashSet::new();
    let tasks = convert_tasks(document.tasks.unwrap_or_default(), &mut seen_ids)?;

    let mut groups = Vec::new();
    for group in document.groups.unwrap_or_default() {
        if group.id.trim().is_empty() {
            return Err(parse_error("group id must not be empty"));
        }
        groups.push(ProviderGroup {
            id: group.id,
            title: group.title,
            status: group.status,
            tasks: convert_tasks(group.tasks, &mut seen_ids)?,
        });
    }

    Ok(ProviderResult { tasks, groups })
}

fn convert_tasks(
    entries: Vec<WireTask>,
    seen_ids: &mut HashSet<String>,
) -> Result<Vec<Task>, CoreError> {
    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.id.trim().is_empty() {
            return Err(parse_error("task id must not be empty"));
        }
        if !seen_ids.insert(entry.id.clone()) {
            return Err(parse_error(&format!("duplicate task id '{}'", entry.id)));
        }
        tasks.push(Task {
            id: entry.id,
            title: entry.title,
            status: entry.status,
        });
    }
    Ok(tasks)
}

fn parse_error(message: &str) -> CoreError {
    CoreError::new(CoreErrorKind::ResultParseError, message)
}
