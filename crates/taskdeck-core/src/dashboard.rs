use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::models::{CoreError, ProjectConfig, ProviderResult, StatusCategory, Task, TaskGroup};
use crate::orchestration::{TasksRefreshed, dedup_by_project_dir};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatusCounts {
    pub done: usize,
    pub active: usize,
    pub todo: usize,
    pub review: usize,
    pub blocked: usize,
    pub other: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            counts.total += 1;
            match task.category() {
                StatusCategory::Done => counts.done += 1,
                StatusCategory::Active => counts.active += 1,
                StatusCategory::Todo => counts.todo += 1,
                StatusCategory::Review => counts.review += 1,
                StatusCategory::Blocked => counts.blocked += 1,
                StatusCategory::Other => counts.other += 1,
            }
        }
        counts
    }

    pub fn get(&self, category: StatusCategory) -> usize {
        match category {
            StatusCategory::Done => self.done,
            StatusCategory::Active => self.active,
            StatusCategory::Todo => self.todo,
            StatusCategory::Review => self.review,
            StatusCategory::Blocked => self.blocked,
            StatusCategory::Other => self.other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TaskFilter {
    pub hide_done: bool,
}

impl TaskFilter {
    pub fn accepts(&self, task: &Task) -> bool {
        !(self.hide_done && task.category() == StatusCategory::Done)
    }

    /// Filters tasks inside each group; groups left empty by the filter are dropped.
    pub fn apply(&self, groups: &[TaskGroup]) -> Vec<TaskGroup> {
        groups
            .iter()
            .filter_map(|group| {
                let tasks: Vec<Task> = group
                    .tasks
                    .iter()
                    .filter(|task| self.accepts(task))
                    .cloned()
                    .collect();
                if tasks.is_empty() && !group.tasks.is_empty() {
                    return None;
                }
                Some(TaskGroup {
                    id: group.id.clone(),
                    title: group.title.clone(),
                    status: group.status,
                    tasks,
                })
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct ProjectPanel {
    pub project_dir: PathBuf,
    pub display_name: String,
    pub result: Option<ProviderResult>,
    pub groups: Vec<TaskGroup>,
    pub error: Option<CoreError>,
    /// When `result` was last replaced by a successful fetch.
    pub updated_at: Option<SystemTime>,
}

impl ProjectPanel {
    fn new(project_dir: PathBuf, display_name: String) -> Self {
        Self {
            project_dir,
            display_name,
            result: None,
            groups: Vec::new(),
            error: None,
            updated_at: None,
        }
    }

    /// Counts over every reported task, regardless of any display filter.
    pub fn counts(&self) -> StatusCounts {
        self.result
            .as_ref()
            .map(|result| StatusCounts::from_tasks(result.all_tasks()))
            .unwrap_or_default()
    }

    pub fn visible_groups(&self, filter: &TaskFilter) -> Vec<TaskGroup> {
        filter.apply(&self.groups)
    }

    pub fn is_loading(&self) -> bool {
        self.result.is_none() && self.error.is_none()
    }
}

/// Per-project view state fed by refresh messages.
///
/// A project whose latest refresh failed keeps showing its last good data next to
/// the error until a later success replaces both.
#[derive(Clone, Debug, Default)]
pub struct ProjectPanels {
    order: Vec<PathBuf>,
    panels: HashMap<PathBuf, ProjectPanel>,
    last_generation: Option<u64>,
}

impl ProjectPanels {
    pub fn new(configs: &[ProjectConfig]) -> Self {
        let mut panels = Self::default();
        for config in dedup_by_project_dir(configs) {
            let display_name = config.display_name();
            panels.order.push(config.project_dir.clone());
            panels.panels.insert(
                config.project_dir.clone(),
                ProjectPanel::new(config.project_dir, display_name),
            );
        }
        panels
    }

    /// Applies a refresh message. Messages older than the last applied one are ignored.
    pub fn apply(&mut self, message: &TasksRefreshed) -> bool {
        if let Some(last) = self.last_generation
            && message.generation < last
        {
            tracing::debug!(
                generation = message.generation,
                last_generation = last,
                "ignoring out-of-order refresh"
            );
            return false;
        }
        self.last_generation = Some(message.generation);

        let snapshot = &message.snapshot;
        for (project_dir, result) in &snapshot.results_by_project {
            let panel = self.panel_mut(project_dir);
            panel.result = Some(result.clone());
            panel.groups = snapshot
                .groups_by_project
                .get(project_dir)
                .cloned()
                .unwrap_or_default();
            panel.error = None;
            panel.updated_at = Some(message.finished_at);
        }

        for (project_dir, error) in &snapshot.errors {
            self.panel_mut(project_dir).error = Some(error.clone());
        }

        true
    }

    pub fn get(&self, project_dir: &Path) -> Option<&ProjectPanel> {
        self.panels.get(project_dir)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectPanel> {
        self.order.iter().filter_map(|dir| self.panels.get(dir))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn totals(&self) -> StatusCounts {
        let mut totals = StatusCounts::default();
        for panel in self.iter() {
            let counts = panel.counts();
            totals.done += counts.done;
            totals.active += counts.active;
            totals.todo += counts.todo;
            totals.review += counts.review;
            totals.blocked += counts.blocked;
            totals.other += counts.other;
            totals.total += counts.total;
        }
        totals
    }

    pub fn error_count(&self) -> usize {
        self.iter().filter(|panel| panel.error.is_some()).count()
    }

    fn panel_mut(&mut self, project_dir: &Path) -> &mut ProjectPanel {
        let order = &mut self.order;
        self.panels
            .entry(project_dir.to_path_buf())
            .or_insert_with(|| {
                order.push(project_dir.to_path_buf());
                let display_name = ProjectConfig::new(project_dir, "").display_name();
                ProjectPanel::new(project_dir.to_path_buf(), display_name)
            })
    }
}
