use std::fmt::{Display, Formatter};

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Done,
    Active,
    Todo,
    Review,
    Blocked,
    Other,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 6] = [
        StatusCategory::Active,
        StatusCategory::Blocked,
        StatusCategory::Review,
        StatusCategory::Todo,
        StatusCategory::Other,
        StatusCategory::Done,
    ];

    /// Maps free-text provider status onto a category. Unrecognized text is `Other`.
    pub fn from_status(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "done" | "complete" | "completed" | "closed" | "finished" | "resolved"
            | "cancelled" | "canceled" => StatusCategory::Done,
            "active" | "in-progress" | "inprogress" | "doing" | "started" | "wip"
            | "running" => StatusCategory::Active,
            "todo" | "to-do" | "pending" | "open" | "new" | "backlog" | "ready"
            | "deferred" => StatusCategory::Todo,
            "review" | "in-review" | "needs-review" | "reviewing" => StatusCategory::Review,
            "blocked" | "stuck" | "waiting" | "on-hold" => StatusCategory::Blocked,
            _ => StatusCategory::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCategory::Done => "done",
            StatusCategory::Active => "active",
            StatusCategory::Todo => "todo",
            StatusCategory::Review => "review",
            StatusCategory::Blocked => "blocked",
            StatusCategory::Other => "other",
        }
    }
}

impl Display for StatusCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: status.into(),
        }
    }

    pub fn category(&self) -> StatusCategory {
        StatusCategory::from_status(&self.status)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TaskGroup {
    pub id: String,
    pub title: String,
    pub status: StatusCategory,
    pub tasks: Vec<Task>,
}

/// Parsed output of one provider run.
///
/// Providers may report a flat list in `tasks`, pre-grouped tasks in `groups`,
/// or both. Normalization into [`TaskGroup`]s happens in
/// [`crate::orchestration::normalize`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ProviderResult {
    pub tasks: Vec<Task>,
    pub groups: Vec<ProviderGroup>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProviderGroup {
    pub id: String,
    pub title: String,
    pub status: Option<String>,
    pub tasks: Vec<Task>,
}

impl ProviderResult {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            groups: Vec::new(),
        }
    }

    /// Every task the provider reported, loose tasks first, independent of any UI filter.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .chain(self.groups.iter().flat_map(|group| group.tasks.iter()))
    }

    pub fn task_count(&self) -> usize {
        self.all_tasks().count()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderGroup, ProviderResult, StatusCategory, Task};

    #[test]
    fn maps_status_aliases_case_insensitively() {
        assert_eq!(StatusCategory::from_status("Done"), StatusCategory::Done);
        assert_eq!(StatusCategory::from_status("in_progress"), StatusCategory::Active);
        assert_eq!(StatusCategory::from_status("In Progress"), StatusCategory::Active);
        assert_eq!(StatusCategory::from_status(" todo "), StatusCategory::Todo);
        assert_eq!(StatusCategory::from_status("needs_review"), StatusCategory::Review);
        assert_eq!(StatusCategory::from_status("ON HOLD"), StatusCategory::Blocked);
        assert_eq!(StatusCategory::from_status("cancelled"), StatusCategory::Done);
    }

    #[test]
    fn unknown_status_maps_to_other() {
        assert_eq!(StatusCategory::from_status("triaged"), StatusCategory::Other);
        assert_eq!(StatusCategory::from_status(""), StatusCategory::Other);
    }

    #[test]
    fn all_tasks_includes_loose_and_grouped_tasks_in_order() {
        let result = ProviderResult {
            tasks: vec![Task::new("a", "Loose", "todo")],
            groups: vec![ProviderGroup {
                id: "g".to_string(),
                title: "Group".to_string(),
                status: None,
                tasks: vec![Task::new("b", "First", "done"), Task::new("c", "Second", "wip")],
            }],
        };

        let ids: Vec<&str> = result.all_tasks().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(result.task_count(), 3);
    }
}
