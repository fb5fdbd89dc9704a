use crate::models::{ProviderResult, StatusCategory, Task, TaskGroup};

pub const DEFAULT_GROUP_ID: &str = "default";
pub const DEFAULT_GROUP_TITLE: &str = "Tasks";

/// Turns a provider result into the group hierarchy used for display.
///
/// Loose tasks land in a synthesized default group (first, original order);
/// provider groups pass through after it. A result with nothing in it still
/// yields one empty default group.
pub fn normalize(result: &ProviderResult) -> Vec<TaskGroup> {
    let mut groups = Vec::with_capacity(result.groups.len() + 1);

    if !result.tasks.is_empty() || result.groups.is_empty() {
        groups.push(TaskGroup {
            id: DEFAULT_GROUP_ID.to_string(),
            title: DEFAULT_GROUP_TITLE.to_string(),
            status: aggregate_status(&result.tasks),
            tasks: result.tasks.clone(),
        });
    }

    for group in &result.groups {
        let status = match group.status.as_deref() {
            Some(raw) if !raw.trim().is_empty() => StatusCategory::from_status(raw),
            _ => aggregate_status(&group.tasks),
        };
        groups.push(TaskGroup {
            id: group.id.clone(),
            title: group.title.clone(),
            status,
            tasks: group.tasks.clone(),
        });
    }

    groups
}

/// Derives a group's status from its members. Independent of member order.
pub fn aggregate_status(tasks: &[Task]) -> StatusCategory {
    if tasks.is_empty() {
        return StatusCategory::Todo;
    }

    let mut done = 0usize;
    let mut active = false;
    let mut review = false;
    let mut blocked = false;
    let mut todo = false;

    for task in tasks {
        match task.category() {
            StatusCategory::Done => done += 1,
            StatusCategory::Active => active = true,
            StatusCategory::Review => review = true,
            StatusCategory::Blocked => blocked = true,
            StatusCategory::Todo => todo = true,
            StatusCategory::Other => {}
        }
    }

    if done == tasks.len() {
        StatusCategory::Done
    } else if blocked {
        StatusCategory::Blocked
    } else if active || done > 0 {
        // Partially finished work counts as in flight.
        StatusCategory::Active
    } else if review {
        StatusCategory::Review
    } else if todo {
        StatusCategory::Todo
    } else {
        StatusCategory::Other
    }
}
