use crate::models::{Status, Task};

// Status filter applied on top of the search query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }

    pub fn cycle(self) -> StatusFilter {
        match self {
            StatusFilter::All => StatusFilter::Only(Status::Pending),
            StatusFilter::Only(Status::Pending) => StatusFilter::Only(Status::InProgress),
            StatusFilter::Only(Status::InProgress) => StatusFilter::Only(Status::Completed),
            StatusFilter::Only(Status::Completed) => StatusFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(s) => s.label(),
        }
    }
}

// Move the task `from_id` to the position currently held by `to_id`,
// shifting everything in between by one slot (a single-element move, not a
// swap), then rewrite every task's `order` to its zero-based index.
//
// Returns the (id, order) pairs that actually changed so the caller can
// persist just those. Same id or an unknown id is a no-op.
pub fn move_task(tasks: &mut Vec<Task>, from_id: &str, to_id: &str) -> Vec<(String, i64)> {
    if from_id == to_id {
        return Vec::new();
    }
    let from = match tasks.iter().position(|t| t.id == from_id) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let to = match tasks.iter().position(|t| t.id == to_id) {
        Some(i) => i,
        None => return Vec::new(),
    };

    let moved = tasks.remove(from);
    tasks.insert(to, moved);

    let mut changed = Vec::new();
    for (index, task) in tasks.iter_mut().enumerate() {
        let order = index as i64;
        if task.order != order {
            task.order = order;
            changed.push((task.id.clone(), order));
        }
    }
    changed
}

// Pure view over the task list: status must match the filter, and the query
// (when non-empty) must appear case-insensitively in title or description.
pub fn filter_tasks<'a>(tasks: &'a [Task], query: &str, filter: StatusFilter) -> Vec<&'a Task> {
    let needle = query.to_lowercase();
    tasks
        .iter()
        .filter(|task| {
            let matches_status = filter.matches(task.status);
            let matches_query = needle.is_empty()
                || task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle);
            matches_status && matches_query
        })
        .collect()
}
