// Filtering and ordering for the derived task view

use crate::models::{Task, TaskPriority};
use serde::{Deserialize, Serialize};

/// Which tasks the derived view keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(TaskPriority),
}

impl PriorityFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(priority) => task.priority == priority,
        }
    }
}

impl From<TaskPriority> for PriorityFilter {
    fn from(priority: TaskPriority) -> Self {
        PriorityFilter::Only(priority)
    }
}

impl std::fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityFilter::All => write!(f, "all"),
            PriorityFilter::Only(priority) => write!(f, "{}", priority),
        }
    }
}

impl std::str::FromStr for PriorityFilter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> eyre::Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(PriorityFilter::All);
        }
        Ok(PriorityFilter::Only(s.parse()?))
    }
}

impl From<PriorityFilter> for String {
    fn from(filter: PriorityFilter) -> Self {
        filter.to_string()
    }
}

impl TryFrom<String> for PriorityFilter {
    type Error = eyre::Report;

    fn try_from(value: String) -> eyre::Result<Self> {
        value.parse()
    }
}

/// Ordering applied to the derived view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// High, then Medium, then Low. Ties go to the earlier deadline.
    Priority,
    /// Lexicographic by id
    Id,
}

impl SortMode {
    pub fn from_priority_flag(enable_priority_order: bool) -> Self {
        if enable_priority_order { SortMode::Priority } else { SortMode::Id }
    }

    /// Stable in-place sort; equal keys keep their relative order
    pub fn apply(self, tasks: &mut [Task]) {
        match self {
            SortMode::Priority => {
                tasks.sort_by(|a, b| {
                    a.priority
                        .rank()
                        .cmp(&b.priority.rank())
                        .then_with(|| a.deadline.cmp(&b.deadline))
                })
            }
            SortMode::Id => tasks.sort_by(|a, b| a.id.cmp(&b.id)),
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortMode::Priority => write!(f, "priority"),
            SortMode::Id => write!(f, "id"),
        }
    }
}

/// Compute the view from the canonical collection and the current view parameters
pub fn derive_view(tasks: &[Task], filter: PriorityFilter, sort: Option<SortMode>) -> Vec<Task> {
    let mut view: Vec<Task> = tasks.iter().filter(|t| filter.matches(t)).cloned().collect();
    if let Some(mode) = sort {
        mode.apply(&mut view);
    }
    view
}
