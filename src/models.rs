// Data models for the task store

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: DateTime<Utc>,
}

impl Task {
    /// Build a task from a draft and an already-assigned id
    pub fn from_draft(id: impl Into<String>, draft: TaskDraft) -> Self {
        Self {
            id: id.into(),
            title: draft.title,
            description: draft.description,
            status: draft.status,
            priority: draft.priority,
            deadline: draft.deadline,
        }
    }

    /// Copy of this task with every field except `id` taken from `draft`
    pub fn with_fields(&self, draft: TaskDraft) -> Self {
        Self::from_draft(self.id.clone(), draft)
    }

    /// Copy of this task with its status flipped between done and not done
    pub fn toggled(&self) -> Self {
        Self {
            status: self.status.toggled(),
            ..self.clone()
        }
    }

    /// True once the deadline has passed. Advisory only, never enforced.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }
}

/// Task fields minus the id, as supplied by callers on add and edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// `Done` goes back to `Todo`; anything else becomes `Done`.
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Done => TaskStatus::Todo,
            TaskStatus::Todo | TaskStatus::InProgress => TaskStatus::Done,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "TODO"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Sort rank, lowest first: High=1, Medium=2, Low=3
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "LOW"),
            TaskPriority::Medium => write!(f, "MEDIUM"),
            TaskPriority::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = eyre::Report;

    fn from_str(s: &str) -> eyre::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(eyre::eyre!("Unknown priority: {} (expected low, medium or high)", other)),
        }
    }
}

/// Starter tasks written on a first run when seeding is enabled
pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    vec![
        Task {
            id: "1".to_string(),
            title: "Grocery Shopping".to_string(),
            description: "Buy milk, eggs, bread, and cheese from the supermarket.".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            deadline: now + Duration::days(1),
        },
        Task {
            id: "2".to_string(),
            title: "Book Doctor Appointment".to_string(),
            description: "Schedule a check-up appointment for next week.".to_string(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::Medium,
            deadline: now + Duration::days(7),
        },
        Task {
            id: "3".to_string(),
            title: "Pay Bills".to_string(),
            description: "Pay electricity and internet bills by the due date.".to_string(),
            status: TaskStatus::Done,
            priority: TaskPriority::High,
            deadline: now,
        },
    ]
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn draft() -> TaskDraft {
        TaskDraft {
            title: "Buy milk".to_string(),
            description: "2%".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            deadline: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_now_ms() {
        let ts = now_ms();
        // Should be reasonable timestamp (after year 2020)
        assert!(ts > 1_600_000_000_000);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&TaskStatus::Todo).unwrap(), "\"TODO\"");
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Done).unwrap(), "\"DONE\"");
        assert_eq!(TaskStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(serde_json::to_string(&TaskPriority::High).unwrap(), "\"HIGH\"");
        let p: TaskPriority = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(p, TaskPriority::Medium);
    }

    #[test]
    fn test_status_toggle() {
        assert_eq!(TaskStatus::Todo.toggled(), TaskStatus::Done);
        assert_eq!(TaskStatus::Done.toggled(), TaskStatus::Todo);
        assert_eq!(TaskStatus::InProgress.toggled(), TaskStatus::Done);
    }

    #[test]
    fn test_priority_rank_and_parse() {
        assert!(TaskPriority::High.rank() < TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() < TaskPriority::Low.rank());
        assert_eq!("High".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_with_fields_keeps_id() {
        let task = Task::from_draft("abc", draft());
        let mut changed = draft();
        changed.title = "Buy oat milk".to_string();
        changed.priority = TaskPriority::High;

        let edited = task.with_fields(changed);
        assert_eq!(edited.id, "abc");
        assert_eq!(edited.title, "Buy oat milk");
        assert_eq!(edited.priority, TaskPriority::High);
    }

    #[test]
    fn test_is_expired() {
        let task = Task::from_draft("1", draft());
        let before = Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert!(!task.is_expired(before));
        assert!(task.is_expired(after));
    }

    #[test]
    fn test_deadline_serializes_as_iso8601() {
        let task = Task::from_draft("1", draft());
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"deadline\":\"2024-05-01T10:00:00Z\""));
    }

    #[test]
    fn test_sample_tasks_have_unique_ids() {
        let tasks = sample_tasks(Utc::now());
        assert_eq!(tasks.len(), 3);
        let ids: HashSet<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }
}
