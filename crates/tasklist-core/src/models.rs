//! Data models for tasklist
//!
//! Defines the task record exchanged with the remote task service, the
//! request bodies sent to it, and the small view-side helpers (filters and
//! counts) derived from a task list.
//!
//! Wire names are camelCase and dates are Unix epoch milliseconds, matching
//! the JSON the service speaks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task as stored by the remote service
///
/// `id`, `created_date` and `completed_date` are assigned by the service and
/// never generated on the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier assigned by the service
    pub id: String,
    /// Human-readable description
    pub text: String,
    /// Whether the task is done
    pub completed: bool,
    /// When the service created the task
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_date: DateTime<Utc>,
    /// When the task was completed (only present while `completed` is true)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub completed_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the task still needs doing
    pub fn is_active(&self) -> bool {
        !self.completed
    }

    /// Check the fields the client relies on
    ///
    /// Only the identifier is required: every reconciliation step matches
    /// on it, so an empty one would silently corrupt the snapshot.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("task has an empty id".to_string());
        }
        Ok(())
    }

    /// Whether `completed_date` is present exactly when `completed` is set
    ///
    /// The service owns this invariant; the client only reports violations.
    pub fn has_consistent_dates(&self) -> bool {
        self.completed == self.completed_date.is_some()
    }
}

/// Body of a create request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub text: String,
}

/// Body of an update request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub text: String,
}

/// Which tasks a view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    /// Check whether a task passes this filter
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => !task.completed,
            TaskFilter::Completed => task.completed,
        }
    }

    /// Message shown when nothing passes the filter
    pub fn empty_message(&self) -> &'static str {
        match self {
            TaskFilter::All => "No tasks.",
            TaskFilter::Active => "No active tasks.",
            TaskFilter::Completed => "No completed tasks.",
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskFilter::All => "all",
            TaskFilter::Active => "active",
            TaskFilter::Completed => "completed",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "active" => Ok(TaskFilter::Active),
            "completed" | "done" => Ok(TaskFilter::Completed),
            other => Err(format!(
                "unknown filter '{}' (expected all, active or completed)",
                other
            )),
        }
    }
}

/// Active/completed tallies for a task list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            active: tasks.len() - completed,
            completed,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: &str, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task {}", id),
            completed,
            created_date: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            completed_date: completed.then(|| Utc.timestamp_millis_opt(1_700_000_100_000).unwrap()),
        }
    }

    #[test]
    fn test_task_deserialize_wire_format() {
        let json = r#"{
            "id": "abc",
            "text": "Buy milk",
            "completed": true,
            "createdDate": 1700000000000,
            "completedDate": 1700000100000
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "abc");
        assert_eq!(task.text, "Buy milk");
        assert!(task.completed);
        assert_eq!(task.created_date.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            task.completed_date.map(|d| d.timestamp_millis()),
            Some(1_700_000_100_000)
        );
    }

    #[test]
    fn test_task_missing_completed_date() {
        let json = r#"{"id":"a","text":"x","completed":false,"createdDate":1}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.completed_date.is_none());
        assert!(task.has_consistent_dates());
    }

    #[test]
    fn test_task_serialize_skips_absent_completed_date() {
        let json = serde_json::to_string(&task("a", false)).unwrap();
        assert!(json.contains("\"createdDate\":1700000000000"));
        assert!(!json.contains("completedDate"));
    }

    #[test]
    fn test_task_rejects_wrong_shape() {
        let json = r#"{"id":"a","text":"x","completed":"yes","createdDate":1}"#;
        assert!(serde_json::from_str::<Task>(json).is_err());

        let json = r#"{"id":"a","completed":false,"createdDate":1}"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn test_task_validate() {
        assert!(task("a", false).validate().is_ok());
        assert!(task("  ", false).validate().is_err());
    }

    #[test]
    fn test_inconsistent_dates() {
        let mut t = task("a", true);
        t.completed_date = None;
        assert!(!t.has_consistent_dates());
    }

    #[test]
    fn test_filter_matches() {
        let active = task("a", false);
        let done = task("b", true);

        assert!(TaskFilter::All.matches(&active));
        assert!(TaskFilter::All.matches(&done));
        assert!(TaskFilter::Active.matches(&active));
        assert!(!TaskFilter::Active.matches(&done));
        assert!(TaskFilter::Completed.matches(&done));
        assert!(!TaskFilter::Completed.matches(&active));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("all".parse::<TaskFilter>().unwrap(), TaskFilter::All);
        assert_eq!("Active".parse::<TaskFilter>().unwrap(), TaskFilter::Active);
        assert_eq!("done".parse::<TaskFilter>().unwrap(), TaskFilter::Completed);
        assert!("someday".parse::<TaskFilter>().is_err());
        assert_eq!(TaskFilter::Completed.to_string(), "completed");
    }

    #[test]
    fn test_counts() {
        let tasks = vec![task("a", false), task("b", true), task("c", true)];
        let counts = TaskCounts::from_tasks(&tasks);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.total(), 3);
    }
}
