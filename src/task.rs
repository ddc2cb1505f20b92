//! Task and subtask data structures.
//!
//! Field names serialize in camelCase (`dueDate`, `createdAt`, ...) so
//! previously exported files import cleanly. Every field has a serde
//! default: imported records are accepted as-is even when sparse, and
//! missing fields degrade to harmless values instead of failing the whole
//! import.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::Priority;

/// A user-created to-do item with scheduling and priority metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub completed: bool,
    /// Missing on import means the epoch, which sorts last under newest-first.
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    /// Dense display-order index, reassigned after any reorder.
    #[serde(default)]
    pub order: usize,
}

/// A sub-item of a task, binary done/not-done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl Task {
    /// Create a task with a fresh id, stamped now, at the given order slot.
    pub fn new(title: impl Into<String>, priority: Priority, order: usize) -> Self {
        Task {
            id: new_id("task"),
            title: title.into(),
            description: None,
            due_date: None,
            priority,
            tags: Vec::new(),
            subtasks: Vec::new(),
            completed: false,
            created_at: Utc::now(),
            order,
        }
    }
}

impl Subtask {
    /// Create an unchecked subtask with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Subtask {
            id: new_id("sub"),
            text: text.into(),
            done: false,
        }
    }
}

/// Generate a prefixed identifier, e.g. `task-9f2c1ab4`.
pub fn new_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_prefix_and_uniqueness() {
        let a = new_id("task");
        let b = new_id("task");
        assert!(a.starts_with("task-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sparse_record_deserializes() {
        let task: Task = serde_json::from_str(r#"{"id":"x","title":"A","priority":"high"}"#)
            .expect("sparse record should parse");
        assert_eq!(task.id, "x");
        assert_eq!(task.title, "A");
        assert_eq!(task.priority, Priority::High);
        assert!(!task.completed);
        assert!(task.subtasks.is_empty());
        assert_eq!(task.created_at, DateTime::UNIX_EPOCH);
        assert_eq!(task.order, 0);
    }

    #[test]
    fn test_camel_case_wire_names() {
        let task = Task::new("Buy milk", Priority::Low, 0);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"dueDate\""));
        assert!(!json.contains("\"created_at\""));
    }
}
