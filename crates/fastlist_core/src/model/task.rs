//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record owned by the task store.
//! - Provide title validation and the derived done/total summary.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` is never blank after trim.
//! - `order` is the dense zero-based display position; only the store assigns it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one task record.
pub type TaskId = Uuid;

/// Validation errors for task records and create input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is empty or whitespace-only.
    EmptyTitle,
    /// Title contains a NUL byte, which the backend cannot round-trip.
    TitleContainsNul,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be blank"),
            Self::TitleContainsNul => write!(f, "task title must not contain NUL characters"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable id assigned at creation.
    pub id: TaskId,
    /// Immutable, non-blank text.
    pub title: String,
    /// Completion flag, `false` at creation.
    pub done: bool,
    /// Dense zero-based display position.
    pub order: u32,
}

impl Task {
    /// Creates a new open task with a generated id at the front of the list.
    ///
    /// The title is normalized (trimmed) and validated.
    pub fn new(title: impl Into<String>) -> Result<Self, TaskValidationError> {
        let title = normalize_title(title.into())?;
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            done: false,
            order: 0,
        })
    }

    /// Validates persisted or caller-built records.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_title(&self.title)
    }
}

/// Derived done/total aggregate over the working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub done_count: usize,
    pub total_count: usize,
}

impl TaskSummary {
    /// Counts done and total records in one pass.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        Self {
            done_count: tasks.iter().filter(|task| task.done).count(),
            total_count: tasks.len(),
        }
    }
}

impl Display for TaskSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \\ {}", self.done_count, self.total_count)
    }
}

/// Trims and validates user-entered title text.
pub fn normalize_title(value: String) -> Result<String, TaskValidationError> {
    let trimmed = value.trim();
    validate_title(trimmed)?;
    Ok(trimmed.to_string())
}

fn validate_title(value: &str) -> Result<(), TaskValidationError> {
    if value.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    if value.contains('\0') {
        return Err(TaskValidationError::TitleContainsNul);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{normalize_title, Task, TaskSummary, TaskValidationError};

    #[test]
    fn new_task_starts_open_at_front() {
        let task = Task::new("  Buy milk ").unwrap();
        assert_eq!(task.title, "Buy milk");
        assert!(!task.done);
        assert_eq!(task.order, 0);
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert_eq!(Task::new("").unwrap_err(), TaskValidationError::EmptyTitle);
        assert_eq!(
            normalize_title(" \t\n".to_string()).unwrap_err(),
            TaskValidationError::EmptyTitle
        );
    }

    #[test]
    fn nul_titles_are_rejected() {
        assert_eq!(
            Task::new("a\0b").unwrap_err(),
            TaskValidationError::TitleContainsNul
        );
    }

    #[test]
    fn validate_catches_mutated_record() {
        let mut task = Task::new("ok").unwrap();
        task.title = "   ".to_string();
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));
    }

    #[test]
    fn summary_counts_and_renders_header() {
        let mut first = Task::new("A").unwrap();
        first.done = true;
        let second = Task::new("B").unwrap();

        let summary = TaskSummary::from_tasks(&[first, second]);
        assert_eq!(summary.done_count, 1);
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.to_string(), "1 \\ 2");
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = TaskSummary::from_tasks(&[]);
        assert_eq!(summary, TaskSummary::default());
        assert_eq!(summary.to_string(), "0 \\ 0");
    }
}
