use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;
use crate::models::validate_bounded_text;

pub const TASK_NAME_MAX_LEN: usize = 100;

/// A task shares its primary key with the owning event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub due_at: DateTime<Utc>,
    pub content: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const TASK_COLUMNS: &str =
    "t.id, t.name, t.due_at, t.content, t.is_completed, t.completed_at, t.created_at, t.updated_at";

/// Completion state of a task: `Incomplete` <-> `Completed(at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletion {
    Incomplete,
    Completed(DateTime<Utc>),
}

impl TaskCompletion {
    pub fn of(task: &Task) -> Self {
        match (task.is_completed, task.completed_at) {
            (true, Some(at)) => TaskCompletion::Completed(at),
            _ => TaskCompletion::Incomplete,
        }
    }

    /// Moves to the requested state. Re-marking a completed task keeps its
    /// original timestamp.
    pub fn apply(self, is_completed: bool, now: DateTime<Utc>) -> Self {
        match (self, is_completed) {
            (TaskCompletion::Completed(at), true) => TaskCompletion::Completed(at),
            (_, true) => TaskCompletion::Completed(now),
            (_, false) => TaskCompletion::Incomplete,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskCompletion::Completed(_))
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskCompletion::Completed(at) => Some(*at),
            TaskCompletion::Incomplete => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_bounded_text("name", &self.name, TASK_NAME_MAX_LEN)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_bounded_text("name", name, TASK_NAME_MAX_LEN)?;
        }
        Ok(())
    }

    /// Merges the present fields into `task`, stamping `updated_at`.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            task.name = name.trim().to_string();
        }
        if let Some(due_at) = self.due_at {
            task.due_at = due_at;
        }
        if let Some(content) = &self.content {
            task.content = content.clone();
        }
        if let Some(is_completed) = self.is_completed {
            let state = TaskCompletion::of(task).apply(is_completed, now);
            task.is_completed = state.is_completed();
            task.completed_at = state.completed_at();
        }
        task.updated_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub is_completed: bool,
}

/// An event holds at most one task; a second attempt is rejected.
pub fn ensure_no_task(existing: Option<i32>) -> Result<(), ApiError> {
    match existing {
        Some(_) => Err(ApiError::TaskAlreadyExists),
        None => Ok(()),
    }
}
