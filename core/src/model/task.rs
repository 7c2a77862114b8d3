use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProjectId, document_id};

document_id!(
    /// Identity of a [`Task`].
    TaskId
);

/// Three-state task lifecycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Single-step advance: TODO → IN_PROGRESS → DONE → TODO.
    pub fn next(self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }

    /// Human label used when describing tasks to the assistant.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "to do",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
        }
    }
}

/// A unit of work under a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub creation_time: DateTime<Utc>,
    /// Owning project (immutable).
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(project_id: ProjectId, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: TaskId::new(),
            creation_time: Utc::now(),
            project_id,
            title: title.into(),
            status,
        }
    }
}

/// Completion counter shown above a task board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub done: usize,
    pub total: usize,
}

impl TaskProgress {
    pub fn of(tasks: &[Task]) -> Self {
        Self {
            done: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
            total: tasks.len(),
        }
    }
}
