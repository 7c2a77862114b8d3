//! Domain operations layer.
//!
//! The only place with referential rules: required-text validation, owning
//! project checks and the cascading project delete. Each operation is atomic
//! from the caller's perspective; multi-row operations (the cascade) are a
//! sequence of independent writes with no compensation if interrupted.
//!
//! | Entity  | Operations |
//! |---------|------------|
//! | project | `list_projects`, `create_project`, `remove_project` (cascades) |
//! | task    | `list_tasks`, `create_task`, `update_task_status`, `remove_task` |
//! | message | `list_messages`, `send_message` |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult, require_text};
use crate::live_query::LiveQuery;
use crate::model::{
    ChatMessage, MessageId, Project, ProjectId, Role, Task, TaskId, TaskStatus,
};
use crate::store::Store;

/// Summary of a cascading project delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedProject {
    pub project: bool,
    pub tasks: usize,
    pub messages: usize,
}

/// Domain operations over a shared [`Store`].
#[derive(Clone)]
pub struct Domain {
    store: Arc<Store>,
}

impl Domain {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ── project ──────────────────────────────────────────────────────────

    /// All projects in insertion order.
    pub fn list_projects(&self) -> Vec<Project> {
        self.store.list_projects()
    }

    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        self.store.project(id)
    }

    pub fn watch_projects(&self) -> LiveQuery<Project> {
        self.store.watch_projects()
    }

    pub fn create_project(&self, name: &str, description: &str) -> DomainResult<ProjectId> {
        require_text("name", name)?;
        let id = self.store.insert_project(Project::new(name, description));
        tracing::debug!("Created project {id}");
        Ok(id)
    }

    /// Delete a project, then its tasks, then its messages.
    ///
    /// Removing an unknown project is a no-op.
    pub fn remove_project(&self, id: &ProjectId) -> RemovedProject {
        let removed = RemovedProject {
            project: self.store.delete_project(id),
            tasks: self.store.delete_tasks_for(id),
            messages: self.store.delete_messages_for(id),
        };

        tracing::debug!(
            "Removed project {id} (found={}, tasks={}, messages={})",
            removed.project,
            removed.tasks,
            removed.messages
        );
        removed
    }

    // ── task ─────────────────────────────────────────────────────────────

    /// Tasks for a project; empty when no project is given.
    pub fn list_tasks(&self, project_id: Option<&ProjectId>) -> Vec<Task> {
        match project_id {
            Some(id) => self.store.tasks_for(id),
            None => Vec::new(),
        }
    }

    /// Live tasks for a project; inert when no project is given.
    pub fn watch_tasks(&self, project_id: Option<&ProjectId>) -> LiveQuery<Task> {
        match project_id {
            Some(id) => self.store.watch_tasks(id),
            None => LiveQuery::inert(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.store.task(id)
    }

    pub fn create_task(
        &self,
        project_id: &ProjectId,
        title: &str,
        status: Option<TaskStatus>,
    ) -> DomainResult<TaskId> {
        require_text("title", title)?;
        let task = Task::new(project_id.clone(), title, status.unwrap_or_default());
        self.store
            .insert_task(task)
            .ok_or_else(|| DomainError::ProjectNotFound(project_id.clone()))
    }

    /// Patch one task's status. Unknown ids are ignored.
    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) {
        if !self.store.patch_task_status(id, status) {
            tracing::debug!("update_task_status: no task {id}");
        }
    }

    /// Delete one task. Unknown ids are ignored.
    pub fn remove_task(&self, id: &TaskId) {
        if !self.store.delete_task(id) {
            tracing::debug!("remove_task: no task {id}");
        }
    }

    // ── message ──────────────────────────────────────────────────────────

    /// Messages for a project in creation order; empty when no project is given.
    pub fn list_messages(&self, project_id: Option<&ProjectId>) -> Vec<ChatMessage> {
        match project_id {
            Some(id) => self.store.messages_for(id),
            None => Vec::new(),
        }
    }

    /// Live messages for a project; inert when no project is given.
    pub fn watch_messages(&self, project_id: Option<&ProjectId>) -> LiveQuery<ChatMessage> {
        match project_id {
            Some(id) => self.store.watch_messages(id),
            None => LiveQuery::inert(),
        }
    }

    /// Append a message to a project's conversation.
    pub fn send_message(
        &self,
        project_id: &ProjectId,
        role: Role,
        text: &str,
        is_error: bool,
    ) -> DomainResult<MessageId> {
        self.store
            .insert_message(ChatMessage::new(project_id.clone(), role, text, is_error))
            .ok_or_else(|| DomainError::ProjectNotFound(project_id.clone()))
    }
}
