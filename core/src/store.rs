//! In-memory document store with live queries.
//!
//! Holds the three collections (`projects`, `tasks`, `messages`) in insertion
//! order. Tasks and messages are addressed by owning project, which plays the
//! role of the `by_project_id` secondary index.
//!
//! Every write publishes fresh snapshots to the live queries it can affect
//! while still holding the store lock, so publication order matches write
//! order and the write's effect is visible before the call returns.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::live_query::LiveQuery;
use crate::model::{ChatMessage, MessageId, Project, ProjectId, Task, TaskId, TaskStatus};
use crate::persistence::{PersistenceError, SnapshotFile};

/// Serialized form of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    schema_version: String,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

impl StoreSnapshot {
    const SCHEMA_VERSION: &'static str = "taskdeck_store@1.0";
}

/// Registered live-query senders, keyed by collection and project filter.
#[derive(Default)]
struct Listeners {
    projects: Option<watch::Sender<Vec<Project>>>,
    tasks: HashMap<ProjectId, watch::Sender<Vec<Task>>>,
    messages: HashMap<ProjectId, watch::Sender<Vec<ChatMessage>>>,
}

#[derive(Default)]
struct Inner {
    projects: Vec<Project>,
    tasks: Vec<Task>,
    messages: Vec<ChatMessage>,
    listeners: Listeners,
}

impl Inner {
    fn tasks_for(&self, project_id: &ProjectId) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| &t.project_id == project_id)
            .cloned()
            .collect()
    }

    fn messages_for(&self, project_id: &ProjectId) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| &m.project_id == project_id)
            .cloned()
            .collect()
    }

    fn has_project(&self, project_id: &ProjectId) -> bool {
        self.projects.iter().any(|p| &p.id == project_id)
    }

    fn publish_projects(&self) {
        if let Some(tx) = &self.listeners.projects {
            tx.send_replace(self.projects.clone());
        }
    }

    fn publish_tasks(&mut self, project_id: &ProjectId) {
        self.listeners.tasks.retain(|_, tx| tx.receiver_count() > 0);
        if let Some(tx) = self.listeners.tasks.get(project_id) {
            tx.send_replace(self.tasks_for(project_id));
        }
    }

    fn publish_messages(&mut self, project_id: &ProjectId) {
        self.listeners
            .messages
            .retain(|_, tx| tx.receiver_count() > 0);
        if let Some(tx) = self.listeners.messages.get(project_id) {
            tx.send_replace(self.messages_for(project_id));
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            schema_version: StoreSnapshot::SCHEMA_VERSION.to_string(),
            projects: self.projects.clone(),
            tasks: self.tasks.clone(),
            messages: self.messages.clone(),
        }
    }
}

/// Row counts, reported by service diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub projects: usize,
    pub tasks: usize,
    pub messages: usize,
}

/// The document store.
pub struct Store {
    inner: Mutex<Inner>,
    snapshot: Option<SnapshotFile>,
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            snapshot: None,
        }
    }

    /// Open a store backed by `snapshot`, loading any existing contents.
    pub fn open(snapshot: SnapshotFile) -> Result<Self, PersistenceError> {
        let mut inner = Inner::default();
        if let Some(saved) = snapshot.load::<StoreSnapshot>()? {
            if saved.schema_version != StoreSnapshot::SCHEMA_VERSION {
                return Err(PersistenceError::Schema {
                    found: saved.schema_version,
                    expected: StoreSnapshot::SCHEMA_VERSION.to_string(),
                });
            }
            inner.projects = saved.projects;
            inner.tasks = saved.tasks;
            inner.messages = saved.messages;
        }
        tracing::debug!(
            "Opened store at {} ({} projects, {} tasks, {} messages)",
            snapshot.path().display(),
            inner.projects.len(),
            inner.tasks.len(),
            inner.messages.len()
        );
        Ok(Self {
            inner: Mutex::new(inner),
            snapshot: Some(snapshot),
        })
    }

    /// Snapshot file location, if the store is persistent.
    pub fn snapshot_file(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist after a write (best-effort; failures are logged only).
    fn persist(&self, inner: &Inner) {
        let Some(file) = &self.snapshot else {
            return;
        };
        if let Err(e) = file.save(&inner.snapshot()) {
            tracing::warn!("Failed to write store snapshot {}: {e}", file.path().display());
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn list_projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        self.lock().projects.iter().find(|p| &p.id == id).cloned()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| &t.id == id).cloned()
    }

    pub fn tasks_for(&self, project_id: &ProjectId) -> Vec<Task> {
        self.lock().tasks_for(project_id)
    }

    pub fn messages_for(&self, project_id: &ProjectId) -> Vec<ChatMessage> {
        self.lock().messages_for(project_id)
    }

    pub fn counts(&self) -> StoreCounts {
        let inner = self.lock();
        StoreCounts {
            projects: inner.projects.len(),
            tasks: inner.tasks.len(),
            messages: inner.messages.len(),
        }
    }

    // ── Live queries ─────────────────────────────────────────────────────

    pub fn watch_projects(&self) -> LiveQuery<Project> {
        let mut inner = self.lock();
        let snapshot = inner.projects.clone();
        let tx = inner
            .listeners
            .projects
            .get_or_insert_with(|| watch::channel(snapshot).0);
        LiveQuery::new(tx.subscribe())
    }

    pub fn watch_tasks(&self, project_id: &ProjectId) -> LiveQuery<Task> {
        let mut inner = self.lock();
        let snapshot = inner.tasks_for(project_id);
        let tx = inner
            .listeners
            .tasks
            .entry(project_id.clone())
            .or_insert_with(|| watch::channel(snapshot).0);
        LiveQuery::new(tx.subscribe())
    }

    pub fn watch_messages(&self, project_id: &ProjectId) -> LiveQuery<ChatMessage> {
        let mut inner = self.lock();
        let snapshot = inner.messages_for(project_id);
        let tx = inner
            .listeners
            .messages
            .entry(project_id.clone())
            .or_insert_with(|| watch::channel(snapshot).0);
        LiveQuery::new(tx.subscribe())
    }

    // ── Writes ───────────────────────────────────────────────────────────

    pub fn insert_project(&self, project: Project) -> ProjectId {
        let mut inner = self.lock();
        let id = project.id.clone();
        inner.projects.push(project);
        inner.publish_projects();
        self.persist(&inner);
        id
    }

    /// Insert a task. Returns `None` if the owning project does not exist.
    pub fn insert_task(&self, task: Task) -> Option<TaskId> {
        let mut inner = self.lock();
        if !inner.has_project(&task.project_id) {
            return None;
        }
        let id = task.id.clone();
        let project_id = task.project_id.clone();
        inner.tasks.push(task);
        inner.publish_tasks(&project_id);
        self.persist(&inner);
        Some(id)
    }

    /// Append a message. Returns `None` if the owning project does not exist.
    pub fn insert_message(&self, message: ChatMessage) -> Option<MessageId> {
        let mut inner = self.lock();
        if !inner.has_project(&message.project_id) {
            return None;
        }
        let id = message.id.clone();
        let project_id = message.project_id.clone();
        inner.messages.push(message);
        inner.publish_messages(&project_id);
        self.persist(&inner);
        Some(id)
    }

    /// Patch the status field of one task. Returns whether the task existed.
    pub fn patch_task_status(&self, id: &TaskId, status: TaskStatus) -> bool {
        let mut inner = self.lock();
        let Some(task) = inner.tasks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        task.status = status;
        let project_id = task.project_id.clone();
        inner.publish_tasks(&project_id);
        self.persist(&inner);
        true
    }

    /// Delete a project row only. Owned rows are removed by the caller.
    pub fn delete_project(&self, id: &ProjectId) -> bool {
        let mut inner = self.lock();
        let before = inner.projects.len();
        inner.projects.retain(|p| &p.id != id);
        if inner.projects.len() == before {
            return false;
        }
        inner.publish_projects();
        self.persist(&inner);
        true
    }

    pub fn delete_task(&self, id: &TaskId) -> bool {
        let mut inner = self.lock();
        let Some(pos) = inner.tasks.iter().position(|t| &t.id == id) else {
            return false;
        };
        let task = inner.tasks.remove(pos);
        inner.publish_tasks(&task.project_id);
        self.persist(&inner);
        true
    }

    /// Delete every task owned by `project_id` in one write.
    pub fn delete_tasks_for(&self, project_id: &ProjectId) -> usize {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| &t.project_id != project_id);
        let removed = before - inner.tasks.len();
        if removed > 0 {
            inner.publish_tasks(project_id);
            self.persist(&inner);
        }
        removed
    }

    /// Delete every message owned by `project_id` in one write.
    pub fn delete_messages_for(&self, project_id: &ProjectId) -> usize {
        let mut inner = self.lock();
        let before = inner.messages.len();
        inner.messages.retain(|m| &m.project_id != project_id);
        let removed = before - inner.messages.len();
        if removed > 0 {
            inner.publish_messages(project_id);
            self.persist(&inner);
        }
        removed
    }
}
