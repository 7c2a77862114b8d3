//! Application controller: one per client session.
//!
//! Holds the session's view state (active project, dialog buffers,
//! pending delete, busy flags, notice) and turns user intents into domain
//! operations and assistant calls. The store's live queries stay the source
//! of truth for projects, tasks and messages; [`Controller::view`] derives
//! everything a client renders from them plus the session state.
//!
//! Busy flags are counters held by [`BusyGuard`]s, so a flag stays set while
//! any overlapping call is still in flight and is released on every exit
//! path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use taskdeck_assistant::{AssistantGateway, GatewayError, HistoryTurn, titles_or_empty};
use taskdeck_core::error::require_text;
use taskdeck_core::ops::RemovedProject;
use taskdeck_core::{
    ChatMessage, Domain, DomainError, MessageId, Project, ProjectId, Role, Task, TaskId,
    TaskProgress, TaskStatus,
};
use tokio::sync::watch;

/// Stored as the assistant's reply when a chat call fails.
pub const CHAT_FAILURE_TEXT: &str = "An error occurred while communicating with the assistant.";

/// Blocking notice shown when on-demand task generation fails.
pub const GENERATION_FAILURE_NOTICE: &str =
    "Error generating tasks. Make sure you have a valid API key.";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("no active project")]
    NoActiveProject,

    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("assistant error: {0}")]
    Gateway(#[from] GatewayError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Buffer behind the "new project" dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProjectForm {
    pub name: String,
    pub description: String,
}

/// Project awaiting delete confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelete {
    pub id: ProjectId,
    pub name: String,
}

/// Everything a client needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub projects: Vec<Project>,
    pub active_project_id: Option<ProjectId>,
    pub active_project: Option<Project>,
    pub tasks: Vec<Task>,
    pub messages: Vec<ChatMessage>,
    pub progress: TaskProgress,
    pub is_generating_tasks: bool,
    pub is_chat_loading: bool,
    /// `Some` while the new-project dialog is open.
    pub new_project: Option<NewProjectForm>,
    pub task_draft: String,
    pub pending_delete: Option<PendingDelete>,
    pub notice: Option<String>,
    /// A credential is configured. `false` renders the missing-key indicator.
    pub assistant_ready: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    new_project: Option<NewProjectForm>,
    task_draft: String,
    pending_delete: Option<ProjectId>,
    notice: Option<String>,
}

/// Holds a busy counter up for the guard's lifetime.
struct BusyGuard<'a> {
    count: &'a AtomicUsize,
    revision: &'a watch::Sender<u64>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(count: &'a AtomicUsize, revision: &'a watch::Sender<u64>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        revision.send_modify(|r| *r += 1);
        Self { count, revision }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.revision.send_modify(|r| *r += 1);
    }
}

pub struct Controller {
    domain: Domain,
    gateway: Arc<dyn AssistantGateway>,
    state: Mutex<SessionState>,
    active: watch::Sender<Option<ProjectId>>,
    /// Serializes read-then-write changes to `active`.
    selection: Mutex<()>,
    /// Bumped whenever session state that is not in the store changes.
    revision: watch::Sender<u64>,
    generating: AtomicUsize,
    chat_loading: AtomicUsize,
}

impl Controller {
    pub fn new(domain: Domain, gateway: Arc<dyn AssistantGateway>) -> Self {
        Self {
            domain,
            gateway,
            state: Mutex::new(SessionState::default()),
            active: watch::channel(None).0,
            selection: Mutex::new(()),
            revision: watch::channel(0).0,
            generating: AtomicUsize::new(0),
            chat_loading: AtomicUsize::new(0),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn assistant_ready(&self) -> bool {
        self.gateway.has_credential()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_selection(&self) -> MutexGuard<'_, ()> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let out = f(&mut self.lock());
        self.revision.send_modify(|r| *r += 1);
        out
    }

    // ── Selection ────────────────────────────────────────────────────────

    pub fn active_project_id(&self) -> Option<ProjectId> {
        self.active.borrow().clone()
    }

    /// Observe changes to the active selection.
    pub fn watch_active(&self) -> watch::Receiver<Option<ProjectId>> {
        self.active.subscribe()
    }

    /// Observe changes to session-only state (dialogs, flags, notice).
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn set_active(&self, id: Option<ProjectId>) {
        self.active.send_if_modified(|current| {
            if *current == id {
                return false;
            }
            *current = id;
            true
        });
    }

    fn active_project(&self) -> ControllerResult<Project> {
        self.active_project_id()
            .and_then(|id| self.domain.project(&id))
            .ok_or(ControllerError::NoActiveProject)
    }

    /// Make `id` the active project, or clear the selection with `None`.
    pub fn select_project(&self, id: Option<ProjectId>) -> ControllerResult<()> {
        let _selection = self.lock_selection();
        if let Some(id) = &id
            && self.domain.project(id).is_none()
        {
            return Err(ControllerError::ProjectNotFound(id.clone()));
        }
        self.set_active(id);
        Ok(())
    }

    /// Auto-select the first project when nothing (or a vanished project) is
    /// active. Returns the newly selected id, if any.
    ///
    /// Called on every project-list push; a no-op while a live project is
    /// selected.
    pub fn sync_selection(&self) -> Option<ProjectId> {
        let _selection = self.lock_selection();
        let projects = self.domain.list_projects();
        if let Some(current) = self.active_project_id() {
            if projects.iter().any(|p| p.id == current) {
                return None;
            }
            tracing::debug!("Active project {current} no longer exists");
        }
        let first = projects.into_iter().next().map(|p| p.id);
        self.set_active(first.clone());
        first
    }

    // ── New project dialog ───────────────────────────────────────────────

    pub fn open_new_project(&self) {
        self.update(|s| {
            s.new_project.get_or_insert_with(NewProjectForm::default);
        });
    }

    /// Edit the dialog buffer; `None` leaves a field untouched.
    pub fn edit_new_project(&self, name: Option<String>, description: Option<String>) {
        self.update(|s| {
            let form = s.new_project.get_or_insert_with(NewProjectForm::default);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(description) = description {
                form.description = description;
            }
        });
    }

    pub fn cancel_new_project(&self) {
        self.update(|s| s.new_project = None);
    }

    /// Create a project from the dialog buffer.
    pub async fn submit_new_project(&self) -> ControllerResult<ProjectId> {
        let form = self.lock().new_project.clone().unwrap_or_default();
        self.create_project(&form.name, &form.description).await
    }

    /// Create a project, select it and close the dialog. A non-blank
    /// description seeds the project with generated tasks; generation
    /// failures only mean no tasks are added.
    pub async fn create_project(&self, name: &str, description: &str) -> ControllerResult<ProjectId> {
        let id = self.domain.create_project(name, description)?;
        {
            let _selection = self.lock_selection();
            self.set_active(Some(id.clone()));
        }
        self.update(|s| s.new_project = None);

        if description.trim().is_empty() {
            return Ok(id);
        }

        let _busy = BusyGuard::acquire(&self.generating, &self.revision);
        let titles = titles_or_empty(self.gateway.generate_project_tasks(name, description).await);
        self.insert_generated(&id, titles);
        Ok(id)
    }

    /// Insert generated titles one by one, stopping at the first failure.
    fn insert_generated(&self, project_id: &ProjectId, titles: Vec<String>) -> usize {
        let mut inserted = 0;
        for title in titles {
            match self
                .domain
                .create_task(project_id, &title, Some(TaskStatus::Todo))
            {
                Ok(_) => inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        "Stopped inserting generated tasks for {project_id} after {inserted}: {e}"
                    );
                    break;
                }
            }
        }
        inserted
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    pub fn edit_task_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|s| s.task_draft = text);
    }

    /// Add the drafted task and clear the draft.
    pub fn submit_task_draft(&self) -> ControllerResult<TaskId> {
        let draft = self.lock().task_draft.clone();
        let id = self.add_task(&draft)?;
        self.update(|s| s.task_draft.clear());
        Ok(id)
    }

    /// Add a TODO task to the active project.
    pub fn add_task(&self, title: &str) -> ControllerResult<TaskId> {
        require_text("title", title)?;
        let project_id = self
            .active_project_id()
            .ok_or(ControllerError::NoActiveProject)?;
        Ok(self
            .domain
            .create_task(&project_id, title, Some(TaskStatus::Todo))?)
    }

    /// Move a task one step along TODO → IN_PROGRESS → DONE → TODO.
    pub fn advance_task_status(&self, id: &TaskId) -> ControllerResult<TaskStatus> {
        let task = self
            .domain
            .task(id)
            .ok_or_else(|| ControllerError::TaskNotFound(id.clone()))?;
        let next = task.status.next();
        self.domain.update_task_status(id, next);
        Ok(next)
    }

    pub fn delete_task(&self, id: &TaskId) {
        self.domain.remove_task(id);
    }

    // ── Project delete ───────────────────────────────────────────────────

    /// Ask for confirmation before deleting `id`. Nothing is deleted yet.
    pub fn request_delete(&self, id: ProjectId) {
        self.update(|s| s.pending_delete = Some(id));
    }

    pub fn cancel_delete(&self) {
        self.update(|s| s.pending_delete = None);
    }

    /// Delete the pending project with its tasks and messages, returning
    /// the view as it stands right after the delete.
    ///
    /// Deleting the active project clears the selection. Reselection waits
    /// for the next [`sync_selection`](Self::sync_selection), which cannot
    /// run until the returned view has been built.
    pub fn confirm_delete(&self) -> (Option<RemovedProject>, ViewState) {
        let _selection = self.lock_selection();
        let Some(id) = self.update(|s| s.pending_delete.take()) else {
            return (None, self.view());
        };
        if self.active_project_id().as_ref() == Some(&id) {
            self.set_active(None);
        }
        let removed = self.domain.remove_project(&id);
        (Some(removed), self.view())
    }

    // ── Assistant ────────────────────────────────────────────────────────

    /// Generate tasks for the active project on demand.
    ///
    /// Failures set the blocking notice and are returned to the caller.
    pub async fn generate_tasks(&self) -> ControllerResult<usize> {
        let project = self.active_project()?;
        let _busy = BusyGuard::acquire(&self.generating, &self.revision);

        match self
            .gateway
            .generate_project_tasks(&project.name, &project.description)
            .await
        {
            Ok(titles) => Ok(self.insert_generated(&project.id, titles)),
            Err(e) => {
                tracing::warn!("Task generation for {} failed: {e}", project.id);
                self.update(|s| s.notice = Some(GENERATION_FAILURE_NOTICE.to_string()));
                Err(e.into())
            }
        }
    }

    /// Store the user's message, ask the assistant and store its reply.
    ///
    /// Blank text is ignored (`Ok(None)`). A failed assistant call is stored
    /// as an error-flagged model message.
    pub async fn send_chat_message(&self, text: &str) -> ControllerResult<Option<MessageId>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let project = self.active_project()?;

        let history: Vec<HistoryTurn> = self
            .domain
            .list_messages(Some(&project.id))
            .iter()
            .map(HistoryTurn::from)
            .collect();
        self.domain
            .send_message(&project.id, Role::User, text, false)?;

        let _busy = BusyGuard::acquire(&self.chat_loading, &self.revision);
        let tasks = self.domain.list_tasks(Some(&project.id));
        let reply = self
            .gateway
            .chat_with_project(&history, text, &project, &tasks)
            .await;

        let id = match reply {
            Ok(reply) => self
                .domain
                .send_message(&project.id, Role::Model, &reply, false)?,
            Err(e) => {
                tracing::warn!("Chat for {} failed: {e}", project.id);
                self.domain
                    .send_message(&project.id, Role::Model, CHAT_FAILURE_TEXT, true)?
            }
        };
        Ok(Some(id))
    }

    pub fn dismiss_notice(&self) {
        self.update(|s| s.notice = None);
    }

    // ── View ─────────────────────────────────────────────────────────────

    pub fn is_generating_tasks(&self) -> bool {
        self.generating.load(Ordering::SeqCst) > 0
    }

    pub fn is_chat_loading(&self) -> bool {
        self.chat_loading.load(Ordering::SeqCst) > 0
    }

    pub fn view(&self) -> ViewState {
        let projects = self.domain.list_projects();
        let active_project_id = self.active_project_id();
        let active_project = active_project_id
            .as_ref()
            .and_then(|id| projects.iter().find(|p| &p.id == id).cloned());
        let tasks = self.domain.list_tasks(active_project_id.as_ref());
        let messages = self.domain.list_messages(active_project_id.as_ref());

        let state = self.lock();
        let pending_delete = state.pending_delete.as_ref().and_then(|id| {
            projects.iter().find(|p| &p.id == id).map(|p| PendingDelete {
                id: p.id.clone(),
                name: p.name.clone(),
            })
        });

        ViewState {
            progress: TaskProgress::of(&tasks),
            active_project_id,
            active_project,
            tasks,
            messages,
            is_generating_tasks: self.is_generating_tasks(),
            is_chat_loading: self.is_chat_loading(),
            new_project: state.new_project.clone(),
            task_draft: state.task_draft.clone(),
            pending_delete,
            notice: state.notice.clone(),
            assistant_ready: self.assistant_ready(),
            projects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use taskdeck_assistant::GatewayResult;
    use taskdeck_core::Store;
    use tokio::sync::Notify;

    /// Scripted gateway recording what it was asked.
    #[derive(Default)]
    struct FakeGateway {
        titles: Mutex<Option<Vec<String>>>,
        reply: Mutex<Option<String>>,
        generate_calls: Mutex<Vec<(String, String)>>,
        chat_calls: Mutex<Vec<(Vec<HistoryTurn>, String, usize)>>,
        /// When set, chat waits for a signal before answering.
        hold_chat: Option<Arc<Notify>>,
    }

    impl FakeGateway {
        fn with_titles(titles: &[&str]) -> Self {
            Self {
                titles: Mutex::new(Some(titles.iter().map(|t| (*t).to_string()).collect())),
                ..Self::default()
            }
        }

        fn with_reply(reply: &str) -> Self {
            Self {
                reply: Mutex::new(Some(reply.to_string())),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AssistantGateway for FakeGateway {
        fn has_credential(&self) -> bool {
            true
        }

        async fn generate_project_tasks(
            &self,
            name: &str,
            description: &str,
        ) -> GatewayResult<Vec<String>> {
            self.generate_calls
                .lock()
                .unwrap()
                .push((name.to_string(), description.to_string()));
            self.titles
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| GatewayError::Parse("scripted failure".to_string()))
        }

        async fn chat_with_project(
            &self,
            history: &[HistoryTurn],
            message: &str,
            _project: &Project,
            tasks: &[Task],
        ) -> GatewayResult<String> {
            self.chat_calls
                .lock()
                .unwrap()
                .push((history.to_vec(), message.to_string(), tasks.len()));
            if let Some(hold) = &self.hold_chat {
                hold.notified().await;
            }
            self.reply
                .lock()
                .unwrap()
                .clone()
                .ok_or(GatewayError::MissingCredential)
        }
    }

    fn controller(gateway: FakeGateway) -> (Controller, Arc<FakeGateway>) {
        let gateway = Arc::new(gateway);
        let domain = Domain::new(Arc::new(Store::in_memory()));
        let controller = Controller::new(domain, Arc::clone(&gateway) as Arc<dyn AssistantGateway>);
        (controller, gateway)
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        let mut titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        titles.sort_unstable();
        titles
    }

    #[tokio::test]
    async fn create_project_with_description_seeds_generated_tasks() {
        let (controller, gateway) =
            controller(FakeGateway::with_titles(&["Write press release", "Book venue"]));

        let id = controller
            .create_project("Launch", "Plan a product launch")
            .await
            .unwrap();

        let view = controller.view();
        assert_eq!(view.active_project_id, Some(id.clone()));
        assert_eq!(titles(&view.tasks), vec!["Book venue", "Write press release"]);
        assert!(view.tasks.iter().all(|t| t.status == TaskStatus::Todo));
        assert!(view.tasks.iter().all(|t| t.project_id == id));
        assert!(!view.is_generating_tasks);
        assert_eq!(
            *gateway.generate_calls.lock().unwrap(),
            vec![("Launch".to_string(), "Plan a product launch".to_string())]
        );
    }

    #[tokio::test]
    async fn whitespace_description_skips_generation() {
        let (controller, gateway) = controller(FakeGateway::with_titles(&["never"]));
        controller.create_project("Launch", "   \n").await.unwrap();

        assert!(gateway.generate_calls.lock().unwrap().is_empty());
        assert!(controller.view().tasks.is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_any_write() {
        let (controller, gateway) = controller(FakeGateway::with_titles(&["never"]));
        controller.open_new_project();
        controller.edit_new_project(Some("  ".to_string()), Some("desc".to_string()));

        let err = controller.submit_new_project().await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Domain(DomainError::Validation { field: "name" })
        ));

        let view = controller.view();
        assert!(view.projects.is_empty());
        assert!(view.new_project.is_some(), "dialog stays open");
        assert!(gateway.generate_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_during_create_is_swallowed() {
        let (controller, _gateway) = controller(FakeGateway::default());
        controller.open_new_project();
        controller.edit_new_project(Some("Launch".to_string()), Some("desc".to_string()));

        let id = controller.submit_new_project().await.unwrap();

        let view = controller.view();
        assert_eq!(view.active_project_id, Some(id));
        assert!(view.tasks.is_empty());
        assert_eq!(view.new_project, None);
        assert_eq!(view.notice, None);
        assert!(!view.is_generating_tasks);
    }

    #[tokio::test]
    async fn on_demand_generation_failure_sets_notice() {
        let (controller, _gateway) = controller(FakeGateway::default());
        controller.create_project("Launch", "").await.unwrap();

        let err = controller.generate_tasks().await.unwrap_err();
        assert!(matches!(err, ControllerError::Gateway(_)));

        let view = controller.view();
        assert_eq!(view.notice.as_deref(), Some(GENERATION_FAILURE_NOTICE));
        assert!(!view.is_generating_tasks);

        controller.dismiss_notice();
        assert_eq!(controller.view().notice, None);
    }

    #[tokio::test]
    async fn generation_requires_an_active_project() {
        let (controller, gateway) = controller(FakeGateway::with_titles(&["x"]));
        assert!(matches!(
            controller.generate_tasks().await,
            Err(ControllerError::NoActiveProject)
        ));
        assert!(gateway.generate_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_generation_is_not_deduplicated() {
        let (controller, _gateway) = controller(FakeGateway::with_titles(&["Book venue"]));
        controller.create_project("Launch", "").await.unwrap();

        assert_eq!(controller.generate_tasks().await.unwrap(), 1);
        assert_eq!(controller.generate_tasks().await.unwrap(), 1);
        assert_eq!(controller.view().tasks.len(), 2);
    }

    #[tokio::test]
    async fn chat_failure_stores_error_reply_after_user_message() {
        let (controller, _gateway) = controller(FakeGateway::default());
        controller.create_project("Launch", "").await.unwrap();

        controller
            .send_chat_message("What's our status?")
            .await
            .unwrap();

        let messages = controller.view().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "What's our status?");
        assert!(!messages[0].is_error);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].text, CHAT_FAILURE_TEXT);
        assert!(messages[1].is_error);
        assert!(!controller.is_chat_loading());
    }

    #[tokio::test]
    async fn chat_history_excludes_the_message_being_sent() {
        let (controller, gateway) = controller(FakeGateway::with_reply("All good."));
        controller.create_project("Launch", "").await.unwrap();
        controller.add_task("Book venue").unwrap();

        controller.send_chat_message("First").await.unwrap();
        controller.send_chat_message("Second").await.unwrap();

        let calls = gateway.chat_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.is_empty());
        assert_eq!(calls[0].2, 1);
        assert_eq!(
            calls[1].0,
            vec![
                HistoryTurn {
                    role: Role::User,
                    text: "First".to_string()
                },
                HistoryTurn {
                    role: Role::Model,
                    text: "All good.".to_string()
                },
            ]
        );
        assert_eq!(calls[1].1, "Second");
    }

    #[tokio::test]
    async fn blank_chat_text_is_ignored() {
        let (controller, gateway) = controller(FakeGateway::with_reply("hi"));
        controller.create_project("Launch", "").await.unwrap();

        assert_eq!(controller.send_chat_message("   ").await.unwrap(), None);
        assert!(controller.view().messages.is_empty());
        assert!(gateway.chat_calls.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn chat_loading_flag_is_held_while_waiting_for_reply() {
        let hold = Arc::new(Notify::new());
        let gateway = FakeGateway {
            hold_chat: Some(Arc::clone(&hold)),
            ..FakeGateway::with_reply("done")
        };
        let (controller, _gateway) = controller(gateway);
        let controller = Arc::new(controller);
        controller.create_project("Launch", "").await.unwrap();

        let task = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.send_chat_message("ping").await }
        });

        let mut revision = controller.watch_revision();
        while !controller.is_chat_loading() {
            revision.changed().await.unwrap();
        }
        let view = controller.view();
        assert!(view.is_chat_loading);
        assert_eq!(view.messages.len(), 1, "user message is stored first");

        hold.notify_one();
        task.await.unwrap().unwrap();
        assert!(!controller.is_chat_loading());
        assert_eq!(controller.view().messages.len(), 2);
    }

    #[tokio::test]
    async fn delete_then_cancel_leaves_everything_intact() {
        let (controller, _gateway) = controller(FakeGateway::default());
        let id = controller.create_project("X", "").await.unwrap();
        controller.add_task("keep me").unwrap();
        let projects = controller.domain().watch_projects();

        controller.request_delete(id.clone());
        assert_eq!(
            controller.view().pending_delete,
            Some(PendingDelete {
                id: id.clone(),
                name: "X".to_string()
            })
        );
        controller.cancel_delete();

        let view = controller.view();
        assert_eq!(view.pending_delete, None);
        assert_eq!(view.projects.len(), 1);
        assert_eq!(view.tasks.len(), 1);
        assert!(!projects.has_changed(), "no store mutation");
    }

    #[tokio::test]
    async fn confirm_delete_of_active_project_clears_selection() {
        let (controller, _gateway) = controller(FakeGateway::default());
        controller.create_project("Other", "").await.unwrap();
        let doomed = controller.create_project("X", "").await.unwrap();
        controller.add_task("gone").unwrap();
        assert_eq!(controller.active_project_id(), Some(doomed.clone()));

        controller.request_delete(doomed.clone());
        let (removed, view) = controller.confirm_delete();
        let removed = removed.unwrap();

        assert!(removed.project);
        assert_eq!(removed.tasks, 1);
        assert_eq!(view.active_project_id, None);
        assert!(view.tasks.is_empty());
        assert_eq!(controller.active_project_id(), None);
        assert!(controller.domain().list_tasks(Some(&doomed)).is_empty());
        assert_eq!(controller.view().pending_delete, None);

        // The next project-list push reselects.
        assert!(controller.sync_selection().is_some());
        assert_eq!(controller.view().active_project.unwrap().name, "Other");
    }

    #[tokio::test]
    async fn confirm_without_pending_delete_is_noop() {
        let (controller, _gateway) = controller(FakeGateway::default());
        controller.create_project("X", "").await.unwrap();
        let (removed, view) = controller.confirm_delete();
        assert_eq!(removed, None);
        assert_eq!(view.projects.len(), 1);
    }

    #[tokio::test]
    async fn sync_selection_picks_first_project_only_when_unselected() {
        let (controller, _gateway) = controller(FakeGateway::default());
        assert_eq!(controller.sync_selection(), None);

        let first = controller.domain().create_project("First", "").unwrap();
        let second = controller.domain().create_project("Second", "").unwrap();
        assert_eq!(controller.sync_selection(), Some(first));

        controller.select_project(Some(second.clone())).unwrap();
        assert_eq!(controller.sync_selection(), None);
        assert_eq!(controller.active_project_id(), Some(second));
    }

    #[tokio::test]
    async fn selecting_unknown_project_fails() {
        let (controller, _gateway) = controller(FakeGateway::default());
        let ghost = ProjectId::new();
        assert!(matches!(
            controller.select_project(Some(ghost)),
            Err(ControllerError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn task_draft_flow_and_status_cycle() {
        let (controller, _gateway) = controller(FakeGateway::default());

        controller.edit_task_draft("Book venue");
        assert!(matches!(
            controller.submit_task_draft(),
            Err(ControllerError::NoActiveProject)
        ));

        controller.create_project("Launch", "").await.unwrap();
        let id = controller.submit_task_draft().unwrap();
        assert_eq!(controller.view().task_draft, "");

        controller.edit_task_draft("  ");
        assert!(matches!(
            controller.submit_task_draft(),
            Err(ControllerError::Domain(DomainError::Validation { field: "title" }))
        ));

        let statuses: Vec<TaskStatus> = (0..3)
            .map(|_| controller.advance_task_status(&id).unwrap())
            .collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Todo]
        );

        controller.advance_task_status(&id).unwrap();
        controller.advance_task_status(&id).unwrap();
        assert_eq!(
            controller.view().progress,
            TaskProgress { done: 1, total: 1 }
        );

        controller.delete_task(&id);
        assert!(matches!(
            controller.advance_task_status(&id),
            Err(ControllerError::TaskNotFound(_))
        ));
    }
}
