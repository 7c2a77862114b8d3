//! Unix domain socket IPC listener.
//!
//! Each connection is one session: it owns a [`Controller`], dispatches
//! every request on its own task (so a slow assistant call never blocks the
//! connection), and funnels responses and `view.updated` pushes through a
//! single writer task.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskdeck_assistant::GatewayError;
use taskdeck_core::{DomainError, ProjectId, TaskId};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};

use crate::PROTOCOL_VERSION;
use crate::context::ServiceContext;
use crate::controller::{Controller, ControllerError};
use crate::protocol::*;

type RpcResult = Result<Value, (i64, String)>;

/// Longest request line accepted; a longer one ends the session.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

/// Every method `dispatch_method` understands, advertised by `hello`.
pub const METHODS: &[&str] = &[
    "project.list",
    "project.create",
    "project.remove",
    "task.list",
    "task.create",
    "task.update_status",
    "task.remove",
    "message.list",
    "message.send",
    "ui.view",
    "ui.select_project",
    "ui.open_new_project",
    "ui.edit_new_project",
    "ui.cancel_new_project",
    "ui.submit_new_project",
    "ui.edit_task_draft",
    "ui.submit_task_draft",
    "ui.advance_task",
    "ui.delete_task",
    "ui.request_delete",
    "ui.confirm_delete",
    "ui.cancel_delete",
    "ui.generate_tasks",
    "ui.send_chat",
    "ui.dismiss_notice",
    "service.status",
    "service.doctor",
];

/// Bind the listening socket, replacing a stale socket file.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(path)?;
    tracing::info!("taskdeck service listening on {}", path.display());
    Ok(listener)
}

/// Accept connections until `shutdown` flips to `true`.
pub async fn serve(
    ctx: Arc<ServiceContext>,
    listener: UnixListener,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(ctx, stream).await {
                            tracing::warn!("Connection error: {e}");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {e}");
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Handle a single client connection.
async fn handle_connection(ctx: Arc<ServiceContext>, stream: UnixStream) -> std::io::Result<()> {
    let sessions = ctx.inc_sessions();
    tracing::debug!("Session opened ({sessions} active)");

    let controller = Arc::new(ctx.new_controller());
    let (reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let mut bytes = serde_json::to_vec(&message).unwrap_or_else(|_| b"{}".to_vec());
            bytes.push(b'\n');
            if let Err(e) = writer.write_all(&bytes).await {
                tracing::debug!("Client went away: {e}");
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let pump = tokio::spawn(run_view_pump(Arc::clone(&controller), out_tx.clone()));
    let result = read_requests(&ctx, &controller, reader, &out_tx).await;

    pump.abort();
    let sessions = ctx.dec_sessions();
    tracing::debug!("Session closed ({sessions} active)");
    result
}

/// Read newline-delimited requests and dispatch each on its own task.
async fn read_requests(
    ctx: &Arc<ServiceContext>,
    controller: &Arc<Controller>,
    reader: tokio::net::unix::OwnedReadHalf,
    out: &mpsc::UnboundedSender<Value>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_REQUEST_BYTES as u64)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            break; // EOF
        }
        if n == MAX_REQUEST_BYTES && !line.ends_with('\n') {
            tracing::warn!("Request exceeds {MAX_REQUEST_BYTES} bytes; closing session");
            let _ = out.send(
                serde_json::to_value(JSONRPCError {
                    id: RequestId::Integer(0),
                    error: JSONRPCErrorError {
                        code: ERR_INVALID_REQUEST,
                        message: format!("Request exceeds {MAX_REQUEST_BYTES} bytes"),
                        data: None,
                    },
                })
                .unwrap_or_default(),
            );
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let raw = trimmed.to_string();
        let ctx = Arc::clone(ctx);
        let controller = Arc::clone(controller);
        let out = out.clone();
        tokio::spawn(async move {
            let response = dispatch_message(&ctx, &controller, &raw).await;
            let _ = out.send(response);
        });
    }

    Ok(())
}

/// Push a fresh view whenever the projects list, the active project's tasks
/// or messages, the selection, or session state changes.
///
/// Tasks and messages are only watched while a project is selected.
async fn run_view_pump(controller: Arc<Controller>, out: mpsc::UnboundedSender<Value>) {
    let domain = controller.domain().clone();
    let mut projects = domain.watch_projects();
    let mut active = controller.watch_active();
    let mut revision = controller.watch_revision();

    loop {
        controller.sync_selection();
        let selected = active.borrow_and_update().clone();
        let mut tasks = domain.watch_tasks(selected.as_ref());
        let mut messages = domain.watch_messages(selected.as_ref());
        let mut tasks_live = selected.is_some();
        let mut messages_live = selected.is_some();

        loop {
            let view = match serde_json::to_value(controller.view()) {
                Ok(view) => view,
                Err(e) => {
                    tracing::warn!("Failed to serialize view: {e}");
                    return;
                }
            };
            if out.send(encode_notification(NOTIFY_VIEW_UPDATED, view)).is_err() {
                return;
            }

            tokio::select! {
                alive = projects.changed() => {
                    if !alive {
                        return;
                    }
                    controller.sync_selection();
                }
                changed = active.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                alive = tasks.changed(), if tasks_live => tasks_live = alive,
                alive = messages.changed(), if messages_live => messages_live = alive,
                changed = revision.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Build a notification (no id, no response expected).
pub fn encode_notification(method: &str, params: Value) -> Value {
    serde_json::to_value(JSONRPCNotification {
        method: method.to_string(),
        params: Some(params),
    })
    .unwrap_or_default()
}

/// Parse and dispatch a single JSON-RPC message.
async fn dispatch_message(ctx: &ServiceContext, controller: &Controller, raw: &str) -> Value {
    let request: JSONRPCRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => {
            return serde_json::to_value(JSONRPCError {
                id: RequestId::Integer(0),
                error: JSONRPCErrorError {
                    code: ERR_INVALID_REQUEST,
                    message: format!("Invalid JSON-RPC: {e}"),
                    data: None,
                },
            })
            .unwrap_or_default();
        }
    };

    let id = request.id.clone();
    let result = dispatch_method(ctx, controller, &request.method, request.params).await;

    match result {
        Ok(value) => {
            serde_json::to_value(JSONRPCResponse { id, result: value }).unwrap_or_default()
        }
        Err((code, message)) => serde_json::to_value(JSONRPCError {
            id,
            error: JSONRPCErrorError {
                code,
                message,
                data: None,
            },
        })
        .unwrap_or_default(),
    }
}

/// Dispatch to the appropriate handler based on method name.
async fn dispatch_method(
    ctx: &ServiceContext,
    controller: &Controller,
    method: &str,
    params: Option<Value>,
) -> RpcResult {
    match method {
        "hello" => handle_hello(params),

        "project.list" | "project.create" | "project.remove" | "task.list" | "task.create"
        | "task.update_status" | "task.remove" | "message.list" | "message.send" => {
            handle_domain(ctx, method, params)
        }

        m if m.starts_with("ui.") => handle_ui(controller, method, params).await,

        "service.status" => handle_service_status(ctx),
        "service.doctor" => handle_service_doctor(ctx),
        _ => Err((ERR_METHOD_NOT_FOUND, format!("Unknown method: {method}"))),
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, (i64, String)> {
    params
        .ok_or_else(|| (ERR_INVALID_PARAMS, "Missing params".to_string()))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| (ERR_INVALID_PARAMS, format!("Invalid {method} params: {e}")))
        })
}

/// Like [`parse_params`], but absent params mean `T::default()`.
fn optional_params<T: DeserializeOwned + Default>(
    method: &str,
    params: Option<Value>,
) -> Result<T, (i64, String)> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        some => parse_params(method, some),
    }
}

fn to_result<T: Serialize>(value: &T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| (ERR_INFRA, format!("Serialize error: {e}")))
}

/// Handle the `hello` handshake.
fn handle_hello(params: Option<Value>) -> RpcResult {
    let hello: HelloParams = parse_params("hello", params)?;

    if hello.protocol_version != PROTOCOL_VERSION {
        return Err((
            ERR_INVALID_PARAMS,
            format!(
                "Incompatible protocol version: client={}, service={}",
                hello.protocol_version, PROTOCOL_VERSION
            ),
        ));
    }
    tracing::debug!("hello from client {}", hello.client_version);

    to_result(&HelloResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        capabilities: METHODS.iter().map(|m| (*m).to_string()).collect(),
    })
}

/// `project.*`, `task.*` and `message.*`: the domain operations as-is.
fn handle_domain(ctx: &ServiceContext, method: &str, params: Option<Value>) -> RpcResult {
    let domain = ctx.domain();
    match method {
        "project.list" => to_result(&ProjectListResult {
            projects: domain.list_projects(),
        }),
        "project.create" => {
            let p: ProjectCreateParams = parse_params(method, params)?;
            let id = domain
                .create_project(&p.name, &p.description)
                .map_err(|e| domain_error_to_rpc(&e))?;
            to_result(&CreatedResult { id })
        }
        "project.remove" => {
            let p: IdParams<ProjectId> = parse_params(method, params)?;
            to_result(&domain.remove_project(&p.id))
        }
        "task.list" => {
            let p: ProjectFilterParams = optional_params(method, params)?;
            to_result(&TaskListResult {
                tasks: domain.list_tasks(p.project_id.as_ref()),
            })
        }
        "task.create" => {
            let p: TaskCreateParams = parse_params(method, params)?;
            let id = domain
                .create_task(&p.project_id, &p.title, p.status)
                .map_err(|e| domain_error_to_rpc(&e))?;
            to_result(&CreatedResult { id })
        }
        "task.update_status" => {
            let p: TaskUpdateStatusParams = parse_params(method, params)?;
            domain.update_task_status(&p.id, p.status);
            to_result(&serde_json::json!({ "id": p.id, "status": p.status }))
        }
        "task.remove" => {
            let p: IdParams<TaskId> = parse_params(method, params)?;
            domain.remove_task(&p.id);
            to_result(&serde_json::json!({ "id": p.id }))
        }
        "message.list" => {
            let p: ProjectFilterParams = optional_params(method, params)?;
            to_result(&MessageListResult {
                messages: domain.list_messages(p.project_id.as_ref()),
            })
        }
        "message.send" => {
            let p: MessageSendParams = parse_params(method, params)?;
            let id = domain
                .send_message(&p.project_id, p.role, &p.text, p.is_error)
                .map_err(|e| domain_error_to_rpc(&e))?;
            to_result(&CreatedResult { id })
        }
        _ => Err((ERR_METHOD_NOT_FOUND, format!("Unknown method: {method}"))),
    }
}

/// `ui.*`: session intents. Each answers with the resulting view.
async fn handle_ui(controller: &Controller, method: &str, params: Option<Value>) -> RpcResult {
    let outcome: Result<(), ControllerError> = match method {
        "ui.view" => Ok(()),
        "ui.select_project" => {
            let p: SelectProjectParams = parse_params(method, params)?;
            controller.select_project(p.project_id)
        }
        "ui.open_new_project" => {
            controller.open_new_project();
            Ok(())
        }
        "ui.edit_new_project" => {
            let p: EditNewProjectParams = optional_params(method, params)?;
            controller.edit_new_project(p.name, p.description);
            Ok(())
        }
        "ui.cancel_new_project" => {
            controller.cancel_new_project();
            Ok(())
        }
        "ui.submit_new_project" => controller.submit_new_project().await.map(drop),
        "ui.edit_task_draft" => {
            let p: EditTaskDraftParams = parse_params(method, params)?;
            controller.edit_task_draft(p.text);
            Ok(())
        }
        "ui.submit_task_draft" => controller.submit_task_draft().map(drop),
        "ui.advance_task" => {
            let p: TaskRefParams = parse_params(method, params)?;
            controller.advance_task_status(&p.task_id).map(drop)
        }
        "ui.delete_task" => {
            let p: TaskRefParams = parse_params(method, params)?;
            controller.delete_task(&p.task_id);
            Ok(())
        }
        "ui.request_delete" => {
            let p: RequestDeleteParams = parse_params(method, params)?;
            controller.request_delete(p.project_id);
            Ok(())
        }
        "ui.confirm_delete" => {
            let (_removed, view) = controller.confirm_delete();
            return to_result(&view);
        }
        "ui.cancel_delete" => {
            controller.cancel_delete();
            Ok(())
        }
        "ui.generate_tasks" => controller.generate_tasks().await.map(drop),
        "ui.send_chat" => {
            let p: SendChatParams = parse_params(method, params)?;
            controller.send_chat_message(&p.text).await.map(drop)
        }
        "ui.dismiss_notice" => {
            controller.dismiss_notice();
            Ok(())
        }
        _ => return Err((ERR_METHOD_NOT_FOUND, format!("Unknown method: {method}"))),
    };

    outcome.map_err(|e| controller_error_to_rpc(&e))?;
    to_result(&controller.view())
}

/// Handle `service.status`.
fn handle_service_status(ctx: &ServiceContext) -> RpcResult {
    to_result(&ServiceStatusResult {
        uptime_s: ctx.uptime_s(),
        sessions: ctx.session_count(),
        assistant_ready: ctx.gateway().has_credential(),
        store: ctx.domain().store().counts(),
    })
}

/// Handle `service.doctor`.
fn handle_service_doctor(ctx: &ServiceContext) -> RpcResult {
    let store_detail = match ctx.domain().store().snapshot_file() {
        Some(file) => format!("Persisting to {}", file.path().display()),
        None => "In-memory only (persistence disabled)".to_string(),
    };
    let credential = if ctx.gateway().has_credential() {
        DoctorCheck {
            name: "credential".to_string(),
            status: "ok".to_string(),
            detail: Some("Assistant API key configured".to_string()),
        }
    } else {
        DoctorCheck {
            name: "credential".to_string(),
            status: "warn".to_string(),
            detail: Some(
                "No API key configured; set TASKDECK_API_KEY or GEMINI_API_KEY".to_string(),
            ),
        }
    };

    let checks = vec![
        DoctorCheck {
            name: "service".to_string(),
            status: "ok".to_string(),
            detail: Some("Service is running".to_string()),
        },
        DoctorCheck {
            name: "socket".to_string(),
            status: "ok".to_string(),
            detail: Some(format!("Listening on {}", ctx.socket_path().display())),
        },
        DoctorCheck {
            name: "store".to_string(),
            status: "ok".to_string(),
            detail: Some(store_detail),
        },
        credential,
    ];

    to_result(&ServiceDoctorResult { checks })
}

fn domain_error_to_rpc(err: &DomainError) -> (i64, String) {
    match err {
        DomainError::Validation { .. } => (ERR_VALIDATION, err.to_string()),
        DomainError::ProjectNotFound(_) => (ERR_NOT_FOUND, err.to_string()),
    }
}

fn controller_error_to_rpc(err: &ControllerError) -> (i64, String) {
    match err {
        ControllerError::NoActiveProject => (ERR_NO_ACTIVE_PROJECT, err.to_string()),
        ControllerError::ProjectNotFound(_) | ControllerError::TaskNotFound(_) => {
            (ERR_NOT_FOUND, err.to_string())
        }
        ControllerError::Domain(e) => domain_error_to_rpc(e),
        ControllerError::Gateway(GatewayError::MissingCredential) => {
            (ERR_MISSING_CREDENTIAL, err.to_string())
        }
        ControllerError::Gateway(_) => (ERR_GATEWAY, err.to_string()),
    }
}
