//! `taskdeck-service` — per-user taskdeck service.
//!
//! Listens on a Unix domain socket at `$XDG_RUNTIME_DIR/taskdeck.sock` and
//! speaks newline-delimited JSON-RPC-lite. Every connection is a session
//! with its own [`controller::Controller`]; all sessions share one store.

pub mod context;
pub mod controller;
pub mod ipc;
pub mod protocol;

/// Protocol version for the taskdeck IPC.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default socket filename.
pub const SOCKET_FILENAME: &str = "taskdeck.sock";

/// Get the default socket path using XDG_RUNTIME_DIR.
///
/// Falls back to `/tmp/taskdeck-<username>.sock` if XDG_RUNTIME_DIR is not set.
pub fn default_socket_path() -> std::path::PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        std::path::PathBuf::from(runtime_dir).join(SOCKET_FILENAME)
    } else {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        std::path::PathBuf::from(format!("/tmp/taskdeck-{user}.sock"))
    }
}
