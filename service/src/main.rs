//! `taskdeck-service` entry point.
//!
//! ## Modes
//!
//! - **Service mode** (default): load config, open the store, start the IPC
//!   server and serve until Ctrl+C.
//! - **`--ping`**: connect to the running service socket, send a hello
//!   handshake, verify the response, then exit.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use taskdeck_assistant::{AssistantGateway, DisabledGateway, GeminiClient};
use taskdeck_core::persistence::SnapshotFile;
use taskdeck_core::{Config, ConfigLoader, Domain, Store};
use taskdeck_service::context::ServiceContext;

/// Connect to the service socket, send a hello handshake, verify the
/// response, then exit.
fn ping(path: &Path) -> std::io::Result<()> {
    let mut stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
        std::io::Error::other(format!("ping: cannot connect to {}: {e}", path.display()))
    })?;
    stream.set_read_timeout(Some(std::time::Duration::from_secs(10)))?;
    stream.set_write_timeout(Some(std::time::Duration::from_secs(5)))?;

    let hello = format!(
        r#"{{"id":0,"method":"hello","params":{{"protocol_version":"{}","client_version":"ping"}}}}"#,
        taskdeck_service::PROTOCOL_VERSION,
    );
    stream.write_all(hello.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    // The session pushes `view.updated` right away; skip to the response.
    let mut reader = std::io::BufReader::new(&stream);
    let resp = loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(std::io::Error::other("ping: connection closed"));
        }
        let value: serde_json::Value = serde_json::from_str(line.trim())
            .map_err(|e| std::io::Error::other(format!("ping: invalid response JSON: {e}")))?;
        if value.get("id").is_some() {
            break value;
        }
    };

    if resp.get("result").is_some() {
        eprintln!("ping: service is alive");
        Ok(())
    } else {
        let msg = resp
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        Err(std::io::Error::other(format!("ping: hello failed: {msg}")))
    }
}

fn load_config() -> std::io::Result<Config> {
    ConfigLoader::new()
        .load()
        .map_err(|e| std::io::Error::other(format!("Failed to load config: {e}")))
}

fn socket_path(config: &Config) -> std::path::PathBuf {
    config
        .service
        .socket_path
        .clone()
        .unwrap_or_else(taskdeck_service::default_socket_path)
}

fn open_store(config: &Config) -> std::io::Result<Store> {
    let Some(dir) = config.data_dir() else {
        tracing::info!("Persistence disabled; using in-memory store");
        return Ok(Store::in_memory());
    };
    let store = SnapshotFile::in_dir(&dir).and_then(Store::open).map_err(|e| {
        std::io::Error::other(format!("Failed to open store in {}: {e}", dir.display()))
    })?;
    tracing::info!("Store at {}", dir.display());
    Ok(store)
}

fn build_gateway(config: &Config) -> std::io::Result<Arc<dyn AssistantGateway>> {
    if config.assistant.api_key.is_none() {
        tracing::warn!(
            "No API key configured (TASKDECK_API_KEY, GEMINI_API_KEY or API_KEY); assistant features are disabled"
        );
        return Ok(Arc::new(DisabledGateway));
    }
    let client = GeminiClient::new(&config.assistant)
        .map_err(|e| std::io::Error::other(format!("Failed to build assistant client: {e}")))?;
    tracing::info!("Assistant model {}", config.assistant.model);
    Ok(Arc::new(client))
}

fn main() -> std::io::Result<()> {
    let config = load_config()?;

    if std::env::args().nth(1).as_deref() == Some("--ping") {
        return ping(&socket_path(&config));
    }

    run_service(config)
}

#[tokio::main]
async fn run_service(config: Config) -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("taskdeck-service v{} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(open_store(&config)?);
    let gateway = build_gateway(&config)?;
    let path = socket_path(&config);
    let ctx = Arc::new(ServiceContext::new(Domain::new(store), gateway, path.clone()));

    let listener = taskdeck_service::ipc::bind(&path)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let ctx_signal = Arc::clone(&ctx);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(
            "Signal received, shutting down (sessions: {})",
            ctx_signal.session_count()
        );
        let _ = shutdown_tx.send(true);
    });

    taskdeck_service::ipc::serve(ctx, listener, shutdown_rx).await?;

    if let Err(e) = std::fs::remove_file(&path) {
        tracing::debug!("Could not remove socket {}: {e}", path.display());
    }
    tracing::info!("taskdeck-service exiting cleanly");
    Ok(())
}
