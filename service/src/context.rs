//! State shared by every session of one service process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use taskdeck_assistant::AssistantGateway;
use taskdeck_core::Domain;

use crate::controller::Controller;

pub struct ServiceContext {
    domain: Domain,
    gateway: Arc<dyn AssistantGateway>,
    /// Where clients connect; reported by `service.doctor`.
    socket_path: PathBuf,
    started_at: Instant,
    session_count: AtomicU32,
}

impl ServiceContext {
    pub fn new(domain: Domain, gateway: Arc<dyn AssistantGateway>, socket_path: PathBuf) -> Self {
        Self {
            domain,
            gateway,
            socket_path,
            started_at: Instant::now(),
            session_count: AtomicU32::new(0),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn gateway(&self) -> &Arc<dyn AssistantGateway> {
        &self.gateway
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// A fresh controller for a new session.
    pub fn new_controller(&self) -> Controller {
        Controller::new(self.domain.clone(), Arc::clone(&self.gateway))
    }

    /// Service uptime in seconds.
    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn inc_sessions(&self) -> u32 {
        self.session_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn dec_sessions(&self) -> u32 {
        self.session_count.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub fn session_count(&self) -> u32 {
        self.session_count.load(Ordering::Relaxed)
    }
}
