//! On-disk snapshots of the document store.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   taskdeck.json       StoreSnapshot (all three collections)
//!   taskdeck.json.tmp   transient, renamed over taskdeck.json
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported snapshot schema: {found} (expected {expected})")]
    Schema { found: String, expected: String },
}

/// Location of the store snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub const FILE_NAME: &'static str = "taskdeck.json";

    /// Snapshot inside `data_dir`, creating the directory if needed.
    pub fn in_dir(data_dir: &Path) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(Self::FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file yields `None`.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, PersistenceError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Atomically replace the snapshot via a `.tmp` sibling.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(value)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
