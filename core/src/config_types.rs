//! Types used to define the fields of [`Config`].

// Note this file should generally be restricted to simple struct/enum
// definitions that do not contain business logic.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default Generative Language model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Generative Language REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fully merged configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assistant: AssistantConfig,
    pub store: StoreConfig,
    pub service: ServiceConfig,

    /// Resolved home directory (`$TASKDECK_HOME` or `~/.taskdeck`).
    #[serde(skip)]
    pub home: PathBuf,
}

impl Config {
    /// Directory for the store snapshot, or `None` for an in-memory store.
    pub fn data_dir(&self) -> Option<PathBuf> {
        if !self.store.persist {
            return None;
        }
        Some(
            self.store
                .data_dir
                .clone()
                .unwrap_or_else(|| self.home.join("data")),
        )
    }
}

/// `[assistant]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub model: String,
    pub api_base: String,

    /// Credential. Environment variables take precedence over the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub max_output_tokens: u32,
    pub temperature: Option<f32>,

    /// Replaces the built-in system instruction when set.
    pub system_instruction: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            max_output_tokens: 2048,
            temperature: None,
            system_instruction: None,
        }
    }
}

/// `[store]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Write a snapshot to disk after every mutation.
    pub persist: bool,
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist: true,
            data_dir: None,
        }
    }
}

/// `[service]` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub socket_path: Option<PathBuf>,
}
