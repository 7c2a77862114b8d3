//! Layered configuration loader.
//!
//! Three layers with precedence (later layers override earlier):
//! 1. Default config (hardcoded sensible defaults)
//! 2. File config (`<home>/config.toml`)
//! 3. Environment overrides (`TASKDECK_*` variables)
//!
//! ## Example
//!
//! ```no_run
//! use taskdeck_core::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! # Ok::<(), taskdeck_core::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config_types::Config;

/// Name of the configuration file inside the home directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Credential variables consulted after `<PREFIX>_API_KEY`, in order.
const FALLBACK_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error loading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for ${var}: '{value}' (expected: {expected})")]
    InvalidEnvValue {
        var: String,
        value: String,
        expected: String,
    },
}

/// Builder for layered configuration loading.
pub struct ConfigLoader {
    home: Option<PathBuf>,
    env_prefix: String,
    skip_file: bool,
    skip_env: bool,
    /// Replaces the process environment (tests).
    env: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// By default the home directory is auto-detected, the environment
    /// prefix is `TASKDECK`, and all layers are enabled.
    pub fn new() -> Self {
        Self {
            home: None,
            env_prefix: "TASKDECK".to_string(),
            skip_file: false,
            skip_env: false,
            env: None,
        }
    }

    /// Set the home directory explicitly.
    pub fn with_home(mut self, path: PathBuf) -> Self {
        self.home = Some(path);
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Skip loading from the config file (only defaults + env).
    pub fn skip_file_layer(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Skip environment overrides (only defaults + file).
    pub fn skip_env_layer(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load and merge all enabled layers.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let home = self.resolve_home();

        let mut config = if self.skip_file {
            Config::default()
        } else {
            Self::load_file(&home.join(CONFIG_FILE_NAME))?
        };
        config.home = home;

        if !self.skip_env {
            self.apply_env_overrides(&mut config)?;
        }

        Ok(config)
    }

    fn var(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            Some(map) => map.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn prefixed(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.env_prefix)
    }

    fn resolve_home(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        if let Some(home) = self.var(&self.prefixed("HOME")) {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .map(|h| h.join(".taskdeck"))
            .unwrap_or_else(|| PathBuf::from(".taskdeck"))
    }

    /// Parse the file layer. A missing file yields defaults.
    fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(model) = self.var(&self.prefixed("MODEL")) {
            config.assistant.model = model;
        }
        if let Some(base) = self.var(&self.prefixed("API_BASE")) {
            config.assistant.api_base = base;
        }
        if let Some(dir) = self.var(&self.prefixed("DATA_DIR")) {
            config.store.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(socket) = self.var(&self.prefixed("SOCKET")) {
            config.service.socket_path = Some(PathBuf::from(socket));
        }

        let persist_var = self.prefixed("PERSIST");
        if let Some(raw) = self.var(&persist_var) {
            config.store.persist = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidEnvValue {
                var: persist_var.clone(),
                value: raw.clone(),
                expected: "true/false/1/0".to_string(),
            })?;
        }

        let key_vars = std::iter::once(self.prefixed("API_KEY"))
            .chain(FALLBACK_KEY_VARS.iter().map(|v| (*v).to_string()));
        for var in key_vars {
            if let Some(key) = self.var(&var) {
                config.assistant.api_key = Some(key);
                break;
            }
        }

        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
