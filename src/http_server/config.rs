//! Emulator Configuration
//!
//! Listener address, directory layout and request limits. Every field has a
//! default so a config file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Host to bind to (default: "0.0.0.0")
    pub host: String,

    /// Port to bind to (default: 3003)
    pub port: u16,

    /// Project root the directories below are resolved against
    pub root: PathBuf,

    /// Directory whose files name the functions (default: "lambdas")
    pub functions_dir: PathBuf,

    /// Directory holding the built handler executables (default: "out")
    pub handlers_dir: PathBuf,

    /// First path segment of every route (default: "dev")
    pub stage: String,

    /// Largest accepted request body (default: 10 MiB)
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3003
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: PathBuf::from("."),
            functions_dir: PathBuf::from("lambdas"),
            handlers_dir: PathBuf::from("out"),
            stage: "dev".to_string(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl EmulatorConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Directory scanned for function names
    pub fn functions_path(&self) -> PathBuf {
        self.root.join(&self.functions_dir)
    }

    /// Directory searched for handler executables
    pub fn handlers_path(&self) -> PathBuf {
        self.root.join(&self.handlers_dir)
    }
}
