//! Error types for the planner.

use std::path::PathBuf;

use crate::config::ValidationReport;
use crate::registry::ModuleCategory;

/// All errors that can occur while configuring or running the planner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("configuration is invalid:\n{0}")]
    Validation(ValidationReport),

    #[error("duplicate module '{name}' in {category}")]
    DuplicateModule {
        category: ModuleCategory,
        name: String,
    },

    #[error("unknown module '{name}' referenced in {category}")]
    UnknownModule {
        category: ModuleCategory,
        name: String,
    },

    #[error("module '{name}' failed: {message}")]
    Module { name: String, message: String },

    #[error("repository error: {0}")]
    Repository(String),

    #[error("remote evaluation unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("sequence store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a module failure.
    pub fn module(name: &str, message: impl Into<String>) -> Self {
        Error::Module {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
