//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level CLI configuration. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub evaluation: EvaluationSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    /// Planner configuration document
    #[serde(default = "default_planner_config")]
    pub config: PathBuf,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_planner_config() -> PathBuf {
    PathBuf::from("planner.toml")
}
fn default_bucket() -> String {
    "core".into()
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            config: default_planner_config(),
            bucket: default_bucket(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationSection {
    /// Base URL of a batch evaluation service; local only when unset
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Sequences evaluated per incremental step
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout() -> u64 {
    30
}
fn default_batch_size() -> usize {
    100
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            remote_url: None,
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;
        // A relative planner document is relative to this file.
        if config.planner.config.is_relative() {
            if let Some(dir) = path.parent() {
                config.planner.config = dir.join(&config.planner.config);
            }
        }
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.planner.bucket.is_empty() {
            return Err(Error::Config("bucket must not be empty".into()));
        }
        if self.evaluation.batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".into()));
        }
        if self.evaluation.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        if let Some(url) = &self.evaluation.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "remote_url must start with http:// or https://, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation.timeout_secs)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
