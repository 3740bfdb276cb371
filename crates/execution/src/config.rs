//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed config file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Workforce configuration. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkforceConfig {
    /// Directory of the JSON store
    pub storage_path: PathBuf,

    /// Seconds between periodic assignment passes
    pub assignment_interval_secs: u64,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(".workforce"),
            assignment_interval_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl WorkforceConfig {
    /// Load from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assignment_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "assignment_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between periodic passes.
    pub fn assignment_interval(&self) -> Duration {
        Duration::from_secs(self.assignment_interval_secs)
    }
}
