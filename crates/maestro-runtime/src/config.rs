//! Runtime configuration with environment variable support.
//!
//! Environment variables:
//! - `MAESTRO_DEFAULT_TIMEOUT_SECS` - default per-task deadline (default: 30)
//! - `MAESTRO_DEFAULT_MAX_RETRIES` - default task retry budget (default: 2)
//! - `MAESTRO_MAX_CONCURRENT` - default worker-pool size (default: 4)
//! - `MAESTRO_HISTORY_LIMIT` - terminal tasks retained in memory (default: 100)
//! - `MAESTRO_JOURNAL_PATH` - path of the append-only task journal (default: unset)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Defaults applied to tasks and batch operations by the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_timeout_secs: u64,
    pub default_max_retries: u32,
    /// Worker-pool bound used by `Orchestrator::drain`.
    pub max_concurrent: usize,
    /// Terminal tasks retained in the in-memory history.
    pub history_limit: usize,
    /// When set, terminal tasks are appended to this journal file.
    pub journal_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            default_max_retries: 2,
            max_concurrent: 4,
            history_limit: 100,
            journal_path: None,
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `MAESTRO_*` environment variables,
    /// falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(timeout) = get_env_u64("MAESTRO_DEFAULT_TIMEOUT_SECS")? {
            config.default_timeout_secs = timeout;
        }
        if let Some(retries) = get_env_u64("MAESTRO_DEFAULT_MAX_RETRIES")? {
            config.default_max_retries = retries as u32;
        }
        if let Some(concurrent) = get_env_u64("MAESTRO_MAX_CONCURRENT")? {
            config.max_concurrent = concurrent as usize;
        }
        if let Some(limit) = get_env_u64("MAESTRO_HISTORY_LIMIT")? {
            config.history_limit = limit as usize;
        }
        if let Ok(path) = env::var("MAESTRO_JOURNAL_PATH") {
            if !path.is_empty() {
                config.journal_path = Some(PathBuf::from(path));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_secs = timeout.as_secs();
        self
    }

    pub fn default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// The default per-task deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "default timeout must be at least 1 second".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
