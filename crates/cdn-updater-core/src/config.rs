//! Updater configuration
//!
//! Immutable after the updater is constructed. Every field has a default, so
//! partial TOML documents are accepted.

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// How the bulk run drives the per-distribution pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// One distribution at a time, fail-fast
    #[default]
    Sequential,
    /// Up to `concurrency_limit` pipelines in flight
    Parallel,
}

/// Updater configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Dry run: compute and record diffs, never commit
    pub debug_mode: bool,
    /// Permit transforms that change `Enabled`
    pub allow_sensitive_action: bool,
    /// Bulk execution mode
    pub task_type: TaskType,
    /// Maximum in-flight pipelines in parallel mode
    pub concurrency_limit: usize,
    /// Items requested per listing page
    pub page_size: u32,
    /// Throttling retry policy
    pub retry: RetryPolicy,
}

impl UpdaterConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With dry-run mode
    #[inline]
    #[must_use]
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// With sensitive-action override
    #[inline]
    #[must_use]
    pub fn with_allow_sensitive_action(mut self, allow: bool) -> Self {
        self.allow_sensitive_action = allow;
        self
    }

    /// With task type
    #[inline]
    #[must_use]
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Parallel mode with the given concurrency cap
    #[inline]
    #[must_use]
    pub fn parallel(mut self, concurrency_limit: usize) -> Self {
        self.task_type = TaskType::Parallel;
        self.concurrency_limit = concurrency_limit;
        self
    }

    /// With listing page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// Returns `ConfigError` on malformed TOML or out-of-range values
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` if `concurrency_limit` or `page_size` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency_limit",
                reason: "must be a positive integer".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size",
                reason: "must be a positive integer".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            allow_sensitive_action: false,
            task_type: TaskType::Sequential,
            concurrency_limit: 5,
            page_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}
