//! Error types for the updater
//!
//! Provides error handling for:
//! - Missing configurations and version tokens
//! - Sensitive-action policy violations
//! - Caller callback failures
//! - Remote collaborator failures (throttling, stale tokens, transport)
//! - Invalid configuration

/// Boxed error raised by a caller-supplied callback
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main updater error type
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// No configuration exists for the distribution
    #[error("distribution config not found for {id}")]
    NotFound { id: String },

    /// Collaborator returned a config without a version token
    #[error("version token (ETag) not found for {id}")]
    MissingVersionToken { id: String },

    /// Transform flipped `Enabled` without the override
    #[error("cannot change the Enabled field without opting in; set allow_sensitive_action in the updater config")]
    SensitiveAction { id: String },

    /// Caller transform failed
    #[error("transform failed for {id}: {source}")]
    Transform {
        id: String,
        #[source]
        source: CallbackError,
    },

    /// Caller selection predicate failed
    #[error("filter failed for {id}: {source}")]
    Filter {
        id: String,
        #[source]
        source: CallbackError,
    },

    /// Remote collaborator failure, propagated unchanged
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl UpdaterError {
    /// Wrap a transform failure
    #[inline]
    pub fn transform(id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Transform {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Wrap a predicate failure
    #[inline]
    pub fn filter(id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Filter {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Only throttling is transient; policy violations and stale tokens are not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_throttling())
    }

    /// Check if error is a stale-token conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::PreconditionFailed { .. }))
    }

    /// Distribution the error relates to, if known
    #[must_use]
    pub fn distribution_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id }
            | Self::MissingVersionToken { id }
            | Self::SensitiveAction { id }
            | Self::Transform { id, .. }
            | Self::Filter { id, .. } => Some(id),
            Self::Remote(RemoteError::PreconditionFailed { id })
            | Self::Remote(RemoteError::NoSuchDistribution(id)) => Some(id),
            Self::Remote(_) | Self::Config(_) => None,
        }
    }
}

/// Remote collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Rate limit signalled by the collaborator
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Version token no longer matches the server state
    #[error("precondition failed for {id}: version token is stale")]
    PreconditionFailed { id: String },

    /// Identifier has no corresponding distribution
    #[error("no such distribution: {0}")]
    NoSuchDistribution(String),

    /// Transport or service failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Check if the collaborator signalled throttling
    #[inline]
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Field holds a value outside its domain
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// TOML could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
