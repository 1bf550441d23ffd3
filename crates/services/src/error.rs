//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Errors from a single remote progress write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("progress sync is not configured")]
    Disabled,
    #[error("network failure: {0}")]
    Network(String),
    #[error("progress rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl SubmitError {
    /// Only transport-level failures are worth retrying immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Errors from reading sync configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {var} value {raw:?}: {source}")]
    InvalidUrl {
        var: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[error("invalid {var} value {raw:?}: expected a non-negative integer")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} must be at least {min}")]
    TooSmall { var: &'static str, min: u64 },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
