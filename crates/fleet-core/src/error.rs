use crate::job::JobId;

/// Tagged error a [`crate::adapter::Adapter`] reports for a single host
/// collection attempt. Replaces the source's "catch and inspect the
/// exception class name" dispatch with a closed sum type the runner can
/// `match` on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("timeout")]
    Timeout,
    #[error("unreachable")]
    Unreachable,
    #[error("authentication failed")]
    AuthFailed,
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// Stable, low-cardinality label stored on health/job records.
    pub fn error_type(&self) -> &'static str {
        match self {
            AdapterError::Timeout => "timeout",
            AdapterError::Unreachable => "unreachable",
            AdapterError::AuthFailed => "auth_failed",
            AdapterError::ParseError(_) => "parse_error",
            AdapterError::Other(_) => "other",
        }
    }

    /// Message to surface on host/job status. `Unreachable` is normalized
    /// to the literal string `"unreachable"` regardless of the underlying
    /// cause, per the error-handling design.
    pub fn error_message(&self) -> String {
        match self {
            AdapterError::Unreachable => "unreachable".to_string(),
            other => crate::health::truncate_for_audit(&other.to_string()),
        }
    }
}

/// Engine-internal failures that are not adapter-originated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("provider is not configured or disabled")]
    ProviderNotReady,

    #[error("a job is already active for this scope")]
    JobAlreadyActive,

    #[error("persistence error: {0}")]
    Persistence(#[source] anyhow::Error),
}
