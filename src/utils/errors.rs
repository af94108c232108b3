//! Dispatcher error taxonomy
//!
//! All failure modes surfaced by the dispatcher. Admission rejections
//! (`RateLimitExceeded`, `ConcurrencyLimitExceeded`) are distinct from
//! execution failures (`Timeout`, `ExecutorError`); none of them are
//! retried by the dispatcher itself.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target agent is not currently registered
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The agent definition failed validation at registration
    #[error("invalid agent definition: {0}")]
    InvalidDefinition(String),

    /// The agent's sliding-window rate limit is full; never queued
    #[error("rate limit exceeded for agent {0}")]
    RateLimitExceeded(String),

    /// The agent is at its concurrency cap and queuing was disabled
    #[error("concurrency limit exceeded for agent {0}")]
    ConcurrencyLimitExceeded(String),

    /// Execution exceeded its deadline; the executor result is discarded
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// The pluggable executor reported a failure
    #[error("executor error: {0}")]
    ExecutorError(String),

    /// Configuration loading failed
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Snapshot serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    /// Short machine-readable tag, used for event payloads and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentNotFound(_) => "agent_not_found",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::RateLimitExceeded(_) => "rate_limit_exceeded",
            Self::ConcurrencyLimitExceeded(_) => "concurrency_limit_exceeded",
            Self::Timeout(_) => "timeout",
            Self::ExecutorError(_) => "executor_error",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DispatchError::AgentNotFound("a1".to_string());
        assert_eq!(err.to_string(), "agent not found: a1");

        let err = DispatchError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            DispatchError::RateLimitExceeded("a1".into()).kind(),
            "rate_limit_exceeded"
        );
        assert_eq!(
            DispatchError::ExecutorError("boom".into()).kind(),
            "executor_error"
        );
    }
}
