//! Request and response envelopes
//!
//! One `AgentRequest` is built per submission and lives only until its
//! outcome is delivered; one `AgentResponse` corresponds to exactly one
//! request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Scheduling priority for queued work
///
/// Ordered so that `Low < Medium < High`; within one priority the queue is
/// first-in-first-out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// One unit of submitted work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Generated unique id
    pub id: String,

    /// Target agent
    pub agent_id: String,

    /// Opaque payload handed to the executor
    pub input: serde_json::Value,

    /// Opaque key/value bag passed through to the executor
    pub context: HashMap<String, serde_json::Value>,

    /// Attribution string
    pub requester: String,

    /// Wall-clock submission time
    pub submitted_at: DateTime<Utc>,

    /// Scheduling priority
    pub priority: Priority,
}

impl AgentRequest {
    /// Build a request envelope with a fresh ulid and the current time
    pub fn new(agent_id: impl Into<String>, input: serde_json::Value, opts: &SubmitOptions) -> Self {
        Self {
            id: Ulid::new().to_string(),
            agent_id: agent_id.into(),
            input,
            context: opts.context.clone(),
            requester: opts
                .requester
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
            submitted_at: Utc::now(),
            priority: opts.priority,
        }
    }
}

/// Result of one executed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The request this response answers
    pub request_id: String,

    /// Agent that produced it
    pub agent_id: String,

    /// Executor output
    pub output: serde_json::Value,

    /// Executor confidence in [0, 1]
    pub confidence: f64,

    /// Token-like usage, when the executor reports it
    pub resource_units: Option<u64>,

    /// Wall time spent executing
    pub duration_ms: u64,

    /// Opaque executor metadata
    pub metadata: HashMap<String, serde_json::Value>,

    /// Wall-clock completion time
    pub completed_at: DateTime<Utc>,
}

/// Per-submission options
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Opaque context forwarded to the executor
    pub context: HashMap<String, serde_json::Value>,

    /// Attribution string; "anonymous" when unset
    pub requester: Option<String>,

    /// Scheduling priority (default: medium)
    pub priority: Priority,

    /// Queue when the agent is at its concurrency cap; when false the
    /// submission fails with a concurrency rejection instead
    pub queue_when_saturated: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            context: HashMap::new(),
            requester: None,
            priority: Priority::default(),
            queue_when_saturated: true,
        }
    }
}

impl SubmitOptions {
    /// Set the scheduling priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the attribution string
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Set the opaque executor context
    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Fail with `ConcurrencyLimitExceeded` instead of queuing
    pub fn no_queue(mut self) -> Self {
        self.queue_when_saturated = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_request_defaults() {
        let req = AgentRequest::new("a1", serde_json::json!("hello"), &SubmitOptions::default());
        assert_eq!(req.agent_id, "a1");
        assert_eq!(req.requester, "anonymous");
        assert_eq!(req.priority, Priority::Medium);
        assert!(!req.id.is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let opts = SubmitOptions::default();
        let a = AgentRequest::new("a1", serde_json::Value::Null, &opts);
        let b = AgentRequest::new("a1", serde_json::Value::Null, &opts);
        assert_ne!(a.id, b.id);
    }
}
