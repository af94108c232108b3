//! Agent definitions and capacity constraints
//!
//! A definition is registered once per agent and is immutable afterwards
//! except through an explicit re-registration. The `execution_config` bag
//! is opaque to the dispatcher; only the configured executor interprets it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an agent produces its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Delegates to an LLM-calling executor
    Llm,

    /// Delegates to a deterministic rule executor
    RuleBased,

    /// Rules first, LLM fallback when rule confidence is low
    Hybrid,
}

/// Sliding-window rate limit: at any instant, the count of admitted
/// requests within the trailing `window` never exceeds `max_requests`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum admissions inside one trailing window
    pub max_requests: usize,

    /// Window duration
    pub window: Duration,
}

/// Per-agent capacity constraints; `None` means unbounded / default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConstraints {
    /// Sliding-window throughput limit (hard rejection when full)
    pub rate_limit: Option<RateLimit>,

    /// Maximum simultaneously executing requests (excess queues)
    pub max_concurrent: Option<usize>,

    /// Execution deadline; dispatcher default applies when unset
    pub timeout: Option<Duration>,
}

/// A registered agent: identity, kind, capabilities, and constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent id (registry key)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Executor strategy selector
    pub kind: AgentKind,

    /// Informational capability tags; not enforced by the dispatcher
    pub capabilities: Vec<String>,

    /// Opaque executor configuration (model name, rule table, ...)
    pub execution_config: serde_json::Value,

    /// Capacity constraints
    pub constraints: AgentConstraints,
}

impl AgentDefinition {
    /// Create a definition with no capabilities, empty execution config,
    /// and unbounded constraints
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            capabilities: Vec::new(),
            execution_config: serde_json::Value::Null,
            constraints: AgentConstraints::default(),
        }
    }

    /// Set capability tags
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the opaque executor configuration
    pub fn with_execution_config(mut self, config: serde_json::Value) -> Self {
        self.execution_config = config;
        self
    }

    /// Set capacity constraints
    pub fn with_constraints(mut self, constraints: AgentConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Check whether the agent carries a capability tag
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Validate the definition before registration
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("agent id cannot be empty".to_string());
        }

        if let Some(rate) = &self.constraints.rate_limit {
            if rate.max_requests == 0 {
                return Err("rate limit max_requests cannot be 0".to_string());
            }
            if rate.window.is_zero() {
                return Err("rate limit window cannot be zero".to_string());
            }
        }

        if let Some(max) = self.constraints.max_concurrent {
            if max == 0 {
                return Err("max_concurrent cannot be 0".to_string());
            }
        }

        if let Some(timeout) = self.constraints.timeout {
            if timeout.is_zero() {
                return Err("timeout cannot be zero".to_string());
            }
        }

        Ok(())
    }
}

impl AgentConstraints {
    /// Constraints with a rate limit
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit = Some(RateLimit {
            max_requests,
            window,
        });
        self
    }

    /// Constraints with a concurrency cap
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    /// Constraints with an execution deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_definition_is_unbounded() {
        let def = AgentDefinition::new("a1", "Agent One", AgentKind::Llm);
        assert!(def.constraints.rate_limit.is_none());
        assert!(def.constraints.max_concurrent.is_none());
        assert!(def.constraints.timeout.is_none());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_capabilities() {
        let def = AgentDefinition::new("a1", "Agent One", AgentKind::RuleBased)
            .with_capabilities(vec!["triage".to_string(), "billing".to_string()]);

        assert!(def.has_capability("triage"));
        assert!(!def.has_capability("refunds"));
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let def = AgentDefinition::new("a1", "Agent One", AgentKind::Llm).with_constraints(
            AgentConstraints::default().with_rate_limit(0, Duration::from_secs(1)),
        );
        assert!(def.validate().is_err());

        let def = AgentDefinition::new("a1", "Agent One", AgentKind::Llm)
            .with_constraints(AgentConstraints::default().with_max_concurrent(0));
        assert!(def.validate().is_err());

        let def = AgentDefinition::new("a1", "Agent One", AgentKind::Llm)
            .with_constraints(AgentConstraints::default().with_rate_limit(5, Duration::ZERO));
        assert!(def.validate().is_err());

        let def = AgentDefinition::new("", "Agent One", AgentKind::Llm);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_kind_serde_naming() {
        let json = serde_json::to_string(&AgentKind::RuleBased).unwrap();
        assert_eq!(json, r#""rule_based""#);
    }
}
