//! Agent definitions, registry, and executor strategies
//!
//! An agent is a named, independently-configured unit of work capacity:
//! one LLM model configuration, one rule table, or a hybrid of both. This
//! module provides:
//!
//! - **Definition**: the registered descriptor with capacity constraints
//! - **Registry**: the live in-memory map of agents and their state
//! - **Executor**: the pluggable strategy that actually produces output

pub mod definition;
pub mod executor;
pub mod registry;

// Re-export commonly used types
pub use definition::{AgentConstraints, AgentDefinition, AgentKind, RateLimit};
pub use executor::{
    AgentExecutor, ExecutorOutput, ExecutorSet, HybridExecutor, RuleExecutor, SimulatedLlmExecutor,
};
pub use registry::AgentRegistry;
