//! Agent Request Dispatcher Library
//!
//! This library provides an in-process dispatcher for work requests
//! addressed to named, independently-configured agents (LLM-backed,
//! rule-based, or hybrid), with per-agent admission control and priority
//! scheduling.
//!
//! # Architecture
//!
//! The crate is structured into several key modules:
//!
//! - **agent**: Agent definitions, the live registry, executor strategies
//! - **dispatch**: Admission control, priority queue, the dispatcher facade
//! - **metrics**: Per-agent counters, running averages, snapshot export
//! - **events**: Best-effort lifecycle notifications for observers
//! - **observability**: Tracing bootstrap
//! - **utils**: Errors and configuration
//!
//! # Behavior
//!
//! - **Rate limits** are strict sliding windows and reject hard: delaying
//!   a request cannot create more quota inside the window.
//! - **Concurrency caps** queue excess work instead (unless the caller
//!   opts out); queued work drains highest-priority-first, FIFO within a
//!   priority, re-checking the rate window at drain time.
//! - **Timeouts** race every execution; a timed-out executor is abandoned
//!   and its slot freed at the deadline.
//! - Failures are surfaced, never retried, and every terminal outcome
//!   updates metrics and emits exactly one lifecycle event.
//!
//! # Example
//!
//! ```no_run
//! use agent_dispatcher::{
//!     AgentConstraints, AgentDefinition, AgentDispatcher, AgentKind, SubmitOptions,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> agent_dispatcher::Result<()> {
//! let dispatcher = AgentDispatcher::new();
//!
//! dispatcher.register_agent(
//!     AgentDefinition::new("triage", "Ticket triage", AgentKind::Hybrid)
//!         .with_constraints(
//!             AgentConstraints::default()
//!                 .with_max_concurrent(4)
//!                 .with_rate_limit(100, Duration::from_secs(60)),
//!         ),
//! )?;
//!
//! let response = dispatcher
//!     .submit_and_wait(
//!         "triage",
//!         serde_json::json!("customer asks for refund"),
//!         SubmitOptions::default(),
//!     )
//!     .await?;
//! println!("confidence: {}", response.confidence);
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod agent;
pub mod dispatch;
pub mod events;
pub mod metrics;
pub mod observability;
pub mod utils;

// Re-export commonly used types
pub use agent::definition::{AgentConstraints, AgentDefinition, AgentKind, RateLimit};
pub use agent::executor::{AgentExecutor, ExecutorOutput, ExecutorSet};
pub use agent::registry::AgentRegistry;
pub use dispatch::dispatcher::{AgentDispatcher, QueueStatus};
pub use dispatch::request::{AgentRequest, AgentResponse, Priority, SubmitOptions};
pub use events::{DispatchEvent, EventNotifier};
pub use metrics::{AgentMetrics, ExportFormat};
pub use utils::config::DispatcherConfig;
pub use utils::errors::{DispatchError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
