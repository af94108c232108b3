//! Request dispatch
//!
//! The admission-controlled execution path:
//!
//! ```text
//! submit ──► registry lookup ──► rate limit ──► concurrency ──► execute
//!                                    │               │             ▲
//!                               hard reject        queue ──────────┘
//!                                                 (priority drain on
//!                                                  each freed slot)
//! ```
//!
//! - **request**: request/response envelopes, priority, submit options
//! - **admission**: per-agent sliding window and slot accounting
//! - **queue**: stable priority-ordered holding area
//! - **dispatcher**: the public facade and execution engine

pub mod admission;
pub mod dispatcher;
pub mod queue;
pub mod request;

// Re-export commonly used types
pub use dispatcher::{AgentDispatcher, QueueStatus};
pub use queue::PriorityCounts;
pub use request::{AgentRequest, AgentResponse, Priority, SubmitOptions};
