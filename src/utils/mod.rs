//! Common utilities and helpers

pub mod config;
pub mod errors;

pub use config::DispatcherConfig;
pub use errors::{DispatchError, Result};
