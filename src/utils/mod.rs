//! Shared utilities

pub mod error;

pub use error::{AgentError, AgentResult, ErrorResponse};
