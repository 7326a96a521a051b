// src/utils/errors.rs
//! Error types for the interception engine
//!
//! Errors fall into two groups. `EngineError` covers construction and
//! host-runtime interaction and is surfaced to the embedding code.
//! `RewriteError` describes why a single class could not be rewritten; it
//! never escapes the instrumentation hook and only ends up in the log.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The host environment offers no instrumentation capability
    #[error("instrumentation capability unavailable: {0}")]
    AttachmentUnavailable(String),

    /// Dispatch registry storage could not be made reachable
    #[error("bootstrap loading failed: {0}")]
    BootstrapFailed(String),

    /// Advice could not be registered in the dispatch registry
    #[error("failed to set advice: {0}")]
    AdviceRegistration(String),

    /// Handler ID does not fit in the registry
    #[error("dispatch slot {id} out of range (capacity {capacity})")]
    SlotOutOfRange { id: u64, capacity: usize },

    /// Handler ID already carries a handler
    #[error("dispatch slot {0} already registered")]
    SlotOccupied(u64),

    /// Host runtime refused to redefine a batch of classes
    #[error("unmodifiable classes: {}", .0.join(", "))]
    Unmodifiable(Vec<String>),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Logging / tracing setup failed
    #[error("observability error: {0}")]
    Observability(String),
}

/// Reason a class could not be rewritten
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    /// The code-transformation capability rejected the input
    #[error("transformer failed: {0}")]
    Transformer(String),

    /// Validation of the rewritten definition failed
    #[error("validation failed: {0}")]
    Validation(String),

    /// The code-transformation capability panicked
    #[error("transformer panicked: {0}")]
    Panicked(String),
}

/// A failure raised into an intercepted call in place of its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Type name of the raised failure
    pub kind: String,

    /// Human readable message
    pub message: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmodifiable_message_lists_classes() {
        let err = EngineError::Unmodifiable(vec!["a.A".to_string(), "b.B".to_string()]);
        assert_eq!(err.to_string(), "unmodifiable classes: a.A, b.B");
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::new("IllegalStateException", "stubbed");
        assert_eq!(failure.to_string(), "IllegalStateException: stubbed");
    }
}
