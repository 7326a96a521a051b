// src/observability.rs
//! Logging setup and the engine's pluggable log sink
//!
//! The engine itself never writes to a global logger directly. It reports
//! through an [`AgentLogger`], which defaults to [`NoOpLogger`] so the engine
//! is silent unless the embedding code opts in. [`TracingLogger`] forwards
//! everything to `tracing`.

use crate::utils::config::LoggingConfig;
use crate::utils::errors::{EngineError, Result};
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Sink for engine trace messages
pub trait AgentLogger: Send + Sync {
    /// Record a trace message
    fn trace(&self, message: &str);

    /// Record a message together with the error that caused it
    fn trace_error(&self, error: &dyn Error, message: &str);
}

/// Logger that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLogger;

impl AgentLogger for NoOpLogger {
    fn trace(&self, _message: &str) {}

    fn trace_error(&self, _error: &dyn Error, _message: &str) {}
}

/// Logger that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl AgentLogger for TracingLogger {
    fn trace(&self, message: &str) {
        tracing::trace!(target: "inline_intercept", "{}", message);
    }

    fn trace_error(&self, error: &dyn Error, message: &str) {
        tracing::warn!(target: "inline_intercept", error = %error, "{}", message);
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::Observability(format!("invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| EngineError::Observability(e.to_string()))
}
