// src/utils/mod.rs
//! Shared utilities: error types and configuration loading

pub mod config;
pub mod errors;

pub use config::{EligibilityConfig, EngineConfig, LoggingConfig};
pub use errors::{EngineError, Failure, Result, RewriteError};
