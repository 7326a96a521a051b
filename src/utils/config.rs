// src/utils/config.rs
//! Engine configuration
//!
//! Configuration is layered: built-in defaults, then an optional
//! `config/intercept.{toml,yaml,json}` file, then `INTERCEPT__*` environment
//! variables (e.g. `INTERCEPT__LOGGING__JSON=true`).

use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which methods receive advice
    pub eligibility: EligibilityConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Method eligibility configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityConfig {
    /// Declaring-type prefixes owned by the host platform. Package-private
    /// methods of these types are never advised.
    pub foreign_prefixes: Vec<String>,

    /// Name of the no-argument finalizer method
    pub finalizer_name: String,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            foreign_prefixes: vec!["java.".to_string()],
            finalizer_name: "finalize".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/intercept").required(false))
            .add_source(Environment::with_prefix("INTERCEPT").separator("__"))
            .build()?;

        let loaded: EngineConfig = config.try_deserialize()?;
        debug!("Loaded engine configuration: {:?}", loaded);
        Ok(loaded)
    }

    /// Load configuration from an explicit file, layered over defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
