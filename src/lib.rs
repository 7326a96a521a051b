// src/lib.rs
//! Inline method interception engine
//!
//! Rewrites already-loaded classes in place so that calls to their methods
//! pass through registered advice before the original body runs. This is
//! the mechanism a mocking framework needs to record calls, capture
//! arguments and substitute results without touching source code.
//!
//! # Architecture
//!
//! The library is structured into several key modules:
//!
//! - **model**: class identities and method descriptions
//! - **dispatch**: dispatch registry and advice handlers (call-time path)
//! - **transform**: method matchers, class rewriter, transformation cache
//! - **host**: host runtime contracts and an in-memory host runtime
//! - **engine**: lifecycle, instrumentation hook and the public entry points
//! - **observability**: tracing setup and the pluggable log sink
//! - **utils**: configuration and error types

pub mod dispatch;
pub mod engine;
pub mod host;
pub mod model;
pub mod observability;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub use dispatch::{handler_fn, CallResult, DispatchRegistry, InvocationHandler, ObjectId, Value};
pub use engine::{EngineBuilder, InterceptionEngine, LifecycleState};
pub use host::{BootstrapLoader, ClassFileHook, HostAttacher, HostRuntime};
pub use model::{ClassIdentity, MethodDescription, ScopeId};
pub use observability::{AgentLogger, NoOpLogger, TracingLogger};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Failure, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
