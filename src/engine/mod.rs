// src/engine/mod.rs
//! The interception engine
//!
//! - **Lifecycle**: attached / disabled / unavailable state and the host binding
//! - **Hook**: per-class callback that rewrites claimed classes
//! - **Instrumentation**: the engine itself (`inject`, `enable`, `disable`)
//!
//! # Architecture
//!
//! ```text
//! inject(classes)
//!     │
//!     ├─ TransformationCache::claim ──► pending (unclaimed classes)
//!     │
//!     └─ HostRuntime::request_redefinition(pending)
//!             │
//!             └─ InstrumentationHook::transform (per class)
//!                     │
//!                     └─ ClassRewriter ──► new definition installed
//! ```

pub mod hook;
pub mod instrumentation;
pub mod lifecycle;

pub use hook::{HookStats, InstrumentationHook};
pub use instrumentation::{EngineBuilder, InterceptionEngine};
pub use lifecycle::{Lifecycle, LifecycleState};
