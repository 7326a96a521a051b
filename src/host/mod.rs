// src/host/mod.rs
//! Host runtime contracts
//!
//! The engine talks to the runtime that owns the loaded classes only
//! through these traits:
//!
//! - **HostAttacher**: obtains the instrumentation binding
//! - **HostRuntime**: installs class-file hooks and redefines classes
//! - **BootstrapLoader**: makes dispatch registry storage reachable from
//!   every isolation scope
//! - **ClassFileHook**: callback run per class load or redefinition
//!
//! [`memory`] provides an in-process implementation of all of them.

pub mod memory;

use crate::dispatch::DispatchRegistry;
use crate::model::ClassIdentity;
use crate::utils::errors::{EngineError, Result};
use std::sync::Arc;
use thiserror::Error;

pub use memory::{ClassImage, InMemoryRuntime, MemoryAttacher, MemoryBootstrap, MemoryTransformer};

/// The host runtime refused to redefine a class
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("class {class} cannot be redefined")]
pub struct UnmodifiableClass {
    pub class: String,
}

/// Callback invoked by the host runtime for every class load and every
/// requested redefinition
pub trait ClassFileHook: Send + Sync {
    /// Return a replacement definition, or `None` to keep `definition`
    fn transform(&self, class: &ClassIdentity, definition: &[u8]) -> Option<Vec<u8>>;
}

/// Instrumentation capability of the host runtime
pub trait HostRuntime: Send + Sync {
    /// Install a hook. Only `retransformable` hooks run on redefinition.
    fn add_hook(&self, hook: Arc<dyn ClassFileHook>, retransformable: bool);

    /// Redefine `classes` as one batch, feeding each through the installed
    /// hooks. Blocks until the batch is installed or rejected.
    fn request_redefinition(
        &self,
        classes: &[ClassIdentity],
    ) -> std::result::Result<(), UnmodifiableClass>;

    /// Registry that rewritten code in every scope resolves handler IDs
    /// against, if the host already has one on its boot path
    fn boot_registry(&self) -> Option<Arc<DispatchRegistry>>;
}

/// Obtains the instrumentation binding
pub trait HostAttacher: Send + Sync {
    /// Attach to the host runtime. `None` if the environment has no
    /// instrumentation capability.
    fn install(&self) -> Option<Arc<dyn HostRuntime>>;

    /// Binding established by an earlier `install`, if any
    fn current_binding(&self) -> Option<Arc<dyn HostRuntime>>;
}

/// Makes dispatch registry storage reachable from all isolation scopes
pub trait BootstrapLoader: Send + Sync {
    fn load(&self, runtime: &dyn HostRuntime) -> Result<Arc<DispatchRegistry>>;
}

/// Uses the registry the host already exposes on its boot path
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBootstrap;

impl BootstrapLoader for HostBootstrap {
    fn load(&self, runtime: &dyn HostRuntime) -> Result<Arc<DispatchRegistry>> {
        runtime
            .boot_registry()
            .ok_or_else(|| EngineError::BootstrapFailed("host exposes no boot registry".into()))
    }
}
