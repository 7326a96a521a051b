// src/engine/lifecycle.rs
//! Engine lifecycle
//!
//! ```text
//! Uninitialized ──attach──► Attached ◄──enable──┐
//!       │                      │                │
//!       │                      └──disable──► Disabled
//!       │
//!       └──attach failed──► Unavailable (terminal)
//! ```
//!
//! Only `Attached` exposes a host binding. `Unavailable` is permanent: no
//! further attachment is attempted for the life of the engine.

use crate::host::HostRuntime;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Construction has not finished
    Uninitialized,

    /// Bound to the host runtime, accepting work
    Attached,

    /// Hook still installed, new requests refused
    Disabled,

    /// The host offered no instrumentation capability
    Unavailable,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Attached => "attached",
            LifecycleState::Disabled => "disabled",
            LifecycleState::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

struct Inner {
    state: LifecycleState,
    binding: Option<Arc<dyn HostRuntime>>,
}

/// State machine guarding the host binding
pub struct Lifecycle {
    inner: RwLock<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: LifecycleState::Uninitialized,
                binding: None,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.read().state
    }

    /// Host binding, present only while attached
    pub fn binding(&self) -> Option<Arc<dyn HostRuntime>> {
        let inner = self.inner.read();
        match inner.state {
            LifecycleState::Attached => inner.binding.clone(),
            _ => None,
        }
    }

    /// Finish construction with a binding
    pub fn attach(&self, binding: Arc<dyn HostRuntime>) {
        let mut inner = self.inner.write();
        if inner.state == LifecycleState::Uninitialized {
            inner.state = LifecycleState::Attached;
            inner.binding = Some(binding);
        }
    }

    /// Finish construction without a binding
    pub fn mark_unavailable(&self) {
        let mut inner = self.inner.write();
        if inner.state == LifecycleState::Uninitialized {
            inner.state = LifecycleState::Unavailable;
            inner.binding = None;
        }
    }

    /// Clear the binding. Returns the resulting state.
    pub fn disable(&self) -> LifecycleState {
        let mut inner = self.inner.write();
        if inner.state == LifecycleState::Attached {
            inner.state = LifecycleState::Disabled;
            inner.binding = None;
        }
        inner.state
    }

    /// Re-establish the binding from `binding`. Returns the resulting state.
    pub fn enable(&self, binding: Option<Arc<dyn HostRuntime>>) -> LifecycleState {
        let mut inner = self.inner.write();
        match inner.state {
            LifecycleState::Attached | LifecycleState::Disabled => match binding {
                Some(binding) => {
                    inner.state = LifecycleState::Attached;
                    inner.binding = Some(binding);
                }
                None => {
                    inner.state = LifecycleState::Disabled;
                    inner.binding = None;
                }
            },
            LifecycleState::Uninitialized | LifecycleState::Unavailable => {}
        }
        inner.state
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
