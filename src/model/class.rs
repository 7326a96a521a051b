// src/model/class.rs
//! Identity of a loaded class definition

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An isolation scope: an independently loaded graph of classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The privileged root scope every other scope can see
    pub const BOOTSTRAP: ScopeId = ScopeId(0);

    pub fn is_bootstrap(self) -> bool {
        self == Self::BOOTSTRAP
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bootstrap() {
            f.write_str("bootstrap")
        } else {
            write!(f, "scope#{}", self.0)
        }
    }
}

/// Handle to exactly one loaded class definition.
///
/// `definition` is assigned by the host runtime when the class is defined
/// and is unique per process, so two handles compare equal only when they
/// name the same definition. A class with the same name loaded into a
/// different scope is a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassIdentity {
    definition: u64,
    scope: ScopeId,
    name: Arc<str>,
}

impl ClassIdentity {
    pub fn new(definition: u64, scope: ScopeId, name: impl Into<Arc<str>>) -> Self {
        Self {
            definition,
            scope,
            name: name.into(),
        }
    }

    pub fn definition(&self) -> u64 {
        self.definition
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.scope)
    }
}
