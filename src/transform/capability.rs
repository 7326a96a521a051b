// src/transform/capability.rs
//! Contract of the code-transformation library
//!
//! The engine never encodes method bodies itself. A [`CodeTransformer`]
//! opens a class definition for redefinition and returns a
//! [`TypeRewriter`] that attaches entry advice to the methods a matcher
//! selects, then emits the new definition.

use crate::dispatch::{AdviceId, AdviceKind};
use crate::model::ClassIdentity;
use crate::transform::matcher::MethodMatcher;
use crate::utils::errors::RewriteError;

/// Whether the emitted definition is type-checked before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    #[default]
    Enabled,
    Disabled,
}

/// Advice to attach, parameterised by the handler ID the injected code
/// passes to the dispatch registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdviceBinding {
    pub kind: AdviceKind,
    pub id: AdviceId,
}

impl AdviceBinding {
    pub fn new(kind: AdviceKind, id: AdviceId) -> Self {
        Self { kind, id }
    }
}

/// Builder for one redefinition
pub trait TypeRewriter: Send {
    fn validation(&mut self, validation: Validation);

    /// Attach `binding` at the entry of every method `matcher` accepts
    fn visit(&mut self, binding: AdviceBinding, matcher: &MethodMatcher);

    /// Emit the rewritten definition. Everything not touched by a visit is
    /// carried over unchanged.
    fn make(self: Box<Self>) -> Result<Vec<u8>, RewriteError>;
}

/// Entry point of the code-transformation library
pub trait CodeTransformer: Send + Sync {
    fn redefine(
        &self,
        class: &ClassIdentity,
        definition: &[u8],
    ) -> Result<Box<dyn TypeRewriter>, RewriteError>;
}
