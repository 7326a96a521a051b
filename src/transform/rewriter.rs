// src/transform/rewriter.rs
//! Class rewriter
//!
//! Builds the redefinition of one class: instance advice on eligible
//! virtual methods, static advice on eligible static methods, everything
//! else untouched. Validation of the output is switched off since the
//! transformer only inserts entry advice into existing bodies.
//!
//! Any failure, including a panic inside the transformer, yields
//! [`RewriteOutcome::Error`] and the class keeps its current definition.

use crate::dispatch::AdviceKind;
use crate::model::ClassIdentity;
use crate::transform::capability::{AdviceBinding, CodeTransformer, Validation};
use crate::transform::matcher::EligibilityPolicy;
use crate::utils::errors::RewriteError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Result of rewriting one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// New definition to install
    Applied(Vec<u8>),

    /// Nothing to advise; keep the current definition
    Unchanged,

    /// Rewriting failed; keep the current definition
    Error(RewriteError),
}

impl RewriteOutcome {
    /// Bytes to hand back to the host runtime, `None` meaning "no change"
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RewriteOutcome::Applied(bytes) => Some(bytes),
            RewriteOutcome::Unchanged | RewriteOutcome::Error(_) => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RewriteOutcome::Applied(_))
    }
}

/// Rewrites classes to route calls through the engine's advice
pub struct ClassRewriter {
    transformer: Arc<dyn CodeTransformer>,
    policy: EligibilityPolicy,
    instance: AdviceBinding,
    statics: AdviceBinding,
}

impl ClassRewriter {
    pub fn new(
        transformer: Arc<dyn CodeTransformer>,
        policy: EligibilityPolicy,
        instance: AdviceBinding,
        statics: AdviceBinding,
    ) -> Self {
        debug_assert_eq!(instance.kind, AdviceKind::Instance);
        debug_assert_eq!(statics.kind, AdviceKind::Static);
        Self {
            transformer,
            policy,
            instance,
            statics,
        }
    }

    /// Rewrite `definition`, never panicking
    pub fn rewrite(&self, class: &ClassIdentity, definition: &[u8]) -> RewriteOutcome {
        let attempt = catch_unwind(AssertUnwindSafe(|| self.try_rewrite(class, definition)));

        match attempt {
            Ok(Ok(bytes)) if bytes.as_slice() == definition => RewriteOutcome::Unchanged,
            Ok(Ok(bytes)) => RewriteOutcome::Applied(bytes),
            Ok(Err(e)) => RewriteOutcome::Error(e),
            Err(payload) => RewriteOutcome::Error(RewriteError::Panicked(panic_message(payload))),
        }
    }

    fn try_rewrite(
        &self,
        class: &ClassIdentity,
        definition: &[u8],
    ) -> Result<Vec<u8>, RewriteError> {
        let mut builder = self.transformer.redefine(class, definition)?;
        builder.validation(Validation::Disabled);
        builder.visit(self.instance, &self.policy.instance);
        builder.visit(self.statics, &self.policy.statics);
        builder.make()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
