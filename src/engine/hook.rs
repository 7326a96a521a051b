// src/engine/hook.rs
//! Instrumentation hook
//!
//! Installed once with the host runtime and called for every class load
//! and redefinition in the process. Classes the engine has not claimed are
//! passed through untouched. A class that fails to rewrite keeps its
//! current definition; the failure is logged and never reaches the host's
//! class-loading path.

use crate::host::ClassFileHook;
use crate::model::ClassIdentity;
use crate::observability::AgentLogger;
use crate::transform::{ClassRewriter, RewriteOutcome, TransformationCache};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-class hook driving the [`ClassRewriter`]
pub struct InstrumentationHook {
    cache: Arc<TransformationCache>,
    rewriter: ClassRewriter,
    logger: Arc<dyn AgentLogger>,
    applied: AtomicU64,
    unchanged: AtomicU64,
    failed: AtomicU64,
}

/// Hook counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    /// Classes given a new definition
    pub applied: u64,

    /// Claimed classes with nothing to advise
    pub unchanged: u64,

    /// Claimed classes that failed to rewrite
    pub failed: u64,
}

impl HookStats {
    /// Claimed classes the hook has processed
    pub fn total(&self) -> u64 {
        self.applied + self.unchanged + self.failed
    }
}

impl InstrumentationHook {
    pub fn new(
        cache: Arc<TransformationCache>,
        rewriter: ClassRewriter,
        logger: Arc<dyn AgentLogger>,
    ) -> Self {
        Self {
            cache,
            rewriter,
            logger,
            applied: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> HookStats {
        HookStats {
            applied: self.applied.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl ClassFileHook for InstrumentationHook {
    fn transform(&self, class: &ClassIdentity, definition: &[u8]) -> Option<Vec<u8>> {
        if !self.cache.contains(class) {
            return None;
        }

        match self.rewriter.rewrite(class, definition) {
            RewriteOutcome::Applied(bytes) => {
                self.applied.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("intercept.classes.rewritten").increment(1);
                self.logger.trace(&format!(
                    "Rewrote {} ({} -> {} bytes)",
                    class,
                    definition.len(),
                    bytes.len()
                ));
                Some(bytes)
            }
            RewriteOutcome::Unchanged => {
                self.unchanged.fetch_add(1, Ordering::Relaxed);
                self.logger.trace(&format!("No eligible methods in {}", class));
                None
            }
            RewriteOutcome::Error(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("intercept.classes.rewrite_failed").increment(1);
                self.logger
                    .trace_error(&e, &format!("Failed to transform class {}", class));
                None
            }
        }
    }
}
