// src/transform/mod.rs
//! Class rewriting
//!
//! - **Matcher**: composable method predicates and the eligibility policy
//! - **Capability**: contract of the external code-transformation library
//! - **Rewriter**: attaches advice to eligible methods of one class
//! - **Cache**: the set of classes the engine has claimed for rewriting

pub mod cache;
pub mod capability;
pub mod matcher;
pub mod rewriter;

pub use cache::TransformationCache;
pub use capability::{AdviceBinding, CodeTransformer, TypeRewriter, Validation};
pub use matcher::{EligibilityPolicy, MethodMatcher};
pub use rewriter::{ClassRewriter, RewriteOutcome};
