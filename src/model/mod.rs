// src/model/mod.rs
//! Class and method descriptions shared by the rewriter, the hook and the
//! call-time dispatch path.

pub mod class;
pub mod method;

pub use class::{ClassIdentity, ScopeId};
pub use method::{MethodDescription, MethodKind, Visibility};
