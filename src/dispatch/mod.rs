// src/dispatch/mod.rs
//! Call-time dispatch
//!
//! Rewritten method bodies carry nothing but a numeric handler ID. On entry
//! they look that ID up in a [`DispatchRegistry`] and hand the call to the
//! [`Dispatcher`] found there:
//!
//! ```text
//! intercepted call
//!     │
//!     ├─ advice(id) → DispatchRegistry::resolve(id) → Dispatcher
//!     │                                                  │
//!     │                      ┌───────────────────────────┤
//!     │                      │ None                      │ Some(result)
//!     ▼                      ▼                           ▼
//! original body       original body            substituted value / failure
//! ```

pub mod advice;
pub mod call;
pub mod registry;

pub use advice::{handler_fn, AdviceKind, InstanceAdvice, InvocationHandler, StaticAdvice};
pub use call::{CallResult, Invocation, ObjectId, Value};
pub use registry::{AdviceId, DispatchRegistry, Dispatcher};
