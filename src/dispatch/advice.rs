// src/dispatch/advice.rs
//! Advice handlers
//!
//! Two handlers exist per engine, one for instance methods and one for
//! static methods. Each owns a table of per-target [`InvocationHandler`]s:
//! instance advice is keyed by receiver object, static advice by class.
//! Calls on targets without a handler fall through to the original body.

use crate::dispatch::call::{CallResult, Invocation, ObjectId, Value};
use crate::dispatch::registry::{AdviceId, Dispatcher};
use crate::model::ClassIdentity;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Which advice a method body receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Instance,
    Static,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdviceKind::Instance => f.write_str("instance"),
            AdviceKind::Static => f.write_str("static"),
        }
    }
}

/// Decides the outcome of an intercepted call.
///
/// The handler may call `original` (possibly with different arguments) to
/// run the real method body, return a substitute value, or return a
/// [`Failure`](crate::utils::errors::Failure).
pub trait InvocationHandler: Send + Sync {
    fn invoke(
        &self,
        invocation: &Invocation<'_>,
        original: &dyn Fn(&[Value]) -> CallResult,
    ) -> CallResult;
}

struct FnHandler<F>(F);

impl<F> InvocationHandler for FnHandler<F>
where
    F: Fn(&Invocation<'_>, &dyn Fn(&[Value]) -> CallResult) -> CallResult + Send + Sync,
{
    fn invoke(
        &self,
        invocation: &Invocation<'_>,
        original: &dyn Fn(&[Value]) -> CallResult,
    ) -> CallResult {
        (self.0)(invocation, original)
    }
}

/// Wrap a closure as an [`InvocationHandler`]
pub fn handler_fn<F>(f: F) -> Arc<dyn InvocationHandler>
where
    F: Fn(&Invocation<'_>, &dyn Fn(&[Value]) -> CallResult) -> CallResult
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}

/// Advice attached to virtual methods
pub struct InstanceAdvice {
    id: AdviceId,
    handlers: DashMap<ObjectId, Arc<dyn InvocationHandler>>,
}

impl InstanceAdvice {
    pub fn new(id: AdviceId) -> Self {
        Self {
            id,
            handlers: DashMap::new(),
        }
    }

    pub fn id(&self) -> AdviceId {
        self.id
    }

    /// Route calls on `receiver` to `handler`, returning the previous handler
    pub fn intercept(
        &self,
        receiver: ObjectId,
        handler: Arc<dyn InvocationHandler>,
    ) -> Option<Arc<dyn InvocationHandler>> {
        self.handlers.insert(receiver, handler)
    }

    /// Stop intercepting `receiver`
    pub fn release(&self, receiver: ObjectId) -> bool {
        self.handlers.remove(&receiver).is_some()
    }

    pub fn is_intercepted(&self, receiver: ObjectId) -> bool {
        self.handlers.contains_key(&receiver)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Dispatcher for InstanceAdvice {
    fn dispatch(
        &self,
        invocation: &Invocation<'_>,
        original: &dyn Fn(&[Value]) -> CallResult,
    ) -> Option<CallResult> {
        let receiver = invocation.receiver?;
        // clone out of the map so the shard lock is released before the
        // handler runs; handlers may re-enter the advice
        let handler = self.handlers.get(&receiver).map(|h| Arc::clone(h.value()))?;
        Some(handler.invoke(invocation, original))
    }
}

/// Advice attached to static methods
pub struct StaticAdvice {
    id: AdviceId,
    handlers: DashMap<ClassIdentity, Arc<dyn InvocationHandler>>,
}

impl StaticAdvice {
    pub fn new(id: AdviceId) -> Self {
        Self {
            id,
            handlers: DashMap::new(),
        }
    }

    pub fn id(&self) -> AdviceId {
        self.id
    }

    /// Route static calls on `class` to `handler`, returning the previous handler
    pub fn intercept(
        &self,
        class: ClassIdentity,
        handler: Arc<dyn InvocationHandler>,
    ) -> Option<Arc<dyn InvocationHandler>> {
        self.handlers.insert(class, handler)
    }

    pub fn release(&self, class: &ClassIdentity) -> bool {
        self.handlers.remove(class).is_some()
    }

    pub fn is_intercepted(&self, class: &ClassIdentity) -> bool {
        self.handlers.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Dispatcher for StaticAdvice {
    fn dispatch(
        &self,
        invocation: &Invocation<'_>,
        original: &dyn Fn(&[Value]) -> CallResult,
    ) -> Option<CallResult> {
        if !invocation.is_static() {
            return None;
        }
        let handler = self
            .handlers
            .get(invocation.class)
            .map(|h| Arc::clone(h.value()))?;
        Some(handler.invoke(invocation, original))
    }
}
