// src/dispatch/registry.rs
//! Dispatch registry
//!
//! A fixed table of write-once slots indexed by a small numeric handler ID.
//! Rewritten code only ever holds the raw `u64`, so it needs no knowledge of
//! the engine's types to reach its advice. Slots are filled during engine
//! construction and never change afterwards, which lets [`resolve`] run
//! without locks or allocation on every intercepted call.
//!
//! [`resolve`]: DispatchRegistry::resolve

use crate::dispatch::call::{CallResult, Invocation, Value};
use crate::utils::errors::{EngineError, Result};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Slot count of the process-wide registry
pub const GLOBAL_CAPACITY: usize = 1024;

static GLOBAL: Lazy<Arc<DispatchRegistry>> =
    Lazy::new(|| Arc::new(DispatchRegistry::with_capacity(GLOBAL_CAPACITY)));

/// Target of a registry lookup.
///
/// Returning `None` lets the original method body run untouched; `Some`
/// skips the body and completes the call with the given result.
pub trait Dispatcher: Send + Sync {
    fn dispatch(
        &self,
        invocation: &Invocation<'_>,
        original: &dyn Fn(&[Value]) -> CallResult,
    ) -> Option<CallResult>;
}

/// Handler ID. Zero is never a valid ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdviceId(NonZeroU64);

impl AdviceId {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for AdviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write-once table of dispatchers
pub struct DispatchRegistry {
    /// Slot `i` holds the dispatcher for ID `i + 1`
    slots: Box<[OnceCell<Arc<dyn Dispatcher>>]>,

    /// Next ID handed out by `reserve`
    next_id: AtomicU64,
}

impl DispatchRegistry {
    /// Create a registry accepting IDs `1..=capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| OnceCell::new()).collect(),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry, shared by every isolation scope
    pub fn global() -> Arc<DispatchRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Hand out a fresh ID whose slot is still empty. IDs are never handed
    /// out twice by the same registry.
    pub fn reserve(&self) -> Result<AdviceId> {
        loop {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
            let slot = self.slot(raw).ok_or(EngineError::SlotOutOfRange {
                id: raw,
                capacity: self.capacity(),
            })?;
            if slot.get().is_none() {
                // raw >= 1 because the counter starts at 1
                if let Some(id) = AdviceId::new(raw) {
                    return Ok(id);
                }
            }
        }
    }

    /// Store a dispatcher under `id`. A slot can be written exactly once.
    pub fn register(&self, id: AdviceId, dispatcher: Arc<dyn Dispatcher>) -> Result<()> {
        let slot = self.slot(id.get()).ok_or(EngineError::SlotOutOfRange {
            id: id.get(),
            capacity: self.capacity(),
        })?;

        slot.set(dispatcher)
            .map_err(|_| EngineError::SlotOccupied(id.get()))
    }

    /// Look up the dispatcher for a handler ID embedded in rewritten code.
    ///
    /// # Panics
    ///
    /// Panics if nothing is registered under `id`. Rewritten code only
    /// carries IDs the engine registered before rewriting, so a miss means
    /// the engine was wired incorrectly.
    #[inline]
    pub fn resolve(&self, id: u64) -> &Arc<dyn Dispatcher> {
        match self.get(id) {
            Some(dispatcher) => dispatcher,
            None => panic!(
                "no dispatcher registered for advice id {} (registry capacity {})",
                id,
                self.capacity()
            ),
        }
    }

    /// Non-panicking lookup
    #[inline]
    pub fn get(&self, id: u64) -> Option<&Arc<dyn Dispatcher>> {
        self.slot(id).and_then(OnceCell::get)
    }

    pub fn is_registered(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn slot(&self, id: u64) -> Option<&OnceCell<Arc<dyn Dispatcher>>> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.slots.get(index)
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("capacity", &self.capacity())
            .field("registered", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassIdentity, MethodDescription, ScopeId};

    struct Constant(i64);

    impl Dispatcher for Constant {
        fn dispatch(
            &self,
            _invocation: &Invocation<'_>,
            _original: &dyn Fn(&[Value]) -> CallResult,
        ) -> Option<CallResult> {
            Some(Ok(Value::Int(self.0)))
        }
    }

    fn call(dispatcher: &Arc<dyn Dispatcher>) -> Option<CallResult> {
        let class = ClassIdentity::new(1, ScopeId(4), "isolated.Caller");
        let method = MethodDescription::new("isolated.Caller", "answer");
        let invocation = Invocation {
            class: &class,
            method: &method,
            receiver: None,
            args: &[],
        };
        dispatcher.dispatch(&invocation, &|_| Ok(Value::Void))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = DispatchRegistry::with_capacity(16);
        let id = AdviceId::new(7).unwrap();
        registry.register(id, Arc::new(Constant(42))).unwrap();

        assert!(registry.is_registered(7));
        assert_eq!(call(registry.resolve(7)), Some(Ok(Value::Int(42))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_slot_is_write_once() {
        let registry = DispatchRegistry::with_capacity(4);
        let id = AdviceId::new(2).unwrap();
        registry.register(id, Arc::new(Constant(1))).unwrap();

        let err = registry.register(id, Arc::new(Constant(2))).unwrap_err();
        assert!(matches!(err, EngineError::SlotOccupied(2)));
        assert_eq!(call(registry.resolve(2)), Some(Ok(Value::Int(1))));
    }

    #[test]
    fn test_out_of_range() {
        let registry = DispatchRegistry::with_capacity(4);
        let err = registry
            .register(AdviceId::new(5).unwrap(), Arc::new(Constant(0)))
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotOutOfRange { id: 5, capacity: 4 }));
        assert!(registry.get(0).is_none());
        assert!(registry.get(u64::MAX).is_none());
    }

    #[test]
    #[should_panic(expected = "no dispatcher registered for advice id 3")]
    fn test_resolve_unregistered_panics() {
        let registry = DispatchRegistry::with_capacity(4);
        registry.resolve(3);
    }

    #[test]
    fn test_reserve_skips_taken_slots() {
        let registry = DispatchRegistry::with_capacity(3);
        registry
            .register(AdviceId::new(1).unwrap(), Arc::new(Constant(0)))
            .unwrap();

        assert_eq!(registry.reserve().unwrap().get(), 2);
        assert_eq!(registry.reserve().unwrap().get(), 3);
        assert!(registry.reserve().is_err());
    }

    #[test]
    fn test_global_is_shared() {
        let a = DispatchRegistry::global();
        let b = DispatchRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.capacity(), GLOBAL_CAPACITY);
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(DispatchRegistry::with_capacity(8));
        registry
            .register(AdviceId::new(1).unwrap(), Arc::new(Constant(9)))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(call(registry.resolve(1)), Some(Ok(Value::Int(9))));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
