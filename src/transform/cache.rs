// src/transform/cache.rs
//! Transformation cache
//!
//! Set of classes the engine has claimed for rewriting. A class enters the
//! set at most once and never leaves it, so each class is handed to the
//! host runtime for redefinition at most once per engine.

use crate::model::ClassIdentity;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Classes already claimed for rewriting
#[derive(Debug, Default)]
pub struct TransformationCache {
    classes: Mutex<HashSet<ClassIdentity>>,
}

impl TransformationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically compute `requested - cache`, add the difference to the
    /// cache and return it in request order. Concurrent callers with
    /// overlapping requests each receive a disjoint share.
    pub fn claim<I>(&self, requested: I) -> Vec<ClassIdentity>
    where
        I: IntoIterator<Item = ClassIdentity>,
    {
        let mut classes = self.classes.lock();
        requested
            .into_iter()
            .filter(|class| classes.insert(class.clone()))
            .collect()
    }

    pub fn contains(&self, class: &ClassIdentity) -> bool {
        self.classes.lock().contains(class)
    }

    pub fn len(&self) -> usize {
        self.classes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.lock().is_empty()
    }
}
