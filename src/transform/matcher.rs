// src/transform/matcher.rs
//! Method matchers
//!
//! A [`MethodMatcher`] is a shareable predicate over [`MethodDescription`]
//! that also carries a readable description for logs. Matchers compose with
//! [`and`](MethodMatcher::and), [`or`](MethodMatcher::or) and `!`.

use crate::model::MethodDescription;
use crate::utils::config::EligibilityConfig;
use std::fmt;
use std::ops::Not;
use std::sync::Arc;

type Predicate = dyn Fn(&MethodDescription) -> bool + Send + Sync;

/// Composable method predicate
#[derive(Clone)]
pub struct MethodMatcher {
    predicate: Arc<Predicate>,
    description: Arc<str>,
}

impl MethodMatcher {
    pub fn new<F>(description: impl Into<Arc<str>>, predicate: F) -> Self
    where
        F: Fn(&MethodDescription) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: description.into(),
        }
    }

    #[inline]
    pub fn matches(&self, method: &MethodDescription) -> bool {
        (self.predicate)(method)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn and(self, other: MethodMatcher) -> MethodMatcher {
        let description = format!("({} and {})", self.description, other.description);
        MethodMatcher::new(description, move |m| self.matches(m) && other.matches(m))
    }

    pub fn or(self, other: MethodMatcher) -> MethodMatcher {
        let description = format!("({} or {})", self.description, other.description);
        MethodMatcher::new(description, move |m| self.matches(m) || other.matches(m))
    }

    pub fn any() -> Self {
        Self::new("any", |_| true)
    }

    pub fn none() -> Self {
        Self::new("none", |_| false)
    }

    pub fn is_virtual() -> Self {
        Self::new("virtual", MethodDescription::is_virtual)
    }

    pub fn is_static() -> Self {
        Self::new("static", |m| m.is_static)
    }

    pub fn is_constructor() -> Self {
        Self::new("constructor", MethodDescription::is_constructor)
    }

    pub fn is_type_initializer() -> Self {
        Self::new("type initializer", MethodDescription::is_type_initializer)
    }

    pub fn is_package_private() -> Self {
        Self::new("package-private", MethodDescription::is_package_private)
    }

    pub fn has_body() -> Self {
        Self::new("has body", MethodDescription::has_body)
    }

    /// No-argument `void` method with the given name
    pub fn is_finalizer(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("finalizer {}", name), move |m| {
            m.name == name && m.descriptor == "()V" && !m.is_static
        })
    }

    pub fn declared_by_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(format!("declared by {}*", prefix), move |m| {
            m.declaring_type.starts_with(prefix.as_str())
        })
    }
}

impl Not for MethodMatcher {
    type Output = MethodMatcher;

    fn not(self) -> MethodMatcher {
        let description = format!("not {}", self.description);
        MethodMatcher::new(description, move |m| !self.matches(m))
    }
}

impl fmt::Debug for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodMatcher").field(&self.description).finish()
    }
}

/// Which methods receive which advice
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    /// Methods that get instance advice
    pub instance: MethodMatcher,

    /// Methods that get static advice
    pub statics: MethodMatcher,
}

impl EligibilityPolicy {
    /// Build the policy:
    ///
    /// - instance advice: virtual methods except finalizers
    /// - static advice: static methods except type initializers and constructors
    ///
    /// Both exclude package-private methods of platform-owned types and
    /// methods without a body.
    pub fn from_config(config: &EligibilityConfig) -> Self {
        let instance = MethodMatcher::is_virtual()
            .and(!MethodMatcher::is_finalizer(config.finalizer_name.clone()))
            .and(!Self::foreign_package_private(&config.foreign_prefixes))
            .and(MethodMatcher::has_body());

        let statics = MethodMatcher::is_static()
            .and(!MethodMatcher::is_type_initializer())
            .and(!MethodMatcher::is_constructor())
            .and(!Self::foreign_package_private(&config.foreign_prefixes))
            .and(MethodMatcher::has_body());

        Self { instance, statics }
    }

    fn foreign_package_private(prefixes: &[String]) -> MethodMatcher {
        let declared_by_foreign = prefixes
            .iter()
            .map(|prefix| MethodMatcher::declared_by_prefix(prefix.clone()))
            .reduce(MethodMatcher::or)
            .unwrap_or_else(MethodMatcher::none);

        declared_by_foreign.and(MethodMatcher::is_package_private())
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::from_config(&EligibilityConfig::default())
    }
}
