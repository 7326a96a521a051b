// src/host/memory.rs
//! In-process host runtime
//!
//! Classes are [`ClassImage`]s stored as JSON bytes. Method bodies are
//! native closures registered per method; the image only records each
//! method's description and, once rewritten, the advice attached to it.
//! Invoking an advised method looks the advice ID up in the runtime's boot
//! registry, exactly as rewritten code would.
//!
//! # Lifecycle of a class
//!
//! ```text
//! define_class ──► load hooks ──► installed (initial bytes kept)
//!                                     │
//! request_redefinition ──► retransformable hooks run on the initial
//!                          bytes ──► result installed
//! ```

use crate::dispatch::{
    AdviceKind, CallResult, DispatchRegistry, Dispatcher, Invocation, ObjectId, Value,
};
use crate::host::{BootstrapLoader, ClassFileHook, HostAttacher, HostRuntime, UnmodifiableClass};
use crate::model::{ClassIdentity, MethodDescription, ScopeId};
use crate::transform::{AdviceBinding, CodeTransformer, MethodMatcher, TypeRewriter, Validation};
use crate::utils::errors::{EngineError, Result, RewriteError};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by the in-memory runtime itself
#[derive(Debug, Error)]
pub enum MemoryRuntimeError {
    #[error("class image codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("no method {method} in {class}")]
    NoSuchMethod { class: String, method: String },

    #[error("no body registered for {class}.{method}")]
    NoBody { class: String, method: String },

    #[error("{class}.{method} expects a receiver: {expected}")]
    ReceiverMismatch {
        class: String,
        method: String,
        expected: bool,
    },
}

/// Advice recorded on a rewritten method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceMarker {
    pub kind: AdviceKind,
    pub id: u64,
}

/// A field of a class image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub is_static: bool,
}

/// A method of a class image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodImage {
    #[serde(flatten)]
    pub description: MethodDescription,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<AdviceMarker>,
}

/// Binary definition of a class in the in-memory runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassImage {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<FieldImage>,

    #[serde(default)]
    pub methods: Vec<MethodImage>,

    /// Free-form metadata carried through rewriting
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ClassImage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.fields.push(FieldImage {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static: false,
        });
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a method; its declaring type is forced to this class
    pub fn with_method(mut self, mut description: MethodDescription) -> Self {
        description.declaring_type = self.name.clone();
        self.methods.push(MethodImage {
            description,
            advice: None,
        });
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodImage> {
        self.methods.iter().find(|m| m.description.name == name)
    }

    /// Methods carrying advice, by name
    pub fn advised(&self) -> Vec<(&str, AdviceMarker)> {
        self.methods
            .iter()
            .filter_map(|m| m.advice.map(|a| (m.description.name.as_str(), a)))
            .collect()
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

type Body = dyn Fn(Option<ObjectId>, &[Value]) -> CallResult + Send + Sync;

struct LoadedClass {
    /// Definition as first loaded; redefinition always starts from here
    initial: Arc<[u8]>,

    /// Installed definition
    current: Arc<[u8]>,

    /// Decoded form of `current`
    image: Arc<ClassImage>,
}

struct InstalledHook {
    hook: Arc<dyn ClassFileHook>,
    retransformable: bool,
}

/// In-process host runtime
pub struct InMemoryRuntime {
    /// Dispatch storage visible to every scope of this runtime
    registry: Arc<DispatchRegistry>,

    classes: RwLock<HashMap<ClassIdentity, LoadedClass>>,

    hooks: RwLock<Vec<InstalledHook>>,

    bodies: DashMap<(ClassIdentity, String), Arc<Body>>,

    objects: DashMap<ObjectId, ClassIdentity>,

    unmodifiable: DashSet<ClassIdentity>,

    next_definition: AtomicU64,

    next_object: AtomicU64,

    /// Redefinition requests received
    redefinitions: AtomicUsize,
}

impl InMemoryRuntime {
    /// Runtime whose boot storage is `registry`
    pub fn new(registry: Arc<DispatchRegistry>) -> Self {
        Self {
            registry,
            classes: RwLock::new(HashMap::new()),
            hooks: RwLock::new(Vec::new()),
            bodies: DashMap::new(),
            objects: DashMap::new(),
            unmodifiable: DashSet::new(),
            next_definition: AtomicU64::new(1),
            next_object: AtomicU64::new(1),
            redefinitions: AtomicUsize::new(0),
        }
    }

    /// Runtime backed by the process-wide registry
    pub fn with_global_registry() -> Self {
        Self::new(DispatchRegistry::global())
    }

    pub fn registry(&self) -> Arc<DispatchRegistry> {
        Arc::clone(&self.registry)
    }

    /// Load a class into `scope`, running every installed hook
    pub fn define_class(
        &self,
        scope: ScopeId,
        image: &ClassImage,
    ) -> std::result::Result<ClassIdentity, MemoryRuntimeError> {
        let initial: Arc<[u8]> = image.encode()?.into();
        let definition = self.next_definition.fetch_add(1, Ordering::Relaxed);
        let class = ClassIdentity::new(definition, scope, image.name.as_str());

        let hooks = self.hooks_for(false);
        let (current, decoded) = self.run_hooks(&hooks, &class, &initial)?;

        debug!("Defined {} ({} bytes)", class, current.len());
        self.classes.write().insert(
            class.clone(),
            LoadedClass {
                initial,
                current,
                image: decoded,
            },
        );
        Ok(class)
    }

    /// Register the native body of `class.method`
    pub fn define_body<F>(&self, class: &ClassIdentity, method: &str, body: F)
    where
        F: Fn(Option<ObjectId>, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.bodies
            .insert((class.clone(), method.to_string()), Arc::new(body));
    }

    /// Allocate an instance of `class`
    pub fn new_instance(&self, class: &ClassIdentity) -> ObjectId {
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(id, class.clone());
        id
    }

    pub fn class_of(&self, object: ObjectId) -> Option<ClassIdentity> {
        self.objects.get(&object).map(|c| c.value().clone())
    }

    /// Reject any future redefinition batch containing `class`
    pub fn mark_unmodifiable(&self, class: &ClassIdentity) {
        self.unmodifiable.insert(class.clone());
    }

    /// Installed definition
    pub fn definition(&self, class: &ClassIdentity) -> Option<Vec<u8>> {
        self.classes.read().get(class).map(|c| c.current.to_vec())
    }

    /// Installed definition, decoded
    pub fn image(&self, class: &ClassIdentity) -> Option<Arc<ClassImage>> {
        self.classes.read().get(class).map(|c| Arc::clone(&c.image))
    }

    /// Number of redefinition requests received so far
    pub fn redefinition_count(&self) -> usize {
        self.redefinitions.load(Ordering::SeqCst)
    }

    /// Call `method` on `class`. Instance methods take the receiver.
    ///
    /// The outer `Result` reports misuse of the runtime; the inner
    /// [`CallResult`] is what the called method produced.
    pub fn invoke(
        &self,
        class: &ClassIdentity,
        method: &str,
        receiver: Option<ObjectId>,
        args: &[Value],
    ) -> std::result::Result<CallResult, MemoryRuntimeError> {
        let image = self
            .image(class)
            .ok_or_else(|| MemoryRuntimeError::UnknownClass(class.to_string()))?;
        let target = image
            .method(method)
            .ok_or_else(|| MemoryRuntimeError::NoSuchMethod {
                class: class.to_string(),
                method: method.to_string(),
            })?;

        if target.description.is_static == receiver.is_some() {
            return Err(MemoryRuntimeError::ReceiverMismatch {
                class: class.to_string(),
                method: method.to_string(),
                expected: !target.description.is_static,
            });
        }

        let body = self
            .bodies
            .get(&(class.clone(), method.to_string()))
            .map(|b| Arc::clone(b.value()))
            .ok_or_else(|| MemoryRuntimeError::NoBody {
                class: class.to_string(),
                method: method.to_string(),
            })?;

        let original = |args: &[Value]| body(receiver, args);

        let Some(advice) = target.advice else {
            return Ok(original(args));
        };

        let invocation = Invocation {
            class,
            method: &target.description,
            receiver,
            args,
        };
        let dispatched = self.registry.resolve(advice.id).dispatch(&invocation, &original);
        Ok(dispatched.unwrap_or_else(|| original(args)))
    }

    fn hooks_for(&self, redefinition: bool) -> Vec<Arc<dyn ClassFileHook>> {
        self.hooks
            .read()
            .iter()
            .filter(|h| !redefinition || h.retransformable)
            .map(|h| Arc::clone(&h.hook))
            .collect()
    }

    /// Chain `bytes` through `hooks`; a hook result that does not decode
    /// is dropped and the previous definition kept
    fn run_hooks(
        &self,
        hooks: &[Arc<dyn ClassFileHook>],
        class: &ClassIdentity,
        bytes: &Arc<[u8]>,
    ) -> std::result::Result<(Arc<[u8]>, Arc<ClassImage>), MemoryRuntimeError> {
        let mut current = Arc::clone(bytes);
        let mut image = Arc::new(ClassImage::decode(bytes)?);

        for hook in hooks {
            let Some(replacement) = hook.transform(class, &current) else {
                continue;
            };
            match ClassImage::decode(&replacement) {
                Ok(decoded) => {
                    current = replacement.into();
                    image = Arc::new(decoded);
                }
                Err(e) => warn!("Ignoring malformed definition for {}: {}", class, e),
            }
        }

        Ok((current, image))
    }
}

impl HostRuntime for InMemoryRuntime {
    fn add_hook(&self, hook: Arc<dyn ClassFileHook>, retransformable: bool) {
        self.hooks.write().push(InstalledHook {
            hook,
            retransformable,
        });
    }

    fn request_redefinition(
        &self,
        classes: &[ClassIdentity],
    ) -> std::result::Result<(), UnmodifiableClass> {
        self.redefinitions.fetch_add(1, Ordering::SeqCst);

        // the whole batch is rejected before anything is installed
        let initials: Vec<(ClassIdentity, Arc<[u8]>)> = {
            let loaded = self.classes.read();
            classes
                .iter()
                .map(|class| match loaded.get(class) {
                    Some(c) if !self.unmodifiable.contains(class) => {
                        Ok((class.clone(), Arc::clone(&c.initial)))
                    }
                    _ => Err(UnmodifiableClass {
                        class: class.to_string(),
                    }),
                })
                .collect::<std::result::Result<_, _>>()?
        };

        let hooks = self.hooks_for(true);
        for (class, initial) in initials {
            match self.run_hooks(&hooks, &class, &initial) {
                Ok((current, image)) => {
                    if let Some(loaded) = self.classes.write().get_mut(&class) {
                        loaded.current = current;
                        loaded.image = image;
                    }
                }
                Err(e) => warn!("Keeping definition of {}: {}", class, e),
            }
        }

        Ok(())
    }

    fn boot_registry(&self) -> Option<Arc<DispatchRegistry>> {
        Some(self.registry())
    }
}

/// [`CodeTransformer`] over [`ClassImage`] definitions
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTransformer;

impl CodeTransformer for MemoryTransformer {
    fn redefine(
        &self,
        class: &ClassIdentity,
        definition: &[u8],
    ) -> std::result::Result<Box<dyn TypeRewriter>, RewriteError> {
        let image = ClassImage::decode(definition)
            .map_err(|e| RewriteError::Transformer(format!("malformed class image: {}", e)))?;

        if image.name != class.name() {
            return Err(RewriteError::Transformer(format!(
                "definition of {} supplied for {}",
                image.name, class
            )));
        }

        Ok(Box::new(ImageRewriter {
            image,
            validation: Validation::Enabled,
        }))
    }
}

struct ImageRewriter {
    image: ClassImage,
    validation: Validation,
}

impl ImageRewriter {
    fn validate(&self) -> std::result::Result<(), RewriteError> {
        for method in &self.image.methods {
            let Some(advice) = method.advice else {
                continue;
            };
            let d = &method.description;
            if !d.has_body() {
                return Err(RewriteError::Validation(format!(
                    "advice on bodiless method {}",
                    d.name
                )));
            }
            let expects_static = advice.kind == AdviceKind::Static;
            if d.is_static != expects_static {
                return Err(RewriteError::Validation(format!(
                    "{} advice on {}",
                    advice.kind, d.name
                )));
            }
        }
        Ok(())
    }
}

impl TypeRewriter for ImageRewriter {
    fn validation(&mut self, validation: Validation) {
        self.validation = validation;
    }

    fn visit(&mut self, binding: AdviceBinding, matcher: &MethodMatcher) {
        for method in &mut self.image.methods {
            if matcher.matches(&method.description) {
                method.advice = Some(AdviceMarker {
                    kind: binding.kind,
                    id: binding.id.get(),
                });
            }
        }
    }

    fn make(self: Box<Self>) -> std::result::Result<Vec<u8>, RewriteError> {
        if self.validation == Validation::Enabled {
            self.validate()?;
        }
        self.image
            .encode()
            .map_err(|e| RewriteError::Transformer(e.to_string()))
    }
}

/// [`HostAttacher`] for an [`InMemoryRuntime`]
pub struct MemoryAttacher {
    runtime: Option<Arc<InMemoryRuntime>>,
    attached: AtomicBool,
}

impl MemoryAttacher {
    pub fn new(runtime: Arc<InMemoryRuntime>) -> Self {
        Self {
            runtime: Some(runtime),
            attached: AtomicBool::new(false),
        }
    }

    /// An environment without instrumentation capability
    pub fn unavailable() -> Self {
        Self {
            runtime: None,
            attached: AtomicBool::new(false),
        }
    }
}

impl HostAttacher for MemoryAttacher {
    fn install(&self) -> Option<Arc<dyn HostRuntime>> {
        let runtime = self.runtime.as_ref()?;
        self.attached.store(true, Ordering::SeqCst);
        Some(Arc::clone(runtime) as Arc<dyn HostRuntime>)
    }

    fn current_binding(&self) -> Option<Arc<dyn HostRuntime>> {
        if !self.attached.load(Ordering::SeqCst) {
            return None;
        }
        self.runtime
            .as_ref()
            .map(|r| Arc::clone(r) as Arc<dyn HostRuntime>)
    }
}

/// [`BootstrapLoader`] exposing the runtime's own boot registry
pub struct MemoryBootstrap {
    registry: Option<Arc<DispatchRegistry>>,
}

impl MemoryBootstrap {
    pub fn new(runtime: &InMemoryRuntime) -> Self {
        Self {
            registry: Some(runtime.registry()),
        }
    }

    /// A loader that cannot place the registry on the boot path
    pub fn refusing() -> Self {
        Self { registry: None }
    }
}

impl BootstrapLoader for MemoryBootstrap {
    fn load(&self, _runtime: &dyn HostRuntime) -> Result<Arc<DispatchRegistry>> {
        self.registry
            .clone()
            .ok_or_else(|| EngineError::BootstrapFailed("boot registry not reachable".into()))
    }
}
