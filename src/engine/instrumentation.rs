// src/engine/instrumentation.rs
//! Interception engine
//!
//! Owns everything one engine needs: the host binding, the transformation
//! cache, the installed hook and the two advice handlers. Nothing here is
//! a process global; several engines can coexist, each with its own
//! registry, which is how the tests run them side by side.
//!
//! Construction order matters:
//!
//! 1. attach to the host runtime (failure → permanent no-op mode)
//! 2. make the dispatch registry reachable (failure → no-op mode)
//! 3. reserve handler IDs and register both advice handlers
//! 4. install the hook
//!
//! Handlers are registered before the hook exists, so rewritten code can
//! never observe an empty registry slot.

use crate::dispatch::{
    AdviceId, AdviceKind, DispatchRegistry, InstanceAdvice, InvocationHandler, ObjectId,
    StaticAdvice,
};
use crate::engine::hook::{HookStats, InstrumentationHook};
use crate::engine::lifecycle::{Lifecycle, LifecycleState};
use crate::host::{BootstrapLoader, HostAttacher, HostBootstrap, HostRuntime};
use crate::model::ClassIdentity;
use crate::observability::{AgentLogger, NoOpLogger};
use crate::transform::{
    AdviceBinding, ClassRewriter, CodeTransformer, EligibilityPolicy, TransformationCache,
};
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use std::sync::Arc;

/// Builder for [`InterceptionEngine`]
pub struct EngineBuilder {
    attacher: Arc<dyn HostAttacher>,
    transformer: Arc<dyn CodeTransformer>,
    bootstrap: Arc<dyn BootstrapLoader>,
    logger: Arc<dyn AgentLogger>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(attacher: Arc<dyn HostAttacher>, transformer: Arc<dyn CodeTransformer>) -> Self {
        Self {
            attacher,
            transformer,
            bootstrap: Arc::new(HostBootstrap),
            logger: Arc::new(NoOpLogger),
            config: EngineConfig::default(),
        }
    }

    pub fn bootstrap(mut self, bootstrap: Arc<dyn BootstrapLoader>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn AgentLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach and wire the engine.
    ///
    /// Only a failure to register the advice handlers is an error. An
    /// environment without instrumentation yields an engine in
    /// [`LifecycleState::Unavailable`].
    pub fn build(self) -> Result<InterceptionEngine> {
        let logger = self.logger;
        let lifecycle = Lifecycle::new();

        let runtime = match self.attacher.install() {
            Some(runtime) => {
                logger.trace("Instrumentation agent installed");
                Some(runtime)
            }
            None => {
                logger.trace("Can't install instrumentation agent");
                None
            }
        };

        let bound = runtime.and_then(|runtime| {
            match load_registry(self.bootstrap.as_ref(), runtime.as_ref()) {
                Ok(registry) => {
                    logger.trace(&format!("Dispatch registry reachable: {:?}", registry));
                    Some((runtime, registry))
                }
                Err(e) => {
                    logger.trace_error(&e, "Failed to load dispatch registry on bootstrap path");
                    None
                }
            }
        });

        // without a binding the advice still needs a home so the public
        // surface keeps working; nothing will ever be rewritten to use it
        let registry = match &bound {
            Some((_, registry)) => Arc::clone(registry),
            None => Arc::new(DispatchRegistry::with_capacity(DETACHED_CAPACITY)),
        };

        let instance_id = registry.reserve().map_err(advice_error)?;
        let static_id = registry.reserve().map_err(advice_error)?;
        let instance_advice = Arc::new(InstanceAdvice::new(instance_id));
        let static_advice = Arc::new(StaticAdvice::new(static_id));

        registry
            .register(instance_id, Arc::clone(&instance_advice) as _)
            .map_err(advice_error)?;
        registry
            .register(static_id, Arc::clone(&static_advice) as _)
            .map_err(advice_error)?;

        let cache = Arc::new(TransformationCache::new());
        let rewriter = ClassRewriter::new(
            self.transformer,
            EligibilityPolicy::from_config(&self.config.eligibility),
            AdviceBinding::new(AdviceKind::Instance, instance_id),
            AdviceBinding::new(AdviceKind::Static, static_id),
        );
        let hook = Arc::new(InstrumentationHook::new(
            Arc::clone(&cache),
            rewriter,
            Arc::clone(&logger),
        ));

        match bound {
            Some((runtime, _)) => {
                logger.trace("Installing instrumentation hook");
                runtime.add_hook(Arc::clone(&hook) as _, true);
                lifecycle.attach(runtime);
            }
            None => lifecycle.mark_unavailable(),
        }

        Ok(InterceptionEngine {
            attacher: self.attacher,
            lifecycle,
            cache,
            hook,
            registry,
            instance_advice,
            static_advice,
            logger,
        })
    }
}

/// Slots of the registry kept by an engine that never attached
const DETACHED_CAPACITY: usize = 2;

/// Run the loader and reject a registry the host does not dispatch through
fn load_registry(
    bootstrap: &dyn BootstrapLoader,
    runtime: &dyn HostRuntime,
) -> Result<Arc<DispatchRegistry>> {
    let registry = bootstrap.load(runtime)?;
    match runtime.boot_registry() {
        Some(boot) if !Arc::ptr_eq(&boot, &registry) => Err(EngineError::BootstrapFailed(
            "loaded registry is not the one the host dispatches through".into(),
        )),
        _ => Ok(registry),
    }
}

fn advice_error(e: EngineError) -> EngineError {
    EngineError::AdviceRegistration(e.to_string())
}

/// Rewrites requested classes so their calls reach the advice handlers
pub struct InterceptionEngine {
    attacher: Arc<dyn HostAttacher>,
    lifecycle: Lifecycle,
    cache: Arc<TransformationCache>,
    hook: Arc<InstrumentationHook>,
    registry: Arc<DispatchRegistry>,
    instance_advice: Arc<InstanceAdvice>,
    static_advice: Arc<StaticAdvice>,
    logger: Arc<dyn AgentLogger>,
}

impl InterceptionEngine {
    pub fn builder(
        attacher: Arc<dyn HostAttacher>,
        transformer: Arc<dyn CodeTransformer>,
    ) -> EngineBuilder {
        EngineBuilder::new(attacher, transformer)
    }

    /// Rewrite `classes`. `false` means some classes stay uninstrumented:
    /// the engine is not attached, or the host refused the batch. Classes
    /// in a refused batch are not retried.
    pub fn inject<I>(&self, classes: I) -> bool
    where
        I: IntoIterator<Item = ClassIdentity>,
    {
        self.request_transform(classes).is_ok()
    }

    /// Like [`inject`](Self::inject), reporting how many classes were sent
    /// for redefinition or why the request failed
    pub fn request_transform<I>(&self, classes: I) -> Result<usize>
    where
        I: IntoIterator<Item = ClassIdentity>,
    {
        let runtime = self.lifecycle.binding().ok_or_else(|| {
            EngineError::AttachmentUnavailable(format!("engine is {}", self.lifecycle.state()))
        })?;

        metrics::counter!("intercept.inject.requests").increment(1);

        let pending = self.cache.claim(classes);
        if pending.is_empty() {
            return Ok(0);
        }

        self.logger
            .trace(&format!("Injecting handler to {}", describe(&pending)));

        self.redefine(runtime.as_ref(), &pending)?;
        self.logger.trace("Injected OK");
        Ok(pending.len())
    }

    fn redefine(&self, runtime: &dyn HostRuntime, pending: &[ClassIdentity]) -> Result<()> {
        runtime.request_redefinition(pending).map_err(|e| {
            metrics::counter!("intercept.inject.rejected").increment(1);
            self.logger.trace_error(&e, "Redefinition refused");
            EngineError::Unmodifiable(pending.iter().map(ToString::to_string).collect())
        })
    }

    /// Re-establish the host binding after [`disable`](Self::disable)
    pub fn enable(&self) -> LifecycleState {
        let state = self.lifecycle.enable(self.attacher.current_binding());
        self.logger.trace(&format!("Engine {}", state));
        state
    }

    /// Refuse new requests. The hook stays installed.
    pub fn disable(&self) -> LifecycleState {
        let state = self.lifecycle.disable();
        self.logger.trace(&format!("Engine {}", state));
        state
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Whether `class` has been claimed for rewriting
    pub fn is_transformed(&self, class: &ClassIdentity) -> bool {
        self.cache.contains(class)
    }

    pub fn transformed_count(&self) -> usize {
        self.cache.len()
    }

    pub fn hook_stats(&self) -> HookStats {
        self.hook.stats()
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    /// (instance, static) handler IDs
    pub fn advice_ids(&self) -> (AdviceId, AdviceId) {
        (self.instance_advice.id(), self.static_advice.id())
    }

    pub fn instance_advice(&self) -> &Arc<InstanceAdvice> {
        &self.instance_advice
    }

    pub fn static_advice(&self) -> &Arc<StaticAdvice> {
        &self.static_advice
    }

    /// Route instance calls on `receiver` to `handler`
    pub fn intercept_instance(&self, receiver: ObjectId, handler: Arc<dyn InvocationHandler>) {
        self.instance_advice.intercept(receiver, handler);
    }

    /// Route static calls on `class` to `handler`
    pub fn intercept_static(&self, class: ClassIdentity, handler: Arc<dyn InvocationHandler>) {
        self.static_advice.intercept(class, handler);
    }
}

fn describe(classes: &[ClassIdentity]) -> String {
    let names: Vec<String> = classes.iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}
