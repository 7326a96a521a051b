// tests/engine_scenarios.rs
//! End-to-end behaviour of the engine against the in-memory host runtime

use inline_intercept::dispatch::{AdviceId, AdviceKind, CallResult, Dispatcher, Invocation};
use inline_intercept::host::memory::AdviceMarker;
use inline_intercept::host::{ClassImage, InMemoryRuntime, MemoryAttacher, MemoryBootstrap, MemoryTransformer};
use inline_intercept::model::Visibility;
use inline_intercept::transform::{CodeTransformer, TypeRewriter};
use inline_intercept::utils::errors::RewriteError;
use inline_intercept::{
    handler_fn, ClassIdentity, DispatchRegistry, EngineConfig, Failure, InterceptionEngine,
    LifecycleState, MethodDescription, ScopeId, Value,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Records every class handed to the transformer and fails for names in
/// `failing`
#[derive(Default)]
struct Probe {
    calls: Mutex<Vec<ClassIdentity>>,
    failing: HashSet<String>,
}

impl Probe {
    fn failing(names: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn count(&self) -> usize {
        self.calls.lock().len()
    }

    fn per_class(&self) -> HashMap<ClassIdentity, usize> {
        let mut counts = HashMap::new();
        for class in self.calls.lock().iter() {
            *counts.entry(class.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl CodeTransformer for Probe {
    fn redefine(
        &self,
        class: &ClassIdentity,
        definition: &[u8],
    ) -> Result<Box<dyn TypeRewriter>, RewriteError> {
        self.calls.lock().push(class.clone());
        if self.failing.contains(class.name()) {
            return Err(RewriteError::Transformer(format!("cannot handle {}", class.name())));
        }
        MemoryTransformer.redefine(class, definition)
    }
}

struct Harness {
    runtime: Arc<InMemoryRuntime>,
    probe: Arc<Probe>,
    engine: InterceptionEngine,
}

fn harness_with(probe: Probe, config: EngineConfig) -> Harness {
    let runtime = Arc::new(InMemoryRuntime::new(Arc::new(DispatchRegistry::with_capacity(16))));
    let probe = Arc::new(probe);
    let engine = InterceptionEngine::builder(
        Arc::new(MemoryAttacher::new(Arc::clone(&runtime))),
        Arc::clone(&probe) as Arc<dyn CodeTransformer>,
    )
    .bootstrap(Arc::new(MemoryBootstrap::new(&runtime)))
    .config(config)
    .build()
    .unwrap();

    Harness {
        runtime,
        probe,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(Probe::default(), EngineConfig::default())
}

fn simple_class(runtime: &InMemoryRuntime, scope: ScopeId, name: &str) -> ClassIdentity {
    let image = ClassImage::new(name)
        .with_method(MethodDescription::constructor(""))
        .with_method(MethodDescription::new("", "get").with_descriptor("()J"));
    let class = runtime.define_class(scope, &image).unwrap();
    runtime.define_body(&class, "get", |_, _| Ok(Value::Int(1)));
    class
}

#[test]
fn test_scenario_overlapping_requests() {
    let h = harness();
    let a = simple_class(&h.runtime, ScopeId(1), "app.A");
    let b = simple_class(&h.runtime, ScopeId(1), "app.B");
    let c = simple_class(&h.runtime, ScopeId(1), "app.C");

    assert!(h.engine.inject(vec![a.clone(), b.clone()]));
    assert_eq!(h.probe.count(), 2);
    assert!(h.engine.is_transformed(&a));
    assert!(h.engine.is_transformed(&b));

    assert!(h.engine.inject(vec![a.clone(), b.clone()]));
    assert_eq!(h.probe.count(), 2);

    assert!(h.engine.inject(vec![a.clone(), c.clone()]));
    assert_eq!(h.probe.count(), 3);
    assert_eq!(h.probe.calls.lock().last(), Some(&c));
}

#[test]
fn test_idempotent_request_issues_one_redefinition() {
    let h = harness();
    let a = simple_class(&h.runtime, ScopeId(1), "app.A");

    assert!(h.engine.inject([a.clone()]));
    assert!(h.engine.inject([a]));
    assert_eq!(h.runtime.redefinition_count(), 1);
}

#[test]
fn test_concurrent_requests_rewrite_each_class_once() {
    let h = harness();
    let classes: Vec<ClassIdentity> = (0..40)
        .map(|i| simple_class(&h.runtime, ScopeId(1), &format!("app.C{}", i)))
        .collect();
    let engine = Arc::new(h.engine);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            // each thread asks for an overlapping window of classes
            let batch: Vec<ClassIdentity> = classes
                .iter()
                .cycle()
                .skip(t * 5)
                .take(25)
                .cloned()
                .collect();
            std::thread::spawn(move || engine.inject(batch))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let per_class = h.probe.per_class();
    assert_eq!(per_class.len(), classes.len());
    assert!(per_class.values().all(|&n| n == 1));
    assert_eq!(engine.transformed_count(), classes.len());
}

#[test]
fn test_rewrite_failure_leaves_definition_identical() {
    let h = harness_with(Probe::failing(&["app.Broken"]), EngineConfig::default());
    let broken = simple_class(&h.runtime, ScopeId(1), "app.Broken");
    let fine = simple_class(&h.runtime, ScopeId(1), "app.Fine");
    let before = h.runtime.definition(&broken).unwrap();

    // the host accepted the batch; the broken class just stays as it was
    assert!(h.engine.inject([broken.clone(), fine.clone()]));
    assert_eq!(h.runtime.definition(&broken).unwrap(), before);
    assert!(h.runtime.image(&broken).unwrap().advised().is_empty());
    assert!(!h.runtime.image(&fine).unwrap().advised().is_empty());

    let stats = h.engine.hook_stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 1);
}

#[test]
fn test_eligibility_exclusions() {
    let h = harness();
    let image = ClassImage::new("java.util.Widget")
        .with_method(MethodDescription::constructor(""))
        .with_method(MethodDescription::type_initializer(""))
        .with_method(MethodDescription::new("", "finalize").with_visibility(Visibility::Protected))
        .with_method(MethodDescription::new("", "internal").with_visibility(Visibility::PackagePrivate))
        .with_method(MethodDescription::new("", "size").with_descriptor("()I"))
        .with_method(MethodDescription::new("", "freeze").with_final())
        .with_method(MethodDescription::new("", "empty").with_static())
        .with_method(MethodDescription::new("", "helper").with_visibility(Visibility::Private));
    let class = h.runtime.define_class(ScopeId::BOOTSTRAP, &image).unwrap();

    assert!(h.engine.inject([class.clone()]));

    let (instance_id, static_id) = h.engine.advice_ids();
    let advised: HashMap<String, AdviceMarker> = h
        .runtime
        .image(&class)
        .unwrap()
        .advised()
        .into_iter()
        .map(|(name, marker)| (name.to_string(), marker))
        .collect();

    for excluded in ["<init>", "<clinit>", "finalize", "internal", "helper"] {
        assert!(!advised.contains_key(excluded), "{} should not be advised", excluded);
    }
    assert_eq!(
        advised["size"],
        AdviceMarker { kind: AdviceKind::Instance, id: instance_id.get() }
    );
    assert_eq!(advised["freeze"].kind, AdviceKind::Instance);
    assert_eq!(
        advised["empty"],
        AdviceMarker { kind: AdviceKind::Static, id: static_id.get() }
    );
    assert_eq!(advised.len(), 3);
}

#[test]
fn test_configured_foreign_prefix() {
    let mut config = EngineConfig::default();
    config.eligibility.foreign_prefixes = vec!["platform.".to_string()];
    let h = harness_with(Probe::default(), config);

    let image = ClassImage::new("platform.Core")
        .with_method(MethodDescription::new("", "hidden").with_visibility(Visibility::PackagePrivate))
        .with_method(MethodDescription::new("", "visible"));
    let class = h.runtime.define_class(ScopeId(1), &image).unwrap();

    assert!(h.engine.inject([class.clone()]));
    let image = h.runtime.image(&class).unwrap();
    assert!(image.method("hidden").unwrap().advice.is_none());
    assert!(image.method("visible").unwrap().advice.is_some());
}

#[test]
fn test_disabled_engine_is_noop() {
    let h = harness();
    let a = simple_class(&h.runtime, ScopeId(1), "app.A");

    h.engine.disable();
    assert_eq!(h.engine.state(), LifecycleState::Disabled);
    assert!(!h.engine.inject([a.clone()]));
    assert_eq!(h.engine.transformed_count(), 0);
    assert_eq!(h.probe.count(), 0);

    h.engine.enable();
    assert!(h.engine.inject([a]));
    assert_eq!(h.probe.count(), 1);
}

#[test]
fn test_hook_ignores_classes_loaded_later() {
    let h = harness();
    let a = simple_class(&h.runtime, ScopeId(1), "app.A");
    assert!(h.engine.inject([a]));

    // a class loaded after injection is not in the interest set
    let later = simple_class(&h.runtime, ScopeId(1), "app.Later");
    assert!(h.runtime.image(&later).unwrap().advised().is_empty());
    assert_eq!(h.probe.count(), 1);
}

#[test]
fn test_same_name_in_other_scope_is_separate() {
    let h = harness();
    let first = simple_class(&h.runtime, ScopeId(1), "app.Shared");
    let second = simple_class(&h.runtime, ScopeId(2), "app.Shared");

    assert!(h.engine.inject([first.clone()]));
    assert!(h.engine.is_transformed(&first));
    assert!(!h.engine.is_transformed(&second));
    assert!(h.runtime.image(&second).unwrap().advised().is_empty());

    assert!(h.engine.inject([first, second.clone()]));
    assert!(!h.runtime.image(&second).unwrap().advised().is_empty());
    assert_eq!(h.probe.count(), 2);
}

#[test]
fn test_registry_reachable_from_isolated_scope() {
    struct Answer;

    impl Dispatcher for Answer {
        fn dispatch(
            &self,
            invocation: &Invocation<'_>,
            original: &dyn Fn(&[Value]) -> CallResult,
        ) -> Option<CallResult> {
            let real = original(invocation.args).ok()?.as_int()?;
            Some(Ok(Value::Int(real + 41)))
        }
    }

    let registry = Arc::new(DispatchRegistry::with_capacity(16));
    registry
        .register(AdviceId::new(7).unwrap(), Arc::new(Answer))
        .unwrap();
    let runtime = InMemoryRuntime::new(Arc::clone(&registry));

    // code in an unrelated scope that only carries the numeric handler ID
    let mut image = ClassImage::new("isolated.Client")
        .with_method(MethodDescription::new("", "compute").with_static());
    image.methods[0].advice = Some(AdviceMarker {
        kind: AdviceKind::Static,
        id: 7,
    });
    let class = runtime.define_class(ScopeId(99), &image).unwrap();
    runtime.define_body(&class, "compute", |_, _| Ok(Value::Int(1)));

    assert_eq!(
        runtime.invoke(&class, "compute", None, &[]).unwrap(),
        Ok(Value::Int(42))
    );
}

#[test]
fn test_call_recording_and_substitution() {
    let h = harness();
    let image = ClassImage::new("app.Repository")
        .with_method(MethodDescription::new("", "find").with_descriptor("(J)Ljava/lang/String;"))
        .with_method(MethodDescription::new("", "count").with_static().with_descriptor("()J"));
    let class = h.runtime.define_class(ScopeId(1), &image).unwrap();
    h.runtime.define_body(&class, "find", |_, args| {
        Ok(Value::Str(format!("row {}", args[0].as_int().unwrap_or(-1))))
    });
    h.runtime.define_body(&class, "count", |_, _| Ok(Value::Int(10)));
    assert!(h.engine.inject([class.clone()]));

    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let repo = h.runtime.new_instance(&class);
    h.engine.intercept_instance(
        repo,
        handler_fn(move |invocation, original| {
            sink.lock().push(invocation.args.to_vec());
            // call through with a rewritten argument
            original(&[Value::Int(invocation.args[0].as_int().unwrap_or(0) * 2)])
        }),
    );
    h.engine.intercept_static(
        class.clone(),
        handler_fn(|_, _| Err(Failure::new("IllegalStateException", "no database"))),
    );

    let row = h.runtime.invoke(&class, "find", Some(repo), &[Value::Int(21)]).unwrap();
    assert_eq!(row, Ok(Value::from("row 42")));
    assert_eq!(*captured.lock(), vec![vec![Value::Int(21)]]);

    let count = h.runtime.invoke(&class, "count", None, &[]).unwrap();
    assert_eq!(count, Err(Failure::new("IllegalStateException", "no database")));

    assert!(h.engine.instance_advice().release(repo));
    assert!(h.engine.static_advice().release(&class));
    assert_eq!(
        h.runtime.invoke(&class, "find", Some(repo), &[Value::Int(21)]).unwrap(),
        Ok(Value::from("row 21"))
    );
    assert_eq!(h.runtime.invoke(&class, "count", None, &[]).unwrap(), Ok(Value::Int(10)));
}

#[test]
fn test_engines_with_separate_registries_coexist() {
    let first = harness();
    let second = harness();
    let a = simple_class(&first.runtime, ScopeId(1), "app.A");
    let b = simple_class(&second.runtime, ScopeId(1), "app.A");

    assert!(first.engine.inject([a.clone()]));
    assert!(second.engine.inject([b.clone()]));
    assert_eq!(first.probe.count(), 1);
    assert_eq!(second.probe.count(), 1);

    let obj = first.runtime.new_instance(&a);
    first.engine.intercept_instance(obj, handler_fn(|_, _| Ok(Value::Int(5))));
    assert_eq!(first.runtime.invoke(&a, "get", Some(obj), &[]).unwrap(), Ok(Value::Int(5)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_each_class_rewritten_at_most_once(
        batches in prop::collection::vec(prop::collection::vec(0usize..12, 1..6), 1..8)
    ) {
        let h = harness();
        let classes: Vec<ClassIdentity> = (0..12)
            .map(|i| simple_class(&h.runtime, ScopeId(1), &format!("p.C{}", i)))
            .collect();

        for batch in &batches {
            let request: Vec<ClassIdentity> = batch.iter().map(|&i| classes[i].clone()).collect();
            prop_assert!(h.engine.inject(request));
        }

        let requested: HashSet<usize> = batches.iter().flatten().copied().collect();
        let per_class = h.probe.per_class();
        prop_assert_eq!(per_class.len(), requested.len());
        prop_assert!(per_class.values().all(|&n| n == 1));
    }
}
