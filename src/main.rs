// src/main.rs
//! Interception demo
//!
//! Loads a class into the in-memory host runtime, injects the engine into
//! it and shows a recorded call, a substituted result and a raised failure.

use anyhow::{Context, Result};
use inline_intercept::host::{ClassImage, InMemoryRuntime, MemoryAttacher, MemoryTransformer};
use inline_intercept::observability::init_tracing;
use inline_intercept::{
    handler_fn, EngineConfig, Failure, InterceptionEngine, MethodDescription, ScopeId,
    TracingLogger, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> Result<()> {
    let config = EngineConfig::load().context("loading configuration")?;
    init_tracing(&config.logging)?;

    info!("Starting interception demo v{}", inline_intercept::VERSION);

    let runtime = Arc::new(InMemoryRuntime::with_global_registry());
    let engine = InterceptionEngine::builder(
        Arc::new(MemoryAttacher::new(Arc::clone(&runtime))),
        Arc::new(MemoryTransformer),
    )
    .logger(Arc::new(TracingLogger))
    .config(config)
    .build()?;
    info!("Engine {}", engine.state());

    let image = ClassImage::new("com.example.PaymentGateway")
        .with_field("endpoint", "Ljava/lang/String;")
        .with_method(MethodDescription::constructor(""))
        .with_method(MethodDescription::type_initializer(""))
        .with_method(MethodDescription::new("", "charge").with_descriptor("(J)Ljava/lang/String;"))
        .with_method(
            MethodDescription::new("", "currency")
                .with_static()
                .with_descriptor("()Ljava/lang/String;"),
        );
    let gateway = runtime.define_class(ScopeId(1), &image)?;
    runtime.define_body(&gateway, "charge", |_, args| {
        Ok(Value::Str(format!("charged {}", args[0].as_int().unwrap_or(0))))
    });
    runtime.define_body(&gateway, "currency", |_, _| Ok(Value::from("EUR")));

    if !engine.inject([gateway.clone()]) {
        error!("Could not instrument {}", gateway);
        return Ok(());
    }

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&recorded);
    let mock = runtime.new_instance(&gateway);
    engine.intercept_instance(
        mock,
        handler_fn(move |invocation, _original| {
            log.lock().push((invocation.method.name.clone(), invocation.args.to_vec()));
            Ok(Value::from("stubbed"))
        }),
    );
    engine.intercept_static(
        gateway.clone(),
        handler_fn(|_, _| Err(Failure::new("IllegalStateException", "currency unavailable"))),
    );

    let real = runtime.new_instance(&gateway);
    let charged = runtime.invoke(&gateway, "charge", Some(real), &[Value::Int(10)])?;
    info!("real.charge(10) = {:?}", charged);
    let stubbed = runtime.invoke(&gateway, "charge", Some(mock), &[Value::Int(25)])?;
    info!("mock.charge(25) = {:?}", stubbed);
    let currency = runtime.invoke(&gateway, "currency", None, &[])?;
    info!("currency() = {:?}", currency);
    info!("Recorded calls: {:?}", recorded.lock());
    info!("Hook stats: {:?}", engine.hook_stats());

    Ok(())
}
