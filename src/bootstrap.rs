//! Environment construction and trap installation
//!
//! Builds the default host environment (the objects a page script sees, with
//! their real underlying values), then walks the configuration: synthetic
//! properties first so they trap uniformly, then the per-object sweeps, then
//! the method wraps. Every step is best-effort; a missing object or locked
//! slot is logged and skipped, never fatal to the page.

use crate::config::InstrumentationConfig;
use crate::context::PageContext;
use crate::dispatch::{EventDispatcher, EventSink, TraceSink};
use crate::host::{HostObject, HostRegistry};
use crate::value::Value;
use tracing::warn;

/// Register a fresh object and hand back its table for population.
///
/// Names here are unique literals on a registry this module just created, so
/// neither the registration nor the immediate handle lookup can fail.
fn define_object<'a>(registry: &'a mut HostRegistry, name: &str) -> &'a mut HostObject {
    let id = registry.register(name).expect("fresh registry");
    registry.object_mut(id).expect("fresh registry")
}

/// Real-looking underlying values for the default environment. Traps fall
/// back to these when no override is configured.
fn build_default_registry() -> HostRegistry {
    let mut registry = HostRegistry::new();

    let navigator = define_object(&mut registry, "Navigator");
    navigator.define_property("appCodeName", Value::from("Mozilla"), true);
    navigator.define_property("appName", Value::from("Netscape"), true);
    navigator.define_property(
        "appVersion",
        Value::from("5.0 (X11; Linux x86_64) AppleWebKit/537.36"),
        true,
    );
    navigator.define_property("doNotTrack", Value::Undefined, true);
    navigator.define_property("language", Value::from("de-DE"), true);
    navigator.define_property("mimeTypes", Value::List(vec![Value::from("application/pdf")]), true);
    navigator.define_property("platform", Value::from("Linux x86_64"), true);
    navigator.define_property("plugins", Value::List(vec![Value::from("PDF Viewer")]), true);
    navigator.define_property(
        "userAgent",
        Value::from(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/33.0.1750.152 Safari/537.36",
        ),
        true,
    );
    navigator.define_property("vendor", Value::from("Google Inc."), true);
    // productSub is locked in this environment; trapping it must no-op
    navigator.define_property("productSub", Value::from("20030107"), false);

    let screen = define_object(&mut registry, "Screen");
    screen.define_property("availWidth", Value::Int(1920), true);
    screen.define_property("availHeight", Value::Int(1040), true);
    screen.define_property("width", Value::Int(1920), true);
    screen.define_property("height", Value::Int(1080), true);
    screen.define_property("colorDepth", Value::Int(24), true);

    let window = define_object(&mut registry, "Window");
    window.define_property("innerWidth", Value::Int(1920), true);
    window.define_property("innerHeight", Value::Int(948), true);
    window.define_property("location", Value::from("about:blank"), false);

    let date_proto = define_object(&mut registry, "Date.prototype");
    date_proto.define_method("getTimezoneOffset", Box::new(|_| Value::Int(-120)));

    let canvas_proto = define_object(&mut registry, "HTMLCanvasElement.prototype");
    canvas_proto.define_method(
        "toDataURL",
        Box::new(|_| Value::from("data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==")),
    );

    registry
}

/// Bootstrap a fully instrumented page context with no collector attached
/// (batches go to the trace log).
pub fn bootstrap(config: &InstrumentationConfig) -> PageContext {
    bootstrap_with_sink(config, Box::new(TraceSink))
}

/// Bootstrap a fully instrumented page context delivering batches to `sink`.
pub fn bootstrap_with_sink(config: &InstrumentationConfig, sink: Box<dyn EventSink>) -> PageContext {
    let registry = build_default_registry();
    let dispatcher = EventDispatcher::new(&config.correlation_id, sink);
    let mut context = PageContext::new(registry, dispatcher);

    // synthetics first: they participate in the sweeps below like native slots
    for synthetic in &config.synthetics {
        let Some(id) = context.registry().lookup(&synthetic.obj) else {
            warn!(object = %synthetic.obj, "synthetic target missing, skipped");
            continue;
        };
        if let Err(e) = context.define_synthetic(id, &synthetic.prop, synthetic.value.clone()) {
            warn!(error = %e, "synthetic definition failed, skipped");
        }
    }

    for target in &config.targets {
        let Some(id) = context.registry().lookup(&target.obj) else {
            warn!(object = %target.obj, "trap target missing, skipped");
            continue;
        };

        if target.trap_all {
            let properties: Vec<String> = context
                .registry()
                .object(id)
                .map(|o| o.own_properties().map(str::to_string).collect())
                .unwrap_or_default();
            for prop in properties {
                let override_value = config.override_for(&target.obj, &prop).cloned();
                context.install_trap(id, &prop, override_value);
            }
        } else {
            for entry in &target.overrides {
                context.install_trap(id, &entry.prop, entry.value.clone());
            }
        }
    }

    for method in &config.methods {
        let Some(id) = context.registry().lookup(&method.obj) else {
            warn!(object = %method.obj, "method target missing, skipped");
            continue;
        };
        match &method.replace_with {
            Some(value) => context.replace_method(id, &method.method, value.clone()),
            None => context.wrap_method(id, &method.method),
        };
    }

    context.attach_font_probe_detector();
    context
}
