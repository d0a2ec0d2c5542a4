//! Page-load context
//!
//! Single owner of all per-page state: the host object registry, the document,
//! the script call stack, the interception engine, the dispatcher, and the
//! font-probe detector. `read_property` and `call_method` are the page-script
//! entry points; both run synchronously on the caller's turn. `advance` moves
//! the virtual clock and runs the deferred work of later turns (queued
//! mutation batches, due debounced flushes) to completion, modelling the
//! host's cooperative single-threaded scheduler.
//!
//! Nothing in the trap path returns an error for instrumentation reasons:
//! a trapped read can fail only for the same reasons an untrapped one can
//! (unknown object).

use crate::dispatch::{AccessEvent, EventDispatcher};
use crate::dom::Document;
use crate::host::{HostError, HostRegistry, ObjectId};
use crate::mutation::FontProbeDetector;
use crate::origin::{
    strip_position_suffix, CallFrame, OriginProvider, ScriptStack, StackOriginProvider,
};
use crate::schedule::{Tick, VirtualClock};
use crate::trap::{InterceptionEngine, MethodTrap, TrapOutcome};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// RAII guard for one script frame; pops the frame when dropped.
pub struct FrameGuard {
    stack: Rc<RefCell<ScriptStack>>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// One page load's instrumentation context.
pub struct PageContext {
    registry: HostRegistry,
    document: Document,
    stack: Rc<RefCell<ScriptStack>>,
    origin: Box<dyn OriginProvider>,
    engine: InterceptionEngine,
    dispatcher: EventDispatcher,
    detector: Option<FontProbeDetector>,
    clock: VirtualClock,
}

impl PageContext {
    /// Build a context over a populated registry. The stack-walking origin
    /// provider is installed by default; `with_origin_provider` swaps it.
    pub fn new(registry: HostRegistry, dispatcher: EventDispatcher) -> Self {
        let stack = Rc::new(RefCell::new(ScriptStack::new()));
        let origin = Box::new(StackOriginProvider::new(Rc::clone(&stack)));
        Self {
            registry,
            document: Document::new(),
            stack,
            origin,
            engine: InterceptionEngine::new(),
            dispatcher,
            detector: None,
            clock: VirtualClock::new(),
        }
    }

    /// Substitute a coarser origin provider (reduced attribution precision
    /// behind the same interface).
    pub fn with_origin_provider(mut self, origin: Box<dyn OriginProvider>) -> Self {
        self.origin = origin;
        self
    }

    /// Attach the font-probe detector (subscribes to document mutations).
    pub fn attach_font_probe_detector(&mut self) {
        if self.detector.is_none() {
            self.detector = Some(FontProbeDetector::new());
        }
    }

    /// True while the detector is subscribed (active, not yet retired).
    pub fn font_probe_detector_active(&self) -> bool {
        self.detector.is_some()
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HostRegistry {
        &mut self.registry
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn engine(&self) -> &InterceptionEngine {
        &self.engine
    }

    /// Install a read trap; see [`InterceptionEngine::install_trap`].
    pub fn install_trap(
        &mut self,
        object: ObjectId,
        property: &str,
        override_value: Option<Value>,
    ) -> TrapOutcome {
        self.engine
            .install_trap(&self.registry, object, property, override_value)
    }

    /// Wrap a method with report-then-delegate behavior.
    pub fn wrap_method(&mut self, object: ObjectId, method: &str) -> TrapOutcome {
        self.engine.wrap_method(&self.registry, object, method)
    }

    /// Replace a method's return value entirely.
    pub fn replace_method(&mut self, object: ObjectId, method: &str, value: Value) -> TrapOutcome {
        self.engine.replace_method(&self.registry, object, method, value)
    }

    /// Define a synthetic property so later trapping treats it uniformly.
    pub fn define_synthetic(
        &mut self,
        object: ObjectId,
        property: &str,
        value: Value,
    ) -> Result<(), HostError> {
        self.engine
            .define_synthetic(&mut self.registry, object, property, value)
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Enter a script frame; the guard pops it on drop.
    pub fn enter_script(&self, file: &str, line: u32, column: u32) -> FrameGuard {
        self.push_frame(CallFrame::script(file, line, column))
    }

    /// Enter an evaluated-code frame carrying its eval descriptor.
    pub fn enter_eval(&self, descriptor: &str, line: u32, column: u32) -> FrameGuard {
        self.push_frame(CallFrame::eval(descriptor, line, column))
    }

    /// Enter a frame whose file name is an anonymous placeholder
    /// (timer-scheduled code).
    pub fn enter_anonymous(&self, line: u32, column: u32) -> FrameGuard {
        self.push_frame(CallFrame::anonymous(line, column))
    }

    fn push_frame(&self, frame: CallFrame) -> FrameGuard {
        self.stack.borrow_mut().push(frame);
        FrameGuard {
            stack: Rc::clone(&self.stack),
        }
    }

    /// Read `object.property` as page script would.
    ///
    /// Trapped slots report exactly one access event before returning either
    /// the configured override or the original stored value. Untrapped slots
    /// read straight from the registry.
    pub fn read_property(&mut self, object: ObjectId, property: &str) -> Result<Value, HostError> {
        let Some(trap) = self.engine.property_trap(object, property) else {
            return Ok(self.registry.object(object)?.raw_value(property));
        };

        let display_name = self.registry.object(object)?.display_name().to_string();
        let origin = self.resolve_origin_for_trap();
        self.emit(&display_name, property, origin);

        Ok(trap.override_value.unwrap_or(trap.original))
    }

    /// Convenience: read by object display name.
    pub fn read_property_of(&mut self, object_name: &str, property: &str) -> Result<Value, HostError> {
        let id = self
            .registry
            .lookup(object_name)
            .ok_or_else(|| HostError::UnknownObjectName(object_name.to_string()))?;
        self.read_property(id, property)
    }

    /// Call `object.method(args)` as page script would.
    ///
    /// Wrapped methods report, then delegate to the native implementation
    /// with the original arguments, returning its result unchanged. Replaced
    /// methods report, then return the configured value without delegating.
    pub fn call_method(
        &mut self,
        object: ObjectId,
        method: &str,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let Some(trap) = self.engine.method_trap(object, method) else {
            return self.registry.invoke(object, method, args);
        };

        let display_name = self.registry.object(object)?.display_name().to_string();
        let origin = self.resolve_origin_for_trap();
        self.emit(&display_name, method, origin);

        match trap {
            MethodTrap::Observe => self.registry.invoke(object, method, args),
            MethodTrap::Replace(value) => Ok(value),
        }
    }

    /// Advance the cooperative clock, running deferred callbacks that became
    /// due: mutation batches queued by earlier turns, then any due flush.
    pub fn advance(&mut self, ticks: Tick) {
        let records = self.document.take_pending_mutations();
        if !records.is_empty() {
            if let Some(mut detector) = self.detector.take() {
                let now = self.clock.now();
                let fired = detector.process(&records, &self.document, &mut self.dispatcher, now);
                if !fired {
                    // not fired: keep the subscription; fired: retired for
                    // the rest of the page load
                    self.detector = Some(detector);
                }
            }
        }

        let now = self.clock.advance(ticks);
        self.dispatcher.poll(now);
    }

    /// Resolve the caller's origin with the trap's own frame on the stack, as
    /// a native getter would appear mid-resolution.
    fn resolve_origin_for_trap(&self) -> Option<String> {
        self.stack.borrow_mut().push(CallFrame::instrumentation());
        let origin = self.origin.resolve_caller_origin();
        self.stack.borrow_mut().pop();
        if origin.is_empty() {
            None
        } else {
            Some(origin)
        }
    }

    fn emit(&mut self, object: &str, property: &str, origin: Option<String>) {
        let script_url = origin.map(|o| strip_position_suffix(&o));
        let now = self.clock.now();
        self.dispatcher
            .enqueue(AccessEvent::new(object, property, script_url), now);
    }
}
