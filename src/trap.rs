//! Property and method interception
//!
//! The engine is the single audit point for every behavioral change to the
//! host environment. It never rewrites a registry slot in place: installing a
//! trap records an adapter entry (original value + optional override) that the
//! page context consults on each read, so the registry keeps the untouched
//! underlying values.
//!
//! Installation is best-effort instrumentation, never a correctness-critical
//! path: locked descriptors, missing properties, and repeat installs are
//! skipped with a diagnostic rather than surfaced as errors.

use crate::host::{HostError, HostRegistry, ObjectId};
use crate::value::Value;
use fnv::FnvHashMap;
use tracing::{debug, warn};

/// Result of a trap or wrap installation attempt. Informational; none of
/// these is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapOutcome {
    Installed,
    /// Already trapped; install is idempotent per (object, property)
    AlreadyInstalled,
    /// Descriptor is locked; property left untouched
    NotConfigurable,
    /// No such own property (or method) on the target
    MissingProperty,
}

/// Adapter entry for one trapped property read.
#[derive(Debug, Clone)]
pub struct PropertyTrap {
    /// Value stored at install time, returned when no override is configured
    pub original: Value,
    /// Configured replacement value, if any
    pub override_value: Option<Value>,
}

/// How a wrapped method behaves after reporting.
#[derive(Debug, Clone)]
pub enum MethodTrap {
    /// Report, then delegate to the native implementation unchanged
    Observe,
    /// Report, then return this fixed value without delegating
    Replace(Value),
}

/// Interception engine: the trap tables for one page context.
pub struct InterceptionEngine {
    properties: FnvHashMap<(ObjectId, String), PropertyTrap>,
    methods: FnvHashMap<(ObjectId, String), MethodTrap>,
}

impl InterceptionEngine {
    pub fn new() -> Self {
        Self {
            properties: FnvHashMap::default(),
            methods: FnvHashMap::default(),
        }
    }

    /// Install a read trap on `object.property`, optionally overriding the
    /// returned value.
    ///
    /// Preconditions checked here, per the error taxonomy: the property must
    /// exist as an own slot and its descriptor must be configurable. Failing
    /// either logs and skips; reads of the property then behave exactly as if
    /// no install was attempted.
    pub fn install_trap(
        &mut self,
        registry: &HostRegistry,
        object: ObjectId,
        property: &str,
        override_value: Option<Value>,
    ) -> TrapOutcome {
        let key = (object, property.to_string());
        if self.properties.contains_key(&key) {
            return TrapOutcome::AlreadyInstalled;
        }

        let Ok(host_object) = registry.object(object) else {
            warn!("cannot trap property '{}': unknown object", property);
            return TrapOutcome::MissingProperty;
        };
        let name = host_object.display_name();

        let Some(descriptor) = host_object.descriptor(property) else {
            warn!("{}.{} does not exist, skipping trap", name, property);
            return TrapOutcome::MissingProperty;
        };
        if !descriptor.configurable {
            warn!("{}.{} is not configurable", name, property);
            return TrapOutcome::NotConfigurable;
        }

        debug!(object = name, property, "trap installed");
        self.properties.insert(
            key,
            PropertyTrap {
                original: descriptor.value.clone(),
                override_value,
            },
        );
        TrapOutcome::Installed
    }

    /// Wrap a method with report-then-delegate behavior.
    pub fn wrap_method(
        &mut self,
        registry: &HostRegistry,
        object: ObjectId,
        method: &str,
    ) -> TrapOutcome {
        self.install_method_trap(registry, object, method, MethodTrap::Observe)
    }

    /// Replace a method's return value entirely: report, then return `value`
    /// without invoking the native implementation.
    pub fn replace_method(
        &mut self,
        registry: &HostRegistry,
        object: ObjectId,
        method: &str,
        value: Value,
    ) -> TrapOutcome {
        self.install_method_trap(registry, object, method, MethodTrap::Replace(value))
    }

    fn install_method_trap(
        &mut self,
        registry: &HostRegistry,
        object: ObjectId,
        method: &str,
        trap: MethodTrap,
    ) -> TrapOutcome {
        let key = (object, method.to_string());
        if self.methods.contains_key(&key) {
            return TrapOutcome::AlreadyInstalled;
        }

        let Ok(host_object) = registry.object(object) else {
            warn!("cannot wrap method '{}': unknown object", method);
            return TrapOutcome::MissingProperty;
        };
        if !host_object.has_method(method) {
            warn!(
                "{}.{} is not a method, skipping wrap",
                host_object.display_name(),
                method
            );
            return TrapOutcome::MissingProperty;
        }

        debug!(object = host_object.display_name(), method, "method wrapped");
        self.methods.insert(key, trap);
        TrapOutcome::Installed
    }

    /// Define a property that does not natively exist on the target, so later
    /// trapping treats it uniformly with native ones. Defined configurable.
    pub fn define_synthetic(
        &mut self,
        registry: &mut HostRegistry,
        object: ObjectId,
        property: &str,
        value: Value,
    ) -> Result<(), HostError> {
        let host_object = registry.object_mut(object)?;
        if host_object.descriptor(property).is_some() {
            debug!(
                "{}.{} already exists, synthetic definition skipped",
                host_object.display_name(),
                property
            );
            return Ok(());
        }
        host_object.define_property(property, value, true);
        Ok(())
    }

    /// Snapshot of the trap for a property read, if one is installed.
    pub fn property_trap(&self, object: ObjectId, property: &str) -> Option<PropertyTrap> {
        self.properties.get(&(object, property.to_string())).cloned()
    }

    /// Snapshot of the trap for a method call, if one is installed.
    pub fn method_trap(&self, object: ObjectId, method: &str) -> Option<MethodTrap> {
        self.methods.get(&(object, method.to_string())).cloned()
    }

    /// Number of installed property traps.
    pub fn trapped_properties(&self) -> usize {
        self.properties.len()
    }
}

impl Default for InterceptionEngine {
    fn default() -> Self {
        Self::new()
    }
}
