//! Host object registry
//!
//! Models the instrumented environment's global objects (`Navigator`, `Screen`,
//! `Window`, prototype objects) as an arena of [`HostObject`]s addressed by
//! stable [`ObjectId`] handles. Each object carries named property slots with a
//! `configurable` flag and named methods backed by native implementations.
//!
//! The registry is deliberately passive: it stores values and invokes natives,
//! nothing more. All interception state lives in the engine (`trap` module) so
//! that every behavioral change to the host environment is auditable in one
//! place, and the registry's own slots are never rewritten by a trap install.

use crate::value::Value;
use fnv::FnvHashMap;
use thiserror::Error;

/// Errors from host registry operations
#[derive(Error, Debug)]
pub enum HostError {
    #[error("unknown host object id {0:?}")]
    UnknownObject(ObjectId),
    #[error("no host object named '{0}'")]
    UnknownObjectName(String),
    #[error("host object '{0}' already registered")]
    DuplicateObject(String),
    #[error("{object}.{method} is not callable")]
    NotCallable { object: String, method: String },
}

/// Stable handle to a registered host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) u32);

/// A property slot on a host object.
///
/// `configurable: false` mirrors a locked descriptor: the interception engine
/// must refuse to trap such a slot.
#[derive(Debug, Clone)]
pub struct PropertySlot {
    pub value: Value,
    pub configurable: bool,
}

/// Native implementation backing a host method.
pub type NativeMethod = Box<dyn Fn(&[Value]) -> Value>;

/// A host object: display name plus property and method tables.
///
/// Property definition order is preserved so that "trap every own property"
/// sweeps are deterministic.
pub struct HostObject {
    display_name: String,
    properties: FnvHashMap<String, PropertySlot>,
    property_order: Vec<String>,
    methods: FnvHashMap<String, NativeMethod>,
}

impl HostObject {
    fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            properties: FnvHashMap::default(),
            property_order: Vec::new(),
            methods: FnvHashMap::default(),
        }
    }

    /// Display name used in access reports (e.g. `Navigator`).
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Define or overwrite a property slot.
    pub fn define_property(&mut self, name: &str, value: Value, configurable: bool) {
        if !self.properties.contains_key(name) {
            self.property_order.push(name.to_string());
        }
        self.properties
            .insert(name.to_string(), PropertySlot { value, configurable });
    }

    /// Register a native method.
    pub fn define_method(&mut self, name: &str, imp: NativeMethod) {
        self.methods.insert(name.to_string(), imp);
    }

    /// Property descriptor lookup.
    pub fn descriptor(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.get(name)
    }

    /// Raw slot value, bypassing any traps. Missing slots read as `Undefined`.
    pub fn raw_value(&self, name: &str) -> Value {
        self.properties
            .get(name)
            .map(|slot| slot.value.clone())
            .unwrap_or(Value::Undefined)
    }

    /// True when a native method with this name exists.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Own property names in definition order.
    pub fn own_properties(&self) -> impl Iterator<Item = &str> {
        self.property_order.iter().map(|s| s.as_str())
    }
}

/// Arena of host objects with name-based lookup.
pub struct HostRegistry {
    objects: Vec<HostObject>,
    by_name: FnvHashMap<String, ObjectId>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            by_name: FnvHashMap::default(),
        }
    }

    /// Register a new host object under its display name.
    pub fn register(&mut self, display_name: &str) -> Result<ObjectId, HostError> {
        if self.by_name.contains_key(display_name) {
            return Err(HostError::DuplicateObject(display_name.to_string()));
        }
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(HostObject::new(display_name));
        self.by_name.insert(display_name.to_string(), id);
        Ok(id)
    }

    /// Handle lookup by display name.
    pub fn lookup(&self, display_name: &str) -> Option<ObjectId> {
        self.by_name.get(display_name).copied()
    }

    pub fn object(&self, id: ObjectId) -> Result<&HostObject, HostError> {
        self.objects
            .get(id.0 as usize)
            .ok_or(HostError::UnknownObject(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut HostObject, HostError> {
        self.objects
            .get_mut(id.0 as usize)
            .ok_or(HostError::UnknownObject(id))
    }

    /// Invoke a native method with the original argument list.
    pub fn invoke(&self, id: ObjectId, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let object = self.object(id)?;
        let imp = object.methods.get(method).ok_or_else(|| HostError::NotCallable {
            object: object.display_name.clone(),
            method: method.to_string(),
        })?;
        Ok(imp(args))
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}
