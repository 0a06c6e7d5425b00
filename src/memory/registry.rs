//! The table of memory objects created while mounting.
//!
//! The registry is populated once, by the mounting algorithm, and never
//! changes shape afterwards. It holds no lock of its own: every lookup hands
//! out the shared object, and all synchronisation happens inside the object.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::memory_object::{MemoryObject, MemorySnapshot};
use crate::activation::ActivationBounds;
use crate::error::MindError;

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    objects: BTreeMap<String, Arc<MemoryObject>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `null` object. Fails if the name is taken.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        bounds: ActivationBounds,
    ) -> Result<Arc<MemoryObject>, MindError> {
        self.create_with_value(name, bounds, Value::Null)
    }

    /// Create an object with an initial (unversioned) payload.
    pub fn create_with_value(
        &mut self,
        name: impl Into<String>,
        bounds: ActivationBounds,
        value: Value,
    ) -> Result<Arc<MemoryObject>, MindError> {
        let name = name.into();
        if self.objects.contains_key(&name) {
            return Err(MindError::DuplicateMemoryName(name));
        }
        let object = Arc::new(MemoryObject::with_value(name.clone(), bounds, value));
        self.objects.insert(name, Arc::clone(&object));
        Ok(object)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MemoryObject>> {
        self.objects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Snapshot one object.
    pub fn read(&self, name: &str) -> Option<MemorySnapshot> {
        self.objects.get(name).map(|object| object.read())
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Names starting with `prefix`, e.g. every input of one motor.
    pub fn names_by_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.names().filter(move |name| name.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Snapshot every object.
    pub fn snapshot(&self) -> Vec<MemorySnapshot> {
        self.objects.values().map(|object| object.read()).collect()
    }

    /// Close every object. Once this returns, no write to any object in the
    /// registry can succeed.
    pub fn close_all(&self) {
        for object in self.objects.values() {
            object.close();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
