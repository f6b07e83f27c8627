//! Test support: a scripted in-memory host.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use meshlens_core::Value;

use crate::host::Host;

/// Scripted `Host` whose tables can be rewritten between calls — also while
/// a cache or attribute store holds a shared borrow — with call counters
/// for memoization and one-fetch assertions.
#[derive(Default)]
pub struct FakeHost {
    scalars: RefCell<HashMap<String, Value>>,
    structures: RefCell<HashMap<String, Value>>,
    headers: RefCell<HashMap<String, String>>,
    pub scalar_calls: Cell<usize>,
    pub structured_calls: Cell<usize>,
    pub header_calls: Cell<usize>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scalar(&self, path: &[&str], value: Value) {
        self.scalars.borrow_mut().insert(path.join("/"), value);
    }

    pub fn set_structured(&self, path: &[&str], value: Value) {
        self.structures.borrow_mut().insert(path.join("/"), value);
    }

    pub fn set_header(&self, name: &str, value: &str) {
        self.headers
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }
}

impl Host for FakeHost {
    fn scalar(&self, path: &[&str]) -> Option<Value> {
        self.scalar_calls.set(self.scalar_calls.get() + 1);
        self.scalars.borrow().get(&path.join("/")).cloned()
    }

    fn structured(&self, path: &[&str]) -> Option<Value> {
        self.structured_calls.set(self.structured_calls.get() + 1);
        self.structures.borrow().get(&path.join("/")).cloned()
    }

    fn request_header(&self, name: &str) -> Option<String> {
        self.header_calls.set(self.header_calls.get() + 1);
        self.headers.borrow().get(name).cloned()
    }
}

/// Minimal well-formed identity metadata tree.
pub fn metadata_tree(name: &str, namespace: &str) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("NAME".to_string(), Value::from(name));
    fields.insert("NAMESPACE".to_string(), Value::from(namespace));
    fields.insert("WORKLOAD_NAME".to_string(), Value::from(name));
    Value::Map(fields)
}
