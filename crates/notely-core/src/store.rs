use std::cell::RefCell;
use std::collections::HashMap;

use crate::Error;

/// String-keyed, string-valued store holding whole serialized values.
///
/// Implemented by the in-memory store below, the JSON file directory in
/// `notely-files` and the SQLite table in `notely-sqlite`. All calls are
/// synchronous and complete before returning.
pub trait KeyValueStore {
    /// Read the value in a slot, or `None` if the slot was never written.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Replace the value in a slot.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value)
    }
}

/// Process-local store, mostly useful for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
    writes: RefCell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}
