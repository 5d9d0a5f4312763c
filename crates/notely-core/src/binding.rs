//! Binding between one named slot of a [`KeyValueStore`] and one value.
//!
//! The slot is read once when the binding is created. Every update replaces
//! the whole value and writes its JSON form back before returning.

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, KeyValueStore};

/// Starting value used when the slot has never been written.
pub enum Initial<'a, T> {
    Value(T),
    Lazy(Box<dyn FnOnce() -> T + 'a>),
}

impl<'a, T> Initial<'a, T> {
    /// Defer building the default until the slot turns out to be empty.
    pub fn lazy(produce: impl FnOnce() -> T + 'a) -> Self {
        Initial::Lazy(Box::new(produce))
    }

    fn resolve(self) -> T {
        match self {
            Initial::Value(value) => value,
            Initial::Lazy(produce) => produce(),
        }
    }
}

impl<'a, T> From<T> for Initial<'a, T> {
    fn from(value: T) -> Self {
        Initial::Value(value)
    }
}

/// New value for a binding: either a replacement or a derivation from the
/// current value.
pub enum Update<'a, T> {
    Replace(T),
    With(Box<dyn FnOnce(&T) -> T + 'a>),
}

impl<'a, T> Update<'a, T> {
    pub fn with(derive: impl FnOnce(&T) -> T + 'a) -> Self {
        Update::With(Box::new(derive))
    }

    fn apply(self, current: &T) -> T {
        match self {
            Update::Replace(value) => value,
            Update::With(derive) => derive(current),
        }
    }
}

impl<'a, T> From<T> for Update<'a, T> {
    fn from(value: T) -> Self {
        Update::Replace(value)
    }
}

/// A value mirrored into one store slot.
#[derive(Debug)]
pub struct Binding<T> {
    key: String,
    value: T,
    revision: u64,
}

impl<T: Serialize + DeserializeOwned> Binding<T> {
    /// Load the slot named `key`, falling back to `initial` if it is empty.
    ///
    /// Stored text that is not valid JSON for `T` is returned as
    /// [`Error::Deserialization`].
    pub fn bind<'a, S: KeyValueStore + ?Sized>(
        store: &S,
        key: impl Into<String>,
        initial: impl Into<Initial<'a, T>>,
    ) -> Result<Self, Error> {
        let key = key.into();

        let value = match store.get(&key)? {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|source| {
                    Error::Deserialization {
                        key: key.clone(),
                        source,
                    }
                })?;
                info!("event=slot_load key={} bytes={}", key, json.len());
                value
            }
            None => {
                info!("event=slot_load key={} source=default", key);
                initial.into().resolve()
            }
        };

        Ok(Self {
            key,
            value,
            revision: 0,
        })
    }

    /// Compute the next value, write it to the slot, then make it current.
    ///
    /// If serialization or the write fails the current value is left as is.
    pub fn update<'a, S: KeyValueStore + ?Sized>(
        &mut self,
        store: &S,
        update: impl Into<Update<'a, T>>,
    ) -> Result<(), Error> {
        let next = update.into().apply(&self.value);

        let json = serde_json::to_string(&next).map_err(|source| Error::Serialization {
            key: self.key.clone(),
            source,
        })?;
        store.set(&self.key, &json)?;

        self.value = next;
        self.revision += 1;
        debug!(
            "event=slot_write key={} bytes={} revision={}",
            self.key,
            json.len(),
            self.revision
        );

        Ok(())
    }
}

impl<T> Binding<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Counter bumped by every successful update; identifies the current value.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, Tag};
    use std::cell::Cell;

    #[test]
    fn test_bind_empty_slot_uses_initial_value() {
        let store = MemoryStore::new();
        let binding: Binding<Vec<Tag>> = Binding::bind(&store, "TAGS", Vec::new()).unwrap();

        assert!(binding.get().is_empty());
        assert_eq!(binding.revision(), 0);
        // Nothing is written until the first update.
        assert_eq!(store.get("TAGS").unwrap(), None);
    }

    #[test]
    fn test_lazy_initial_runs_once_and_only_when_empty() {
        let calls = Cell::new(0);
        let store = MemoryStore::new();

        let binding: Binding<Vec<String>> = Binding::bind(
            &store,
            "NOTES",
            Initial::lazy(|| {
                calls.set(calls.get() + 1);
                vec!["seed".to_string()]
            }),
        )
        .unwrap();
        assert_eq!(binding.get(), &vec!["seed".to_string()]);
        assert_eq!(calls.get(), 1);

        store.set("NOTES", r#"["stored"]"#).unwrap();
        let binding: Binding<Vec<String>> = Binding::bind(
            &store,
            "NOTES",
            Initial::lazy(|| {
                calls.set(calls.get() + 1);
                Vec::new()
            }),
        )
        .unwrap();
        assert_eq!(binding.get(), &vec!["stored".to_string()]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_bind_invalid_json_is_deserialization_error() {
        let store = MemoryStore::new();
        store.set("TAGS", "{not json").unwrap();

        let err = Binding::<Vec<Tag>>::bind(&store, "TAGS", Vec::new()).unwrap_err();
        match err {
            Error::Deserialization { key, .. } => assert_eq!(key, "TAGS"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_update_with_value_and_with_function() {
        let store = MemoryStore::new();
        let mut binding: Binding<Vec<Tag>> = Binding::bind(&store, "TAGS", Vec::new()).unwrap();

        binding
            .update(&store, vec![Tag::new("t1", "work")])
            .unwrap();
        binding
            .update(
                &store,
                Update::with(|prev: &Vec<Tag>| {
                    let mut next = prev.clone();
                    next.push(Tag::new("t2", "home"));
                    next
                }),
            )
            .unwrap();

        assert_eq!(binding.get().len(), 2);
        assert_eq!(binding.revision(), 2);
        assert_eq!(store.write_count(), 2);
        assert_eq!(
            store.get("TAGS").unwrap().as_deref(),
            Some(r#"[{"id":"t1","label":"work"},{"id":"t2","label":"home"}]"#)
        );
    }

    #[test]
    fn test_round_trip_through_store() {
        let store = MemoryStore::new();
        let tags = vec![Tag::new("t1", "work"), Tag::new("t2", "ideas \"quoted\"")];

        let mut binding: Binding<Vec<Tag>> = Binding::bind(&store, "TAGS", Vec::new()).unwrap();
        binding.update(&store, tags.clone()).unwrap();

        let reloaded: Binding<Vec<Tag>> = Binding::bind(&store, "TAGS", Vec::new()).unwrap();
        assert_eq!(reloaded.get(), &tags);
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[test]
    fn test_failed_write_keeps_current_value() {
        let mut binding: Binding<Vec<Tag>> =
            Binding::bind(&FailingStore, "TAGS", Vec::new()).unwrap();

        let err = binding
            .update(&FailingStore, vec![Tag::new("t1", "work")])
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(binding.get().is_empty());
        assert_eq!(binding.revision(), 0);
    }
}
