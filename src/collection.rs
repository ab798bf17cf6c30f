use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::Serialize;
use serde_json::Value;

use crate::comparator::Record;
use crate::config::CollectionOptions;
use crate::error::{Error, Result};
use crate::scheduler::Debouncer;
use crate::store::{Backing, Store, Strategy};

struct Shared<E: Record> {
    name: String,
    store: RwLock<Backing<E>>,
    notifier: Option<Weak<Debouncer>>,
}

/// A named, ordered collection of records.
///
/// Cloning is cheap and every clone refers to the same elements. Lookups that
/// miss return `false` or `None`; every successful mutation schedules a
/// write-back when the collection belongs to a [`Database`](crate::Database).
pub struct Collection<E: Record> {
    shared: Arc<Shared<E>>,
}

impl<E: Record> Clone for Collection<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Record> fmt::Debug for Collection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.shared.name)
            .field("strategy", &self.strategy())
            .field("len", &self.len())
            .finish()
    }
}

impl<E: Record> Collection<E> {
    /// Creates a collection that is not persisted anywhere.
    pub fn new(options: CollectionOptions<E::Key>, elements: Vec<E>) -> Self {
        Self::build(options, elements, None)
    }

    pub(crate) fn attached(
        options: CollectionOptions<E::Key>,
        elements: Vec<E>,
        debouncer: &Arc<Debouncer>,
    ) -> Self {
        Self::build(options, elements, Some(Arc::downgrade(debouncer)))
    }

    fn build(
        options: CollectionOptions<E::Key>,
        elements: Vec<E>,
        notifier: Option<Weak<Debouncer>>,
    ) -> Self {
        let store = Backing::new(options.strategy, options.comparator, elements);
        Self {
            shared: Arc::new(Shared {
                name: options.name,
                store: RwLock::new(store),
                notifier,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn strategy(&self) -> Strategy {
        self.read().strategy()
    }

    /// Inserts an element unless its key is already present.
    pub fn insert(&self, element: E) -> bool {
        let inserted = self.write().insert(element);
        if inserted {
            self.notify();
        }
        inserted
    }

    /// Applies a partial update to the element with the given key.
    pub fn update(&self, key: &E::Key, patch: E::Patch) -> bool {
        let updated = self.write().update(key, patch);
        if updated {
            self.notify();
        }
        updated
    }

    pub fn remove(&self, key: &E::Key) -> bool {
        let removed = self.write().remove(key);
        if removed {
            self.notify();
        }
        removed
    }

    /// Removes every element matching `predicate` and returns how many were removed.
    ///
    /// Matches are collected before anything is removed, and the whole batch
    /// schedules a single write-back. The predicate runs without the lock held,
    /// so it may query this collection.
    pub fn remove_all(&self, predicate: impl Fn(&E) -> bool) -> usize {
        let keys: Vec<E::Key> = self
            .iter()
            .filter(|element| predicate(element))
            .map(|element| element.key().clone())
            .collect();
        if keys.is_empty() {
            return 0;
        }

        let removed = {
            let mut store = self.write();
            keys.iter().filter(|key| store.remove(key)).count()
        };

        if removed > 0 {
            self.notify();
        }
        removed
    }

    pub fn has(&self, key: &E::Key) -> bool {
        self.read().find(key).is_some()
    }

    /// Whether any element matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&E) -> bool) -> bool {
        self.iter().any(|element| predicate(&element))
    }

    pub fn find(&self, key: &E::Key) -> Option<E> {
        self.read().find(key).cloned()
    }

    /// All elements matching `predicate`, in order.
    pub fn find_all(&self, predicate: impl Fn(&E) -> bool) -> Vec<E> {
        self.iter().filter(|element| predicate(element)).collect()
    }

    /// All elements, in order.
    pub fn list(&self) -> Vec<E> {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A lazy, ordered iterator over clones of the elements.
    ///
    /// No lock is held between steps: each step finds the successor of the
    /// last key it returned, so the collection may be mutated mid-iteration.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            collection: self,
            last: None,
            done: false,
        }
    }

    fn notify(&self) {
        if let Some(debouncer) = self.shared.notifier.as_ref().and_then(Weak::upgrade) {
            debouncer.notify();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Backing<E>> {
        self.shared.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Backing<E>> {
        self.shared.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Record + Serialize> Collection<E> {
    /// The ordered listing as a JSON array.
    pub(crate) fn to_json(&self) -> Result<Value> {
        let store = self.read();
        let elements: Vec<&E> = store.iter().collect();
        serde_json::to_value(elements).map_err(|e| Error::Encode(self.shared.name.clone(), e))
    }
}

pub struct Iter<'a, E: Record> {
    collection: &'a Collection<E>,
    last: Option<E::Key>,
    done: bool,
}

impl<E: Record> Iterator for Iter<'_, E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        if self.done {
            return None;
        }

        let next = {
            let store = self.collection.read();
            let found = match &self.last {
                None => store.first(),
                Some(key) => store.next_after(key),
            };
            found.cloned()
        };

        match next {
            Some(element) => {
                self.last = Some(element.key().clone());
                Some(element)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl<'a, E: Record> IntoIterator for &'a Collection<E> {
    type Item = E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
