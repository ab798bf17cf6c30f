//! Ordered element stores.
//!
//! Two interchangeable backings implement [`Store`]:
//!
//! - [`SortedStore`]: a `Vec` kept in comparator order, located by binary
//!   search. Cheap iteration and lookups, O(n) inserts and removals.
//! - [`AvlStore`]: a height-balanced binary search tree. O(log n) for every
//!   structural operation.
//!
//! [`Backing`] selects one of them once, at construction, from a [`Strategy`].

pub mod avl;
pub mod sorted;

pub use avl::AvlStore;
pub use sorted::SortedStore;

use std::fmt;
use std::str::FromStr;

use crate::comparator::{Comparator, Record};
use crate::error::{Error, Result};

pub trait Store<E: Record> {
    /// The iterator returned by iter(), in comparator order.
    type Iter<'a>: Iterator<Item = &'a E> + 'a
    where
        Self: 'a,
        E: 'a;

    /// Inserts an element. Returns false, without mutating, if its key is already present.
    fn insert(&mut self, element: E) -> bool;

    /// Retrieves the element with the given key.
    fn find(&self, key: &E::Key) -> Option<&E>;

    /// Retrieves the element with the given key for in-place modification.
    /// Callers must not change the element's key.
    fn find_mut(&mut self, key: &E::Key) -> Option<&mut E>;

    /// Removes the element with the given key.
    fn remove(&mut self, key: &E::Key) -> bool;

    /// Merges a partial update into the element with the given key.
    fn update(&mut self, key: &E::Key, patch: E::Patch) -> bool {
        match self.find_mut(key) {
            Some(element) => {
                element.apply(patch);
                true
            }
            None => false,
        }
    }

    /// The smallest element.
    fn first(&self) -> Option<&E>;

    /// The smallest element strictly greater than `key`. The key itself need not be present.
    fn next_after(&self, key: &E::Key) -> Option<&E>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Self::Iter<'_>;
}

/// Which backing store a collection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    SortedSequence,
    BalancedTree,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sorted-sequence" | "array" => Ok(Strategy::SortedSequence),
            "balanced-tree" | "avl" => Ok(Strategy::BalancedTree),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SortedSequence => write!(f, "sorted-sequence"),
            Strategy::BalancedTree => write!(f, "balanced-tree"),
        }
    }
}

/// A store of either kind, chosen once from a [`Strategy`].
pub enum Backing<E: Record> {
    Sorted(SortedStore<E>),
    Tree(AvlStore<E>),
}

impl<E: Record> Backing<E> {
    pub fn new(strategy: Strategy, comparator: Comparator<E::Key>, elements: Vec<E>) -> Self {
        match strategy {
            Strategy::SortedSequence => Backing::Sorted(SortedStore::from_elements(comparator, elements)),
            Strategy::BalancedTree => Backing::Tree(AvlStore::from_elements(comparator, elements)),
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Backing::Sorted(_) => Strategy::SortedSequence,
            Backing::Tree(_) => Strategy::BalancedTree,
        }
    }
}

pub enum BackingIter<'a, E> {
    Sorted(std::slice::Iter<'a, E>),
    Tree(avl::Iter<'a, E>),
}

impl<'a, E> Iterator for BackingIter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BackingIter::Sorted(iter) => iter.next(),
            BackingIter::Tree(iter) => iter.next(),
        }
    }
}

impl<E: Record> Store<E> for Backing<E> {
    type Iter<'a>
        = BackingIter<'a, E>
    where
        Self: 'a,
        E: 'a;

    fn insert(&mut self, element: E) -> bool {
        match self {
            Backing::Sorted(store) => store.insert(element),
            Backing::Tree(store) => store.insert(element),
        }
    }

    fn find(&self, key: &E::Key) -> Option<&E> {
        match self {
            Backing::Sorted(store) => store.find(key),
            Backing::Tree(store) => store.find(key),
        }
    }

    fn find_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        match self {
            Backing::Sorted(store) => store.find_mut(key),
            Backing::Tree(store) => store.find_mut(key),
        }
    }

    fn remove(&mut self, key: &E::Key) -> bool {
        match self {
            Backing::Sorted(store) => store.remove(key),
            Backing::Tree(store) => store.remove(key),
        }
    }

    fn first(&self) -> Option<&E> {
        match self {
            Backing::Sorted(store) => store.first(),
            Backing::Tree(store) => store.first(),
        }
    }

    fn next_after(&self, key: &E::Key) -> Option<&E> {
        match self {
            Backing::Sorted(store) => store.next_after(key),
            Backing::Tree(store) => store.next_after(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Backing::Sorted(store) => store.len(),
            Backing::Tree(store) => store.len(),
        }
    }

    fn iter(&self) -> Self::Iter<'_> {
        match self {
            Backing::Sorted(store) => BackingIter::Sorted(store.iter()),
            Backing::Tree(store) => BackingIter::Tree(store.iter()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::comparator::Record;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Obj {
        pub id: u64,
        pub name: String,
    }

    #[derive(Debug, Default)]
    pub struct ObjPatch {
        pub name: Option<String>,
    }

    impl Record for Obj {
        type Key = u64;
        type Patch = ObjPatch;

        fn key(&self) -> &u64 {
            &self.id
        }

        fn apply(&mut self, patch: ObjPatch) {
            if let Some(name) = patch.name {
                self.name = name;
            }
        }
    }

    pub fn obj(id: u64, name: &str) -> Obj {
        Obj {
            id,
            name: name.to_string(),
        }
    }

    pub fn objs() -> Vec<Obj> {
        vec![obj(123, "San Zhang"), obj(456, "Si Li"), obj(789, "Wu Wang")]
    }
}
