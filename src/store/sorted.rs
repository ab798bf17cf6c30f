use std::cmp::Ordering;

use super::Store;
use crate::comparator::{Comparator, Record};

/// Elements kept in a `Vec` in strictly ascending comparator order.
#[derive(Debug)]
pub struct SortedStore<E: Record> {
    elements: Vec<E>,
    comparator: Comparator<E::Key>,
}

impl<E: Record> SortedStore<E> {
    pub fn new(comparator: Comparator<E::Key>) -> Self {
        Self {
            elements: Vec::new(),
            comparator,
        }
    }

    /// Sorts `elements` once. Later duplicates of a key are dropped.
    pub fn from_elements(comparator: Comparator<E::Key>, mut elements: Vec<E>) -> Self {
        elements.sort_by(|a, b| comparator.compare(a.key(), b.key()));

        let before = elements.len();
        elements.dedup_by(|next, kept| comparator.compare(next.key(), kept.key()) == Ordering::Equal);
        if elements.len() != before {
            tracing::warn!(dropped = before - elements.len(), "Duplicate keys in initial elements");
        }

        Self {
            elements,
            comparator,
        }
    }

    /// `Ok(index)` of the element with `key`, or `Err(index)` where it would be inserted.
    pub fn binary_search_index(&self, key: &E::Key) -> Result<usize, usize> {
        self.elements
            .binary_search_by(|probe| self.comparator.compare(probe.key(), key))
    }

    pub fn as_slice(&self) -> &[E] {
        &self.elements
    }
}

impl<E: Record> Store<E> for SortedStore<E> {
    type Iter<'a>
        = std::slice::Iter<'a, E>
    where
        Self: 'a,
        E: 'a;

    fn insert(&mut self, element: E) -> bool {
        match self.binary_search_index(element.key()) {
            Ok(_) => false,
            Err(index) => {
                self.elements.insert(index, element);
                true
            }
        }
    }

    fn find(&self, key: &E::Key) -> Option<&E> {
        self.binary_search_index(key)
            .ok()
            .map(|index| &self.elements[index])
    }

    fn find_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        match self.binary_search_index(key) {
            Ok(index) => Some(&mut self.elements[index]),
            Err(_) => None,
        }
    }

    fn remove(&mut self, key: &E::Key) -> bool {
        match self.binary_search_index(key) {
            Ok(index) => {
                self.elements.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    fn first(&self) -> Option<&E> {
        self.elements.first()
    }

    fn next_after(&self, key: &E::Key) -> Option<&E> {
        let index = match self.binary_search_index(key) {
            Ok(index) => index + 1,
            Err(index) => index,
        };
        self.elements.get(index)
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn iter(&self) -> Self::Iter<'_> {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{obj, objs, Obj, ObjPatch};

    fn store() -> SortedStore<Obj> {
        SortedStore::from_elements(Comparator::natural(), objs())
    }

    fn ids(store: &SortedStore<Obj>) -> Vec<u64> {
        store.iter().map(|o| o.id).collect()
    }

    #[test]
    fn test_initial_elements_are_sorted() {
        let shuffled = vec![obj(789, "C"), obj(123, "A"), obj(456, "B"), obj(123, "dup")];
        let store = SortedStore::from_elements(Comparator::natural(), shuffled);

        assert_eq!(ids(&store), vec![123, 456, 789]);
        assert_eq!(store.find(&123).map(|o| o.name.as_str()), Some("A"));
    }

    #[test]
    fn test_binary_search_index() {
        let store = store();
        assert_eq!(store.binary_search_index(&123), Ok(0));
        assert_eq!(store.binary_search_index(&789), Ok(2));
        assert_eq!(store.binary_search_index(&1), Err(0));
        assert_eq!(store.binary_search_index(&500), Err(2));
        assert_eq!(store.binary_search_index(&1000), Err(3));

        let empty = SortedStore::<Obj>::new(Comparator::natural());
        assert_eq!(empty.binary_search_index(&1), Err(0));
    }

    #[test]
    fn test_insert() {
        let mut store = store();
        assert!(!store.insert(obj(123, "Liu Zhao")));
        assert!(store.insert(obj(114514, "Koji Tadokoro")));
        assert!(!store.insert(obj(114514, "Koji Tadokoro")));
        assert!(store.insert(obj(1, "first")));

        assert_eq!(ids(&store), vec![1, 123, 456, 789, 114514]);
        assert_eq!(store.find(&123).map(|o| o.name.as_str()), Some("San Zhang"));
    }

    #[test]
    fn test_remove() {
        let mut store = store();
        assert!(store.remove(&123));
        assert!(!store.remove(&123));
        assert!(store.remove(&456));
        assert_eq!(ids(&store), vec![789]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_in_place() {
        let mut store = store();
        assert!(store.update(&123, ObjPatch { name: Some("Liu Zhao".into()) }));
        assert_eq!(store.find(&123), Some(&obj(123, "Liu Zhao")));

        assert!(store.update(&123, ObjPatch::default()));
        assert_eq!(store.find(&123), Some(&obj(123, "Liu Zhao")));

        assert!(!store.update(&114514, ObjPatch::default()));
    }

    #[test]
    fn test_cursor() {
        let store = store();
        assert_eq!(store.first().map(|o| o.id), Some(123));
        assert_eq!(store.next_after(&123).map(|o| o.id), Some(456));
        assert_eq!(store.next_after(&124).map(|o| o.id), Some(456));
        assert_eq!(store.next_after(&0).map(|o| o.id), Some(123));
        assert_eq!(store.next_after(&789), None);
    }

    #[test]
    fn test_descending_comparator() {
        let mut store = SortedStore::<u64>::from_elements(
            Comparator::natural().reverse(),
            vec![63, 3, 57, 7, 62, 9],
        );
        for n in [77, 23, 6, 56] {
            assert!(store.insert(n));
        }
        assert_eq!(store.as_slice(), &[77, 63, 62, 57, 56, 23, 9, 7, 6, 3]);
    }

    #[test]
    fn test_string_keys() {
        let mut words = SortedStore::<String>::from_elements(
            Comparator::natural(),
            ["the", "quick", "brown", "fox", "jumps"].map(String::from).to_vec(),
        );
        for word in ["over", "lazy", "dog"] {
            assert!(words.insert(word.to_string()));
        }
        assert!(!words.insert("fox".to_string()));

        let listed: Vec<&str> = words.iter().map(String::as_str).collect();
        assert_eq!(listed, vec!["brown", "dog", "fox", "jumps", "lazy", "over", "quick", "the"]);
    }
}
