use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// An element stored in a collection.
///
/// The key is the element's identity: stores order and deduplicate by it.
/// `apply` merges a partial update into the element and must leave the key
/// untouched; `Patch` should not be able to express a key change at all.
pub trait Record: Clone + Send + Sync + 'static {
    type Key: Clone + Send + Sync + 'static;
    type Patch;

    fn key(&self) -> &Self::Key;

    fn apply(&mut self, patch: Self::Patch);
}

// Plain values are their own key and have nothing to patch.
macro_rules! self_keyed {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                type Key = $ty;
                type Patch = Infallible;

                fn key(&self) -> &Self::Key {
                    self
                }

                fn apply(&mut self, patch: Self::Patch) {
                    match patch {}
                }
            }
        )*
    };
}

self_keyed!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String);

/// A total order over keys, fixed for the lifetime of a collection.
pub struct Comparator<K: ?Sized> {
    cmp: Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>,
}

impl<K: ?Sized> Comparator<K> {
    pub fn new(cmp: impl Fn(&K, &K) -> Ordering + Send + Sync + 'static) -> Self {
        Self { cmp: Arc::new(cmp) }
    }

    pub fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.cmp)(a, b)
    }

    /// The same comparator with its order flipped.
    pub fn reverse(self) -> Self
    where
        K: 'static,
    {
        let cmp = self.cmp;
        Self::new(move |a, b| cmp(b, a))
    }
}

impl<K: Ord + ?Sized + 'static> Comparator<K> {
    /// Ascending order as defined by `Ord`.
    pub fn natural() -> Self {
        Self::new(|a: &K, b: &K| a.cmp(b))
    }
}

impl<K: Ord + ?Sized + 'static> Default for Comparator<K> {
    fn default() -> Self {
        Self::natural()
    }
}

impl<K: ?Sized> Clone for Comparator<K> {
    fn clone(&self) -> Self {
        Self {
            cmp: Arc::clone(&self.cmp),
        }
    }
}

impl<K: ?Sized> fmt::Debug for Comparator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comparator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_and_reverse() {
        let asc = Comparator::<i64>::natural();
        assert_eq!(asc.compare(&1, &2), Ordering::Less);
        assert_eq!(asc.compare(&2, &2), Ordering::Equal);

        let desc = asc.clone().reverse();
        assert_eq!(desc.compare(&1, &2), Ordering::Greater);
        assert_eq!(asc.compare(&3, &1), Ordering::Greater);
    }

    #[test]
    fn test_custom_comparator() {
        let by_len = Comparator::<String>::new(|a, b| a.len().cmp(&b.len()));
        assert_eq!(by_len.compare(&"fox".into(), &"quick".into()), Ordering::Less);
        assert_eq!(by_len.compare(&"fox".into(), &"dog".into()), Ordering::Equal);
    }

    #[test]
    fn test_self_keyed_records() {
        let n = 42u64;
        assert_eq!(*n.key(), 42);

        let s = String::from("brown");
        assert_eq!(s.key(), "brown");
    }
}
