use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::comparator::Comparator;
use crate::store::Strategy;

/// Hook invoked after every successful write-back.
pub type SavedHook = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a database
#[derive(Clone)]
pub struct DbConfig {
    /// Quiet period before pending mutations are written back (default: 0)
    pub delay: Duration,

    /// Payload used when the sink cannot be read (default: none, the read error is returned)
    pub init: Option<Value>,

    /// Pretty-print the written JSON (default: false)
    pub pretty: bool,

    /// Called after each successful write (default: none)
    pub on_saved: Option<SavedHook>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            init: None,
            pretty: false,
            on_saved: None,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("delay", &self.delay)
            .field("init", &self.init)
            .field("pretty", &self.pretty)
            .field("on_saved", &self.on_saved.is_some())
            .finish()
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce delay
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the fallback payload for an unreadable sink
    pub fn init(mut self, payload: Value) -> Self {
        self.init = Some(payload);
        self
    }

    /// Enable pretty-printed output
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }

    /// Set the post-save hook
    pub fn on_saved(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_saved = Some(Arc::new(hook));
        self
    }
}

/// Options for opening a single collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions<K> {
    /// Name of the payload entry this collection binds to
    pub name: String,

    /// Backing store (default: sorted sequence)
    pub strategy: Strategy,

    /// Key ordering, fixed for the collection's lifetime
    pub comparator: Comparator<K>,
}

impl<K: Ord + 'static> CollectionOptions<K> {
    /// Options using the key type's natural order.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_comparator(name, Comparator::natural())
    }
}

impl<K> CollectionOptions<K> {
    pub fn with_comparator(name: impl Into<String>, comparator: Comparator<K>) -> Self {
        Self {
            name: name.into(),
            strategy: Strategy::default(),
            comparator,
        }
    }

    /// Set the backing strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}
