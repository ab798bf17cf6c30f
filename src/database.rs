use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::runtime::Handle;

use crate::collection::Collection;
use crate::comparator::Record;
use crate::config::{CollectionOptions, DbConfig, SavedHook};
use crate::error::{Error, Result};
use crate::scheduler::{Context, DeferredTask, Debouncer};
use crate::sink::{FileSink, Sink};

/// A registered collection, type-erased for write-back.
trait Listing: Send + Sync {
    fn to_json(&self) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

impl<E: Record + Serialize> Listing for Collection<E> {
    fn to_json(&self) -> Result<Value> {
        Collection::to_json(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Registry {
    sink: Box<dyn Sink>,
    pretty: bool,
    on_saved: Option<SavedHook>,
    // Entries for collections that were never opened are written back untouched.
    payload: Mutex<Map<String, Value>>,
    collections: RwLock<BTreeMap<String, Box<dyn Listing>>>,
}

impl Registry {
    fn payload(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.payload.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elements<E: Record + DeserializeOwned>(&self, name: &str) -> Result<Vec<E>> {
        let payload = self.payload();
        match payload.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(E::deserialize)
                .collect::<std::result::Result<Vec<E>, _>>()
                .map_err(|e| Error::Decode(name.to_string(), e)),
            Some(_) => Err(Error::NotASequence(name.to_string())),
        }
    }

    /// Snapshots every registered collection into the payload and encodes it.
    fn encode(&self) -> Result<(Vec<u8>, usize)> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let mut payload = self.payload();
        for (name, listing) in collections.iter() {
            payload.insert(name.clone(), listing.to_json()?);
        }

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&*payload)
        } else {
            serde_json::to_vec(&*payload)
        }
        .map_err(|e| Error::Encode("payload".to_string(), e))?;

        Ok((bytes, collections.len()))
    }
}

/// Writes a full snapshot of the registry to its sink.
struct SaveTask {
    registry: Arc<Registry>,
    // Held from snapshot to write so snapshots reach the sink in the order they were taken.
    in_flight: tokio::sync::Mutex<()>,
}

#[async_trait::async_trait]
impl DeferredTask for SaveTask {
    fn name(&self) -> &'static str {
        "write-back"
    }

    async fn execute(&self, ctx: Context) -> Result<()> {
        let _guard = self.in_flight.lock().await;
        let (bytes, collections) = self.registry.encode()?;
        self.registry
            .sink
            .write(&bytes)
            .map_err(|e| Error::WriteError("payload", e))?;

        tracing::info!(
            run_id = ctx.run_id,
            coalesced = ctx.coalesced,
            collections,
            bytes = bytes.len(),
            "Saved database"
        );

        if let Some(hook) = &self.registry.on_saved {
            hook();
        }
        Ok(())
    }
}

/// A set of named collections persisted together to one sink.
///
/// Mutations on any collection schedule a single debounced write of the
/// whole payload. Opening requires a tokio runtime, which runs the write-back.
#[derive(Clone)]
pub struct Database {
    registry: Arc<Registry>,
    debouncer: Arc<Debouncer>,
}

impl Database {
    /// Open a database backed by a file
    pub fn open_path(path: impl Into<PathBuf>, config: DbConfig) -> Result<Self> {
        Self::open(FileSink::new(path), config)
    }

    /// Open a database over any sink, reading its payload now
    pub fn open(sink: impl Sink + 'static, config: DbConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let payload = load_payload(&sink, config.init.as_ref())?;

        let registry = Arc::new(Registry {
            sink: Box::new(sink),
            pretty: config.pretty,
            on_saved: config.on_saved,
            payload: Mutex::new(payload),
            collections: RwLock::new(BTreeMap::new()),
        });
        let task = Arc::new(SaveTask {
            registry: Arc::clone(&registry),
            in_flight: tokio::sync::Mutex::new(()),
        });
        let debouncer = Debouncer::new(config.delay, runtime, task);

        Ok(Self {
            registry,
            debouncer,
        })
    }

    /// Opens the collection bound to `options.name`.
    ///
    /// Opening a name again returns the existing collection, whatever the
    /// options; it fails if the element type differs.
    pub fn collection<E>(&self, options: CollectionOptions<E::Key>) -> Result<Collection<E>>
    where
        E: Record + Serialize + DeserializeOwned,
    {
        let mut collections = self
            .registry
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = collections.get(&options.name) {
            return existing
                .as_any()
                .downcast_ref::<Collection<E>>()
                .cloned()
                .ok_or(Error::CollectionTypeMismatch(options.name));
        }

        let elements = self.registry.elements::<E>(&options.name)?;
        let collection = Collection::attached(options, elements, &self.debouncer);
        tracing::debug!(
            name = collection.name(),
            strategy = %collection.strategy(),
            len = collection.len(),
            "Opened collection"
        );

        collections.insert(collection.name().to_string(), Box::new(collection.clone()));
        Ok(collection)
    }

    /// Names of the opened collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.registry
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Whether a write-back is pending.
    pub fn is_dirty(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Writes pending changes now. Returns false if nothing was pending.
    pub async fn flush(&self) -> Result<bool> {
        self.debouncer.flush().await
    }

    /// Flushes pending changes and releases this handle.
    pub async fn close(self) -> Result<()> {
        self.flush().await?;
        Ok(())
    }
}

fn load_payload(sink: &dyn Sink, init: Option<&Value>) -> Result<Map<String, Value>> {
    let value = match sink.read() {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Decode("payload".to_string(), e))?,
        Err(err) => match init {
            Some(init) => {
                tracing::warn!(error = %err, "Sink unreadable, starting from the initial payload");
                init.clone()
            }
            None => return Err(Error::ReadError("payload", err)),
        },
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidPayload(format!(
            "expected an object of collections, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
