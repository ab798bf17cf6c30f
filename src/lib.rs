//! An embedded store of named, ordered collections, persisted together as a
//! single JSON object and written back after a quiet period.

pub mod collection;
pub mod comparator;
pub mod config;
pub mod database;
pub mod error;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use collection::Collection;
pub use comparator::{Comparator, Record};
pub use config::{CollectionOptions, DbConfig};
pub use database::Database;
pub use error::{Error, Result};
pub use sink::{FileSink, MemorySink, Sink};
pub use store::Strategy;
