//! # Metastore Storage
//!
//! Transactional key/value storage for the metadata store.
//!
//! Everything above this crate talks to an [`Interface`]: point reads and
//! writes, prefix scans, and explicit transactions, all scoped to one
//! bucket. An [`Engine`] hands out one `Interface` per bucket and every
//! store derived from the same engine shares its file (or map).
//!
//! ## Available Engines
//!
//! - [`EmbeddedDb`] - single-file, crash-safe, one writer at a time with
//!   snapshot-isolated readers
//! - [`MemDb`] - in-memory test double; transactions are fully serialized
//!
//! ## Example
//!
//! ```rust
//! use metastore_storage::{Engine, Interface, MemDb, ReadOperator, StorageResult};
//!
//! let db = MemDb::new();
//! let store = db.store("tasks").unwrap();
//! store
//!     .update(|tx| -> StorageResult<()> {
//!         tx.put("/tasks/data/t1", b"one")?;
//!         tx.put("/tasks/data/t2", b"two")
//!     })
//!     .unwrap();
//! assert_eq!(store.list("/tasks/data/").unwrap().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod embedded;
mod error;
mod kv;
mod memory;
mod pattern;

pub use backend::{
    do_update, do_view, BucketPath, Engine, Interface, ReadOnlyTx, ReadOperator, Tx,
    BUCKET_SEPARATOR,
};
pub use config::StorageConfig;
pub use embedded::{BucketStats, EmbeddedDb, EmbeddedStore, Snapshot};
pub use error::{StorageError, StorageResult};
pub use kv::{do_list_func, KeyValue};
pub use memory::{MemDb, MemStore};
pub use pattern::{glob_match, Pattern};
