//! # Metastore Core
//!
//! Typed, indexed object storage on top of [`metastore_storage`].
//!
//! This crate provides:
//! - [`BinaryObject`], the contract for stored objects, and a versioned
//!   JSON envelope for encoding them
//! - [`IndexedStore`], CRUD with secondary indexes kept consistent in the
//!   same transaction as the data
//! - [`Registrar`], a named directory of stores for maintenance actions
//! - [`Versions`], per-component version bookkeeping
//! - [`StorageService`], which ties an engine to all of the above
//!
//! ## Example
//!
//! ```rust
//! use metastore_core::{BinaryObject, IndexedStoreConfig, StorageService, StoreResult};
//!
//! struct User {
//!     name: String,
//! }
//!
//! impl BinaryObject for User {
//!     fn object_id(&self) -> &str {
//!         &self.name
//!     }
//!     fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
//!         Ok(self.name.clone().into_bytes())
//!     }
//!     fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
//!         Ok(User { name: String::from_utf8_lossy(data).into_owned() })
//!     }
//! }
//!
//! let service = StorageService::in_memory().unwrap();
//! let users = service
//!     .indexed_store("users", IndexedStoreConfig::<User>::new("users"))
//!     .unwrap();
//! users.create(&User { name: "bob".into() }).unwrap();
//! assert!(users.create(&User { name: "bob".into() }).unwrap_err().is_object_exists());
//! assert_eq!(service.registrar().list(), vec!["users"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod indexed;
mod object;
mod registrar;
mod service;
mod versions;

pub use error::{StoreError, StoreResult};
pub use index::{
    Index, IndexedStoreConfig, ValueFn, DEFAULT_DATA_PREFIX, DEFAULT_INDEXES_PREFIX, ID_INDEX,
};
pub use indexed::{IndexedStore, PutMode};
pub use object::{version_json_decode, version_json_encode, BinaryObject, VersionWrapper};
pub use registrar::{Registrar, StoreActioner};
pub use service::{StorageService, VERSIONS_BUCKET};
pub use versions::Versions;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
