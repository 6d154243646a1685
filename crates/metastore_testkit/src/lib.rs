//! # Metastore Testkit
//!
//! Test utilities for Metastore.
//!
//! This crate provides:
//! - Test fixtures: a JSON-encoded [`TestObject`], temporary engines and the
//!   [`backend_tests!`] macro
//! - Property-based test generators using proptest
//! - An index consistency harness
//! - An example domain DAO with total error translation
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metastore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_mem_db(|db| {
//!         let store = test_indexed_store(db, "objects");
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dao;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dao::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use dao::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
