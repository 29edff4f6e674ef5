//! Main docglue crate providing a resilient, schema-validating document
//! database access layer.
//!
//! This crate is the primary entry point for users of the docglue
//! project. It re-exports the core types and provides convenient access
//! to the storage backends.
//!
//! # Features
//!
//! - **Transparent resilience** - Driver handles wrapped in a retry
//!   proxy that re-issues calls on transient connectivity failures with
//!   linear backoff
//! - **Schema validation** - Required/optional/custom field validators
//!   with an opt-in strict mode that rejects undeclared fields
//! - **Lazy index management** - Index declarations applied once, on
//!   first use of a bound collection
//! - **Multiple backends** - In-memory storage for tests and MongoDB
//!   for production (behind the `mongodb` feature)
//!
//! # Quick Start
//!
//! ```ignore
//! use docglue::{prelude::*, memory::MemoryConnection};
//! use bson::doc;
//!
//! fn main() -> Result<(), MapperError> {
//!     let conn = ResilientConnection::new(MemoryConnection::new(), RetryPolicy::default());
//!     let db = conn.database("app");
//!
//!     let users = Schema::builder("users")
//!         .required("first_name")
//!         .required("last_name")
//!         .strict()
//!         .build();
//!
//!     let ns = bind(&db, [users]);
//!     let users = ns.get("users").unwrap();
//!
//!     let mut daniel = users.create(doc! {
//!         "first_name": "Daniel",
//!         "last_name": "Hengeveld",
//!     })?;
//!     assert!(daniel.id().is_some());
//!
//!     users.set(&mut daniel, doc! { "last_name": "H." })?;
//!     let found = users.find_one(Some(doc! { "last_name": "H." }))?;
//!     assert!(found.is_some());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Resilience
//!
//! Every driver call made through a [`retry::ResilientConnection`] (and
//! the database, collection, and cursor handles it hands out) is
//! retried on transient failures according to a [`retry::RetryPolicy`]:
//! connection loss always retries, operation failures retry unless the
//! store reports a duplicate-key violation, and the delay between
//! attempts grows linearly. Validation and misuse errors never reach
//! the retry machinery.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing,
//!   with fault injection and operation counting
//! - [`mongodb`] - Persistent MongoDB backend (requires the `mongodb`
//!   feature)

pub mod prelude;

pub use docglue_core::{driver, error, index, mapper, record, retry, schema};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docglue_memory::{MemoryCollection, MemoryConnection, MemoryCursor, MemoryDatabase};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docglue_mongodb::{MongoConnection, MongoCursor, MongoDbCollection, MongoDbDatabase};
}
