//! In-memory backend for the docglue document layer.
//!
//! Implements the core driver contract against process-local state,
//! with a small query evaluator (equality, range operators, `$regex`)
//! and update applier (`$set`, `$inc`, `$addToSet`). Built for tests
//! and ephemeral runs: besides plain storage the connection can count
//! operations and inject faults, which is how the resilient proxy's
//! retry behavior is verified without a live store.
//!
//! # Example
//!
//! ```ignore
//! use docglue_memory::MemoryConnection;
//! use docglue_core::driver::{Collection, Connection, Database};
//! use bson::doc;
//!
//! let conn = MemoryConnection::new();
//! let users = conn.database("app").collection("users");
//! let id = users.insert(doc! { "first_name": "Daniel" })?;
//! assert!(users.find_one(Some(doc! { "_id": id }))?.is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docglue_memory;

mod evaluator;
mod store;
mod update;

pub use store::{MemoryCollection, MemoryConnection, MemoryCursor, MemoryDatabase};
