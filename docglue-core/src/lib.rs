//! A lightweight document-database access layer: transparent resilience
//! against transient connectivity failures plus a schema-validating
//! document mapper.
//!
//! This crate is the core of the docglue project and provides:
//!
//! - **Driver contract** ([`driver`]) - Traits for the three-level
//!   connection → database → collection namespace a document store
//!   driver exposes
//! - **Resilient proxy** ([`retry`]) - Retry policy and wrapper handles
//!   that re-issue remote calls on transient errors
//! - **Schema and validation** ([`schema`]) - Field validators, strict
//!   mode, and index declarations per record type
//! - **Records** ([`record`]) - The materialized document handle
//! - **Document mapper** ([`mapper`]) - Bound collection handles and
//!   the binding factory
//! - **Error handling** ([`error`]) - Driver and mapper error types and
//!   result aliases
//! - **Index declarations** ([`index`]) - Ordered key specifications
//!   and creation options
//!
//! # Example
//!
//! ```ignore
//! use docglue_core::{mapper::bind, retry::{ResilientConnection, RetryPolicy}, schema::Schema};
//! use bson::doc;
//!
//! let conn = ResilientConnection::new(raw_driver_connection, RetryPolicy::default());
//! let db = conn.database("app");
//!
//! let users = Schema::builder("users")
//!     .required("first_name")
//!     .required("last_name")
//!     .build();
//!
//! let ns = bind(&db, [users]);
//! let users = ns.get("users").unwrap();
//! let record = users.create(doc! {
//!     "first_name": "Daniel",
//!     "last_name": "Hengeveld",
//! })?;
//! assert!(record.id().is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docglue_core;

pub mod driver;
pub mod error;
pub mod index;
pub mod mapper;
pub mod record;
pub mod retry;
pub mod schema;
