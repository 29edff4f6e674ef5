//! MongoDB backend for the docglue document layer.
//!
//! Implements the core driver contract over the official MongoDB
//! driver's synchronous API. Driver failures are folded into the
//! two-class error model the resilient proxy retries on: I/O, server
//! selection, and pool-cleared failures surface as connection loss,
//! everything else as an operation failure carrying the server's
//! wording (including duplicate-key rejections).
//!
//! To use this backend through the facade crate, enable its `mongodb`
//! feature:
//!
//! ```toml
//! [dependencies]
//! docglue = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docglue_mongodb::MongoConnection;
//! use docglue_core::retry::{ResilientConnection, RetryPolicy};
//!
//! let raw = MongoConnection::connect("mongodb://localhost:27017")?;
//! let conn = ResilientConnection::new(raw, RetryPolicy::default());
//! let db = conn.database("app");
//! ```

#[allow(unused_extern_crates)]
extern crate self as docglue_mongodb;

pub mod store;

pub use store::{MongoConnection, MongoCursor, MongoDbCollection, MongoDbDatabase};
