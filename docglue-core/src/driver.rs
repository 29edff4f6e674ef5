//! Driver contract for mongo-shaped document stores.
//!
//! A driver exposes a three-level addressable namespace: a
//! [`Connection`] hands out [`Database`] handles, a database hands out
//! [`Collection`] handles, and collections address their own children
//! through dotted names (`parent.child`). Filters and update specs are
//! opaque BSON documents passed through to the store verbatim; query
//! language design is the store's concern, not this layer's.
//!
//! The traits are deliberately synchronous: this is a call-through
//! layer and every operation runs on the caller's thread. All handles
//! must be cheap to clone and safe to share.
//!
//! # Update specs
//!
//! Drivers must support at least `$set` (replace named fields), `$inc`
//! (numeric increment, absent fields treated as zero) and `$addToSet`
//! (set-union on an array field, duplicate values suppressed). Filter
//! specs must support equality, `$gt`/`$gte`/`$lt`/`$lte`, and
//! `$regex` pattern matching against string values.

use std::collections::HashMap;

use bson::{Document, oid::ObjectId};

use crate::{
    error::DriverResult,
    index::{IndexInfo, IndexKeys, IndexOptions},
};

/// A live connection to a document store.
pub trait Connection: Send + Sync {
    type Database: Database;

    /// Addresses a database by name. The database need not exist yet;
    /// lazy creation is the store's responsibility.
    fn database(&self, name: &str) -> Self::Database;

    /// Names of the databases known to the store.
    fn database_names(&self) -> DriverResult<Vec<String>>;
}

/// A database handle within a connection.
pub trait Database: Send + Sync {
    type Collection: Collection;

    /// Addresses a collection by name, existing or not.
    fn collection(&self, name: &str) -> Self::Collection;

    /// Names of the collections in this database.
    fn collection_names(&self) -> DriverResult<Vec<String>>;

    /// Deletes a collection and all its documents.
    fn drop_collection(&self, name: &str) -> DriverResult<()>;
}

/// A collection handle within a database.
///
/// Identity (`_id`) is assigned by the store on [`insert`] and returned
/// to the caller; it never changes afterwards.
///
/// [`insert`]: Collection::insert
pub trait Collection: Clone + Send + Sync {
    type Cursor: Iterator<Item = DriverResult<Document>>;

    /// The (possibly dotted) name of this collection.
    fn name(&self) -> &str;

    /// Addresses a child collection as `<self>.<name>`.
    fn collection(&self, name: &str) -> Self;

    /// Names of all collections in the same database, including this
    /// one's children under their dotted names.
    fn collection_names(&self) -> DriverResult<Vec<String>>;

    /// Inserts a document and returns the store-assigned identity.
    fn insert(&self, document: Document) -> DriverResult<ObjectId>;

    /// Streams documents matching `filter`; `None` matches everything.
    /// Result order is store-defined.
    fn find(&self, filter: Option<Document>) -> DriverResult<Self::Cursor>;

    /// Returns the first document matching `filter`, if any.
    fn find_one(&self, filter: Option<Document>) -> DriverResult<Option<Document>>;

    /// Applies an update spec to every document matching `filter`.
    fn update(&self, filter: Document, update: Document) -> DriverResult<()>;

    /// Deletes every document matching `filter`; `None` deletes all.
    fn remove(&self, filter: Option<Document>) -> DriverResult<()>;

    /// Deletes this collection and all its documents.
    fn drop(&self) -> DriverResult<()>;

    /// Creates an index if it does not already exist and returns its
    /// name.
    fn ensure_index(&self, keys: &IndexKeys, options: &IndexOptions) -> DriverResult<String>;

    /// The indexes declared on this collection, keyed by index name.
    fn index_information(&self) -> DriverResult<HashMap<String, IndexInfo>>;
}
