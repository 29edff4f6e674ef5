//! Bound record types: schema-validated operations against one
//! collection.
//!
//! [`bind`] is the factory that turns a database handle plus a set of
//! [`Schema`] declarations into a [`Namespace`] of [`BoundCollection`]
//! handles, each carrying its database-addressed collection by
//! composition. The caller-supplied schemas are never mutated; handles
//! are cheap to clone and safe to share.
//!
//! Validation always runs before the store is contacted, and validation
//! or misuse failures never reach the retry machinery: they are
//! returned synchronously as [`MapperError`] values.
//!
//! # Example
//!
//! ```ignore
//! let users = Schema::builder("users")
//!     .required("first_name")
//!     .required("last_name")
//!     .strict()
//!     .build();
//!
//! let ns = bind(&db, [users]);
//! let users = ns.get("users").unwrap();
//! let mut daniel = users.create(doc! {
//!     "first_name": "Daniel",
//!     "last_name": "Hengeveld",
//! })?;
//! users.set(&mut daniel, doc! { "last_name": "H." })?;
//! ```

use std::{
    collections::HashMap,
    sync::Arc,
};

use bson::{Bson, Document, doc, oid::ObjectId};
use parking_lot::Mutex;

use crate::{
    driver::{Collection, Database},
    error::{MapperError, MapperResult},
    index::{IndexInfo, IndexKeys, IndexOptions},
    record::Record,
    schema::Schema,
};

/// A record type bound to a concrete collection handle.
///
/// Index declarations attached to the schema are applied once, lazily,
/// the first time a record is materialized through this handle — never
/// at declaration time, so schemas can exist before any live binding
/// does.
pub struct BoundCollection<C: Collection> {
    collection: C,
    schema: Arc<Schema>,
    indexes_applied: Arc<Mutex<bool>>,
}

impl<C: Collection> Clone for BoundCollection<C> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            schema: self.schema.clone(),
            indexes_applied: self.indexes_applied.clone(),
        }
    }
}

impl<C: Collection> BoundCollection<C> {
    /// Binds a schema directly to a collection handle.
    pub fn new(collection: C, schema: Schema) -> Self {
        Self {
            collection,
            schema: Arc::new(schema),
            indexes_applied: Arc::new(Mutex::new(false)),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The bound collection's name.
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// Raw access to the bound collection handle.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    fn apply_indexes(&self) -> MapperResult<()> {
        let mut applied = self.indexes_applied.lock();
        if *applied {
            return Ok(());
        }
        for (keys, options) in self.schema.indexes() {
            self.collection.ensure_index(keys, options)?;
        }
        *applied = true;
        Ok(())
    }

    fn require_id(&self, record: &Record, operation: &str) -> MapperResult<ObjectId> {
        record.id().ok_or_else(|| {
            MapperError::Misuse(format!(
                "cannot {operation} a record without an identity; it was never saved or already removed"
            ))
        })
    }

    /// Validates `fields` against the schema and, on success, inserts
    /// them and returns the materialized record with its store-assigned
    /// identity. Validation failure never touches the store.
    pub fn create(&self, fields: Document) -> MapperResult<Record> {
        self.schema.validate(&fields)?;
        self.apply_indexes()?;
        let id = self.collection.insert(fields.clone())?;
        Ok(Record::new(id, fields))
    }

    /// Materializes every document matching `filter` (all documents
    /// when `None`). Order is store-defined.
    pub fn find(&self, filter: Option<Document>) -> MapperResult<Vec<Record>> {
        self.apply_indexes()?;
        self.collection
            .find(filter)?
            .map(|raw| Record::from_raw(raw?))
            .collect()
    }

    /// Materializes the first document matching `filter`, if any.
    pub fn find_one(&self, filter: Option<Document>) -> MapperResult<Option<Record>> {
        self.apply_indexes()?;
        match self.collection.find_one(filter)? {
            Some(raw) => Ok(Some(Record::from_raw(raw)?)),
            None => Ok(None),
        }
    }

    /// Merges `fields` into the record, validates the merged result,
    /// and issues a field-level `$set` of exactly the changed fields
    /// keyed by the record's identity.
    ///
    /// If validation fails the record keeps its previous state and the
    /// store is never contacted.
    pub fn set(&self, record: &mut Record, fields: Document) -> MapperResult<()> {
        let id = self.require_id(record, "set")?;
        let mut merged = record.fields().clone();
        for (field, value) in fields.iter() {
            merged.insert(field.clone(), value.clone());
        }
        self.schema.validate(&merged)?;
        self.collection
            .update(doc! { "_id": id }, doc! { "$set": fields })?;
        *record.fields_mut() = merged;
        Ok(())
    }

    /// Treats each named field as a set and unions the given value into
    /// it, suppressing duplicates. Fields that are absent become
    /// single-element sets.
    ///
    /// Set semantics: only membership is guaranteed, never element
    /// order.
    pub fn add_to_set(&self, record: &mut Record, fields: Document) -> MapperResult<()> {
        let id = self.require_id(record, "add_to_set")?;
        let mut merged = record.fields().clone();
        for (field, value) in fields.iter() {
            if !merged.contains_key(field) {
                merged.insert(field.clone(), Bson::Array(vec![value.clone()]));
                continue;
            }
            match merged.get_mut(field) {
                Some(Bson::Array(members)) => {
                    if !members.iter().any(|member| member == value) {
                        members.push(value.clone());
                    }
                }
                _ => {
                    return Err(MapperError::Misuse(format!(
                        "cannot add_to_set on non-array field: {field}"
                    )));
                }
            }
        }
        self.schema.validate(&merged)?;
        self.collection
            .update(doc! { "_id": id }, doc! { "$addToSet": fields })?;
        *record.fields_mut() = merged;
        Ok(())
    }

    /// Deletes the document identified by the record and invalidates
    /// the record's identity. The in-memory value remains a husk.
    pub fn remove(&self, record: &mut Record) -> MapperResult<()> {
        let id = self.require_id(record, "remove")?;
        self.collection.remove(Some(doc! { "_id": id }))?;
        record.invalidate_id();
        Ok(())
    }

    /// Deletes the entire bound collection: all documents, all
    /// records.
    ///
    /// Only reachable through the bound handle; a [`Record`] exposes no
    /// collection-level drop, so the high-blast-radius mistake of
    /// dropping a collection when one document was meant is
    /// unrepresentable.
    pub fn drop(&self) -> MapperResult<()> {
        Ok(self.collection.drop()?)
    }

    /// Declares an index on the bound collection and returns its name.
    pub fn ensure_index(
        &self,
        keys: &IndexKeys,
        options: &IndexOptions,
    ) -> MapperResult<String> {
        Ok(self.collection.ensure_index(keys, options)?)
    }

    /// The indexes declared on the bound collection, keyed by name.
    pub fn index_information(&self) -> MapperResult<HashMap<String, IndexInfo>> {
        Ok(self.collection.index_information()?)
    }
}

/// A set of bound record types keyed by collection name, produced by
/// [`bind`].
pub struct Namespace<C: Collection> {
    collections: HashMap<String, BoundCollection<C>>,
}

impl<C: Collection> Namespace<C> {
    /// The bound handle for the named collection.
    pub fn get(&self, collection: &str) -> Option<&BoundCollection<C>> {
        self.collections.get(collection)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundCollection<C>)> {
        self.collections
            .iter()
            .map(|(name, bound)| (name.as_str(), bound))
    }
}

/// Binds each schema to the given database, producing a namespace of
/// record types whose persistence operations are pre-wired to it.
///
/// The caller-supplied schemas are moved in, never mutated: binding
/// manufactures specialized handles by composition.
pub fn bind<D: Database>(
    database: &D,
    schemas: impl IntoIterator<Item = Schema>,
) -> Namespace<D::Collection> {
    Namespace {
        collections: schemas
            .into_iter()
            .map(|schema| {
                let handle = database.collection(schema.collection());
                (
                    schema.collection().to_string(),
                    BoundCollection::new(handle, schema),
                )
            })
            .collect(),
    }
}
