//! In-memory driver backend.
//!
//! All state lives in one shared [`Inner`] behind the connection
//! handle, so databases and collections addressed through different
//! handles observe the same documents. Beyond plain storage the
//! connection offers two test affordances: an operation counter and a
//! fault queue that makes the next driver calls fail with queued
//! errors, which is how retry behavior is exercised without a live
//! store.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bson::{Bson, Document, oid::ObjectId};
use parking_lot::{Mutex, RwLock};

use docglue_core::{
    driver,
    error::{DriverError, DriverResult},
    index::{IndexInfo, IndexKeys, IndexOptions},
};

use crate::{evaluator, update};

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<(String, IndexInfo)>,
}

type StoreMap = HashMap<String, HashMap<String, CollectionData>>;

#[derive(Debug, Default)]
struct Inner {
    store: RwLock<StoreMap>,
    faults: Mutex<VecDeque<DriverError>>,
    operations: AtomicU64,
}

impl Inner {
    /// Every driver entry point passes through here: the operation
    /// counter advances and a queued fault, if any, fires in place of
    /// the real operation.
    fn enter(&self) -> DriverResult<()> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        match self.faults.lock().pop_front() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

/// An in-memory document store connection.
///
/// Clones share state. [`Default`] yields an empty store.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    inner: Arc<Inner>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error that the next driver operation will return
    /// instead of executing.
    pub fn inject_fault(&self, fault: DriverError) {
        self.inner.faults.lock().push_back(fault);
    }

    /// Queues several errors; they fire in order, one per operation.
    pub fn inject_faults(&self, faults: impl IntoIterator<Item = DriverError>) {
        self.inner.faults.lock().extend(faults);
    }

    /// Total driver operations attempted through this connection,
    /// including ones that failed with an injected fault.
    pub fn operations(&self) -> u64 {
        self.inner.operations.load(Ordering::Relaxed)
    }
}

impl driver::Connection for MemoryConnection {
    type Database = MemoryDatabase;

    fn database(&self, name: &str) -> MemoryDatabase {
        MemoryDatabase {
            inner: self.inner.clone(),
            name: name.to_string(),
        }
    }

    fn database_names(&self) -> DriverResult<Vec<String>> {
        self.inner.enter()?;
        let store = self.inner.store.read();
        let mut names: Vec<String> = store.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// A database handle into a [`MemoryConnection`]. Databases spring into
/// existence when first written to.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Arc<Inner>,
    name: String,
}

impl driver::Database for MemoryDatabase {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> MemoryCollection {
        MemoryCollection {
            inner: self.inner.clone(),
            database: self.name.clone(),
            name: name.to_string(),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        self.inner.enter()?;
        Ok(collection_names_in(&self.inner, &self.name))
    }

    fn drop_collection(&self, name: &str) -> DriverResult<()> {
        self.inner.enter()?;
        let mut store = self.inner.store.write();
        if let Some(database) = store.get_mut(&self.name) {
            database.remove(name);
        }
        Ok(())
    }
}

fn collection_names_in(inner: &Inner, database: &str) -> Vec<String> {
    let store = inner.store.read();
    let mut names: Vec<String> = store
        .get(database)
        .map(|collections| collections.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

/// A collection handle into a [`MemoryConnection`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    inner: Arc<Inner>,
    database: String,
    name: String,
}

impl MemoryCollection {
    fn with_data<T>(&self, body: impl FnOnce(&mut CollectionData) -> DriverResult<T>) -> DriverResult<T> {
        let mut store = self.inner.store.write();
        let data = store
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();
        body(data)
    }

    fn read_data<T: Default>(&self, body: impl FnOnce(&CollectionData) -> DriverResult<T>) -> DriverResult<T> {
        let store = self.inner.store.read();
        match store.get(&self.database).and_then(|db| db.get(&self.name)) {
            Some(data) => body(data),
            None => Ok(T::default()),
        }
    }

    fn duplicate_key_error(&self, index_name: &str) -> DriverError {
        DriverError::OperationFailed(format!(
            "E11000 duplicate key error collection: {}.{} index: {}",
            self.database, self.name, index_name
        ))
    }

    /// Rejects `candidate` when a unique index already holds its key.
    /// The document carrying `candidate`'s own `_id` is exempt so
    /// updates do not collide with themselves.
    fn check_unique(&self, data: &CollectionData, candidate: &Document) -> DriverResult<()> {
        for (index_name, info) in &data.indexes {
            if !info.options.unique {
                continue;
            }
            let Some(key) = index_key(candidate, info) else {
                continue;
            };
            for existing in &data.documents {
                if existing.get("_id") == candidate.get("_id") {
                    continue;
                }
                if index_key(existing, info).as_ref() == Some(&key) {
                    return Err(self.duplicate_key_error(index_name));
                }
            }
        }
        Ok(())
    }
}

/// The index key a document contributes, missing fields reading as
/// null. `None` means the document is not indexed at all, which is the
/// sparse case when every indexed field is absent.
fn index_key(document: &Document, info: &IndexInfo) -> Option<Vec<Bson>> {
    let mut key = Vec::with_capacity(info.keys.len());
    let mut any_present = false;
    for (field, _) in info.keys.iter() {
        match document.get(field) {
            Some(value) => {
                any_present = true;
                key.push(value.clone());
            }
            None => key.push(Bson::Null),
        }
    }
    if info.options.sparse && !any_present {
        return None;
    }
    Some(key)
}

impl driver::Collection for MemoryCollection {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Self {
        Self {
            inner: self.inner.clone(),
            database: self.database.clone(),
            name: format!("{}.{}", self.name, name),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        self.inner.enter()?;
        Ok(collection_names_in(&self.inner, &self.database))
    }

    fn insert(&self, document: Document) -> DriverResult<ObjectId> {
        self.inner.enter()?;
        let id = ObjectId::new();
        let mut stored = document;
        stored.insert("_id", id);
        self.with_data(|data| {
            self.check_unique(data, &stored)?;
            data.documents.push(stored.clone());
            Ok(())
        })?;
        Ok(id)
    }

    fn find(&self, filter: Option<Document>) -> DriverResult<MemoryCursor> {
        self.inner.enter()?;
        let filter = filter.unwrap_or_default();
        let matched = self.read_data(|data| {
            let mut matched = VecDeque::new();
            for document in &data.documents {
                if evaluator::matches(document, &filter)? {
                    matched.push_back(document.clone());
                }
            }
            Ok(matched)
        })?;
        Ok(MemoryCursor {
            inner: self.inner.clone(),
            documents: matched,
        })
    }

    fn find_one(&self, filter: Option<Document>) -> DriverResult<Option<Document>> {
        self.inner.enter()?;
        let filter = filter.unwrap_or_default();
        self.read_data(|data| {
            for document in &data.documents {
                if evaluator::matches(document, &filter)? {
                    return Ok(Some(document.clone()));
                }
            }
            Ok(None)
        })
    }

    fn update(&self, filter: Document, update_spec: Document) -> DriverResult<()> {
        self.inner.enter()?;
        self.with_data(|data| {
            for position in 0..data.documents.len() {
                if !evaluator::matches(&data.documents[position], &filter)? {
                    continue;
                }
                let mut updated = data.documents[position].clone();
                update::apply(&mut updated, &update_spec)?;
                self.check_unique(data, &updated)?;
                data.documents[position] = updated;
            }
            Ok(())
        })
    }

    fn remove(&self, filter: Option<Document>) -> DriverResult<()> {
        self.inner.enter()?;
        let filter = filter.unwrap_or_default();
        self.with_data(|data| {
            let mut kept = Vec::with_capacity(data.documents.len());
            for document in data.documents.drain(..) {
                if !evaluator::matches(&document, &filter)? {
                    kept.push(document);
                }
            }
            data.documents = kept;
            Ok(())
        })
    }

    fn drop(&self) -> DriverResult<()> {
        self.inner.enter()?;
        let mut store = self.inner.store.write();
        if let Some(database) = store.get_mut(&self.database) {
            database.remove(&self.name);
        }
        Ok(())
    }

    fn ensure_index(&self, keys: &IndexKeys, options: &IndexOptions) -> DriverResult<String> {
        self.inner.enter()?;
        let name = keys.default_name();
        self.with_data(|data| {
            if !data.indexes.iter().any(|(existing, _)| existing == &name) {
                data.indexes.push((
                    name.clone(),
                    IndexInfo {
                        keys: keys.clone(),
                        options: *options,
                    },
                ));
            }
            Ok(())
        })?;
        Ok(name)
    }

    fn index_information(&self) -> DriverResult<HashMap<String, IndexInfo>> {
        self.inner.enter()?;
        self.read_data(|data| {
            Ok(data
                .indexes
                .iter()
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect())
        })
    }
}

/// Cursor over a snapshot of matched documents.
///
/// Each step passes through the fault queue, so a queued fault surfaces
/// mid-iteration as an `Err` item without consuming the document; the
/// next call yields it again.
#[derive(Debug)]
pub struct MemoryCursor {
    inner: Arc<Inner>,
    documents: VecDeque<Document>,
}

impl Iterator for MemoryCursor {
    type Item = DriverResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.documents.is_empty() {
            return None;
        }
        if let Err(fault) = self.inner.enter() {
            return Some(Err(fault));
        }
        self.documents.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docglue_core::driver::{Collection, Connection, Database};

    fn users() -> (MemoryConnection, MemoryCollection) {
        let conn = MemoryConnection::new();
        let coll = conn.database("app").collection("users");
        (conn, coll)
    }

    #[test]
    fn insert_assigns_identity_and_find_returns_it() {
        let (_conn, coll) = users();
        let id = coll.insert(doc! { "first_name": "Daniel" }).unwrap();

        let found: Vec<_> = coll.find(None).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_object_id("_id").unwrap(), id);
        assert_eq!(found[0].get_str("first_name").unwrap(), "Daniel");
    }

    #[test]
    fn find_filters_documents() {
        let (_conn, coll) = users();
        coll.insert(doc! { "name": "a", "age": 20 }).unwrap();
        coll.insert(doc! { "name": "b", "age": 40 }).unwrap();

        let found: Vec<_> = coll
            .find(Some(doc! { "age": { "$gt": 30 } }))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("name").unwrap(), "b");
    }

    #[test]
    fn find_one_returns_first_match_or_none() {
        let (_conn, coll) = users();
        coll.insert(doc! { "name": "a" }).unwrap();

        assert!(coll.find_one(Some(doc! { "name": "a" })).unwrap().is_some());
        assert!(coll.find_one(Some(doc! { "name": "z" })).unwrap().is_none());
    }

    #[test]
    fn update_applies_operators_to_matching_documents() {
        let (_conn, coll) = users();
        let id = coll.insert(doc! { "name": "a", "count": 1 }).unwrap();
        coll.insert(doc! { "name": "b", "count": 1 }).unwrap();

        coll.update(
            doc! { "_id": id },
            doc! { "$set": { "name": "a2" }, "$inc": { "count": 2 } },
        )
        .unwrap();

        let updated = coll.find_one(Some(doc! { "_id": id })).unwrap().unwrap();
        assert_eq!(updated.get_str("name").unwrap(), "a2");
        assert_eq!(updated.get("count"), Some(&Bson::Int64(3)));

        let other = coll.find_one(Some(doc! { "name": "b" })).unwrap().unwrap();
        assert_eq!(other.get("count"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn update_add_to_set_through_the_driver() {
        let (_conn, coll) = users();
        let id = coll.insert(doc! { "name": "a" }).unwrap();

        coll.update(doc! { "_id": id }, doc! { "$addToSet": { "perm": "read" } })
            .unwrap();
        coll.update(doc! { "_id": id }, doc! { "$addToSet": { "perm": "read" } })
            .unwrap();

        let found = coll.find_one(Some(doc! { "_id": id })).unwrap().unwrap();
        let members = found.get_array("perm").unwrap();
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn remove_deletes_matching_documents() {
        let (_conn, coll) = users();
        coll.insert(doc! { "name": "a" }).unwrap();
        coll.insert(doc! { "name": "b" }).unwrap();

        coll.remove(Some(doc! { "name": "a" })).unwrap();
        let remaining: Vec<_> = coll.find(None).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(remaining.len(), 1);

        coll.remove(None).unwrap();
        assert_eq!(coll.find(None).unwrap().count(), 0);
    }

    #[test]
    fn drop_is_idempotent() {
        let (_conn, coll) = users();
        coll.insert(doc! { "name": "a" }).unwrap();
        coll.drop().unwrap();
        coll.drop().unwrap();
        assert_eq!(coll.find(None).unwrap().count(), 0);
    }

    #[test]
    fn unique_index_rejects_duplicates_with_store_worded_error() {
        let (_conn, coll) = users();
        coll.ensure_index(
            &IndexKeys::new().asc("email"),
            &IndexOptions {
                unique: true,
                sparse: false,
            },
        )
        .unwrap();

        coll.insert(doc! { "email": "a@example.com" }).unwrap();
        let err = coll.insert(doc! { "email": "a@example.com" }).unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(err.to_string().contains("app.users"));
    }

    #[test]
    fn sparse_unique_index_ignores_documents_missing_the_field() {
        let (_conn, coll) = users();
        coll.ensure_index(
            &IndexKeys::new().asc("email"),
            &IndexOptions {
                unique: true,
                sparse: true,
            },
        )
        .unwrap();

        coll.insert(doc! { "name": "a" }).unwrap();
        coll.insert(doc! { "name": "b" }).unwrap();
    }

    #[test]
    fn ensure_index_is_idempotent_and_reported() {
        let (_conn, coll) = users();
        let keys = IndexKeys::new().desc("last_name").asc("first_name");
        let options = IndexOptions {
            unique: false,
            sparse: true,
        };

        let name = coll.ensure_index(&keys, &options).unwrap();
        assert_eq!(name, "last_name_-1_first_name_1");
        coll.ensure_index(&keys, &options).unwrap();

        let info = coll.index_information().unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[&name].keys, keys);
        assert!(info[&name].options.sparse);
    }

    #[test]
    fn names_reflect_live_databases_and_collections() {
        let conn = MemoryConnection::new();
        let db = conn.database("app");
        db.collection("users").insert(doc! {}).unwrap();
        db.collection("users").collection("settings").insert(doc! {}).unwrap();

        assert_eq!(conn.database_names().unwrap(), vec!["app"]);
        assert_eq!(db.collection_names().unwrap(), vec!["users", "users.settings"]);
    }

    #[test]
    fn drop_collection_removes_only_the_named_collection() {
        let conn = MemoryConnection::new();
        let db = conn.database("app");
        db.collection("users").insert(doc! {}).unwrap();
        db.collection("groups").insert(doc! {}).unwrap();

        db.drop_collection("users").unwrap();
        assert_eq!(db.collection_names().unwrap(), vec!["groups"]);
    }

    #[test]
    fn injected_faults_fire_in_order_and_count_as_operations() {
        let (conn, coll) = users();
        let before = conn.operations();
        conn.inject_fault(DriverError::ConnectionLost("reset".to_string()));

        let err = coll.insert(doc! { "name": "a" }).unwrap_err();
        assert!(matches!(err, DriverError::ConnectionLost(_)));

        coll.insert(doc! { "name": "a" }).unwrap();
        assert_eq!(conn.operations() - before, 2);
    }

    #[test]
    fn cursor_surfaces_a_fault_without_losing_the_document() {
        let (conn, coll) = users();
        coll.insert(doc! { "name": "a" }).unwrap();
        coll.insert(doc! { "name": "b" }).unwrap();

        let mut cursor = coll.find(None).unwrap();
        assert!(cursor.next().unwrap().is_ok());

        conn.inject_fault(DriverError::ConnectionLost("reset".to_string()));
        assert!(cursor.next().unwrap().is_err());

        let resumed = cursor.next().unwrap().unwrap();
        assert_eq!(resumed.get_str("name").unwrap(), "b");
        assert!(cursor.next().is_none());
    }
}
