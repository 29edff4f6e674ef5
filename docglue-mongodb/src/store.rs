use std::collections::HashMap;

use bson::{Bson, Document, oid::ObjectId};
use mongodb::{
    IndexModel,
    error::ErrorKind,
    options::IndexOptions as MongoIndexOptions,
    sync::{Client, Collection as MongoCollection, Cursor, Database},
};

use docglue_core::{
    driver,
    error::{DriverError, DriverResult},
    index::{IndexInfo, IndexKeys, IndexOptions},
};

/// Maps driver errors onto the two-way transient/fatal split the retry
/// layer classifies on: connectivity-shaped failures become
/// [`DriverError::ConnectionLost`], everything else keeps the server's
/// wording in [`DriverError::OperationFailed`].
fn map_error(err: mongodb::error::Error) -> DriverError {
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => DriverError::ConnectionLost(err.to_string()),
        _ => DriverError::OperationFailed(err.to_string()),
    }
}

fn index_keys_document(keys: &IndexKeys) -> Document {
    let mut document = Document::new();
    for (field, direction) in keys.iter() {
        document.insert(field.clone(), direction.as_i32());
    }
    document
}

fn index_info_from_model(model: &IndexModel) -> (String, IndexInfo) {
    let mut keys = IndexKeys::new();
    for (field, direction) in model.keys.iter() {
        let descending = matches!(
            direction,
            Bson::Int32(value) if *value < 0
        ) || matches!(direction, Bson::Int64(value) if *value < 0)
            || matches!(direction, Bson::Double(value) if *value < 0.0);
        keys = match descending {
            true => keys.desc(field.clone()),
            false => keys.asc(field.clone()),
        };
    }
    let options = model.options.as_ref();
    let name = options
        .and_then(|opts| opts.name.clone())
        .unwrap_or_else(|| keys.default_name());
    let info = IndexInfo {
        keys,
        options: IndexOptions {
            unique: options.and_then(|opts| opts.unique).unwrap_or(false),
            sparse: options.and_then(|opts| opts.sparse).unwrap_or(false),
        },
    };
    (name, info)
}

/// A connection to a MongoDB deployment over the synchronous driver.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    /// Connects using a MongoDB connection string.
    pub fn connect(dsn: &str) -> DriverResult<Self> {
        Ok(Self {
            client: Client::with_uri_str(dsn).map_err(map_error)?,
        })
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl driver::Connection for MongoConnection {
    type Database = MongoDbDatabase;

    fn database(&self, name: &str) -> MongoDbDatabase {
        MongoDbDatabase {
            database: self.client.database(name),
        }
    }

    fn database_names(&self) -> DriverResult<Vec<String>> {
        self.client
            .list_database_names()
            .run()
            .map_err(map_error)
    }
}

/// A database handle within a [`MongoConnection`].
#[derive(Debug, Clone)]
pub struct MongoDbDatabase {
    database: Database,
}

impl driver::Database for MongoDbDatabase {
    type Collection = MongoDbCollection;

    fn collection(&self, name: &str) -> MongoDbCollection {
        MongoDbCollection {
            database: self.database.clone(),
            name: name.to_string(),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        self.database
            .list_collection_names()
            .run()
            .map_err(map_error)
    }

    fn drop_collection(&self, name: &str) -> DriverResult<()> {
        self.database
            .collection::<Document>(name)
            .drop()
            .run()
            .map_err(map_error)
    }
}

/// A collection handle within a [`MongoDbDatabase`].
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    database: Database,
    name: String,
}

impl MongoDbCollection {
    fn handle(&self) -> MongoCollection<Document> {
        self.database.collection(&self.name)
    }
}

impl driver::Collection for MongoDbCollection {
    type Cursor = MongoCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Self {
        Self {
            database: self.database.clone(),
            name: format!("{}.{}", self.name, name),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        self.database
            .list_collection_names()
            .run()
            .map_err(map_error)
    }

    fn insert(&self, document: Document) -> DriverResult<ObjectId> {
        let result = self
            .handle()
            .insert_one(document)
            .run()
            .map_err(map_error)?;
        match result.inserted_id {
            Bson::ObjectId(id) => Ok(id),
            other => Err(DriverError::Serialization(format!(
                "store assigned a non-ObjectId identity: {other}"
            ))),
        }
    }

    fn find(&self, filter: Option<Document>) -> DriverResult<MongoCursor> {
        let cursor = self
            .handle()
            .find(filter.unwrap_or_default())
            .run()
            .map_err(map_error)?;
        Ok(MongoCursor { cursor })
    }

    fn find_one(&self, filter: Option<Document>) -> DriverResult<Option<Document>> {
        self.handle()
            .find_one(filter.unwrap_or_default())
            .run()
            .map_err(map_error)
    }

    fn update(&self, filter: Document, update: Document) -> DriverResult<()> {
        self.handle()
            .update_many(filter, update)
            .run()
            .map_err(map_error)?;
        Ok(())
    }

    fn remove(&self, filter: Option<Document>) -> DriverResult<()> {
        self.handle()
            .delete_many(filter.unwrap_or_default())
            .run()
            .map_err(map_error)?;
        Ok(())
    }

    fn drop(&self) -> DriverResult<()> {
        self.handle().drop().run().map_err(map_error)
    }

    fn ensure_index(&self, keys: &IndexKeys, options: &IndexOptions) -> DriverResult<String> {
        let model = IndexModel::builder()
            .keys(index_keys_document(keys))
            .options(
                MongoIndexOptions::builder()
                    .name(keys.default_name())
                    .unique(options.unique)
                    .sparse(options.sparse)
                    .build(),
            )
            .build();
        let result = self.handle().create_index(model).run().map_err(map_error)?;
        Ok(result.index_name)
    }

    fn index_information(&self) -> DriverResult<HashMap<String, IndexInfo>> {
        let mut information = HashMap::new();
        let models = self.handle().list_indexes().run().map_err(map_error)?;
        for model in models {
            let model = model.map_err(map_error)?;
            let (name, info) = index_info_from_model(&model);
            information.insert(name, info);
        }
        Ok(information)
    }
}

/// Streaming cursor over a MongoDB result set.
pub struct MongoCursor {
    cursor: Cursor<Document>,
}

impl std::fmt::Debug for MongoCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoCursor").finish_non_exhaustive()
    }
}

impl Iterator for MongoCursor {
    type Item = DriverResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next()
            .map(|item| item.map_err(map_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn index_keys_translate_to_a_direction_document() {
        let keys = IndexKeys::new().desc("last_name").asc("first_name");
        assert_eq!(
            index_keys_document(&keys),
            doc! { "last_name": -1, "first_name": 1 }
        );
    }

    #[test]
    fn index_models_translate_back_to_declarations() {
        let model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                MongoIndexOptions::builder()
                    .name("email_1".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let (name, info) = index_info_from_model(&model);
        assert_eq!(name, "email_1");
        assert_eq!(info.keys, IndexKeys::new().asc("email"));
        assert!(info.options.unique);
        assert!(!info.options.sparse);
    }

    #[test]
    fn unnamed_index_models_fall_back_to_the_generated_name() {
        let model = IndexModel::builder().keys(doc! { "age": -1 }).build();
        let (name, info) = index_info_from_model(&model);
        assert_eq!(name, "age_-1");
        assert_eq!(info.keys, IndexKeys::new().desc("age"));
    }
}
