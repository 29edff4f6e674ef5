//! The in-memory record handle produced by the mapper.

use bson::{Bson, Document, oid::ObjectId};
use serde_json::Value;

use crate::error::{MapperError, MapperResult};

/// A single mapped document: a store-assigned identity plus an ordered
/// field mapping.
///
/// A record starts life with an identity already assigned (records are
/// only materialized by `create` or `find`). `remove` invalidates the
/// identity; the value stays usable in memory but is no longer backed
/// by a store entry and refuses further persistence operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<ObjectId>,
    fields: Document,
}

impl Record {
    pub(crate) fn new(id: ObjectId, fields: Document) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }

    /// Splits a raw driver document into identity and fields.
    pub(crate) fn from_raw(mut raw: Document) -> MapperResult<Self> {
        match raw.remove("_id") {
            Some(Bson::ObjectId(id)) => Ok(Self {
                id: Some(id),
                fields: raw,
            }),
            Some(other) => Err(MapperError::Serialization(format!(
                "unexpected _id value: {other}"
            ))),
            None => Err(MapperError::Serialization(
                "document is missing _id".to_string(),
            )),
        }
    }

    /// The store-assigned identity, or `None` once removed.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// The record's fields, excluding the identity.
    pub fn fields(&self) -> &Document {
        &self.fields
    }

    /// A single field value.
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.fields.get(field)
    }

    /// The fields as a JSON value.
    pub fn to_json(&self) -> MapperResult<Value> {
        Ok(serde_json::to_value(&self.fields)?)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Document {
        &mut self.fields
    }

    pub(crate) fn invalidate_id(&mut self) {
        self.id = None;
    }
}
