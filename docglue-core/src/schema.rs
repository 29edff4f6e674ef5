//! Schema declaration and record validation.
//!
//! A [`Schema`] fixes, per record type, the collection it binds to, the
//! declared fields and their validators, the strictness flag, and any
//! index declarations. Schemas are immutable once built; binding never
//! mutates them.

use std::{fmt, sync::Arc};

use bson::Document;

use crate::{
    error::ValidationError,
    index::{IndexKeys, IndexOptions},
};

/// A field validator, invoked with the full record and the field name.
#[derive(Clone)]
pub enum Validator {
    /// The field must be present.
    Required,
    /// Always satisfied.
    Optional,
    /// An arbitrary predicate over the record and field name.
    Custom(Arc<dyn Fn(&Document, &str) -> bool + Send + Sync>),
}

impl Validator {
    fn check(&self, record: &Document, field: &str) -> bool {
        match self {
            Validator::Required => record.contains_key(field),
            Validator::Optional => true,
            Validator::Custom(predicate) => predicate(record, field),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Required => f.write_str("Required"),
            Validator::Optional => f.write_str("Optional"),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The declared shape of a record type.
#[derive(Debug, Clone)]
pub struct Schema {
    collection: String,
    strict: bool,
    fields: Vec<(String, Validator)>,
    indexes: Vec<(IndexKeys, IndexOptions)>,
}

impl Schema {
    /// Starts declaring a schema bound to the named collection.
    pub fn builder(collection: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                collection: collection.into(),
                strict: false,
                fields: Vec::new(),
                indexes: Vec::new(),
            },
        }
    }

    /// The collection this schema binds to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Declared fields and validators, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Validator)> {
        self.fields
            .iter()
            .map(|(name, validator)| (name.as_str(), validator))
    }

    /// Index declarations attached to this schema.
    pub fn indexes(&self) -> &[(IndexKeys, IndexOptions)] {
        &self.indexes
    }

    /// Validates a record against this schema.
    ///
    /// Strict schemas first reject any field outside the declared set
    /// (`_id` is always allowed), naming the offending fields. Then
    /// every declared validator runs against the full record, strict or
    /// not.
    pub fn validate(&self, record: &Document) -> Result<(), ValidationError> {
        if self.strict {
            let unknown: Vec<String> = record
                .iter()
                .map(|(key, _)| key)
                .filter(|key| {
                    key.as_str() != "_id" && !self.fields.iter().any(|(field, _)| field == *key)
                })
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(ValidationError::UnknownFields(unknown));
            }
        }
        for (field, validator) in &self.fields {
            if !validator.check(record, field) {
                return Err(ValidationError::Failed(field.clone()));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Marks the schema strict: saved documents may only contain
    /// declared fields.
    pub fn strict(mut self) -> Self {
        self.schema.strict = true;
        self
    }

    /// Declares a field that must be present.
    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.schema
            .fields
            .push((field.into(), Validator::Required));
        self
    }

    /// Declares a field with no constraint beyond being known.
    pub fn optional(mut self, field: impl Into<String>) -> Self {
        self.schema
            .fields
            .push((field.into(), Validator::Optional));
        self
    }

    /// Declares a field checked by a custom predicate.
    pub fn field(
        mut self,
        field: impl Into<String>,
        predicate: impl Fn(&Document, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.schema
            .fields
            .push((field.into(), Validator::Custom(Arc::new(predicate))));
        self
    }

    /// Attaches an index declaration, applied lazily on first use of a
    /// bound handle.
    pub fn index(mut self, keys: IndexKeys, options: IndexOptions) -> Self {
        self.schema.indexes.push((keys, options));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}
