//! Error types and result aliases for driver and mapper operations.
//!
//! Two error surfaces exist side by side. [`DriverError`] is what a
//! document store driver raises: it carries the transient/permanent
//! distinction the retry layer classifies on. [`MapperError`] is what
//! the mapping layer returns to callers: validation and misuse failures
//! are raised locally before any store interaction, driver failures are
//! wrapped.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors raised by a document store driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The connection to the store was lost mid-operation. The call may
    /// succeed if re-issued.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// The store rejected the operation. The message text decides
    /// whether this is a permanent uniqueness violation or a transient
    /// conflict worth retrying.
    #[error("operation failed: {0}")]
    OperationFailed(String),
    /// Conversion between document formats failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DriverError {
    /// True when this is a permanent duplicate-key (uniqueness)
    /// violation, recognized by message text the way the store reports
    /// it.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DriverError::OperationFailed(msg) if msg.contains("duplicate key error"))
    }
}

/// A specialized `Result` type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// A schema violation detected before the store is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Fields present on the record but absent from a strict schema.
    #[error("unknown fields: {}", .0.join(", "))]
    UnknownFields(Vec<String>),
    /// A declared validator rejected the record.
    #[error("validation failed for: {0}")]
    Failed(String),
}

/// Errors returned by document mapper operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The record violates its schema. Raised before any store
    /// interaction; never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A caller logic error, e.g. mutating a record that has no
    /// identity. Fatal and immediate.
    #[error("{0}")]
    Misuse(String),
    /// Conversion between document formats failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The underlying driver failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// A specialized `Result` type for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

impl From<BsonError> for DriverError {
    fn from(err: BsonError) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

impl From<BsonError> for MapperError {
    fn from(err: BsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MapperError {
    fn from(err: SerdeJsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}
