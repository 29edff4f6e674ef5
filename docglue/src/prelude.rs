//! Convenient re-exports of commonly used types from docglue.
//!
//! Import this prelude module to quickly access the most frequently
//! used types and traits without needing to import from multiple
//! sub-modules:
//!
//! ```ignore
//! use docglue::prelude::*;
//! ```
//!
//! This provides access to:
//! - Driver traits and the resilient proxy handles
//! - Schema construction and validation
//! - Records, bound collections, and the binding factory
//! - Index declarations
//! - Error types and result aliases

pub use docglue_core::{
    driver::{Collection, Connection, Database},
    error::{DriverError, DriverResult, MapperError, MapperResult, ValidationError},
    index::{IndexDirection, IndexInfo, IndexKeys, IndexOptions},
    mapper::{BoundCollection, Namespace, bind},
    record::Record,
    retry::{
        ErrorClass, ResilientCollection, ResilientConnection, ResilientCursor, ResilientDatabase,
        RetryPolicy, classify_default, with_retry,
    },
    schema::{Schema, SchemaBuilder, Validator},
};
