//! Data Models
//!
//! This module contains the data structures used throughout the archive core:
//!
//! - `EntitySchema` - Typed, validated registry entry for one entity type
//! - `SchemaRegistry` - Process-wide, read-only set of entity schemas
//! - `Node` / `FileRecord` - Rows of the shared `nodes` and `files` tables
//! - `Relation` - Allow-list pair from `node_relations` / `file_relations`
//! - `BoundQuery` - Parameterized SQL text plus its ordered bind values
//!
//! Entity rows themselves are untyped: they travel as [`Record`] maps keyed by
//! column name, shaped by the registry rather than by Rust structs.

mod bound_query;
pub mod core_schemas;
mod file;
mod node;
mod registry;
mod relation;
pub mod schema;
mod timestamp;

pub use bound_query::BoundQuery;
pub use file::{FileMetadata, FileRecord};
pub use node::{Node, OwnerRef};
pub use registry::SchemaRegistry;
pub use relation::Relation;
pub use schema::{
    Attribute, AttributeType, EntityDefinition, EntityKind, EntitySchema, Role, SchemaError,
    TimestampColumns,
};

/// One fetched or submitted row, keyed by column name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Decode a row into a typed model
pub(crate) fn from_record<T: serde::de::DeserializeOwned>(
    record: Record,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(record))
}
