//! Service Layer Error Types
//!
//! This module defines error types for the archive services, providing
//! detailed error handling for schema, relation and tree-integrity failures.
//! Database errors are wrapped without modification.

use crate::db::DatabaseError;
use crate::models::SchemaError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Registry lookup or schema validation failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Attachment violates the relation allow-list
    #[error("Invalid relation: '{dependent_type}' cannot be attached under '{owner_type}'")]
    InvalidRelation {
        dependent_type: String,
        owner_type: String,
    },

    /// Reparent would put a node under itself or one of its descendants
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// Live database disagrees with the static registry
    #[error("Schema mismatch for table '{table}': {detail}")]
    SchemaMismatch { table: String, detail: String },

    /// Delete refused because the node still has dependents
    #[error("Refusing to delete node {id}: it still has {dependents}")]
    OrphanDeletionRefused { id: i64, dependents: String },

    /// Row not found by id
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: i64 },

    /// File-backed entities need an owner node
    #[error("'{0}' requires an owner")]
    MissingOwner(String),

    /// Operation does not apply to this kind of entity
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Row could not be decoded into a model
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ArchiveError {
    /// Create an invalid relation error
    pub fn invalid_relation(dependent_type: impl Into<String>, owner_type: impl Into<String>) -> Self {
        Self::InvalidRelation {
            dependent_type: dependent_type.into(),
            owner_type: owner_type.into(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            detail: detail.into(),
        }
    }

    /// Create an orphan deletion refused error
    pub fn orphan_deletion_refused(id: i64, dependents: impl Into<String>) -> Self {
        Self::OrphanDeletionRefused {
            id,
            dependents: dependents.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<tokio_postgres::Error> for ArchiveError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Database(DatabaseError::Postgres(e))
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
