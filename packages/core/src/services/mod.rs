//! Archive Services
//!
//! This module contains the services that execute statements and enforce the
//! archive's structural rules:
//!
//! - `RelationValidator` - Node and file relation allow-lists
//! - `NodeTreeStore` - The shared `nodes` adjacency list
//! - `FileAttachmentStore` - The shared `files` table
//! - `EntityStore` - Coordinated entity CRUD, routed by entity kind
//! - `SchemaIntrospector` - Catalog queries and registry verification
//! - `EntityService` - Pool- and transaction-owning front door
//!
//! Stores are generic over [`QueryExecutor`](crate::db::QueryExecutor), so a
//! coordinated operation runs the same on a pooled client or inside a
//! transaction.

pub mod entity_service;
pub mod entity_store;
pub mod error;
pub mod file_store;
pub mod node_store;
pub mod relation_validator;
pub mod schema_introspector;

#[cfg(test)]
pub(crate) mod test_support;

pub use entity_service::EntityService;
pub use entity_store::{CreateEntityParams, EntityStore};
pub use error::ArchiveError;
pub use file_store::FileAttachmentStore;
pub use node_store::NodeTreeStore;
pub use relation_validator::RelationValidator;
pub use schema_introspector::{
    ColumnInfo, FieldDescription, Mismatch, RegistryReport, SchemaIntrospector,
};
