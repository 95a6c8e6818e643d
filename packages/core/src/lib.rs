//! Survey Archive Core
//!
//! Schema-driven storage for a photographic-survey archive: a registry of
//! entity types drives SQL generation for PostgreSQL, node-backed entities
//! hang in one shared ownership tree, and files attach to nodes through the
//! same polymorphic owner pair.
//!
//! # Architecture
//!
//! - **Registry first**: every table and column name in generated SQL comes
//!   from a validated [`EntitySchema`]
//! - **Bound queries**: statements are `{ sql, data }` with contiguous,
//!   explicitly cast `$n` placeholders
//! - **Shared tree**: `nodes` and `files` rows share their id with the entity
//!   row and are written in the same transaction
//! - **Allow-lists**: attachments are checked against `node_relations` and
//!   `file_relations`
//!
//! # Modules
//!
//! - [`models`] - Schemas, registry, nodes, files, bound queries
//! - [`queries`] - Pure statement builders
//! - [`db`] - PostgreSQL pool, configuration and the executor seam
//! - [`services`] - Stores, relation validator, introspector, entity service

pub mod db;
pub mod models;
pub mod queries;
pub mod services;

// Re-export commonly used types
pub use db::{DatabaseConfig, DatabaseError, DatabaseService, QueryExecutor};
pub use models::*;
pub use queries::{QueryBuilder, QueryConfig};
pub use services::*;
