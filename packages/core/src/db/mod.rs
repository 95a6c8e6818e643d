//! Database Layer
//!
//! This module handles all database interactions with PostgreSQL:
//!
//! - Connection configuration (`DatabaseConfig`, environment driven)
//! - Pooled connections through `deadpool-postgres`
//! - The `QueryExecutor` seam: runs a `BoundQuery` on a client or an open
//!   transaction and returns rows as JSON records
//!
//! # Architecture
//!
//! Statement text is produced by [`crate::queries`]; this layer never builds
//! SQL of its own beyond wrapping a statement so its rows come back as JSON
//! objects. Transactions are opened by the services that need two-row
//! atomicity, through the pooled client.

mod config;
mod database;
mod error;
mod executor;

pub use config::DatabaseConfig;
pub use database::DatabaseService;
pub use error::DatabaseError;
pub use executor::QueryExecutor;
