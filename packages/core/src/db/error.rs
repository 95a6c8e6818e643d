//! Database Error Types
//!
//! This module defines error types for database operations, providing
//! clear error handling for configuration, pool, and query failures.

use thiserror::Error;

/// Database operation errors
///
/// PostgreSQL errors (constraint violations, failed casts) are carried
/// unmodified in `Postgres` so callers can inspect the SQLSTATE.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Invalid connection configuration
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),

    /// Failed to create the connection pool
    #[error("Failed to create connection pool: {0}")]
    PoolCreation(String),

    /// Failed to check out a pooled connection
    #[error("Failed to get pooled connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Statement failed on the server or in transport
    #[error("Database operation failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// A returned row could not be decoded
    #[error("Failed to decode row: {0}")]
    RowDecode(String),
}

impl DatabaseError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a pool creation error
    pub fn pool_creation(msg: impl Into<String>) -> Self {
        Self::PoolCreation(msg.into())
    }

    /// Create a row decode error
    pub fn row_decode(msg: impl Into<String>) -> Self {
        Self::RowDecode(msg.into())
    }

    /// SQLSTATE code of a server-side error, e.g. `23503` for a foreign-key
    /// violation
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|code| code.code()),
            _ => None,
        }
    }
}
