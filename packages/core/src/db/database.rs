//! Database Connection Management
//!
//! This module provides the pooled PostgreSQL connection used by the
//! archive services.
//!
//! # Connection Patterns
//!
//! Single statements run on a checked-out client:
//!
//! ```no_run
//! # use survey_archive_core::db::{DatabaseConfig, DatabaseService, QueryExecutor};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseService::new(DatabaseConfig::from_env())?;
//! let client = db.client().await?;
//! db.health_check().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Paired writes open a transaction on the client; dropping it without
//! `commit` rolls back. The pool does not connect until the first checkout.

use crate::db::{DatabaseConfig, DatabaseError, QueryExecutor};
use crate::models::BoundQuery;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Pooled access to the archive database
#[derive(Clone)]
pub struct DatabaseService {
    pool: Pool,
    config: DatabaseConfig,
}

impl DatabaseService {
    /// Create the connection pool
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidConfig` for invalid settings and
    /// `DatabaseError::PoolCreation` if the pool cannot be built.
    pub fn new(config: DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate()?;
        let pg_config = config.to_pg_config()?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.max_size)
            .build()
            .map_err(|e| DatabaseError::pool_creation(e.to_string()))?;

        tracing::info!(
            max_size = config.max_size,
            schema = %config.schema,
            "database pool created"
        );

        Ok(Self { pool, config })
    }

    /// Check out a pooled connection
    pub async fn client(&self) -> Result<Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Catalog schema holding the archive tables
    pub fn catalog_schema(&self) -> &str {
        &self.config.schema
    }

    /// Round-trip a trivial statement
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let client = self.client().await?;
        let row = (**client)
            .fetch_optional(&BoundQuery::raw("SELECT 1 AS ok"))
            .await?;
        match row {
            Some(_) => Ok(()),
            None => Err(DatabaseError::row_decode("health check returned no row")),
        }
    }
}
