//! Database connection configuration

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Connection settings for the archive database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; when set it overrides the discrete fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// Maximum pooled connections
    pub max_size: usize,

    /// Catalog schema holding the archive tables
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "archive".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            schema: "public".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Read `ARCHIVE_DB_*` environment variables over the defaults
    ///
    /// - `ARCHIVE_DATABASE_URL`
    /// - `ARCHIVE_DB_HOST`, `ARCHIVE_DB_PORT`, `ARCHIVE_DB_NAME`
    /// - `ARCHIVE_DB_USER`, `ARCHIVE_DB_PASSWORD`
    /// - `ARCHIVE_DB_POOL_SIZE`, `ARCHIVE_DB_SCHEMA`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("ARCHIVE_DATABASE_URL"),
            host: lookup("ARCHIVE_DB_HOST").unwrap_or(defaults.host),
            port: lookup("ARCHIVE_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("ARCHIVE_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("ARCHIVE_DB_USER").unwrap_or(defaults.user),
            password: lookup("ARCHIVE_DB_PASSWORD").unwrap_or_default(),
            max_size: lookup("ARCHIVE_DB_POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            schema: lookup("ARCHIVE_DB_SCHEMA").unwrap_or(defaults.schema),
        }
    }

    /// Configuration for a connection string, other settings defaulted
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.max_size == 0 {
            return Err(DatabaseError::invalid_config(
                "max_size must be greater than 0",
            ));
        }
        if !crate::models::schema::validate_identifier(&self.schema) {
            return Err(DatabaseError::invalid_config(format!(
                "schema '{}' is not a valid identifier",
                self.schema
            )));
        }
        if self.url.is_none() {
            if self.host.is_empty() {
                return Err(DatabaseError::invalid_config("host cannot be empty"));
            }
            if self.dbname.is_empty() {
                return Err(DatabaseError::invalid_config("dbname cannot be empty"));
            }
        }
        Ok(())
    }

    /// Driver-level configuration
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, DatabaseError> {
        if let Some(url) = &self.url {
            return url
                .parse()
                .map_err(|e| DatabaseError::invalid_config(format!("invalid url: {e}")));
        }

        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user);
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        Ok(pg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("ARCHIVE_DB_HOST", "db.internal"),
            ("ARCHIVE_DB_PORT", "6543"),
            ("ARCHIVE_DB_POOL_SIZE", "4"),
        ]
        .into_iter()
        .collect();

        let config = DatabaseConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.dbname, "archive");
        assert_eq!(config.schema, "public");
        assert!(config.url.is_none());
    }

    #[test]
    fn test_unparseable_port_falls_back() {
        let config = DatabaseConfig::from_lookup(|k| {
            (k == "ARCHIVE_DB_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.port, 5432);
    }

    #[test]
    fn test_validate() {
        assert!(DatabaseConfig::default().validate().is_ok());

        let config = DatabaseConfig {
            max_size: 0,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            schema: "public; drop".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_pg_config_from_url() {
        let config = DatabaseConfig::from_url("postgres://archive@localhost:5433/archive_test");
        let pg = config.to_pg_config().unwrap();
        assert_eq!(pg.get_dbname(), Some("archive_test"));
        assert_eq!(pg.get_ports(), &[5433]);

        let config = DatabaseConfig::from_url("postgres://localhost:notaport/archive");
        assert!(config.to_pg_config().is_err());
    }
}
