//! Statement Builders
//!
//! Pure functions from registry metadata (and request values) to
//! [`BoundQuery`](crate::models::BoundQuery) values. Nothing in this module
//! touches a connection; execution belongs to [`crate::db`] and the services.
//!
//! - [`QueryBuilder`] - CRUD statements for any registered entity table
//! - [`node`] - statements over the shared `nodes` tree
//! - [`file`] - statements over the shared `files` table
//! - [`relation`] - relation allow-list loading
//! - [`catalog`] - `information_schema` introspection
//!
//! Identifiers are spliced into SQL text only when they come from a validated
//! [`EntitySchema`](crate::models::EntitySchema) or are constants of this
//! module. All request values are bind parameters with explicit casts.

pub mod catalog;
mod entity;
pub mod file;
pub mod node;
pub mod relation;

pub use entity::QueryBuilder;
pub(crate) use entity::delete_row;

use serde::{Deserialize, Serialize};

/// Default number of rows per `build_select_all` page
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Query generation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Rows per page for list queries
    pub page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }
        Ok(())
    }
}
