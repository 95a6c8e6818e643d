//! File attachment rows
//!
//! Files hang off any node through the same polymorphic (id, type) owner pair
//! that nodes use. They are always leaves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `files` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Shared primary key (also the id of the file-backed entity row)
    pub id: i64,

    /// File-backed entity type name, e.g. "images"
    pub file_type: String,

    pub owner_id: i64,
    pub owner_type: String,

    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub fs_path: Option<String>,

    #[serde(deserialize_with = "crate::models::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    #[serde(deserialize_with = "crate::models::timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Media metadata supplied when attaching a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: Option<String>,
    pub file_size: Option<i64>,
    pub mimetype: Option<String>,
    pub fs_path: Option<String>,
}
