//! Node Data Structures
//!
//! A `Node` is one vertex of the shared adjacency-list tree. Every node-backed
//! entity row has exactly one node with the same `id`; the node's `node_type`
//! names the registry entry that governs that row.
//!
//! # Examples
//!
//! ```rust
//! use survey_archive_core::models::OwnerRef;
//!
//! // A station attached under survey season 12
//! let owner = OwnerRef::new(12, "survey_seasons");
//! assert_eq!(owner.owner_type, "survey_seasons");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `nodes` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Shared primary key (also the id of the entity row)
    pub id: i64,

    /// Entity type name, e.g. "stations"
    #[serde(rename = "type")]
    pub node_type: String,

    /// Owning node id (NULL for root nodes)
    pub owner_id: Option<i64>,

    /// Owning node type (NULL for root nodes)
    pub owner_type: Option<String>,

    #[serde(deserialize_with = "crate::models::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    #[serde(deserialize_with = "crate::models::timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Owner of this node, if attached
    pub fn owner(&self) -> Option<OwnerRef> {
        match (self.owner_id, &self.owner_type) {
            (Some(id), Some(owner_type)) => Some(OwnerRef::new(id, owner_type.clone())),
            _ => None,
        }
    }

    /// Root nodes have no owner
    pub fn is_root(&self) -> bool {
        self.owner_id.is_none()
    }
}

/// Polymorphic owner reference: an (id, type) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: i64,
    pub owner_type: String,
}

impl OwnerRef {
    pub fn new(id: i64, owner_type: impl Into<String>) -> Self {
        Self {
            id,
            owner_type: owner_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::from_record;
    use serde_json::json;

    #[test]
    fn test_node_decodes_from_row_json() {
        let record = json!({
            "id": 42,
            "type": "stations",
            "owner_id": 7,
            "owner_type": "survey_seasons",
            "created_at": "2024-03-01T09:00:00.000001+00:00",
            "updated_at": "2024-03-01T09:00:00"
        })
        .as_object()
        .cloned()
        .unwrap();

        let node: Node = from_record(record).unwrap();
        assert_eq!(node.id, 42);
        assert_eq!(node.node_type, "stations");
        assert_eq!(node.owner(), Some(OwnerRef::new(7, "survey_seasons")));
        assert!(!node.is_root());
    }

    #[test]
    fn test_root_node_has_no_owner() {
        let record = json!({
            "id": 1,
            "type": "surveyors",
            "owner_id": null,
            "owner_type": null,
            "created_at": "2024-03-01T09:00:00+00:00",
            "updated_at": "2024-03-01T09:00:00+00:00"
        })
        .as_object()
        .cloned()
        .unwrap();

        let node: Node = from_record(record).unwrap();
        assert!(node.is_root());
        assert_eq!(node.owner(), None);
    }
}
