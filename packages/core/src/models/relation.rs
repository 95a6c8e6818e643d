//! Relation allow-list pairs

use serde::{Deserialize, Serialize};

/// Row of `node_relations` or `file_relations`: `dependent_type` may be
/// attached under an owner of `owner_type`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub owner_type: String,
    pub dependent_type: String,
}

impl Relation {
    pub fn new(owner_type: impl Into<String>, dependent_type: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            dependent_type: dependent_type.into(),
        }
    }
}
