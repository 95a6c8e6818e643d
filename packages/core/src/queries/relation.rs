//! Relation allow-list statements

use crate::models::BoundQuery;

pub const NODE_RELATIONS_TABLE: &str = "node_relations";
pub const FILE_RELATIONS_TABLE: &str = "file_relations";

pub fn select_node_relations() -> BoundQuery {
    BoundQuery::raw(format!(
        "SELECT owner_type, dependent_type FROM {NODE_RELATIONS_TABLE} \
         ORDER BY owner_type, dependent_type"
    ))
    .ordered_by(&["owner_type", "dependent_type"])
}

pub fn select_file_relations() -> BoundQuery {
    BoundQuery::raw(format!(
        "SELECT owner_type, dependent_type FROM {FILE_RELATIONS_TABLE} \
         ORDER BY owner_type, dependent_type"
    ))
    .ordered_by(&["owner_type", "dependent_type"])
}
