//! Statements over the shared `nodes` tree
//!
//! `nodes(id, type, owner_id, owner_type, created_at, updated_at)`: one row
//! per node-backed entity row, sharing its id.

use crate::models::{BoundQuery, OwnerRef};
use serde_json::Value;

pub const NODES_TABLE: &str = "nodes";

/// Upper bound on ancestor walks; deeper chains indicate a corrupted tree
pub const MAX_TREE_DEPTH: u32 = 256;

fn owner_values(owner: Option<&OwnerRef>) -> (Value, Value) {
    match owner {
        Some(owner) => (Value::from(owner.id), Value::from(owner.owner_type.as_str())),
        None => (Value::Null, Value::Null),
    }
}

/// Allocate a node; the returned row's `id` keys the paired entity row
pub fn insert_node(node_type: &str, owner: Option<&OwnerRef>) -> BoundQuery {
    let (owner_id, owner_type) = owner_values(owner);
    let mut query = BoundQuery::new();
    let type_ph = query.bind(Value::from(node_type), "varchar");
    let owner_id_ph = query.bind(owner_id, "integer");
    let owner_type_ph = query.bind(owner_type, "varchar");
    query.push_str(&format!(
        "INSERT INTO {NODES_TABLE} (type,owner_id,owner_type,created_at,updated_at) \
         VALUES ({type_ph},{owner_id_ph},{owner_type_ph},NOW(),NOW()) RETURNING *"
    ));
    query
}

pub fn select_node(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!("SELECT * FROM {NODES_TABLE} WHERE id = {id_ph}"));
    query
}

/// Direct children of a node
pub fn select_children(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!(
        "SELECT * FROM {NODES_TABLE} WHERE owner_id = {id_ph} ORDER BY id"
    ));
    query.ordered_by(&["id"])
}

/// `has_dependents` boolean column: whether any node is owned by `id`
pub fn has_dependents(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!(
        "SELECT EXISTS (SELECT 1 FROM {NODES_TABLE} WHERE owner_id = {id_ph}) AS has_dependents"
    ));
    query
}

/// Ancestors of a node, nearest first (the node itself excluded)
///
/// Rows carry a `depth` column (1 for the direct owner) alongside the `nodes`
/// columns.
pub fn select_ancestors(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!(
        "WITH RECURSIVE ancestors AS (\
         SELECT p.id, p.type, p.owner_id, p.owner_type, p.created_at, p.updated_at, 1 AS depth \
         FROM {NODES_TABLE} AS p JOIN {NODES_TABLE} AS c ON c.owner_id = p.id \
         WHERE c.id = {id_ph} \
         UNION ALL \
         SELECT p.id, p.type, p.owner_id, p.owner_type, p.created_at, p.updated_at, a.depth + 1 \
         FROM {NODES_TABLE} AS p JOIN ancestors AS a ON a.owner_id = p.id \
         WHERE a.depth < {MAX_TREE_DEPTH}) \
         SELECT id, type, owner_id, owner_type, created_at, updated_at, depth \
         FROM ancestors ORDER BY depth"
    ));
    query.ordered_by(&["depth"])
}

/// Move a node under a new owner
pub fn reparent(id: i64, owner: &OwnerRef) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    let owner_id_ph = query.bind(Value::from(owner.id), "integer");
    let owner_type_ph = query.bind(Value::from(owner.owner_type.as_str()), "varchar");
    query.push_str(&format!(
        "UPDATE {NODES_TABLE} SET owner_id = {owner_id_ph}, owner_type = {owner_type_ph}, \
         updated_at = NOW() WHERE id = {id_ph} RETURNING *"
    ));
    query
}

pub fn delete_node(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!(
        "DELETE FROM {NODES_TABLE} WHERE id = {id_ph} RETURNING *"
    ));
    query
}

/// Registered node type names
pub fn select_node_types() -> BoundQuery {
    BoundQuery::raw("SELECT name FROM node_types ORDER BY name").ordered_by(&["name"])
}
