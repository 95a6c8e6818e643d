//! Statements over the shared `files` table
//!
//! `files(id, file_type, owner_id, owner_type, filename, file_size, mimetype,
//! fs_path, created_at, updated_at)`: one row per file-backed entity row,
//! sharing its id.

use crate::models::{BoundQuery, FileMetadata, OwnerRef};
use serde_json::Value;

pub const FILES_TABLE: &str = "files";

fn optional<T: Clone + Into<Value>>(value: &Option<T>) -> Value {
    value.clone().map(Into::into).unwrap_or(Value::Null)
}

/// Allocate a file row; the returned row's `id` keys the paired entity row
pub fn insert_file(file_type: &str, owner: &OwnerRef, metadata: &FileMetadata) -> BoundQuery {
    let mut query = BoundQuery::new();
    let values = [
        query.bind(Value::from(file_type), "varchar"),
        query.bind(Value::from(owner.id), "integer"),
        query.bind(Value::from(owner.owner_type.as_str()), "varchar"),
        query.bind(optional(&metadata.filename), "varchar"),
        query.bind(optional(&metadata.file_size), "bigint"),
        query.bind(optional(&metadata.mimetype), "varchar"),
        query.bind(optional(&metadata.fs_path), "text"),
    ];
    query.push_str(&format!(
        "INSERT INTO {FILES_TABLE} \
         (file_type,owner_id,owner_type,filename,file_size,mimetype,fs_path,created_at,updated_at) \
         VALUES ({},NOW(),NOW()) RETURNING *",
        values.join(",")
    ));
    query
}

pub fn select_file(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!("SELECT * FROM {FILES_TABLE} WHERE id = {id_ph}"));
    query
}

/// Files attached to one owner node
pub fn select_by_owner(owner: &OwnerRef) -> BoundQuery {
    let mut query = BoundQuery::new();
    let owner_id_ph = query.bind(Value::from(owner.id), "integer");
    let owner_type_ph = query.bind(Value::from(owner.owner_type.as_str()), "varchar");
    query.push_str(&format!(
        "SELECT * FROM {FILES_TABLE} WHERE owner_id = {owner_id_ph} \
         AND owner_type = {owner_type_ph} ORDER BY id"
    ));
    query.ordered_by(&["id"])
}

/// `has_files` boolean column: whether any file hangs off node `owner_id`
pub fn has_files(owner_id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(owner_id), "integer");
    query.push_str(&format!(
        "SELECT EXISTS (SELECT 1 FROM {FILES_TABLE} WHERE owner_id = {id_ph}) AS has_files"
    ));
    query
}

pub fn delete_file(id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), "integer");
    query.push_str(&format!(
        "DELETE FROM {FILES_TABLE} WHERE id = {id_ph} RETURNING *"
    ));
    query
}
