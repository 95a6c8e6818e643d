//! Catalog introspection statements
//!
//! Read-only queries against `information_schema`, scoped to one database
//! schema (normally `public`).

use crate::models::BoundQuery;
use serde_json::Value;

/// Base tables of a schema
pub fn list_tables(catalog_schema: &str) -> BoundQuery {
    let mut query = BoundQuery::new();
    let schema_ph = query.bind(Value::from(catalog_schema), "varchar");
    query.push_str(&format!(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = {schema_ph} AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
    ));
    query.ordered_by(&["table_name"])
}

/// Columns of one table, with the table each foreign-key column references
///
/// The foreign-key target is resolved by joining the column's `FOREIGN KEY`
/// constraint through `key_column_usage` to `constraint_column_usage`.
pub fn list_columns(catalog_schema: &str, table: &str) -> BoundQuery {
    let mut query = BoundQuery::new();
    let schema_ph = query.bind(Value::from(catalog_schema), "varchar");
    let table_ph = query.bind(Value::from(table), "varchar");
    query.push_str(&format!(
        "SELECT c.column_name, c.data_type, (c.is_nullable = 'YES') AS is_nullable, \
         c.ordinal_position, fk.references_table \
         FROM information_schema.columns AS c \
         LEFT JOIN (\
         SELECT DISTINCT ON (kcu.table_schema, kcu.table_name, kcu.column_name) \
         kcu.table_schema, kcu.table_name, kcu.column_name, ccu.table_name AS references_table \
         FROM information_schema.key_column_usage AS kcu \
         JOIN information_schema.table_constraints AS tc \
         ON tc.constraint_name = kcu.constraint_name \
         AND tc.table_schema = kcu.table_schema \
         AND tc.constraint_type = 'FOREIGN KEY' \
         JOIN information_schema.constraint_column_usage AS ccu \
         ON ccu.constraint_name = tc.constraint_name \
         AND ccu.constraint_schema = tc.constraint_schema\
         ) AS fk \
         ON fk.table_schema = c.table_schema \
         AND fk.table_name = c.table_name \
         AND fk.column_name = c.column_name \
         WHERE c.table_schema = {schema_ph} AND c.table_name = {table_ph} \
         ORDER BY c.ordinal_position"
    ));
    query.ordered_by(&["ordinal_position"])
}
