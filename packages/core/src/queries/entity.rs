//! Entity Query Builder
//!
//! Generates CRUD statements for any registered entity table from its
//! [`EntitySchema`]. All builders are pure: same schema and input, same
//! [`BoundQuery`].
//!
//! ## Column rules for writes
//!
//! - Timestamp columns are never bound. Inserts render both as `NOW()`,
//!   updates render only the updated column.
//! - The id column is skipped on insert for plain entities (the table
//!   generates it). Node- and file-backed entities carry the id allocated by
//!   the `nodes`/`files` row, so it is written when the instance supplies it.
//! - Updates are sparse: only attributes present in the instance are set. The
//!   id binds `$1`; SET placeholders start at `$2`.
//!
//! Placeholders come from [`BoundQuery::bind`], which numbers them over the
//! filtered column list, so skipped columns never leave gaps.

use crate::models::{Attribute, BoundQuery, EntityKind, EntitySchema, Record, SchemaError};
use crate::queries::file::FILES_TABLE;
use crate::queries::node::NODES_TABLE;
use crate::queries::QueryConfig;
use serde_json::Value;

/// Stateless statement generator for entity tables
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    /// Create a builder with the given page size settings
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// `SELECT * FROM <table> [ORDER BY <col>] LIMIT <page> OFFSET <offset>`
    ///
    /// # Errors
    ///
    /// `SchemaError::UnknownColumn` if `order_by` is not an attribute or
    /// timestamp column of the schema. The column name is never interpolated
    /// unless it matches.
    pub fn build_select_all(
        &self,
        schema: &EntitySchema,
        offset: u64,
        order_by: Option<&str>,
    ) -> Result<BoundQuery, SchemaError> {
        let mut sql = format!("SELECT * FROM {}", schema.table());

        if let Some(column) = order_by {
            if !schema.has_column(column) {
                return Err(SchemaError::unknown_column(schema.table(), column));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(column);
        }

        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            self.config.page_size, offset
        ));

        let query = BoundQuery::raw(sql);
        Ok(match order_by {
            Some(column) => query.ordered_by(&[column]),
            None => query,
        })
    }

    /// `SELECT * FROM <table> WHERE <idKey> = $1::<id type>`
    pub fn build_select_by_id(&self, schema: &EntitySchema, id: i64) -> BoundQuery {
        let mut query = BoundQuery::new();
        let id_ph = query.bind(Value::from(id), schema.id_type().sql_cast());
        query.push_str(&format!(
            "SELECT * FROM {} WHERE {} = {}",
            schema.table(),
            schema.id_key(),
            id_ph
        ));
        query
    }

    /// Rows of `schema` owned by the `owner` row with id `owner_id`
    ///
    /// Node- and file-backed entities are matched through the shared
    /// `nodes`/`files` owner pair; plain entities through their own
    /// `owner_id` (and `owner_type`, when declared) columns. The owner's table
    /// is joined, so rows whose owner no longer exists are not returned.
    ///
    /// # Errors
    ///
    /// `SchemaError::InvalidSchema` for a plain entity without an `owner_id`
    /// attribute.
    pub fn build_select_by_owner(
        &self,
        schema: &EntitySchema,
        owner: &EntitySchema,
        owner_id: i64,
    ) -> Result<BoundQuery, SchemaError> {
        let mut query = BoundQuery::new();
        let table = schema.table();
        let id_key = schema.id_key();

        let sql = match schema.kind() {
            EntityKind::Node | EntityKind::File => {
                let shared = if schema.kind() == EntityKind::Node {
                    NODES_TABLE
                } else {
                    FILES_TABLE
                };
                let owner_id_ph = query.bind(Value::from(owner_id), owner.id_type().sql_cast());
                let owner_type_ph = query.bind(Value::from(owner.name()), "varchar");
                format!(
                    "SELECT t.* FROM {table} AS t \
                     JOIN {shared} AS s ON s.id = t.{id_key} \
                     JOIN {owner_table} AS o ON o.{owner_key} = s.owner_id \
                     WHERE s.owner_id = {owner_id_ph} AND s.owner_type = {owner_type_ph} \
                     ORDER BY t.{id_key}",
                    owner_table = owner.table(),
                    owner_key = owner.id_key(),
                )
            }
            EntityKind::Plain => {
                let owner_column = schema.attribute("owner_id").ok_or_else(|| {
                    SchemaError::invalid_schema(
                        schema.name(),
                        "plain entity has no owner_id attribute",
                    )
                })?;
                let owner_id_ph = query.bind(
                    Value::from(owner_id),
                    owner_column.attribute_type.sql_cast(),
                );
                let mut sql = format!(
                    "SELECT t.* FROM {table} AS t \
                     JOIN {owner_table} AS o ON o.{owner_key} = t.owner_id \
                     WHERE t.owner_id = {owner_id_ph}",
                    owner_table = owner.table(),
                    owner_key = owner.id_key(),
                );
                if let Some(type_column) = schema.attribute("owner_type") {
                    let owner_type_ph = query.bind(
                        Value::from(owner.name()),
                        type_column.attribute_type.sql_cast(),
                    );
                    sql.push_str(&format!(" AND t.owner_type = {owner_type_ph}"));
                }
                sql.push_str(&format!(" ORDER BY t.{id_key}"));
                sql
            }
        };

        query.push_str(&sql);
        Ok(query.ordered_by(&[id_key]))
    }

    /// `INSERT INTO <table> (<cols>) VALUES ($1::<type>, ..., NOW(), NOW()) RETURNING *`
    pub fn build_insert(&self, schema: &EntitySchema, instance: &Record) -> BoundQuery {
        let mut query = BoundQuery::new();
        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        for attribute in schema.attributes() {
            if schema.is_timestamp_column(&attribute.name) {
                continue;
            }
            let value = instance.get(&attribute.name).cloned().unwrap_or(Value::Null);
            if attribute.name == schema.id_key()
                && !(schema.kind().is_polymorphic() && !value.is_null())
            {
                continue;
            }
            columns.push(&attribute.name);
            values.push(query.bind(coerce(attribute, value), attribute.attribute_type.sql_cast()));
        }

        if let Some(ts) = schema.timestamps() {
            for column in [&ts.created, &ts.updated] {
                columns.push(column);
                values.push("NOW()".to_string());
            }
        }

        if columns.is_empty() {
            query.push_str(&format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING *",
                schema.table()
            ));
        } else {
            query.push_str(&format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                schema.table(),
                columns.join(","),
                values.join(",")
            ));
        }
        query
    }

    /// `UPDATE <table> SET <col> = $2::<type>, ... WHERE <idKey> = $1::<type> RETURNING *`
    ///
    /// # Errors
    ///
    /// `SchemaError::EmptyUpdate` when the instance sets no attribute and the
    /// schema has no updated-timestamp column to touch.
    pub fn build_update(
        &self,
        schema: &EntitySchema,
        instance: &Record,
    ) -> Result<BoundQuery, SchemaError> {
        let mut query = BoundQuery::new();
        let id_value = instance.get(schema.id_key()).cloned().unwrap_or(Value::Null);
        let id_ph = query.bind(id_value, schema.id_type().sql_cast());

        let mut assignments = Vec::new();
        for attribute in schema.attributes() {
            if attribute.name == schema.id_key() || schema.is_timestamp_column(&attribute.name) {
                continue;
            }
            let Some(value) = instance.get(&attribute.name) else {
                continue;
            };
            let ph = query.bind(
                coerce(attribute, value.clone()),
                attribute.attribute_type.sql_cast(),
            );
            assignments.push(format!("{} = {}", attribute.name, ph));
        }

        match schema.timestamps() {
            Some(ts) => assignments.push(format!("{} = NOW()", ts.updated)),
            None if assignments.is_empty() => {
                return Err(SchemaError::EmptyUpdate(schema.name().to_string()))
            }
            None => {}
        }

        query.push_str(&format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING *",
            schema.table(),
            assignments.join(", "),
            schema.id_key(),
            id_ph
        ));
        Ok(query)
    }

    /// `DELETE FROM <table> WHERE <idKey> = $1::<type> RETURNING *`
    ///
    /// Returns `None` for node- and file-backed schemas: their rows are only
    /// removed together with the shared `nodes`/`files` row, through the
    /// coordinated delete in the entity store.
    pub fn build_delete(&self, schema: &EntitySchema, id: i64) -> Option<BoundQuery> {
        match schema.kind() {
            EntityKind::Plain => Some(delete_row(schema, id)),
            EntityKind::Node | EntityKind::File => None,
        }
    }
}

/// Unconditional delete of the entity row, for the coordinated paths
pub(crate) fn delete_row(schema: &EntitySchema, id: i64) -> BoundQuery {
    let mut query = BoundQuery::new();
    let id_ph = query.bind(Value::from(id), schema.id_type().sql_cast());
    query.push_str(&format!(
        "DELETE FROM {} WHERE {} = {} RETURNING *",
        schema.table(),
        schema.id_key(),
        id_ph
    ));
    query
}

/// An empty string means "no value" for non-textual columns
fn coerce(attribute: &Attribute, value: Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() && !attribute.attribute_type.is_textual() => Value::Null,
        other => other,
    }
}
