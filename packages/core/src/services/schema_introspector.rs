//! Schema Introspector
//!
//! Read-only view of the live catalog. Used at startup to check the static
//! registry against the database, and to describe entities for form
//! generation (column nullability and foreign-key targets).
//!
//! Mismatches found by [`SchemaIntrospector::verify_registry`] are reported
//! and logged, never fatal: the registry stays authoritative for query
//! generation.

use crate::db::QueryExecutor;
use crate::models::{from_record, AttributeType, EntityKind, EntitySchema, Role, SchemaRegistry};
use crate::queries;
use crate::services::error::ArchiveError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One row of `list_columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub ordinal_position: i32,
    /// Table referenced by a foreign key on this column
    pub references_table: Option<String>,
}

/// Form field for one visible attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    pub nullable: bool,
    pub references_table: Option<String>,
}

/// Disagreement between the registry and the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    MissingTable { entity: String, table: String },
    MissingColumn { entity: String, table: String, column: String },
    /// Node-backed entity absent from `node_types`
    UnregisteredNodeType { entity: String },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTable { entity, table } => {
                write!(f, "{entity}: table '{table}' does not exist")
            }
            Self::MissingColumn { entity, table, column } => {
                write!(f, "{entity}: column '{table}.{column}' does not exist")
            }
            Self::UnregisteredNodeType { entity } => {
                write!(f, "{entity}: not listed in node_types")
            }
        }
    }
}

/// Result of [`SchemaIntrospector::verify_registry`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryReport {
    pub entities_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl RegistryReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    catalog_schema: String,
}

impl SchemaIntrospector {
    /// Introspect tables of `catalog_schema` (usually `public`)
    pub fn new(catalog_schema: impl Into<String>) -> Self {
        Self {
            catalog_schema: catalog_schema.into(),
        }
    }

    pub fn catalog_schema(&self) -> &str {
        &self.catalog_schema
    }

    pub async fn list_tables<E>(&self, executor: &E) -> Result<Vec<String>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let rows = executor
            .fetch_all(&queries::catalog::list_tables(&self.catalog_schema))
            .await?;
        rows.iter().map(|row| string_column(row, "table_name")).collect()
    }

    /// Columns of `table` in ordinal order
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the table has no columns in the catalog, i.e. it
    /// does not exist.
    pub async fn list_columns<E>(
        &self,
        executor: &E,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let rows = executor
            .fetch_all(&queries::catalog::list_columns(&self.catalog_schema, table))
            .await?;
        if rows.is_empty() {
            return Err(ArchiveError::schema_mismatch(table, "table not found"));
        }
        rows.into_iter()
            .map(|row| from_record(row).map_err(ArchiveError::from))
            .collect()
    }

    /// Names listed in `node_types`
    pub async fn list_node_types<E>(&self, executor: &E) -> Result<Vec<String>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let rows = executor
            .fetch_all(&queries::node::select_node_types())
            .await?;
        rows.iter().map(|row| string_column(row, "name")).collect()
    }

    /// Compare every registered entity with the catalog
    ///
    /// Each mismatch is logged with `warn!`. Only database failures are
    /// returned as errors.
    pub async fn verify_registry<E>(
        &self,
        executor: &E,
        registry: &SchemaRegistry,
    ) -> Result<RegistryReport, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let mut report = RegistryReport::default();
        let tables: HashSet<String> = self.list_tables(executor).await?.into_iter().collect();
        let node_types: HashSet<String> =
            self.list_node_types(executor).await?.into_iter().collect();

        for schema in registry.iter() {
            report.entities_checked += 1;

            if schema.kind() == EntityKind::Node && !node_types.contains(schema.name()) {
                report.mismatches.push(Mismatch::UnregisteredNodeType {
                    entity: schema.name().to_string(),
                });
            }

            if !tables.contains(schema.table()) {
                report.mismatches.push(Mismatch::MissingTable {
                    entity: schema.name().to_string(),
                    table: schema.table().to_string(),
                });
                continue;
            }

            let columns: HashSet<String> = self
                .list_columns(executor, schema.table())
                .await?
                .into_iter()
                .map(|c| c.column_name)
                .collect();
            for column in expected_columns(schema) {
                if !columns.contains(column) {
                    report.mismatches.push(Mismatch::MissingColumn {
                        entity: schema.name().to_string(),
                        table: schema.table().to_string(),
                        column: column.to_string(),
                    });
                }
            }
        }

        for mismatch in &report.mismatches {
            tracing::warn!("Schema mismatch: {}", mismatch);
        }
        tracing::info!(
            "Verified {} entities against schema '{}': {} mismatches",
            report.entities_checked,
            self.catalog_schema,
            report.mismatches.len()
        );

        Ok(report)
    }

    /// Form fields for the attributes `role` may see
    ///
    /// Attributes without a matching column are reported as nullable with no
    /// reference, and logged. A missing table degrades the same way for every
    /// attribute.
    pub async fn describe_entity<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        role: Role,
    ) -> Result<Vec<FieldDescription>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let columns = match self.list_columns(executor, schema.table()).await {
            Ok(columns) => columns,
            Err(ArchiveError::SchemaMismatch { table, detail }) => {
                tracing::warn!(
                    "Schema mismatch: {}: table '{}' {}; describing from the registry only",
                    schema.name(),
                    table,
                    detail
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let table_missing = columns.is_empty();

        Ok(schema
            .visible_attributes(role)
            .map(|attribute| {
                let column = columns.iter().find(|c| c.column_name == attribute.name);
                if column.is_none() && !table_missing {
                    tracing::warn!(
                        "Schema mismatch: {}: column '{}.{}' does not exist",
                        schema.name(),
                        schema.table(),
                        attribute.name
                    );
                }
                FieldDescription {
                    name: attribute.name.clone(),
                    attribute_type: attribute.attribute_type,
                    nullable: column.map_or(true, |c| c.is_nullable),
                    references_table: column.and_then(|c| c.references_table.clone()),
                }
            })
            .collect())
    }
}

fn expected_columns(schema: &EntitySchema) -> impl Iterator<Item = &str> {
    let timestamps = schema
        .timestamps()
        .map(|ts| vec![ts.created.as_str(), ts.updated.as_str()])
        .unwrap_or_default();
    schema
        .attributes()
        .iter()
        .map(|a| a.name.as_str())
        .chain(timestamps)
}

fn string_column(row: &crate::models::Record, column: &str) -> Result<String, ArchiveError> {
    match row.get(column) {
        Some(Value::String(value)) => Ok(value.clone()),
        other => Err(ArchiveError::serialization(format!(
            "column '{column}' is not a string: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribute, AttributeType};
    use crate::services::test_support::ScriptedExecutor;
    use serde_json::json;

    fn column(name: &str, data_type: &str, nullable: bool, references: Option<&str>) -> Value {
        json!({
            "column_name": name,
            "data_type": data_type,
            "is_nullable": nullable,
            "ordinal_position": 1,
            "references_table": references
        })
    }

    fn registry() -> SchemaRegistry {
        let captures = EntitySchema::new(
            "modern_captures",
            "modern_captures",
            "id",
            EntityKind::Node,
            vec![
                Attribute::new("id", AttributeType::Integer),
                Attribute::new("cameras_id", AttributeType::Integer),
                Attribute::new("iso", AttributeType::Integer),
            ],
        )
        .unwrap();
        let cameras = EntitySchema::new(
            "cameras",
            "cameras",
            "id",
            EntityKind::Plain,
            vec![Attribute::new("id", AttributeType::Integer)],
        )
        .unwrap();
        SchemaRegistry::new(vec![captures, cameras]).unwrap()
    }

    #[tokio::test]
    async fn test_list_columns_missing_table_is_mismatch() {
        let executor = ScriptedExecutor::new();
        let err = SchemaIntrospector::new("public")
            .list_columns(&executor, "nope")
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::SchemaMismatch { ref table, .. } if table == "nope"));
    }

    #[tokio::test]
    async fn test_verify_registry_reports_without_failing() {
        // registry iterates in name order: cameras, modern_captures
        let executor = ScriptedExecutor::new()
            .respond(vec![json!({"table_name": "modern_captures"}), json!({"table_name": "nodes"})])
            .respond(vec![])
            .respond(vec![
                column("id", "integer", false, Some("nodes")),
                column("cameras_id", "integer", true, Some("cameras")),
                column("created_at", "timestamp without time zone", false, None),
                column("updated_at", "timestamp without time zone", false, None),
            ]);

        let report = SchemaIntrospector::new("public")
            .verify_registry(&executor, &registry())
            .await
            .unwrap();

        assert_eq!(report.entities_checked, 2);
        assert!(!report.is_consistent());
        assert_eq!(
            report.mismatches,
            vec![
                Mismatch::MissingTable {
                    entity: "cameras".to_string(),
                    table: "cameras".to_string()
                },
                Mismatch::UnregisteredNodeType {
                    entity: "modern_captures".to_string()
                },
                Mismatch::MissingColumn {
                    entity: "modern_captures".to_string(),
                    table: "modern_captures".to_string(),
                    column: "iso".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_entity_joins_columns() {
        let registry = registry();
        let captures = registry.require("modern_captures").unwrap();
        let executor = ScriptedExecutor::new().respond(vec![
            column("id", "integer", false, Some("nodes")),
            column("cameras_id", "integer", true, Some("cameras")),
        ]);

        let fields = SchemaIntrospector::new("public")
            .describe_entity(&executor, captures, Role::Visitor)
            .await
            .unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].references_table.as_deref(), Some("cameras"));
        assert!(!fields[0].nullable);
        // iso has no column; reported as nullable
        assert!(fields[2].nullable);
        assert_eq!(fields[2].references_table, None);
    }

    #[tokio::test]
    async fn test_describe_entity_missing_table_falls_back_to_registry() {
        let registry = registry();
        let captures = registry.require("modern_captures").unwrap();
        let executor = ScriptedExecutor::new();

        let fields = SchemaIntrospector::new("public")
            .describe_entity(&executor, captures, Role::Visitor)
            .await
            .unwrap();

        assert_eq!(executor.executed().len(), 1);
        assert_eq!(
            fields,
            vec![
                FieldDescription {
                    name: "id".to_string(),
                    attribute_type: AttributeType::Integer,
                    nullable: true,
                    references_table: None,
                },
                FieldDescription {
                    name: "cameras_id".to_string(),
                    attribute_type: AttributeType::Integer,
                    nullable: true,
                    references_table: None,
                },
                FieldDescription {
                    name: "iso".to_string(),
                    attribute_type: AttributeType::Integer,
                    nullable: true,
                    references_table: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_entity_propagates_database_errors() {
        let registry = registry();
        let captures = registry.require("modern_captures").unwrap();
        let executor = ScriptedExecutor::new().fail("connection reset");

        let err = SchemaIntrospector::new("public")
            .describe_entity(&executor, captures, Role::Visitor)
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Database(_)));
    }
}
