//! Schema Registry
//!
//! Process-wide map from entity type name to its validated [`EntitySchema`].
//! Built once at startup (from JSON configuration or the built-in archive
//! definitions) and shared read-only afterwards, typically behind an `Arc`.

use crate::models::schema::{EntityDefinition, EntityKind, EntitySchema, SchemaError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// Build a registry from already-validated schemas
    ///
    /// # Errors
    ///
    /// `SchemaError::InvalidSchema` if two schemas share a name or a table.
    pub fn new(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self, SchemaError> {
        let mut entities = BTreeMap::new();
        let mut tables = HashSet::new();

        for schema in schemas {
            if !tables.insert(schema.table().to_string()) {
                return Err(SchemaError::invalid_schema(
                    schema.name(),
                    format!("table '{}' is already used by another entity", schema.table()),
                ));
            }
            let name = schema.name().to_string();
            if entities.insert(name.clone(), schema).is_some() {
                return Err(SchemaError::invalid_schema(name, "entity declared twice"));
            }
        }

        Ok(Self { entities })
    }

    /// Build a registry from raw definitions keyed by entity name
    pub fn from_definitions(
        definitions: HashMap<String, EntityDefinition>,
    ) -> Result<Self, SchemaError> {
        let schemas = definitions
            .into_iter()
            .map(|(name, definition)| EntitySchema::from_definition(&name, definition))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(schemas)
    }

    /// Parse a JSON mapping of entity name to definition
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let definitions: HashMap<String, EntityDefinition> = serde_json::from_str(json)
            .map_err(|e| SchemaError::invalid_schema("<registry>", e.to_string()))?;
        Self::from_definitions(definitions)
    }

    /// Load a JSON registry file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SchemaError::invalid_schema("<registry>", format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Look up an entity schema by type name
    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Look up an entity schema, failing with `UnknownEntity`
    pub fn require(&self, name: &str) -> Result<&EntitySchema, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// Schemas in name order
    pub fn iter(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    /// Names of the node-backed entity types
    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|s| s.kind() == EntityKind::Node)
            .map(|s| s.name())
    }

    /// Names of the file-backed entity types
    pub fn file_types(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|s| s.kind() == EntityKind::File)
            .map(|s| s.name())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribute, AttributeType};

    const REGISTRY_JSON: &str = r#"{
        "surveys": {
            "table": "surveys",
            "idKey": "id",
            "isNode": true,
            "attributes": [
                { "name": "id", "type": "integer" },
                { "name": "name", "type": "varchar" }
            ]
        },
        "images": {
            "table": "images",
            "idKey": "id",
            "isFile": true,
            "attributes": [
                { "name": "id", "type": "integer" },
                { "name": "format", "type": "varchar" },
                { "name": "secure_token", "type": "varchar", "restrictedToRoles": ["administrator"] }
            ]
        },
        "cameras": {
            "table": "cameras",
            "attributes": [
                { "name": "id", "type": "integer" },
                { "name": "model", "type": "varchar" }
            ]
        }
    }"#;

    #[test]
    fn test_from_json_str() {
        let registry = SchemaRegistry::from_json_str(REGISTRY_JSON).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.require("surveys").unwrap().kind(), EntityKind::Node);
        assert_eq!(registry.require("images").unwrap().kind(), EntityKind::File);
        assert_eq!(registry.require("cameras").unwrap().kind(), EntityKind::Plain);
        assert_eq!(registry.node_types().collect::<Vec<_>>(), vec!["surveys"]);
        assert_eq!(registry.file_types().collect::<Vec<_>>(), vec!["images"]);
    }

    #[test]
    fn test_require_unknown_entity() {
        let registry = SchemaRegistry::from_json_str(REGISTRY_JSON).unwrap();
        assert_eq!(
            registry.require("stations").unwrap_err(),
            SchemaError::UnknownEntity("stations".to_string())
        );
    }

    #[test]
    fn test_malformed_json_is_invalid_schema() {
        let err = SchemaRegistry::from_json_str(r#"{ "surveys": { "idKey": "id" } }"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema { .. }));
    }

    #[test]
    fn test_shared_table_rejected() {
        let attributes = vec![Attribute::new("id", AttributeType::Integer)];
        let a = EntitySchema::new("a", "shared", "id", EntityKind::Plain, attributes.clone()).unwrap();
        let b = EntitySchema::new("b", "shared", "id", EntityKind::Plain, attributes).unwrap();

        let err = SchemaRegistry::new(vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    fn cameras_json(column: &str) -> String {
        format!(
            r#"{{
                "cameras": {{
                    "table": "cameras",
                    "attributes": [
                        {{ "name": "id", "type": "integer" }},
                        {{ "name": "{column}", "type": "varchar", "restrictedToRoles": ["administrator"] }}
                    ]
                }}
            }}"#
        )
    }

    #[test]
    fn test_reserved_keyword_column_rejected() {
        for column in ["user", "order", "limit"] {
            let err = SchemaRegistry::from_json_str(&cameras_json(column)).unwrap_err();
            assert_eq!(
                err,
                SchemaError::invalid_schema(
                    "cameras",
                    format!("attribute '{column}' is a reserved SQL keyword")
                )
            );
        }
    }

    #[test]
    fn test_mixed_case_column_rejected() {
        let err = SchemaRegistry::from_json_str(&cameras_json("secureToken")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema { .. }));
        assert!(err.to_string().contains("'secureToken' is not a valid identifier"));

        assert!(SchemaRegistry::from_json_str(&cameras_json("secure_token")).is_ok());
    }
}
