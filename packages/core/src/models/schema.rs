//! Entity Schema Types
//!
//! This module defines the typed registry entry that every query is generated
//! from. An [`EntitySchema`] describes one archive entity type: the table it
//! lives in, its primary-key column, its ordered attribute list, and whether
//! it participates in the shared `nodes` tree or the shared `files` table.
//!
//! Schemas are validated once, when they are constructed. Every identifier a
//! schema carries (table, columns, timestamp columns) has passed
//! [`validate_identifier`], so the query builders may splice them into SQL
//! text. Values never are: they always travel as bind parameters.
//!
//! ## Example Definition (registry JSON)
//!
//! ```json
//! {
//!   "stations": {
//!     "table": "stations",
//!     "idKey": "id",
//!     "isNode": true,
//!     "attributes": [
//!       { "name": "id", "type": "integer" },
//!       { "name": "name", "type": "varchar" },
//!       { "name": "lat", "type": "numeric" },
//!       { "name": "long", "type": "numeric" },
//!       { "name": "published", "type": "boolean", "restrictedToRoles": ["editor", "administrator"] }
//!     ]
//!   }
//! }
//! ```

use crate::models::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// PostgreSQL's identifier length limit
const MAX_IDENTIFIER_LEN: usize = 63;

/// Schema construction and lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Malformed registry entry
    #[error("Invalid schema '{entity}': {reason}")]
    InvalidSchema { entity: String, reason: String },

    /// Entity type not present in the registry
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// Caller-supplied column name not known to the schema
    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Update with nothing to set
    #[error("Nothing to update for entity '{0}'")]
    EmptyUpdate(String),
}

impl SchemaError {
    /// Create an invalid schema error
    pub fn invalid_schema(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// PostgreSQL keywords that cannot appear as an unquoted column or table name
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning",
    "right", "select", "session_user", "similar", "some", "symmetric", "system_user",
    "table", "tablesample", "then", "to", "trailing", "true", "union", "unique", "user",
    "using", "variadic", "verbose", "when", "where", "window", "with",
];

/// Whether `name` is a reserved PostgreSQL keyword
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name)
}

/// Check that `name` is safe to interpolate into SQL as an unquoted identifier
///
/// Accepts lowercase ASCII letters, digits and underscores, starting with a
/// letter or an underscore, at most 63 bytes long. Uppercase is rejected
/// because PostgreSQL folds unquoted names to lowercase, so the column key a
/// row comes back with would no longer match the attribute name. Reserved
/// keywords are rejected as well.
pub fn validate_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    starts_ok
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !is_reserved_keyword(name)
}

fn identifier_reason(what: &str, name: &str) -> String {
    if is_reserved_keyword(name) {
        format!("{what} '{name}' is a reserved SQL keyword")
    } else {
        format!("{what} '{name}' is not a valid identifier")
    }
}

/// Logical attribute type, rendered as the explicit cast on each placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Integer,
    #[serde(alias = "bigint")]
    BigInt,
    Numeric,
    #[serde(alias = "double")]
    Float,
    #[serde(alias = "string")]
    Varchar,
    Text,
    #[serde(alias = "bool")]
    Boolean,
    Date,
    #[serde(alias = "datetime")]
    Timestamp,
    Time,
    Json,
}

impl AttributeType {
    /// PostgreSQL type name used in `$n::<type>` casts
    pub fn sql_cast(&self) -> &'static str {
        match self {
            AttributeType::Integer => "integer",
            AttributeType::BigInt => "bigint",
            AttributeType::Numeric => "numeric",
            AttributeType::Float => "double precision",
            AttributeType::Varchar => "varchar",
            AttributeType::Text => "text",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Timestamp => "timestamp",
            AttributeType::Time => "time",
            AttributeType::Json => "json",
        }
    }

    /// Whether an empty string is a meaningful value for this type
    pub fn is_textual(&self) -> bool {
        matches!(self, AttributeType::Varchar | AttributeType::Text)
    }
}

/// Archive user roles, lowest privilege first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Visitor,
    Registered,
    Editor,
    Administrator,
    SuperAdministrator,
}

/// One column of an entity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Column name
    pub name: String,

    /// Logical type (drives the placeholder cast)
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,

    /// Roles allowed to see this attribute; empty means everyone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restricted_to_roles: Vec<Role>,
}

impl Attribute {
    /// Create an unrestricted attribute
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            restricted_to_roles: Vec::new(),
        }
    }

    /// Restrict visibility to the given roles
    pub fn restricted_to(mut self, roles: &[Role]) -> Self {
        self.restricted_to_roles = roles.to_vec();
        self
    }

    /// Whether a caller with `role` may see this attribute
    pub fn is_visible_to(&self, role: Role) -> bool {
        self.restricted_to_roles.is_empty() || self.restricted_to_roles.contains(&role)
    }
}

/// How an entity is stored beyond its own table
///
/// Node- and file-backed entities share their primary key with a row in the
/// `nodes` or `files` table respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Stand-alone row
    Plain,
    /// Row paired with a vertex in the shared `nodes` tree
    Node,
    /// Row paired with an entry in the shared `files` table
    File,
}

impl EntityKind {
    /// Node- or file-backed
    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, EntityKind::Plain)
    }
}

/// Server-generated timestamp columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampColumns {
    pub created: String,
    pub updated: String,
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self {
            created: "created_at".to_string(),
            updated: "updated_at".to_string(),
        }
    }
}

/// Raw registry entry, as read from configuration
///
/// Converted into an [`EntitySchema`] by [`EntitySchema::from_definition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub table: String,

    #[serde(default = "default_id_key")]
    pub id_key: String,

    pub attributes: Vec<Attribute>,

    #[serde(default)]
    pub is_node: bool,

    #[serde(default)]
    pub is_file: bool,

    /// `[created, updated]`; an empty list disables timestamps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_columns: Option<Vec<String>>,
}

fn default_id_key() -> String {
    "id".to_string()
}

/// Validated registry entry for one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    name: String,
    table: String,
    id_key: String,
    kind: EntityKind,
    attributes: Vec<Attribute>,
    timestamps: Option<TimestampColumns>,
}

impl EntitySchema {
    /// Create a schema with the default `created_at`/`updated_at` timestamps
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidSchema` if:
    /// - the table or id key is empty or not a safe identifier
    /// - an attribute name is unsafe or duplicated
    /// - the id key is not one of the attributes
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        id_key: impl Into<String>,
        kind: EntityKind,
        attributes: Vec<Attribute>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            name: name.into(),
            table: table.into(),
            id_key: id_key.into(),
            kind,
            attributes,
            timestamps: Some(TimestampColumns::default()),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Replace the timestamp columns (`None` disables them)
    pub fn with_timestamps(mut self, timestamps: Option<TimestampColumns>) -> Result<Self, SchemaError> {
        self.timestamps = timestamps;
        self.validate()?;
        Ok(self)
    }

    /// Build a schema from a registry definition
    pub fn from_definition(name: &str, definition: EntityDefinition) -> Result<Self, SchemaError> {
        let kind = match (definition.is_node, definition.is_file) {
            (false, false) => EntityKind::Plain,
            (true, false) => EntityKind::Node,
            (false, true) => EntityKind::File,
            (true, true) => {
                return Err(SchemaError::invalid_schema(
                    name,
                    "an entity cannot be both node-backed and file-backed",
                ))
            }
        };

        let timestamps = match definition.timestamp_columns {
            None => Some(TimestampColumns::default()),
            Some(columns) => match columns.as_slice() {
                [] => None,
                [created, updated] => Some(TimestampColumns {
                    created: created.clone(),
                    updated: updated.clone(),
                }),
                _ => {
                    return Err(SchemaError::invalid_schema(
                        name,
                        "timestampColumns must list exactly [created, updated] or be empty",
                    ))
                }
            },
        };

        let schema = Self {
            name: name.to_string(),
            table: definition.table,
            id_key: definition.id_key,
            kind,
            attributes: definition.attributes,
            timestamps,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::invalid_schema(&self.table, "missing entity name"));
        }
        if self.table.is_empty() {
            return Err(SchemaError::invalid_schema(&self.name, "missing table"));
        }
        if !validate_identifier(&self.table) {
            return Err(SchemaError::invalid_schema(
                &self.name,
                identifier_reason("table", &self.table),
            ));
        }
        if self.id_key.is_empty() {
            return Err(SchemaError::invalid_schema(&self.name, "missing idKey"));
        }

        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !validate_identifier(&attribute.name) {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    identifier_reason("attribute", &attribute.name),
                ));
            }
            if !seen.insert(attribute.name.as_str()) {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("duplicate attribute '{}'", attribute.name),
                ));
            }
        }

        if !seen.contains(self.id_key.as_str()) {
            return Err(SchemaError::invalid_schema(
                &self.name,
                format!("idKey '{}' is not declared in attributes", self.id_key),
            ));
        }

        if let Some(ts) = &self.timestamps {
            for column in [&ts.created, &ts.updated] {
                if !validate_identifier(column) {
                    return Err(SchemaError::invalid_schema(
                        &self.name,
                        identifier_reason("timestamp column", column),
                    ));
                }
            }
            if ts.created == ts.updated {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    "created and updated timestamp columns must differ",
                ));
            }
            if ts.created == self.id_key || ts.updated == self.id_key {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    "the id column cannot be a timestamp column",
                ));
            }
        }

        Ok(())
    }

    /// Entity type name (also the `type` of its node, or `file_type` of its file)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn timestamps(&self) -> Option<&TimestampColumns> {
        self.timestamps.as_ref()
    }

    /// Look up an attribute by column name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Logical type of the primary key
    pub fn id_type(&self) -> AttributeType {
        self.attribute(&self.id_key)
            .map(|a| a.attribute_type)
            .unwrap_or(AttributeType::Integer)
    }

    /// Whether `column` is a timestamp column of this schema
    pub fn is_timestamp_column(&self, column: &str) -> bool {
        self.timestamps
            .as_ref()
            .map(|ts| ts.created == column || ts.updated == column)
            .unwrap_or(false)
    }

    /// Whether `column` may appear in generated SQL (attributes and timestamps)
    pub fn has_column(&self, column: &str) -> bool {
        self.attribute(column).is_some() || self.is_timestamp_column(column)
    }

    /// Attributes a caller with `role` may see
    pub fn visible_attributes(&self, role: Role) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.is_visible_to(role))
    }

    /// Remove attributes hidden from `role` from a fetched row
    pub fn redact(&self, mut record: Record, role: Role) -> Record {
        for attribute in &self.attributes {
            if !attribute.is_visible_to(role) {
                record.remove(&attribute.name);
            }
        }
        record
    }
}
