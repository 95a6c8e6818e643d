//! Entity Store - coordinated CRUD over entity tables
//!
//! Routes every write by [`EntityKind`]:
//!
//! - `Plain`: one statement on the entity table
//! - `Node`: a `nodes` row plus the entity row sharing its id
//! - `File`: a `files` row plus the entity row sharing its id
//!
//! The paired statements must commit together. The store does not open
//! transactions itself; [`EntityService`](crate::services::EntityService)
//! hands it a `Transaction` so the pair is atomic, and tests hand it a
//! scripted executor.

use crate::db::QueryExecutor;
use crate::models::{EntityKind, EntitySchema, FileMetadata, Node, OwnerRef, Record};
use crate::queries::{self, QueryBuilder};
use crate::services::error::ArchiveError;
use crate::services::file_store::FileAttachmentStore;
use crate::services::node_store::{fetch_one, NodeTreeStore};
use crate::services::relation_validator::RelationValidator;
use serde_json::Value;
use std::sync::Arc;

/// Parameters for creating an entity row
///
/// `owner` places node-backed rows in the tree (omit it for a root) and is
/// required for file-backed rows. `file` carries the media metadata stored on
/// the `files` row.
#[derive(Debug, Clone, Default)]
pub struct CreateEntityParams {
    pub attributes: Record,
    pub owner: Option<OwnerRef>,
    pub file: Option<FileMetadata>,
}

impl CreateEntityParams {
    pub fn new(attributes: Record) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_file(mut self, file: FileMetadata) -> Self {
        self.file = Some(file);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EntityStore {
    builder: QueryBuilder,
    nodes: NodeTreeStore,
    files: FileAttachmentStore,
}

impl EntityStore {
    pub fn new(builder: QueryBuilder, relations: Arc<RelationValidator>) -> Self {
        Self {
            builder,
            nodes: NodeTreeStore::new(Arc::clone(&relations)),
            files: FileAttachmentStore::new(relations),
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn nodes(&self) -> &NodeTreeStore {
        &self.nodes
    }

    pub fn files(&self) -> &FileAttachmentStore {
        &self.files
    }

    /// One page of rows
    pub async fn list<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        offset: u64,
        order_by: Option<&str>,
    ) -> Result<Vec<Record>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let query = self.builder.build_select_all(schema, offset, order_by)?;
        Ok(executor.fetch_all(&query).await?)
    }

    pub async fn get<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<Option<Record>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        Ok(executor
            .fetch_optional(&self.builder.build_select_by_id(schema, id))
            .await?)
    }

    /// Rows of `schema` owned by the `owner` row with id `owner_id`
    pub async fn list_by_owner<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        owner: &EntitySchema,
        owner_id: i64,
    ) -> Result<Vec<Record>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let query = self.builder.build_select_by_owner(schema, owner, owner_id)?;
        Ok(executor.fetch_all(&query).await?)
    }

    /// Create a row, routing by entity kind
    pub async fn create<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        params: CreateEntityParams,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        match schema.kind() {
            EntityKind::Plain => {
                if params.owner.is_some() {
                    return Err(ArchiveError::unsupported(format!(
                        "'{}' is not node- or file-backed and cannot take an owner",
                        schema.name()
                    )));
                }
                self.create_plain(executor, schema, &params.attributes).await
            }
            EntityKind::Node => {
                self.create_node_backed(executor, schema, params.attributes, params.owner.as_ref())
                    .await
            }
            EntityKind::File => {
                let owner = params
                    .owner
                    .ok_or_else(|| ArchiveError::MissingOwner(schema.name().to_string()))?;
                self.create_file_backed(
                    executor,
                    schema,
                    params.attributes,
                    &owner,
                    &params.file.unwrap_or_default(),
                )
                .await
            }
        }
    }

    pub async fn create_plain<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        attributes: &Record,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        fetch_one(executor, &self.builder.build_insert(schema, attributes), schema.name()).await
    }

    /// Allocate the node, then write the entity row under the node's id
    pub async fn create_node_backed<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        mut attributes: Record,
        owner: Option<&OwnerRef>,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node = self.nodes.insert_node(executor, schema.name(), owner).await?;
        attributes.insert(schema.id_key().to_string(), Value::from(node.id));

        let record = fetch_one(executor, &self.builder.build_insert(schema, &attributes), schema.name()).await?;
        tracing::debug!("Created {} {}", schema.name(), node.id);
        Ok(record)
    }

    /// Allocate the file row, then write the entity row under the file's id
    pub async fn create_file_backed<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        mut attributes: Record,
        owner: &OwnerRef,
        metadata: &FileMetadata,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let file = self
            .files
            .insert_file(executor, schema.name(), owner, metadata)
            .await?;
        attributes.insert(schema.id_key().to_string(), Value::from(file.id));

        let record = fetch_one(executor, &self.builder.build_insert(schema, &attributes), schema.name()).await?;
        tracing::debug!("Created {} {} under {} {}", schema.name(), file.id, owner.owner_type, owner.id);
        Ok(record)
    }

    /// Sparse update of row `id`
    ///
    /// # Errors
    ///
    /// `NotFound` if no row has that id; `EmptyUpdate` if there is nothing to
    /// set.
    pub async fn update<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
        mut attributes: Record,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        attributes.insert(schema.id_key().to_string(), Value::from(id));
        let query = self.builder.build_update(schema, &attributes)?;
        executor
            .fetch_optional(&query)
            .await?
            .ok_or_else(|| ArchiveError::not_found(schema.name(), id))
    }

    /// Delete row `id`, routing by entity kind
    pub async fn delete<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        match self.builder.build_delete(schema, id) {
            Some(query) => executor
                .fetch_optional(&query)
                .await?
                .ok_or_else(|| ArchiveError::not_found(schema.name(), id)),
            None if schema.kind() == EntityKind::Node => {
                self.delete_node_backed(executor, schema, id).await
            }
            None => self.delete_file_backed(executor, schema, id).await,
        }
    }

    /// Delete the entity row and its node
    ///
    /// Refused with `OrphanDeletionRefused` before any statement is issued if
    /// the node still owns nodes or files.
    pub async fn delete_node_backed<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node = self.nodes.ensure_removable(executor, id).await?;
        if node.node_type != schema.name() {
            return Err(ArchiveError::not_found(schema.name(), id));
        }

        let record = executor
            .fetch_optional(&queries::delete_row(schema, id))
            .await?
            .ok_or_else(|| ArchiveError::not_found(schema.name(), id))?;
        fetch_one(executor, &queries::node::delete_node(id), "node").await?;

        tracing::debug!("Deleted {} {}", schema.name(), id);
        Ok(record)
    }

    /// Delete the entity row and its file row
    pub async fn delete_file_backed<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
    ) -> Result<Record, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        match self.files.select_file(executor, id).await? {
            Some(file) if file.file_type == schema.name() => {}
            _ => return Err(ArchiveError::not_found(schema.name(), id)),
        }

        let record = executor
            .fetch_optional(&queries::delete_row(schema, id))
            .await?
            .ok_or_else(|| ArchiveError::not_found(schema.name(), id))?;
        self.files.remove_file(executor, id).await?;

        tracing::debug!("Deleted {} {}", schema.name(), id);
        Ok(record)
    }

    /// Move a node-backed row under a new owner
    pub async fn reparent<E>(
        &self,
        executor: &E,
        schema: &EntitySchema,
        id: i64,
        new_owner: &OwnerRef,
    ) -> Result<Node, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        if schema.kind() != EntityKind::Node {
            return Err(ArchiveError::unsupported(format!(
                "'{}' is not node-backed and cannot be reparented",
                schema.name()
            )));
        }
        match self.nodes.select_node(executor, id).await? {
            Some(node) if node.node_type == schema.name() => {}
            _ => return Err(ArchiveError::not_found(schema.name(), id)),
        }
        self.nodes.reparent(executor, id, new_owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core_schemas::{
        archive_file_relations, archive_node_relations, archive_registry,
    };
    use crate::models::SchemaError;
    use crate::services::test_support::{file_row, node_row, ScriptedExecutor};
    use serde_json::json;

    fn store() -> EntityStore {
        EntityStore::new(
            QueryBuilder::default(),
            Arc::new(RelationValidator::new(
                archive_node_relations(),
                archive_file_relations(),
            )),
        )
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn schema(name: &str) -> EntitySchema {
        archive_registry().unwrap().require(name).unwrap().clone()
    }

    #[tokio::test]
    async fn test_create_node_backed_writes_both_rows_with_shared_id() {
        let stations = schema("stations");
        let owner = OwnerRef::new(3, "survey_seasons");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(3, "survey_seasons", None)])
            .respond(vec![node_row(20, "stations", Some((3, "survey_seasons")))])
            .respond(vec![json!({"id": 20, "name": "Site A"})]);

        let params = CreateEntityParams::new(record(json!({"name": "Site A"}))).with_owner(owner.clone());
        let created = store().create(&executor, &stations, params).await.unwrap();

        assert_eq!(created["id"], json!(20));
        let executed = executor.executed();
        assert_eq!(executed[1], queries::node::insert_node("stations", Some(&owner)));
        assert!(executed[2].sql.starts_with("INSERT INTO stations (id,name,"));
        assert_eq!(executed[2].data[0], json!(20));
        assert_eq!(executed[2].data[1], json!("Site A"));
    }

    #[tokio::test]
    async fn test_create_node_backed_entity_insert_failure_propagates() {
        let stations = schema("stations");
        let owner = OwnerRef::new(3, "survey_seasons");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(3, "survey_seasons", None)])
            .respond(vec![node_row(20, "stations", Some((3, "survey_seasons")))])
            .fail("invalid input syntax for type numeric: \"abc\"")
            .respond(vec![json!({"id": 20})]);

        let params = CreateEntityParams::new(record(json!({"name": "Site A", "lat": "abc"})))
            .with_owner(owner);
        let err = store().create(&executor, &stations, params).await.unwrap_err();

        assert!(matches!(err, ArchiveError::Database(_)));
        // node row written, entity insert failed, nothing after it
        let statements = executor.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("INSERT INTO nodes"));
        assert!(statements[2].starts_with("INSERT INTO stations"));
    }

    #[tokio::test]
    async fn test_create_file_backed_entity_insert_failure_propagates() {
        let images = schema("images");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(30, "modern_captures", None)])
            .respond(vec![file_row(31, "images", (30, "modern_captures"))])
            .fail("null value in column \"format\"");

        let params = CreateEntityParams::new(Record::new())
            .with_owner(OwnerRef::new(30, "modern_captures"));
        let err = store().create(&executor, &images, params).await.unwrap_err();

        assert!(matches!(err, ArchiveError::Database(_)));
        assert_eq!(executor.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_create_node_backed_invalid_relation_writes_nothing() {
        let surveys = schema("surveys");
        let executor = ScriptedExecutor::new();
        let params = CreateEntityParams::new(Record::new()).with_owner(OwnerRef::new(20, "stations"));

        let err = store().create(&executor, &surveys, params).await.unwrap_err();

        assert!(matches!(err, ArchiveError::InvalidRelation { .. }));
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_create_file_backed_requires_owner() {
        let images = schema("images");
        let executor = ScriptedExecutor::new();

        let err = store()
            .create(&executor, &images, CreateEntityParams::new(Record::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::MissingOwner(ref name) if name == "images"));
    }

    #[tokio::test]
    async fn test_create_file_backed() {
        let images = schema("images");
        let owner = OwnerRef::new(30, "modern_captures");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(30, "modern_captures", None)])
            .respond(vec![file_row(31, "images", (30, "modern_captures"))])
            .respond(vec![json!({"id": 31, "format": "tiff"})]);

        let params = CreateEntityParams::new(record(json!({"format": "tiff"})))
            .with_owner(owner)
            .with_file(FileMetadata {
                filename: Some("scan.tif".to_string()),
                ..Default::default()
            });
        let created = store().create(&executor, &images, params).await.unwrap();

        assert_eq!(created["id"], json!(31));
        let executed = executor.executed();
        assert!(executed[1].sql.starts_with("INSERT INTO files"));
        assert!(executed[2].sql.starts_with("INSERT INTO images (id,"));
        assert_eq!(executed[2].data[0], json!(31));
    }

    #[tokio::test]
    async fn test_create_plain_rejects_owner() {
        let cameras = schema("cameras");
        let executor = ScriptedExecutor::new();
        let params = CreateEntityParams::new(Record::new()).with_owner(OwnerRef::new(1, "stations"));

        let err = store().create(&executor, &cameras, params).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let cameras = schema("cameras");
        let executor = ScriptedExecutor::new();

        let err = store()
            .update(&executor, &cameras, 5, record(json!({"model": "Mk II"})))
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::NotFound { id: 5, .. }));
        assert_eq!(executor.executed()[0].data, vec![json!(5), json!("Mk II")]);
    }

    #[tokio::test]
    async fn test_delete_node_backed_with_dependents_deletes_nothing() {
        let seasons = schema("survey_seasons");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(3, "survey_seasons", Some((2, "surveys")))])
            .respond(vec![json!({"has_dependents": true})]);

        let err = store().delete(&executor, &seasons, 3).await.unwrap_err();

        assert!(matches!(err, ArchiveError::OrphanDeletionRefused { id: 3, .. }));
        assert!(executor.statements().iter().all(|sql| !sql.starts_with("DELETE")));
    }

    #[tokio::test]
    async fn test_delete_node_backed_removes_type_row_then_node() {
        let locations = schema("locations");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(22, "locations", Some((21, "modern_visits")))])
            .respond(vec![json!({"has_dependents": false})])
            .respond(vec![json!({"has_files": false})])
            .respond(vec![json!({"id": 22})])
            .respond(vec![node_row(22, "locations", Some((21, "modern_visits")))]);

        let deleted = store().delete(&executor, &locations, 22).await.unwrap();

        assert_eq!(deleted["id"], json!(22));
        let statements = executor.statements();
        assert_eq!(statements[3], queries::delete_row(&locations, 22).sql);
        assert_eq!(statements[4], queries::node::delete_node(22).sql);
    }

    #[tokio::test]
    async fn test_delete_node_of_other_type_is_not_found() {
        let locations = schema("locations");
        let executor = ScriptedExecutor::new()
            .respond(vec![node_row(22, "stations", None)])
            .respond(vec![json!({"has_dependents": false})])
            .respond(vec![json!({"has_files": false})]);

        let err = store().delete(&executor, &locations, 22).await.unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { .. }));
        assert_eq!(executor.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_file_backed() {
        let images = schema("images");
        let executor = ScriptedExecutor::new()
            .respond(vec![file_row(31, "images", (30, "modern_captures"))])
            .respond(vec![json!({"id": 31})])
            .respond(vec![file_row(31, "images", (30, "modern_captures"))]);

        store().delete(&executor, &images, 31).await.unwrap();

        let statements = executor.statements();
        assert_eq!(statements[1], queries::delete_row(&images, 31).sql);
        assert_eq!(statements[2], queries::file::delete_file(31).sql);
    }

    #[tokio::test]
    async fn test_delete_plain() {
        let cameras = schema("cameras");
        let executor = ScriptedExecutor::new().respond(vec![json!({"id": 4})]);

        store().delete(&executor, &cameras, 4).await.unwrap();
        assert_eq!(
            executor.statements(),
            vec!["DELETE FROM cameras WHERE id = $1::integer RETURNING *".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_order_column() {
        let cameras = schema("cameras");
        let executor = ScriptedExecutor::new();

        let err = store()
            .list(&executor, &cameras, 0, Some("model; DROP TABLE cameras"))
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Schema(SchemaError::UnknownColumn { .. })));
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_reparent_plain_is_unsupported() {
        let cameras = schema("cameras");
        let executor = ScriptedExecutor::new();
        let err = store()
            .reparent(&executor, &cameras, 1, &OwnerRef::new(2, "stations"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Unsupported(_)));
    }
}
