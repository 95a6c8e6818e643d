//! Entity Service - registry-driven CRUD over a connection pool
//!
//! Front door for callers that work in entity type names rather than
//! schemas. Each operation checks out one pooled connection; writes run in a
//! single transaction so node/file rows and entity rows commit or roll back
//! together. Dropping an uncommitted transaction rolls it back.
//!
//! Rows returned to a caller are redacted for the caller's [`Role`].

use crate::db::DatabaseService;
use crate::models::{FileRecord, Node, OwnerRef, Record, Role, SchemaError, SchemaRegistry};
use crate::queries::{QueryBuilder, QueryConfig};
use crate::services::entity_store::{CreateEntityParams, EntityStore};
use crate::services::error::ArchiveError;
use crate::services::relation_validator::RelationValidator;
use crate::services::schema_introspector::{FieldDescription, RegistryReport, SchemaIntrospector};
use std::sync::Arc;

pub struct EntityService {
    db: DatabaseService,
    registry: Arc<SchemaRegistry>,
    relations: Arc<RelationValidator>,
    store: EntityStore,
    introspector: SchemaIntrospector,
    config: QueryConfig,
}

impl EntityService {
    /// Assemble a service from already-loaded parts
    pub fn new(
        db: DatabaseService,
        registry: Arc<SchemaRegistry>,
        relations: Arc<RelationValidator>,
        config: QueryConfig,
    ) -> Self {
        let introspector = SchemaIntrospector::new(db.catalog_schema());
        Self {
            store: EntityStore::new(QueryBuilder::new(config), Arc::clone(&relations)),
            db,
            registry,
            relations,
            introspector,
            config,
        }
    }

    /// Load the relation allow-lists and assemble the service
    pub async fn connect(
        db: DatabaseService,
        registry: Arc<SchemaRegistry>,
        config: QueryConfig,
    ) -> Result<Self, ArchiveError> {
        config
            .validate()
            .map_err(|e| SchemaError::invalid_schema("<query config>", e))?;

        let relations = {
            let client = db.client().await?;
            RelationValidator::load(&**client).await?
        };

        tracing::info!(
            "Entity service ready with {} registered entities",
            registry.len()
        );
        Ok(Self::new(db, registry, Arc::new(relations), config))
    }

    /// Replace the relation snapshot with a fresh read of the tables
    pub async fn reload_relations(&mut self) -> Result<(), ArchiveError> {
        let client = self.db.client().await?;
        let relations = Arc::new(RelationValidator::load(&**client).await?);
        self.store = EntityStore::new(QueryBuilder::new(self.config), Arc::clone(&relations));
        self.relations = relations;
        Ok(())
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn relations(&self) -> &RelationValidator {
        &self.relations
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// One page of `entity` rows
    pub async fn list(
        &self,
        entity: &str,
        offset: u64,
        order_by: Option<&str>,
        role: Role,
    ) -> Result<Vec<Record>, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let client = self.db.client().await?;
        let rows = self.store.list(&**client, schema, offset, order_by).await?;
        Ok(rows.into_iter().map(|row| schema.redact(row, role)).collect())
    }

    pub async fn get(&self, entity: &str, id: i64, role: Role) -> Result<Option<Record>, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let client = self.db.client().await?;
        let row = self.store.get(&**client, schema, id).await?;
        Ok(row.map(|row| schema.redact(row, role)))
    }

    /// Rows of `entity` owned by the `owner_type` row `owner_id`
    pub async fn list_by_owner(
        &self,
        entity: &str,
        owner_type: &str,
        owner_id: i64,
        role: Role,
    ) -> Result<Vec<Record>, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let owner = self.registry.require(owner_type)?;
        let client = self.db.client().await?;
        let rows = self
            .store
            .list_by_owner(&**client, schema, owner, owner_id)
            .await?;
        Ok(rows.into_iter().map(|row| schema.redact(row, role)).collect())
    }

    /// Create an `entity` row (and its node or file row) in one transaction
    pub async fn create(
        &self,
        entity: &str,
        params: CreateEntityParams,
        role: Role,
    ) -> Result<Record, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let record = self.store.create(&*tx, schema, params).await?;
        tx.commit().await?;

        tracing::info!("Created {} row", entity);
        Ok(schema.redact(record, role))
    }

    /// Sparse update of an `entity` row
    pub async fn update(
        &self,
        entity: &str,
        id: i64,
        attributes: Record,
        role: Role,
    ) -> Result<Record, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let client = self.db.client().await?;
        let record = self.store.update(&**client, schema, id, attributes).await?;
        Ok(schema.redact(record, role))
    }

    /// Delete an `entity` row (and its node or file row) in one transaction
    ///
    /// Node-backed rows that still own nodes or files are refused with
    /// `OrphanDeletionRefused`; nothing is deleted.
    pub async fn delete(&self, entity: &str, id: i64, role: Role) -> Result<Record, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let record = self.store.delete(&*tx, schema, id).await?;
        tx.commit().await?;

        tracing::info!("Deleted {} {}", entity, id);
        Ok(schema.redact(record, role))
    }

    /// Move a node-backed `entity` row under a new owner
    pub async fn reparent(
        &self,
        entity: &str,
        id: i64,
        new_owner: &OwnerRef,
    ) -> Result<Node, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let mut client = self.db.client().await?;
        let tx = client.transaction().await?;

        let node = self.store.reparent(&*tx, schema, id, new_owner).await?;
        tx.commit().await?;
        Ok(node)
    }

    /// Nodes owned directly by `node_id`, in id order
    pub async fn children(&self, node_id: i64) -> Result<Vec<Node>, ArchiveError> {
        let client = self.db.client().await?;
        self.store.nodes().select_children(&**client, node_id).await
    }

    /// Path from a node up to its root, nearest owner first
    pub async fn ancestors(&self, node_id: i64) -> Result<Vec<Node>, ArchiveError> {
        let client = self.db.client().await?;
        self.store.nodes().select_ancestors(&**client, node_id).await
    }

    /// Files attached to a node
    pub async fn files(&self, owner: &OwnerRef) -> Result<Vec<FileRecord>, ArchiveError> {
        let client = self.db.client().await?;
        self.store.files().select_by_owner(&**client, owner).await
    }

    /// Form fields of `entity` visible to `role`
    pub async fn describe(&self, entity: &str, role: Role) -> Result<Vec<FieldDescription>, ArchiveError> {
        let schema = self.registry.require(entity)?;
        let client = self.db.client().await?;
        self.introspector
            .describe_entity(&**client, schema, role)
            .await
    }

    /// Check the registry against the live catalog
    pub async fn verify_registry(&self) -> Result<RegistryReport, ArchiveError> {
        let client = self.db.client().await?;
        self.introspector
            .verify_registry(&**client, &self.registry)
            .await
    }
}
