//! Node Tree Store
//!
//! Owns the shared `nodes` adjacency list. Every node-backed entity row has a
//! node with the same id; the node carries the polymorphic owner pair that
//! places the row in the archive hierarchy.
//!
//! # Lifecycle
//!
//! A node is created attached (owner set) only when the relation allow-list
//! permits its type under the owner's type; root nodes are always permitted.
//! It can be moved with [`NodeTreeStore::reparent`] and removed only once it
//! has no child nodes and no attached files.
//!
//! All operations are generic over [`QueryExecutor`], so callers decide
//! whether they run on a pooled connection or inside a transaction.

use crate::db::QueryExecutor;
use crate::models::{from_record, Node, OwnerRef, Record};
use crate::queries;
use crate::services::error::ArchiveError;
use crate::services::relation_validator::{fetch_node, RelationValidator};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NodeTreeStore {
    relations: Arc<RelationValidator>,
}

impl NodeTreeStore {
    pub fn new(relations: Arc<RelationValidator>) -> Self {
        Self { relations }
    }

    pub fn relations(&self) -> &RelationValidator {
        &self.relations
    }

    /// Create a node of `node_type`, attached under `owner` when given
    ///
    /// # Errors
    ///
    /// - `InvalidRelation` if the pair is not allowed
    /// - `NotFound` if the owner node does not exist with the given type
    pub async fn insert_node<E>(
        &self,
        executor: &E,
        node_type: &str,
        owner: Option<&OwnerRef>,
    ) -> Result<Node, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.relations.ensure_relatable(node_type, owner)?;
        if let Some(owner) = owner {
            resolve_owner(executor, owner).await?;
        }

        let row = fetch_one(executor, &queries::node::insert_node(node_type, owner), "node").await?;
        let node: Node = from_record(row)?;

        tracing::debug!(
            "Created node {} ({}) under {:?}",
            node.id,
            node.node_type,
            node.owner_id
        );
        Ok(node)
    }

    pub async fn select_node<E>(&self, executor: &E, id: i64) -> Result<Option<Node>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        executor
            .fetch_optional(&queries::node::select_node(id))
            .await?
            .map(|row| from_record(row).map_err(ArchiveError::from))
            .transpose()
    }

    /// Nodes owned directly by `id`
    pub async fn select_children<E>(&self, executor: &E, id: i64) -> Result<Vec<Node>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        decode_nodes(executor.fetch_all(&queries::node::select_children(id)).await?)
    }

    /// Whether any node is owned by `id`
    pub async fn has_dependents<E>(&self, executor: &E, id: i64) -> Result<bool, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        fetch_flag(executor, &queries::node::has_dependents(id), "has_dependents").await
    }

    /// Owners of `id` up to the root, nearest first
    pub async fn select_ancestors<E>(&self, executor: &E, id: i64) -> Result<Vec<Node>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        decode_nodes(executor.fetch_all(&queries::node::select_ancestors(id)).await?)
    }

    /// Move node `id` under `new_owner`
    ///
    /// # Errors
    ///
    /// - `NotFound` if either node is missing
    /// - `InvalidRelation` if the node's type may not live under the owner's
    /// - `CircularReference` if the owner is the node itself or one of its
    ///   descendants
    pub async fn reparent<E>(
        &self,
        executor: &E,
        id: i64,
        new_owner: &OwnerRef,
    ) -> Result<Node, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node = fetch_node(executor, id).await?;
        self.relations
            .ensure_relatable(&node.node_type, Some(new_owner))?;
        resolve_owner(executor, new_owner).await?;

        if new_owner.id == id {
            return Err(ArchiveError::circular_reference(format!(
                "node {id} cannot own itself"
            )));
        }
        let ancestors = self.select_ancestors(executor, new_owner.id).await?;
        if ancestors.iter().any(|a| a.id == id) {
            return Err(ArchiveError::circular_reference(format!(
                "node {} is a descendant of node {}",
                new_owner.id, id
            )));
        }

        let row = fetch_one(executor, &queries::node::reparent(id, new_owner), "node").await?;
        let moved: Node = from_record(row)?;

        tracing::debug!(
            "Reparented node {} under {} {}",
            id,
            new_owner.owner_type,
            new_owner.id
        );
        Ok(moved)
    }

    /// Check that node `id` exists and nothing hangs off it
    ///
    /// # Errors
    ///
    /// `NotFound`, or `OrphanDeletionRefused` naming what still depends on it.
    pub async fn ensure_removable<E>(&self, executor: &E, id: i64) -> Result<Node, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node = fetch_node(executor, id).await?;

        if self.has_dependents(executor, id).await? {
            return Err(ArchiveError::orphan_deletion_refused(id, "child nodes"));
        }
        if fetch_flag(executor, &queries::file::has_files(id), "has_files").await? {
            return Err(ArchiveError::orphan_deletion_refused(id, "attached files"));
        }

        Ok(node)
    }

    /// Delete a leaf node; refused while it has children or files
    pub async fn remove_node<E>(&self, executor: &E, id: i64) -> Result<Node, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.ensure_removable(executor, id).await?;
        let row = fetch_one(executor, &queries::node::delete_node(id), "node").await?;
        Ok(from_record(row)?)
    }
}

/// The owner must be an existing node of the stated type
pub(crate) async fn resolve_owner<E>(executor: &E, owner: &OwnerRef) -> Result<Node, ArchiveError>
where
    E: QueryExecutor + ?Sized,
{
    match fetch_node(executor, owner.id).await {
        Ok(node) if node.node_type == owner.owner_type => Ok(node),
        Ok(_) | Err(ArchiveError::NotFound { .. }) => {
            Err(ArchiveError::not_found(&owner.owner_type, owner.id))
        }
        Err(e) => Err(e),
    }
}

/// First row of a statement that must return one, e.g. `RETURNING *`
pub(crate) async fn fetch_one<E>(
    executor: &E,
    query: &crate::models::BoundQuery,
    entity: &str,
) -> Result<Record, ArchiveError>
where
    E: QueryExecutor + ?Sized,
{
    executor.fetch_optional(query).await?.ok_or_else(|| {
        ArchiveError::serialization(format!("statement on {entity} returned no row"))
    })
}

/// Boolean column of a single-row `SELECT EXISTS (...)`
pub(crate) async fn fetch_flag<E>(
    executor: &E,
    query: &crate::models::BoundQuery,
    column: &str,
) -> Result<bool, ArchiveError>
where
    E: QueryExecutor + ?Sized,
{
    let row = fetch_one(executor, query, column).await?;
    row.get(column)
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| ArchiveError::serialization(format!("column '{column}' is not a boolean")))
}

fn decode_nodes(rows: Vec<Record>) -> Result<Vec<Node>, ArchiveError> {
    rows.into_iter()
        .map(|row| from_record(row).map_err(ArchiveError::from))
        .collect()
}
