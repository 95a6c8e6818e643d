//! Relation Validator
//!
//! Answers "may a `dependent_type` be attached under an `owner_type`?" from the
//! `node_relations` and `file_relations` allow-lists.
//!
//! A validator is an immutable snapshot: it is loaded once (usually at
//! startup), wrapped in an `Arc` and shared by every store. A changed relation
//! table is picked up only by calling [`RelationValidator::load`] again and
//! handing the new snapshot to the services.

use crate::db::QueryExecutor;
use crate::models::{from_record, Node, OwnerRef, Relation};
use crate::queries;
use crate::services::error::ArchiveError;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Default)]
struct RelationSet {
    pairs: HashSet<(String, String)>,
}

impl RelationSet {
    fn from_relations(relations: impl IntoIterator<Item = Relation>) -> Self {
        Self {
            pairs: relations
                .into_iter()
                .map(|r| (r.dependent_type, r.owner_type))
                .collect(),
        }
    }

    fn contains(&self, dependent_type: &str, owner_type: &str) -> bool {
        self.pairs
            .contains(&(dependent_type.to_string(), owner_type.to_string()))
    }

    fn dependents_of<'a>(&'a self, owner_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(_, owner)| owner == owner_type)
            .map(|(dependent, _)| dependent.as_str())
    }
}

/// Preloaded node and file relation allow-lists
#[derive(Debug, Clone, Default)]
pub struct RelationValidator {
    nodes: RelationSet,
    files: RelationSet,
}

impl RelationValidator {
    /// Build a validator from in-memory pairs
    pub fn new(
        node_relations: impl IntoIterator<Item = Relation>,
        file_relations: impl IntoIterator<Item = Relation>,
    ) -> Self {
        Self {
            nodes: RelationSet::from_relations(node_relations),
            files: RelationSet::from_relations(file_relations),
        }
    }

    /// Read both relation tables and build a fresh snapshot
    pub async fn load<E>(executor: &E) -> Result<Self, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node_relations = decode_relations(
            executor
                .fetch_all(&queries::relation::select_node_relations())
                .await?,
        )?;
        let file_relations = decode_relations(
            executor
                .fetch_all(&queries::relation::select_file_relations())
                .await?,
        )?;

        tracing::info!(
            node_relations = node_relations.len(),
            file_relations = file_relations.len(),
            "Loaded relation allow-lists"
        );

        Ok(Self::new(node_relations, file_relations))
    }

    /// Whether a node of `dependent_type` may be owned by `owner_type`
    pub fn is_relatable(&self, dependent_type: &str, owner_type: &str) -> bool {
        self.nodes.contains(dependent_type, owner_type)
    }

    /// Whether a file of `file_type` may be owned by `owner_type`
    pub fn is_file_relatable(&self, file_type: &str, owner_type: &str) -> bool {
        self.files.contains(file_type, owner_type)
    }

    /// Resolve both node types, then check the pair
    ///
    /// # Errors
    ///
    /// `NotFound` if either node does not exist. An existing but disallowed
    /// pair is `Ok(false)`.
    pub async fn is_relatable_by_id<E>(
        &self,
        executor: &E,
        node_id: i64,
        owner_id: i64,
    ) -> Result<bool, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let node = fetch_node(executor, node_id).await?;
        let owner = fetch_node(executor, owner_id).await?;
        Ok(self.is_relatable(&node.node_type, &owner.node_type))
    }

    /// Fail with `InvalidRelation` unless the attachment is allowed
    ///
    /// Root nodes (no owner) are always allowed.
    pub fn ensure_relatable(
        &self,
        dependent_type: &str,
        owner: Option<&OwnerRef>,
    ) -> Result<(), ArchiveError> {
        match owner {
            None => Ok(()),
            Some(owner) if self.is_relatable(dependent_type, &owner.owner_type) => Ok(()),
            Some(owner) => Err(ArchiveError::invalid_relation(
                dependent_type,
                &owner.owner_type,
            )),
        }
    }

    /// Fail with `InvalidRelation` unless the file attachment is allowed
    pub fn ensure_file_relatable(
        &self,
        file_type: &str,
        owner: &OwnerRef,
    ) -> Result<(), ArchiveError> {
        if self.is_file_relatable(file_type, &owner.owner_type) {
            Ok(())
        } else {
            Err(ArchiveError::invalid_relation(file_type, &owner.owner_type))
        }
    }

    /// Node and file types that may be attached under `owner_type`, sorted
    pub fn dependents_of(&self, owner_type: &str) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .nodes
            .dependents_of(owner_type)
            .chain(self.files.dependents_of(owner_type))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }
}

fn decode_relations(rows: Vec<crate::models::Record>) -> Result<Vec<Relation>, ArchiveError> {
    rows.into_iter()
        .map(|row| from_record(row).map_err(ArchiveError::from))
        .collect()
}

/// Fetch a node row or fail with `NotFound`
pub(crate) async fn fetch_node<E>(executor: &E, id: i64) -> Result<Node, ArchiveError>
where
    E: QueryExecutor + ?Sized,
{
    let row = executor
        .fetch_optional(&queries::node::select_node(id))
        .await?
        .ok_or_else(|| ArchiveError::not_found("node", id))?;
    Ok(from_record(row)?)
}
