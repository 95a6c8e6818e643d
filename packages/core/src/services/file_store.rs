//! File Attachment Store
//!
//! Shared `files` table. Files are leaves: they always have an owner node,
//! never own anything, and are checked against the file relation allow-list.

use crate::db::QueryExecutor;
use crate::models::{from_record, FileMetadata, FileRecord, OwnerRef};
use crate::queries;
use crate::services::error::ArchiveError;
use crate::services::node_store::{fetch_flag, fetch_one, resolve_owner};
use crate::services::relation_validator::RelationValidator;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FileAttachmentStore {
    relations: Arc<RelationValidator>,
}

impl FileAttachmentStore {
    pub fn new(relations: Arc<RelationValidator>) -> Self {
        Self { relations }
    }

    /// Attach a file of `file_type` under `owner`
    ///
    /// # Errors
    ///
    /// - `InvalidRelation` if `file_type` may not hang off the owner's type
    /// - `NotFound` if the owner node does not exist with the given type
    pub async fn insert_file<E>(
        &self,
        executor: &E,
        file_type: &str,
        owner: &OwnerRef,
        metadata: &FileMetadata,
    ) -> Result<FileRecord, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        self.relations.ensure_file_relatable(file_type, owner)?;
        resolve_owner(executor, owner).await?;

        let row = fetch_one(
            executor,
            &queries::file::insert_file(file_type, owner, metadata),
            "file",
        )
        .await?;
        let file: FileRecord = from_record(row)?;

        tracing::debug!(
            "Attached file {} ({}) to {} {}",
            file.id,
            file.file_type,
            owner.owner_type,
            owner.id
        );
        Ok(file)
    }

    pub async fn select_file<E>(&self, executor: &E, id: i64) -> Result<Option<FileRecord>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        executor
            .fetch_optional(&queries::file::select_file(id))
            .await?
            .map(|row| from_record(row).map_err(ArchiveError::from))
            .transpose()
    }

    /// Files attached to `owner`, in id order
    pub async fn select_by_owner<E>(
        &self,
        executor: &E,
        owner: &OwnerRef,
    ) -> Result<Vec<FileRecord>, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        executor
            .fetch_all(&queries::file::select_by_owner(owner))
            .await?
            .into_iter()
            .map(|row| from_record(row).map_err(ArchiveError::from))
            .collect()
    }

    /// Whether any file hangs off node `owner_id`
    pub async fn has_files<E>(&self, executor: &E, owner_id: i64) -> Result<bool, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        fetch_flag(executor, &queries::file::has_files(owner_id), "has_files").await
    }

    /// Delete a file row, failing with `NotFound` if it does not exist
    pub async fn remove_file<E>(&self, executor: &E, id: i64) -> Result<FileRecord, ArchiveError>
    where
        E: QueryExecutor + ?Sized,
    {
        let row = executor
            .fetch_optional(&queries::file::delete_file(id))
            .await?
            .ok_or_else(|| ArchiveError::not_found("file", id))?;
        Ok(from_record(row)?)
    }
}
