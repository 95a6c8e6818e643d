//! Scripted executor for exercising services without a database

use crate::db::{DatabaseError, QueryExecutor};
use crate::models::{BoundQuery, Record};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every statement it receives
///
/// When the script runs out, statements return no rows.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<Vec<Record>, String>>>,
    log: Mutex<Vec<BoundQuery>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the rows for the next statement
    pub(crate) fn respond(self, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.as_object().cloned().unwrap_or_default())
            .collect();
        self.responses.lock().unwrap().push_back(Ok(rows));
        self
    }

    /// Queue a failure for the next statement
    pub(crate) fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn executed(&self) -> Vec<BoundQuery> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|q| q.sql).collect()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn fetch_all(&self, query: &BoundQuery) -> Result<Vec<Record>, DatabaseError> {
        self.log.lock().unwrap().push(query.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(DatabaseError::row_decode(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// A `nodes` row as the database would return it
pub(crate) fn node_row(id: i64, node_type: &str, owner: Option<(i64, &str)>) -> Value {
    json!({
        "id": id,
        "type": node_type,
        "owner_id": owner.map(|(id, _)| id),
        "owner_type": owner.map(|(_, t)| t),
        "created_at": "2024-05-01T12:00:00.000000+00:00",
        "updated_at": "2024-05-01T12:00:00.000000+00:00"
    })
}

/// A `files` row as the database would return it
pub(crate) fn file_row(id: i64, file_type: &str, owner: (i64, &str)) -> Value {
    json!({
        "id": id,
        "file_type": file_type,
        "owner_id": owner.0,
        "owner_type": owner.1,
        "filename": "scan.tif",
        "file_size": 2048,
        "mimetype": "image/tiff",
        "fs_path": null,
        "created_at": "2024-05-01T12:00:00.000000+00:00",
        "updated_at": "2024-05-01T12:00:00.000000+00:00"
    })
}
