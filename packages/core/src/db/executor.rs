//! QueryExecutor - the seam between statement builders and PostgreSQL
//!
//! Implemented for `tokio_postgres::Client` (a pooled connection, one
//! statement per round trip) and `tokio_postgres::Transaction` (several
//! statements that commit together). Services are generic over it, so the
//! same coordinated operation runs on either.
//!
//! # Wire format
//!
//! Every parameter is declared as `text` when the statement is prepared and
//! converted by the `$n::<type>` cast the builder wrote. Rows come back as a
//! single `json` column (`row_to_json`), decoded into a [`Record`]. The
//! wrapping select sorts by the query's `row_order` columns, if any.

use crate::db::DatabaseError;
use crate::models::{BoundQuery, Record};
use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::GenericClient;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement and return all rows
    async fn fetch_all(&self, query: &BoundQuery) -> Result<Vec<Record>, DatabaseError>;

    /// Run a statement and return the first row, if any
    async fn fetch_optional(&self, query: &BoundQuery) -> Result<Option<Record>, DatabaseError> {
        Ok(self.fetch_all(query).await?.into_iter().next())
    }
}

#[async_trait]
impl QueryExecutor for tokio_postgres::Client {
    async fn fetch_all(&self, query: &BoundQuery) -> Result<Vec<Record>, DatabaseError> {
        run(self, query).await
    }
}

#[async_trait]
impl<'a> QueryExecutor for tokio_postgres::Transaction<'a> {
    async fn fetch_all(&self, query: &BoundQuery) -> Result<Vec<Record>, DatabaseError> {
        run(self, query).await
    }
}

async fn run<C>(client: &C, query: &BoundQuery) -> Result<Vec<Record>, DatabaseError>
where
    C: GenericClient + Sync,
{
    let sql = json_rows(query);
    let params = query.text_params();
    let types = vec![Type::TEXT; params.len()];

    tracing::debug!(sql = %query.sql, binds = params.len(), "executing statement");

    let statement = client.prepare_typed(&sql, &types).await?;
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();
    let rows = client.query(&statement, &refs).await?;

    rows.iter()
        .map(|row| {
            let value: Value = row.try_get(0)?;
            match value {
                Value::Object(record) => Ok(record),
                other => Err(DatabaseError::row_decode(format!(
                    "expected a JSON object, got {other}"
                ))),
            }
        })
        .collect()
}

/// Wrap a statement so each result row is one `json` value
///
/// Data-modifying statements are placed in a CTE (their `RETURNING` rows feed
/// the outer select); queries become a derived table. The outer select is
/// ordered by `row_order`, since the inner `ORDER BY` is not guaranteed to
/// survive the wrapping.
fn json_rows(query: &BoundQuery) -> String {
    let sql = &query.sql;
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    let mut wrapped = match head.as_str() {
        "INSERT" | "UPDATE" | "DELETE" => {
            format!("WITH q AS ({sql}) SELECT row_to_json(q) FROM q")
        }
        _ => format!("SELECT row_to_json(q) FROM ({sql}) AS q"),
    };

    if !query.row_order.is_empty() {
        let columns: Vec<String> = query.row_order.iter().map(|c| format!("q.{c}")).collect();
        wrapped.push_str(" ORDER BY ");
        wrapped.push_str(&columns.join(", "));
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries;

    #[test]
    fn test_json_rows_wraps_writes_in_cte() {
        assert_eq!(
            json_rows(&BoundQuery::raw("DELETE FROM nodes WHERE id = $1::integer RETURNING *")),
            "WITH q AS (DELETE FROM nodes WHERE id = $1::integer RETURNING *) \
             SELECT row_to_json(q) FROM q"
        );
        assert!(json_rows(&BoundQuery::raw("  insert into t DEFAULT VALUES RETURNING *"))
            .starts_with("WITH q AS ("));
    }

    #[test]
    fn test_json_rows_wraps_reads_as_derived_table() {
        assert_eq!(
            json_rows(&BoundQuery::raw("SELECT * FROM stations LIMIT 50 OFFSET 0")),
            "SELECT row_to_json(q) FROM (SELECT * FROM stations LIMIT 50 OFFSET 0) AS q"
        );
        assert!(json_rows(&BoundQuery::raw("WITH RECURSIVE a AS (SELECT 1) SELECT * FROM a"))
            .starts_with("SELECT row_to_json(q) FROM (WITH RECURSIVE"));
    }

    #[test]
    fn test_json_rows_orders_outer_select() {
        assert_eq!(
            json_rows(&queries::node::select_node_types()),
            "SELECT row_to_json(q) FROM (SELECT name FROM node_types ORDER BY name) AS q \
             ORDER BY q.name"
        );

        let ancestors = json_rows(&queries::node::select_ancestors(5));
        assert!(ancestors.starts_with("SELECT row_to_json(q) FROM (WITH RECURSIVE"));
        assert!(ancestors.ends_with(") AS q ORDER BY q.depth"));

        let relations = json_rows(&queries::relation::select_node_relations());
        assert!(relations.ends_with(" ORDER BY q.owner_type, q.dependent_type"));
    }
}
