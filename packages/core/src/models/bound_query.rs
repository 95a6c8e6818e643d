//! Bound Query
//!
//! The unit every statement builder produces: PostgreSQL text with numbered
//! `$n` placeholders plus the values bound to them, in placeholder order.
//!
//! Placeholders are only ever allocated through [`BoundQuery::bind`], which
//! pushes the value and returns the next number. That keeps the placeholder
//! count equal to `data.len()` and the numbering contiguous from `$1`, no
//! matter how many columns a builder skips.
//!
//! A query that returns rows in a defined order also names its sort columns
//! in [`BoundQuery::row_order`]. The executor decodes rows through a wrapping
//! select, and a subquery's `ORDER BY` does not carry through it, so the
//! wrapper re-applies the order.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundQuery {
    /// Statement text
    pub sql: String,

    /// Bind values, `data[0]` binds `$1`
    pub data: Vec<Value>,

    /// Output columns the result rows are ordered by
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub row_order: Vec<String>,
}

impl BoundQuery {
    /// Start an empty query; builders push text and binds as they go
    pub(crate) fn new() -> Self {
        Self {
            sql: String::new(),
            data: Vec::new(),
            row_order: Vec::new(),
        }
    }

    /// Query with no bind values
    pub(crate) fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            data: Vec::new(),
            row_order: Vec::new(),
        }
    }

    /// Declare the output columns the rows come back sorted by
    pub(crate) fn ordered_by(mut self, columns: &[&str]) -> Self {
        self.row_order = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Register a value and return its placeholder with an explicit cast,
    /// e.g. `$3::numeric`
    pub(crate) fn bind(&mut self, value: Value, cast: &str) -> String {
        self.data.push(value);
        format!("${}::{}", self.data.len(), cast)
    }

    pub(crate) fn push_str(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Placeholder numbers in order of appearance in `sql`
    pub fn placeholders(&self) -> Vec<usize> {
        let bytes = self.sql.as_bytes();
        let mut found = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = self.sql[start..end].parse() {
                        found.push(n);
                    }
                }
                i = end.max(i + 1);
            } else {
                i += 1;
            }
        }
        found
    }

    /// Bind values rendered as text
    ///
    /// Every parameter is sent to the server as `text`; the `$n::<type>` cast
    /// in the statement converts it. `NULL` stays `None`.
    pub fn text_params(&self) -> Vec<Option<String>> {
        self.data.iter().map(value_as_text).collect()
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_numbers_contiguously() {
        let mut query = BoundQuery::new();
        let first = query.bind(json!("Site A"), "varchar");
        let second = query.bind(json!(51.1), "numeric");
        assert_eq!(first, "$1::varchar");
        assert_eq!(second, "$2::numeric");
        assert_eq!(query.data, vec![json!("Site A"), json!(51.1)]);
    }

    #[test]
    fn test_ordered_by() {
        let query = BoundQuery::raw("SELECT * FROM node_types ORDER BY name").ordered_by(&["name"]);
        assert_eq!(query.row_order, vec!["name".to_string()]);
        assert!(BoundQuery::raw("SELECT 1").row_order.is_empty());
    }

    #[test]
    fn test_placeholders_scan() {
        let query = BoundQuery::raw(
            "UPDATE t SET a = $2::varchar, b = $3::integer WHERE id = $1::integer",
        );
        assert_eq!(query.placeholders(), vec![2, 3, 1]);

        let query = BoundQuery::raw("SELECT 1 AS \"$\"");
        assert!(query.placeholders().is_empty());
    }

    #[test]
    fn test_text_params() {
        let query = BoundQuery {
            sql: "SELECT $1::integer, $2::boolean, $3::varchar, $4::json".to_string(),
            data: vec![json!(7), json!(true), Value::Null, json!({"k": [1, 2]})],
            row_order: Vec::new(),
        };
        assert_eq!(
            query.text_params(),
            vec![
                Some("7".to_string()),
                Some("true".to_string()),
                None,
                Some("{\"k\":[1,2]}".to_string()),
            ]
        );
    }
}
