//! Compiled statements and their results.

use crate::row::Row;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier attached to each compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

impl QueryId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        Self(NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// SQL text plus the positional parameters to bind, produced by a
/// [`QueryCompiler`](crate::QueryCompiler) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    sql: String,
    parameters: Vec<Value>,
    query_id: QueryId,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, parameters: Vec<Value>, query_id: QueryId) -> Self {
        Self {
            sql: sql.into(),
            parameters,
            query_id,
        }
    }

    /// A statement with no parameters, e.g. `BEGIN`.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new(), QueryId::new())
    }

    /// A statement with parameters and a fresh query id.
    pub fn with_params(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self::new(sql, parameters, QueryId::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }
}

/// Outcome of executing a statement.
///
/// Buffered execution fills every field. Streaming execution yields one
/// `QueryResult` per row with a single entry in `rows` and both counters
/// left as `None`.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Rows changed by the most recent INSERT/UPDATE/DELETE on the connection.
    pub num_affected_rows: Option<u64>,
    /// Rowid of the most recent successful INSERT on the connection.
    pub insert_id: Option<i64>,
}

impl QueryResult {
    /// Result of a buffered execution.
    pub fn buffered(rows: Vec<Row>, num_affected_rows: u64, insert_id: i64) -> Self {
        Self {
            rows,
            num_affected_rows: Some(num_affected_rows),
            insert_id: Some(insert_id),
        }
    }

    /// A single-row batch produced while streaming.
    pub fn single_row(row: Row) -> Self {
        Self {
            rows: vec![row],
            num_affected_rows: None,
            insert_id: None,
        }
    }
}
