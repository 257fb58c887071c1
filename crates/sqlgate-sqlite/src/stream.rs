//! Lazy row streaming.

use crate::database::SqliteDatabase;
use crate::statement::Statement;
use sqlgate_core::{Cx, Error, Outcome, QueryResult, QueryStream, Result, Row};
use std::sync::Arc;

/// A forward-only cursor over a prepared statement.
///
/// Each [`next`](QueryStream::next) steps the statement once under the
/// database lock and yields a single-row [`QueryResult`]. The statement is
/// finalized as soon as it is exhausted, fails, is cancelled, or the stream
/// is dropped.
pub struct RowStream {
    db: Arc<SqliteDatabase>,
    stmt: Option<Statement>,
}

impl RowStream {
    pub(crate) fn new(db: Arc<SqliteDatabase>, stmt: Statement) -> Self {
        Self {
            db,
            stmt: Some(stmt),
        }
    }

    /// Has the underlying statement been finalized?
    pub fn is_finished(&self) -> bool {
        self.stmt.is_none()
    }

    /// Step once. `Ok(None)` when there are no more rows.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(stmt) = self.stmt.as_mut() else {
            return Ok(None);
        };

        let inner = self.db.lock();
        let stepped = stmt.step(&inner);
        if !matches!(stepped, Ok(Some(_))) {
            // Finalize under the lock so nothing else interleaves with it.
            self.stmt = None;
        }
        drop(inner);
        stepped
    }

    fn finish(&mut self) {
        if let Some(stmt) = self.stmt.take() {
            let _guard = self.db.lock();
            drop(stmt);
        }
    }
}

impl QueryStream for RowStream {
    fn next(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Option<Outcome<QueryResult, Error>>> + Send {
        let item = if self.stmt.is_none() {
            None
        } else if let Some(reason) = cx.cancel_reason() {
            self.finish();
            Some(Outcome::Cancelled(reason))
        } else {
            match self.next_row() {
                Ok(Some(row)) => Some(Outcome::Ok(QueryResult::single_row(row))),
                Ok(None) => None,
                Err(e) => Some(Outcome::Err(e)),
            }
        };
        async move { item }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        if let Some(stmt) = &self.stmt {
            tracing::debug!(sql = %stmt.sql(), "row stream dropped before completion");
        }
        self.finish();
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
