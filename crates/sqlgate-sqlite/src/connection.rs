//! The logical connection handle handed out by the driver.

use crate::database::SqliteDatabase;
use crate::stream::RowStream;
use sqlgate_core::{CompiledQuery, Cx, DatabaseConnection, Error, Outcome, QueryResult, Result};
use std::sync::Arc;

/// Executor over the shared physical connection.
///
/// Cloning the handle is cheap; every clone talks to the same
/// [`SqliteDatabase`]. Exclusive use is enforced by the driver's gate, not
/// here.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    db: Arc<SqliteDatabase>,
}

impl SqliteConnection {
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self { db }
    }

    /// The physical connection behind this handle.
    pub fn database(&self) -> &Arc<SqliteDatabase> {
        &self.db
    }

    /// Buffered execution without an async context.
    pub fn query_sync(&self, query: &CompiledQuery) -> Result<QueryResult> {
        self.db.query(query)
    }

    /// Run raw SQL that takes no parameters and returns nothing.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.db.execute_batch(sql)
    }
}

impl DatabaseConnection for SqliteConnection {
    type Stream = RowStream;

    #[tracing::instrument(
        level = "trace",
        skip(self, cx, query),
        fields(query_id = %query.query_id())
    )]
    fn execute_query(
        &self,
        cx: &Cx,
        query: &CompiledQuery,
    ) -> impl Future<Output = Outcome<QueryResult, Error>> + Send {
        let outcome = match cx.cancel_reason() {
            Some(reason) => Outcome::Cancelled(reason),
            None => self.db.query(query).map_or_else(Outcome::Err, Outcome::Ok),
        };
        async move { outcome }
    }

    fn stream_query(
        &self,
        cx: &Cx,
        query: &CompiledQuery,
    ) -> impl Future<Output = Outcome<RowStream, Error>> + Send {
        let outcome = match cx.cancel_reason() {
            Some(reason) => Outcome::Cancelled(reason),
            None => self.db.stream(query).map_or_else(Outcome::Err, Outcome::Ok),
        };
        async move { outcome }
    }
}
