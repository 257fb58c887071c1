//! Transaction and savepoint control statements.
//!
//! Every function issues exactly one statement through the buffered executor
//! of a connection the caller has already acquired. Nothing here touches the
//! gate, and nesting is not tracked: statements go out in the order they are
//! called, and a bad sequence is reported by SQLite itself.

use sqlgate_core::{
    CompiledQuery, Cx, DatabaseConnection, Error, Outcome, QueryCompiler, QueryId, QueryNode,
};

/// The three savepoint commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavepointCommand {
    Savepoint,
    RollbackTo,
    Release,
}

impl SavepointCommand {
    pub const fn keyword(self) -> &'static str {
        match self {
            SavepointCommand::Savepoint => "SAVEPOINT",
            SavepointCommand::RollbackTo => "ROLLBACK TO",
            SavepointCommand::Release => "RELEASE",
        }
    }

    /// Build `<keyword> <name>` with the name as an identifier node, so the
    /// compiler quotes it instead of splicing caller text into the SQL.
    pub fn to_node(self, name: &str) -> QueryNode {
        QueryNode::with_children(vec![
            QueryNode::raw(format!("{} ", self.keyword())),
            QueryNode::identifier(name),
        ])
    }

    /// Render the statement with a fresh query id.
    pub fn compile(self, name: &str, compiler: &dyn QueryCompiler) -> CompiledQuery {
        compiler.compile_query(&self.to_node(name), QueryId::new())
    }
}

async fn run<C: DatabaseConnection>(cx: &Cx, conn: &C, query: CompiledQuery) -> Outcome<(), Error> {
    tracing::trace!(sql = %query.sql(), "transaction control");
    match conn.execute_query(cx, &query).await {
        Outcome::Ok(_) => Outcome::Ok(()),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Issue `BEGIN`.
pub async fn begin<C: DatabaseConnection>(cx: &Cx, conn: &C) -> Outcome<(), Error> {
    run(cx, conn, CompiledQuery::raw("BEGIN")).await
}

/// Issue `COMMIT`.
pub async fn commit<C: DatabaseConnection>(cx: &Cx, conn: &C) -> Outcome<(), Error> {
    run(cx, conn, CompiledQuery::raw("COMMIT")).await
}

/// Issue `ROLLBACK`.
pub async fn rollback<C: DatabaseConnection>(cx: &Cx, conn: &C) -> Outcome<(), Error> {
    run(cx, conn, CompiledQuery::raw("ROLLBACK")).await
}

#[tracing::instrument(level = "debug", skip(cx, conn, compiler))]
pub async fn savepoint<C: DatabaseConnection>(
    cx: &Cx,
    conn: &C,
    name: &str,
    compiler: &dyn QueryCompiler,
) -> Outcome<(), Error> {
    let query = SavepointCommand::Savepoint.compile(name, compiler);
    run(cx, conn, query).await
}

#[tracing::instrument(level = "debug", skip(cx, conn, compiler))]
pub async fn rollback_to_savepoint<C: DatabaseConnection>(
    cx: &Cx,
    conn: &C,
    name: &str,
    compiler: &dyn QueryCompiler,
) -> Outcome<(), Error> {
    let query = SavepointCommand::RollbackTo.compile(name, compiler);
    run(cx, conn, query).await
}

#[tracing::instrument(level = "debug", skip(cx, conn, compiler))]
pub async fn release_savepoint<C: DatabaseConnection>(
    cx: &Cx,
    conn: &C,
    name: &str,
    compiler: &dyn QueryCompiler,
) -> Outcome<(), Error> {
    let query = SavepointCommand::Release.compile(name, compiler);
    run(cx, conn, query).await
}
