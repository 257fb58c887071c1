//! Driver and connection traits.
//!
//! This module defines the surface a query framework programs against:
//!
//! - [`DatabaseConnection`] - the logical connection handle; buffered and streaming execution
//! - [`QueryStream`] - a lazy, forward-only sequence of single-row results
//! - [`Driver`] - lifecycle, exclusive acquisition and transaction control
//!
//! All operations take a `Cx` context so callers can cancel them through
//! asupersync's structured concurrency.

use crate::compiler::QueryCompiler;
use crate::error::Error;
use crate::query::{CompiledQuery, QueryResult};
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future, used where closures must return futures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A connection capable of executing compiled statements.
///
/// The handle itself performs no locking. Whoever holds it must have been
/// admitted by the driver's gate and must stop using it after release.
pub trait DatabaseConnection: Send + Sync {
    /// Stream type returned by [`stream_query`](DatabaseConnection::stream_query).
    type Stream: QueryStream;

    /// Execute a statement to completion and return every row, the
    /// affected-row count and the last insert id.
    fn execute_query(
        &self,
        cx: &Cx,
        query: &CompiledQuery,
    ) -> impl Future<Output = Outcome<QueryResult, Error>> + Send;

    /// Prepare and bind a statement, returning a stream that steps it one
    /// row at a time.
    fn stream_query(
        &self,
        cx: &Cx,
        query: &CompiledQuery,
    ) -> impl Future<Output = Outcome<Self::Stream, Error>> + Send;
}

/// Lazy, forward-only, non-restartable sequence of single-row results.
///
/// Dropping the stream before it is exhausted releases the underlying
/// statement.
pub trait QueryStream: Send {
    /// Pull the next row. `None` once the statement is done or has failed.
    fn next(&mut self, cx: &Cx)
    -> impl Future<Output = Option<Outcome<QueryResult, Error>>> + Send;
}

/// A driver adapting one physical connection to concurrent callers.
///
/// # Protocol
///
/// ```text
/// init ─▶ acquire_connection ─▶ (execute | begin … savepoint … commit)* ─▶ release_connection
///                 ▲                                                              │
///                 └──────────────────────────────────────────────────────────────┘
/// destroy
/// ```
///
/// Every successful `acquire_connection` must be paired with exactly one
/// `release_connection`, on every exit path. Transaction and savepoint
/// operations never acquire or release on their own.
pub trait Driver: Send + Sync {
    /// The logical connection handle handed to acquirers.
    type Connection: DatabaseConnection;

    /// Resolve the physical connection and run one-time setup.
    fn init(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Wait for exclusive access and return the connection handle.
    fn acquire_connection(
        &self,
        cx: &Cx,
    ) -> impl Future<Output = Outcome<Arc<Self::Connection>, Error>> + Send;

    /// Issue `BEGIN`.
    fn begin_transaction(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Issue `COMMIT`.
    fn commit_transaction(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Issue `ROLLBACK`.
    fn rollback_transaction(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Issue `SAVEPOINT <name>`, with the name rendered by `compiler`.
    fn savepoint(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Issue `ROLLBACK TO <name>`.
    fn rollback_to_savepoint(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Issue `RELEASE <name>`.
    fn release_savepoint(
        &self,
        cx: &Cx,
        conn: &Self::Connection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Give up exclusive access, admitting the next waiter.
    fn release_connection(&self) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Close the physical connection.
    fn destroy(&self) -> impl Future<Output = Outcome<(), Error>> + Send;
}
