//! sqlgate - one SQLite connection, many async callers.
//!
//! SQLite connections are not safe for concurrent use, while query frameworks
//! expect a driver that many tasks can share. This crate sits in between:
//!
//! - [`ConnectionGate`] admits callers one at a time, strictly in arrival order
//! - [`SqliteDriver`] owns the physical connection and its lifecycle
//! - [`transaction`] issues `BEGIN` / `COMMIT` / `ROLLBACK` and quoted savepoints
//! - [`SqliteDialect`] bundles the driver, compiler and adapter
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlgate::prelude::*;
//!
//! let dialect = SqliteDialect::new(
//!     DialectConfig::new(DatabaseSource::open(SqliteConfig::file("app.db")))
//!         .on_create_connection(|_cx, conn| {
//!             Box::pin(async move {
//!                 conn.execute_raw("PRAGMA foreign_keys = ON")
//!                     .map_or_else(Outcome::Err, Outcome::Ok)
//!             })
//!         }),
//! );
//! let driver = dialect.create_driver();
//! let compiler = dialect.create_query_compiler();
//!
//! driver.init(cx).await;
//! let conn = driver.acquire_connection(cx).await?;
//! driver.begin_transaction(cx, &conn).await;
//! driver.savepoint(cx, &conn, "before_import", &compiler).await;
//! // ...
//! driver.commit_transaction(cx, &conn).await;
//! driver.release_connection().await;
//! ```
//!
//! Every successful `acquire_connection` must be followed by exactly one
//! `release_connection`, including on error paths.

pub mod config;
pub mod dialect;
pub mod driver;
pub mod gate;
pub mod transaction;

pub use config::{ConnectionFactory, ConnectionHook, DatabaseSource, DialectConfig};
pub use dialect::{SqliteAdapter, SqliteDialect};
pub use driver::SqliteDriver;
pub use gate::ConnectionGate;
pub use transaction::SavepointCommand;

pub use sqlgate_core::{
    BoxFuture, CompiledQuery, Cx, DatabaseConnection, Driver, DriverErrorKind, Error, Outcome,
    QueryCompiler, QueryErrorKind, QueryId, QueryNode, QueryResult, QueryStream, Result, Row,
    Value,
};
pub use sqlgate_sqlite::{
    OpenFlags, RowStream, SqliteConfig, SqliteConnection, SqliteDatabase, SqliteQueryCompiler,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        CompiledQuery, ConnectionGate, Cx, DatabaseConnection, DatabaseSource, DialectConfig,
        Driver, Error, Outcome, QueryCompiler, QueryResult, QueryStream, Result, Row,
        SqliteConfig, SqliteConnection, SqliteDatabase, SqliteDialect, SqliteDriver, Value,
    };
}
