//! The SQLite dialect: driver, compiler and adapter in one place.

use crate::config::DialectConfig;
use crate::driver::SqliteDriver;
use sqlgate_core::{Cx, Error, Outcome};
use sqlgate_sqlite::{SqliteConnection, SqliteQueryCompiler};

/// Capabilities and migration hooks of the SQLite backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAdapter;

impl SqliteAdapter {
    pub fn new() -> Self {
        Self
    }

    /// DDL statements roll back with the surrounding transaction.
    pub const fn supports_transactional_ddl(&self) -> bool {
        true
    }

    /// `INSERT ... RETURNING` is available.
    pub const fn supports_returning(&self) -> bool {
        true
    }

    /// SQLite has a single writer, so migrations need no extra lock.
    pub fn acquire_migration_lock(
        &self,
        _cx: &Cx,
        _conn: &SqliteConnection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    pub fn release_migration_lock(
        &self,
        _cx: &Cx,
        _conn: &SqliteConnection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }
}

/// Factory for everything a query framework needs to talk to SQLite.
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    config: DialectConfig,
}

impl SqliteDialect {
    pub fn new(config: DialectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DialectConfig {
        &self.config
    }

    /// A new, uninitialized driver over the configured database.
    pub fn create_driver(&self) -> SqliteDriver {
        SqliteDriver::new(self.config.clone())
    }

    pub fn create_query_compiler(&self) -> SqliteQueryCompiler {
        SqliteQueryCompiler::new()
    }

    pub fn create_adapter(&self) -> SqliteAdapter {
        SqliteAdapter::new()
    }
}
