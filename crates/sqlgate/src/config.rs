//! Dialect configuration.

use sqlgate_core::{BoxFuture, Cx, Error, Outcome, Result};
use sqlgate_sqlite::{SqliteConfig, SqliteConnection, SqliteDatabase};
use std::fmt;
use std::sync::Arc;

/// Asynchronous producer of the physical connection.
pub type ConnectionFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<SqliteDatabase>> + Send + Sync>;

/// One-time setup run against the freshly created connection handle.
pub type ConnectionHook = Arc<
    dyn for<'a> Fn(&'a Cx, &'a SqliteConnection) -> BoxFuture<'a, Outcome<(), Error>>
        + Send
        + Sync,
>;

/// Where the physical connection comes from.
#[derive(Clone)]
pub enum DatabaseSource {
    /// An already-open connection.
    ///
    /// Each driver closes it on `destroy`, so build at most one driver from
    /// a given live connection.
    Connection(Arc<SqliteDatabase>),
    /// Invoked exactly once by each driver's `init`.
    Factory(ConnectionFactory),
}

impl DatabaseSource {
    /// Wrap an open connection.
    pub fn connection(db: SqliteDatabase) -> Self {
        DatabaseSource::Connection(Arc::new(db))
    }

    /// Wrap an async factory.
    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SqliteDatabase>> + Send + 'static,
    {
        DatabaseSource::Factory(Arc::new(
            move || -> BoxFuture<'static, Result<SqliteDatabase>> { Box::pin(factory()) },
        ))
    }

    /// A factory that opens `config` when the driver initializes.
    pub fn open(config: SqliteConfig) -> Self {
        Self::factory(move || {
            let config = config.clone();
            async move { SqliteDatabase::open(&config) }
        })
    }
}

impl fmt::Debug for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSource::Connection(db) => f.debug_tuple("Connection").field(db).finish(),
            DatabaseSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<SqliteDatabase> for DatabaseSource {
    fn from(db: SqliteDatabase) -> Self {
        Self::connection(db)
    }
}

impl From<Arc<SqliteDatabase>> for DatabaseSource {
    fn from(db: Arc<SqliteDatabase>) -> Self {
        DatabaseSource::Connection(db)
    }
}

/// Configuration shared by every driver a dialect creates.
#[derive(Clone)]
pub struct DialectConfig {
    pub database: DatabaseSource,
    pub on_create_connection: Option<ConnectionHook>,
}

impl DialectConfig {
    pub fn new(database: impl Into<DatabaseSource>) -> Self {
        Self {
            database: database.into(),
            on_create_connection: None,
        }
    }

    /// Run `hook` once after the connection is established, e.g. to set pragmas.
    pub fn on_create_connection<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Cx, &'a SqliteConnection) -> BoxFuture<'a, Outcome<(), Error>>
            + Send
            + Sync
            + 'static,
    {
        self.on_create_connection = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for DialectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectConfig")
            .field("database", &self.database)
            .field("on_create_connection", &self.on_create_connection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_cloneable() {
        let config = DialectConfig::new(DatabaseSource::open(SqliteConfig::memory()))
            .on_create_connection(|_cx, conn| {
                Box::pin(async move {
                    conn.execute_raw("PRAGMA foreign_keys = ON")
                        .map_or_else(Outcome::Err, Outcome::Ok)
                })
            });
        let copy = config.clone();
        assert!(copy.on_create_connection.is_some());
        assert!(matches!(copy.database, DatabaseSource::Factory(_)));
    }

    #[test]
    fn test_debug_hides_closures() {
        let config = DialectConfig::new(SqliteDatabase::open_memory().unwrap());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("Connection"));
        assert!(rendered.contains("on_create_connection: false"));
    }
}
