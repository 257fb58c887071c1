//! The driver facade.
//!
//! [`SqliteDriver`] owns the one physical connection and the gate in front of
//! it. Its lifecycle is
//!
//! ```text
//! Uninitialized ──init──▶ Initializing ──▶ Ready ──destroy──▶ Destroyed
//!                              │
//!                              └──(factory or hook error)──▶ Failed
//! ```
//!
//! Every acquirer receives the same `Arc<SqliteConnection>`; the gate makes
//! sure only one of them is using it at a time.

use crate::config::{DatabaseSource, DialectConfig};
use crate::gate::ConnectionGate;
use crate::transaction;
use asupersync::sync::AcquireError;
use sqlgate_core::error::{ConnectionError, ConnectionErrorKind, DriverError};
use sqlgate_core::{Cx, Driver, DriverErrorKind, Error, Outcome, QueryCompiler};
use sqlgate_sqlite::SqliteConnection;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum DriverState {
    Uninitialized,
    Initializing,
    Ready(Arc<SqliteConnection>),
    Failed,
    Destroyed,
}

impl DriverState {
    fn name(&self) -> &'static str {
        match self {
            DriverState::Uninitialized => "uninitialized",
            DriverState::Initializing => "initializing",
            DriverState::Ready(_) => "ready",
            DriverState::Failed => "failed",
            DriverState::Destroyed => "destroyed",
        }
    }

    /// The handle if ready, otherwise the error for using the driver now.
    fn connection(&self) -> Result<Arc<SqliteConnection>, Error> {
        match self {
            DriverState::Ready(conn) => Ok(Arc::clone(conn)),
            DriverState::Destroyed => Err(Error::closed("driver has been destroyed")),
            other => Err(Error::Driver(DriverError {
                kind: DriverErrorKind::NotInitialized,
                message: format!("driver is {}, call init first", other.name()),
            })),
        }
    }
}

/// Single-connection SQLite driver.
pub struct SqliteDriver {
    config: DialectConfig,
    state: Mutex<DriverState>,
    gate: ConnectionGate,
}

impl SqliteDriver {
    pub fn new(config: DialectConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DriverState::Uninitialized),
            gate: ConnectionGate::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state(), DriverState::Ready(_))
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(*self.state(), DriverState::Destroyed)
    }

    /// The gate guarding the connection.
    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    fn fail(&self) {
        let mut state = self.state();
        if matches!(*state, DriverState::Initializing) {
            *state = DriverState::Failed;
        }
    }
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("state", &self.state().name())
            .field("gate_held", &self.gate.is_held())
            .field("gate_closed", &self.gate.is_closed())
            .finish_non_exhaustive()
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    #[tracing::instrument(level = "debug", skip(self, cx))]
    async fn init(&self, cx: &Cx) -> Outcome<(), Error> {
        {
            let mut state = self.state();
            match *state {
                DriverState::Uninitialized => *state = DriverState::Initializing,
                DriverState::Destroyed => {
                    return Outcome::Err(Error::closed("driver has been destroyed"));
                }
                _ => {
                    return Outcome::Err(Error::Driver(DriverError {
                        kind: DriverErrorKind::AlreadyInitialized,
                        message: format!("init called on a driver that is {}", state.name()),
                    }));
                }
            }
        }

        let db = match &self.config.database {
            DatabaseSource::Connection(db) => Arc::clone(db),
            DatabaseSource::Factory(factory) => match factory().await {
                Ok(db) => Arc::new(db),
                Err(e) => {
                    tracing::debug!(error = %e, "connection factory failed");
                    self.fail();
                    return Outcome::Err(e);
                }
            },
        };
        let conn = Arc::new(SqliteConnection::new(db));

        if let Some(hook) = &self.config.on_create_connection {
            match hook(cx, conn.as_ref()).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => {
                    tracing::debug!(error = %e, "on_create_connection hook failed");
                    self.fail();
                    return Outcome::Err(Error::Connection(ConnectionError {
                        kind: ConnectionErrorKind::Hook,
                        message: format!("on_create_connection hook failed: {}", e),
                        source: Some(Box::new(e)),
                    }));
                }
                Outcome::Cancelled(r) => {
                    self.fail();
                    return Outcome::Cancelled(r);
                }
                Outcome::Panicked(p) => {
                    self.fail();
                    return Outcome::Panicked(p);
                }
            }
        }

        let mut state = self.state();
        if !matches!(*state, DriverState::Initializing) {
            // Destroyed while the factory or hook was running.
            drop(state);
            conn.database().close();
            return Outcome::Err(Error::closed("driver was destroyed during init"));
        }
        *state = DriverState::Ready(conn);
        drop(state);

        tracing::debug!("driver ready");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self, cx))]
    async fn acquire_connection(&self, cx: &Cx) -> Outcome<Arc<SqliteConnection>, Error> {
        let ready = self.state().connection();
        if let Err(e) = ready {
            return Outcome::Err(e);
        }
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        match self.gate.acquire(cx).await {
            Ok(()) => {}
            Err(AcquireError::Cancelled) => {
                return Outcome::Cancelled(cx.cancel_reason().unwrap_or_default());
            }
            Err(e) => {
                tracing::debug!(error = %e, "gate refused acquirer");
                return Outcome::Err(Error::closed("driver has been destroyed"));
            }
        }

        // The driver may have been destroyed while we were queued.
        let ready = self.state().connection();
        match ready {
            Ok(conn) => {
                tracing::trace!("connection acquired");
                Outcome::Ok(conn)
            }
            Err(e) => {
                self.gate.release();
                Outcome::Err(e)
            }
        }
    }

    async fn begin_transaction(&self, cx: &Cx, conn: &SqliteConnection) -> Outcome<(), Error> {
        transaction::begin(cx, conn).await
    }

    async fn commit_transaction(&self, cx: &Cx, conn: &SqliteConnection) -> Outcome<(), Error> {
        transaction::commit(cx, conn).await
    }

    async fn rollback_transaction(&self, cx: &Cx, conn: &SqliteConnection) -> Outcome<(), Error> {
        transaction::rollback(cx, conn).await
    }

    async fn savepoint(
        &self,
        cx: &Cx,
        conn: &SqliteConnection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> Outcome<(), Error> {
        transaction::savepoint(cx, conn, name, compiler).await
    }

    async fn rollback_to_savepoint(
        &self,
        cx: &Cx,
        conn: &SqliteConnection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> Outcome<(), Error> {
        transaction::rollback_to_savepoint(cx, conn, name, compiler).await
    }

    async fn release_savepoint(
        &self,
        cx: &Cx,
        conn: &SqliteConnection,
        name: &str,
        compiler: &dyn QueryCompiler,
    ) -> Outcome<(), Error> {
        transaction::release_savepoint(cx, conn, name, compiler).await
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn release_connection(&self) -> Outcome<(), Error> {
        // Release first so queued waiters always make progress.
        if !self.gate.release() {
            tracing::warn!("release_connection called without a matching acquire");
        }
        if matches!(*self.state(), DriverState::Destroyed) {
            return Outcome::Err(Error::closed("driver has been destroyed"));
        }
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn destroy(&self) -> Outcome<(), Error> {
        let previous = std::mem::replace(&mut *self.state(), DriverState::Destroyed);
        self.gate.close();
        match previous {
            DriverState::Ready(conn) => {
                conn.database().close();
                tracing::debug!(gate_held = self.gate.is_held(), "driver destroyed");
            }
            DriverState::Destroyed => tracing::trace!("destroy called twice"),
            other => tracing::debug!(state = other.name(), "driver destroyed before ready"),
        }
        Outcome::Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use sqlgate_sqlite::SqliteDatabase;

    fn memory_driver() -> SqliteDriver {
        SqliteDriver::new(DialectConfig::new(SqliteDatabase::open_memory().unwrap()))
    }

    #[test]
    fn test_acquire_before_init_fails() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            match driver.acquire_connection(&cx).await {
                Outcome::Err(e) => {
                    assert_eq!(e.driver_kind(), Some(DriverErrorKind::NotInitialized));
                }
                _ => panic!("expected NotInitialized"),
            }
            assert!(!driver.gate().is_held());
        });
    }

    #[test]
    fn test_second_init_is_rejected() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            assert!(matches!(driver.init(&cx).await, Outcome::Ok(())));
            match driver.init(&cx).await {
                Outcome::Err(e) => {
                    assert_eq!(e.driver_kind(), Some(DriverErrorKind::AlreadyInitialized));
                }
                _ => panic!("expected AlreadyInitialized"),
            }
            assert!(driver.is_ready());
        });
    }

    #[test]
    fn test_same_handle_for_every_acquirer() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            assert!(matches!(driver.init(&cx).await, Outcome::Ok(())));

            let Outcome::Ok(a) = driver.acquire_connection(&cx).await else {
                panic!("acquire failed");
            };
            assert!(matches!(driver.release_connection().await, Outcome::Ok(())));
            let Outcome::Ok(b) = driver.acquire_connection(&cx).await else {
                panic!("acquire failed");
            };
            assert!(Arc::ptr_eq(&a, &b));
            assert!(matches!(driver.release_connection().await, Outcome::Ok(())));
        });
    }

    #[test]
    fn test_unmatched_release_is_ignored() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            assert!(matches!(driver.init(&cx).await, Outcome::Ok(())));
            assert!(matches!(driver.release_connection().await, Outcome::Ok(())));
            assert!(!driver.gate().is_held());
        });
    }

    #[test]
    fn test_destroy_is_idempotent_and_closes() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let db = Arc::new(SqliteDatabase::open_memory().unwrap());
            let driver = SqliteDriver::new(DialectConfig::new(Arc::clone(&db)));
            assert!(matches!(driver.init(&cx).await, Outcome::Ok(())));

            assert!(matches!(driver.destroy().await, Outcome::Ok(())));
            assert!(db.is_closed());
            assert!(matches!(driver.destroy().await, Outcome::Ok(())));
            assert!(driver.is_destroyed());
        });
    }

    #[test]
    fn test_destroy_before_init() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            assert!(matches!(driver.destroy().await, Outcome::Ok(())));
            match driver.init(&cx).await {
                Outcome::Err(e) => assert!(e.is_closed()),
                _ => panic!("expected Closed"),
            }
        });
    }

    #[test]
    fn test_release_after_destroy_reports_closed_but_frees_gate() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let driver = memory_driver();
            assert!(matches!(driver.init(&cx).await, Outcome::Ok(())));
            let Outcome::Ok(_conn) = driver.acquire_connection(&cx).await else {
                panic!("acquire failed");
            };
            assert!(matches!(driver.destroy().await, Outcome::Ok(())));
            assert!(driver.gate().is_closed());
            match driver.release_connection().await {
                Outcome::Err(e) => assert!(e.is_closed()),
                _ => panic!("expected Closed"),
            }
            assert!(!driver.gate().is_held());
        });
    }
}
