//! The physical SQLite connection.
//!
//! [`SqliteDatabase`] owns the raw `sqlite3*` handle. It is opened once and
//! closed exactly once; after [`close`](SqliteDatabase::close) every operation
//! fails with a `Closed` driver error instead of touching a dangling handle.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]

use crate::statement::{Statement, engine_error};
use crate::stream::RowStream;
use crate::types;
mod ffi {
    pub use libsqlite3_sys::*;

    // libsqlite3-sys blocklists `sqlite3_close_v2` from its bindings; the
    // bundled library still exports it, so declare it here.
    unsafe extern "C" {
        pub fn sqlite3_close_v2(db: *mut sqlite3) -> std::ffi::c_int;
    }
}
use sqlgate_core::error::{ConnectionError, ConnectionErrorKind};
use sqlgate_core::{CompiledQuery, Error, QueryResult, Result};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds. Zero disables the busy handler.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Read-only access to an existing database.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write access; the database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Read-write access, creating the database if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }

        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        // The driver's gate serializes access, so SQLite's own mutex is redundant.
        flags | ffi::SQLITE_OPEN_NOMUTEX
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Raw handle state. `db` is null once the connection is closed.
pub(crate) struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is opened with SQLITE_OPEN_NOMUTEX and only used while
// the surrounding Mutex is held, so it never sees concurrent calls.
unsafe impl Send for SqliteInner {}

impl SqliteInner {
    /// The open handle, or a `Closed` error.
    pub(crate) fn handle(&self) -> Result<*mut ffi::sqlite3> {
        if self.db.is_null() {
            Err(Error::closed("database connection is closed"))
        } else {
            Ok(self.db)
        }
    }
}

/// The single physical SQLite connection.
pub struct SqliteDatabase {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteDatabase {
    /// Open a database with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                types::error_string(rc)
            } else {
                // SAFETY: db is valid even on failure and must still be closed
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database {}: {}", config.path, msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        tracing::debug!(path = %config.path, "opened sqlite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open (or create) a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.lock().db.is_null()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the connection. Returns `false` if it was already closed.
    ///
    /// Statements still alive (an abandoned stream that has not been dropped
    /// yet) keep SQLite's side of the handle around until they finalize.
    pub fn close(&self) -> bool {
        let mut inner = self.lock();
        if inner.db.is_null() {
            return false;
        }
        // SAFETY: db is valid; close_v2 defers while statements are outstanding
        unsafe { ffi::sqlite3_close_v2(inner.db) };
        inner.db = ptr::null_mut();
        tracing::debug!(path = %self.path, "closed sqlite database");
        true
    }

    /// Run one or more `;`-separated statements without parameters or results.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        let db = inner.handle()?;
        let c_sql = CString::new(sql).map_err(|_| Error::binding(sql, "SQL contains null byte"))?;

        // SAFETY: db is valid and no callback is registered
        let rc = unsafe {
            ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(engine_error(db, Some(sql)))
        }
    }

    /// Rows changed by the most recent write.
    pub fn changes(&self) -> Result<u64> {
        let inner = self.lock();
        let db = inner.handle()?;
        // SAFETY: db is valid
        Ok(u64::try_from(unsafe { ffi::sqlite3_changes64(db) }).unwrap_or(0))
    }

    /// Rowid of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let inner = self.lock();
        let db = inner.handle()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(db) })
    }

    /// Buffered execution: prepare, bind, step to completion, then read the
    /// change counter and last insert rowid before releasing the lock.
    pub fn query(&self, query: &CompiledQuery) -> Result<QueryResult> {
        let inner = self.lock();
        let mut stmt = Statement::prepare(&inner, query.sql())?;
        stmt.bind_all(query.parameters())?;

        let mut rows = Vec::new();
        while let Some(row) = stmt.step(&inner)? {
            rows.push(row);
        }
        drop(stmt);

        let db = inner.handle()?;
        // SAFETY: db is valid and the lock is held
        let (changes, insert_id) =
            unsafe { (ffi::sqlite3_changes64(db), ffi::sqlite3_last_insert_rowid(db)) };

        tracing::trace!(
            sql = %query.sql(),
            query_id = %query.query_id(),
            rows = rows.len(),
            changes,
            "executed query"
        );

        Ok(QueryResult::buffered(
            rows,
            u64::try_from(changes).unwrap_or(0),
            insert_id,
        ))
    }

    /// Streaming execution: prepare and bind now, step lazily.
    pub fn stream(self: &Arc<Self>, query: &CompiledQuery) -> Result<RowStream> {
        let stmt = {
            let inner = self.lock();
            let mut stmt = Statement::prepare(&inner, query.sql())?;
            stmt.bind_all(query.parameters())?;
            stmt
        };
        tracing::trace!(sql = %query.sql(), query_id = %query.query_id(), "opened row stream");
        Ok(RowStream::new(Arc::clone(self), stmt))
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
