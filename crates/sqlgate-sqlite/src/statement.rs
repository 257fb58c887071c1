//! RAII wrapper around `sqlite3_stmt`.

use crate::database::SqliteInner;
use crate::types::{self, BindFailure};
use libsqlite3_sys as ffi;
use sqlgate_core::error::{QueryError, QueryErrorKind};
use sqlgate_core::row::ColumnInfo;
use sqlgate_core::{Error, Result, Row, Value};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::Arc;

/// A prepared statement, finalized on drop.
///
/// Stepping and finalizing require the owning database's lock; `step` takes
/// the locked [`SqliteInner`] as proof.
pub(crate) struct Statement {
    raw: *mut ffi::sqlite3_stmt,
    sql: String,
    columns: Arc<ColumnInfo>,
}

// SAFETY: the statement is only touched while the owning database's mutex is
// held, which serializes every use across threads.
unsafe impl Send for Statement {}

impl Statement {
    /// Compile the first statement in `sql`.
    pub(crate) fn prepare(inner: &SqliteInner, sql: &str) -> Result<Self> {
        let db = inner.handle()?;
        let c_sql = CString::new(sql).map_err(|_| {
            Error::Query(QueryError {
                kind: QueryErrorKind::Syntax,
                sql: Some(sql.to_string()),
                code: None,
                message: "SQL contains null byte".to_string(),
                source: None,
            })
        })?;
        let len = c_int::try_from(c_sql.as_bytes().len())
            .map_err(|_| Error::binding(sql, "SQL text too long"))?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: db is open (checked by `handle`) and all pointers are valid
        let rc =
            unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut raw, ptr::null_mut()) };
        if rc != ffi::SQLITE_OK {
            return Err(engine_error(db, Some(sql)));
        }

        // Whitespace- or comment-only SQL prepares to a null statement.
        let col_count = if raw.is_null() {
            0
        } else {
            // SAFETY: raw is a valid statement
            unsafe { ffi::sqlite3_column_count(raw) }
        };
        let names = (0..col_count)
            .map(|i| {
                // SAFETY: raw is valid and i < column count
                unsafe { types::column_name(raw, i) }.unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        Ok(Self {
            raw,
            sql: sql.to_string(),
            columns: Arc::new(ColumnInfo::new(names)),
        })
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind `params` positionally. The count must match exactly.
    pub(crate) fn bind_all(&mut self, params: &[Value]) -> Result<()> {
        let expected = if self.raw.is_null() {
            0
        } else {
            // SAFETY: raw is a valid statement
            unsafe { ffi::sqlite3_bind_parameter_count(self.raw) as usize }
        };
        if expected != params.len() {
            return Err(Error::binding(
                &self.sql,
                format!(
                    "statement expects {} parameter(s), {} supplied",
                    expected,
                    params.len()
                ),
            ));
        }

        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1)
                .map_err(|_| Error::binding(&self.sql, "too many parameters"))?;
            // SAFETY: raw is valid (non-null because expected > 0) and index is 1-based
            unsafe { types::bind_value(self.raw, index, param) }.map_err(|failure| {
                let detail = match failure {
                    BindFailure::Unsupported(type_name) => {
                        format!("{} values cannot be bound", type_name)
                    }
                    BindFailure::TooBig => "value too large".to_string(),
                    BindFailure::Code(rc) => types::error_string(rc),
                };
                Error::binding(
                    &self.sql,
                    format!("failed to bind parameter {}: {}", i + 1, detail),
                )
            })?;
        }
        Ok(())
    }

    /// Advance to the next row. `Ok(None)` once the statement is done.
    pub(crate) fn step(&mut self, inner: &SqliteInner) -> Result<Option<Row>> {
        if self.raw.is_null() {
            return Ok(None);
        }
        let db = inner.handle()?;

        // SAFETY: raw is valid and the database lock is held
        let rc = unsafe { ffi::sqlite3_step(self.raw) };
        match rc {
            ffi::SQLITE_ROW => {
                let values = (0..self.columns.len())
                    .map(|i| {
                        // SAFETY: we just got SQLITE_ROW and i < column count
                        unsafe { types::read_column(self.raw, i as c_int) }
                    })
                    .collect();
                Ok(Some(Row::with_columns(Arc::clone(&self.columns), values)))
            }
            ffi::SQLITE_DONE => Ok(None),
            _ => Err(engine_error(db, Some(&self.sql))),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            // SAFETY: raw is valid and finalized exactly once
            unsafe { ffi::sqlite3_finalize(self.raw) };
        }
    }
}

/// Build an error from the connection's most recent failure.
pub(crate) fn engine_error(db: *mut ffi::sqlite3, sql: Option<&str>) -> Error {
    // SAFETY: db is a valid connection handle
    let (message, code) = unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        let message = if ptr.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        };
        (message, ffi::sqlite3_extended_errcode(db))
    };

    Error::Query(QueryError {
        kind: error_code_to_kind(code, &message),
        sql: sql.map(str::to_string),
        code: Some(code),
        message,
        source: None,
    })
}

fn error_code_to_kind(code: c_int, message: &str) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_READONLY => QueryErrorKind::ReadOnly,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Interrupted,
        ffi::SQLITE_MISUSE => QueryErrorKind::Misuse,
        ffi::SQLITE_RANGE | ffi::SQLITE_MISMATCH => QueryErrorKind::Binding,
        ffi::SQLITE_ERROR if message.contains("syntax error") => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}
