//! Value encoding and decoding between Rust and SQLite.
//!
//! SQLite has five storage classes:
//! - INTEGER: signed integer up to 8 bytes
//! - REAL: 8-byte IEEE floating point
//! - TEXT: UTF-8 string
//! - BLOB: binary data
//! - NULL
//!
//! Booleans bind as 0/1 and JSON binds as its text form. Arrays have no
//! storage class and are rejected.

use libsqlite3_sys as ffi;
use sqlgate_core::Value;
use std::ffi::{CStr, c_int};

/// Why a value could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFailure {
    /// The value has no SQLite representation.
    Unsupported(&'static str),
    /// The value is larger than a single SQLite bind allows.
    TooBig,
    /// SQLite rejected the bind with this result code.
    Code(c_int),
}

/// Bind a Value to a prepared statement parameter.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` must be a valid 1-based parameter index
pub unsafe fn bind_value(
    stmt: *mut ffi::sqlite3_stmt,
    index: c_int,
    value: &Value,
) -> Result<(), BindFailure> {
    // SAFETY: the caller guarantees `stmt` and `index` are valid; text and
    // blob binds use SQLITE_TRANSIENT so SQLite copies the bytes.
    let rc = unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
            Value::Bool(b) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*b)),
            Value::Int(v) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*v)),
            Value::BigInt(v) => ffi::sqlite3_bind_int64(stmt, index, *v),
            Value::Double(v) => ffi::sqlite3_bind_double(stmt, index, *v),
            Value::Text(s) => bind_text(stmt, index, s)?,
            Value::Json(json) => bind_text(stmt, index, &json.to_string())?,
            Value::Bytes(b) => {
                let len = c_int::try_from(b.len()).map_err(|_| BindFailure::TooBig)?;
                ffi::sqlite3_bind_blob(stmt, index, b.as_ptr().cast(), len, ffi::SQLITE_TRANSIENT())
            }
            Value::Array(_) => return Err(BindFailure::Unsupported(value.type_name())),
        }
    };

    if rc == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(BindFailure::Code(rc))
    }
}

unsafe fn bind_text(
    stmt: *mut ffi::sqlite3_stmt,
    index: c_int,
    text: &str,
) -> Result<c_int, BindFailure> {
    let len = c_int::try_from(text.len()).map_err(|_| BindFailure::TooBig)?;
    // SAFETY: the caller guarantees `stmt` is valid; SQLITE_TRANSIENT copies.
    Ok(unsafe {
        ffi::sqlite3_bind_text(stmt, index, text.as_ptr().cast(), len, ffi::SQLITE_TRANSIENT())
    })
}

/// Read a column value from the current result row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: guaranteed by the caller; pointers returned by sqlite3_column_*
    // stay valid until the next step/reset/finalize, and we copy immediately.
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::BigInt(ffi::sqlite3_column_int64(stmt, index)),

            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),

            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Value::Null
                } else {
                    let slice = std::slice::from_raw_parts(ptr, len as usize);
                    Value::Text(String::from_utf8_lossy(slice).into_owned())
                }
            }

            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Bytes(slice.to_vec())
                }
            }

            _ => Value::Null,
        }
    }
}

/// Get the column name from a prepared statement.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: guaranteed by the caller.
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}

/// Convert an SQLite result code to a human-readable string.
pub fn error_string(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static string for every code
    unsafe {
        let ptr = ffi::sqlite3_errstr(code);
        if ptr.is_null() {
            return "unknown error".to_string();
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}
