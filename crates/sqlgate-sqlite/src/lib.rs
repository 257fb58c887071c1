//! SQLite backend for sqlgate.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate owns the physical connection and everything that talks to
//! libsqlite3 directly:
//!
//! - [`SqliteDatabase`]: the one `sqlite3*` handle, opened once and closed once
//! - [`SqliteConnection`]: the executor handle, buffered and streaming
//! - [`RowStream`]: a lazy cursor that finalizes its statement on every exit path
//! - [`SqliteQueryCompiler`]: renders `QueryNode` trees with `?` placeholders
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlgate_sqlite::{SqliteConnection, SqliteDatabase};
//! use sqlgate_core::{CompiledQuery, Cx, DatabaseConnection, Outcome, Value};
//! use std::sync::Arc;
//!
//! let conn = SqliteConnection::new(Arc::new(SqliteDatabase::open_memory()?));
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let cx = Cx::for_testing();
//! let insert = CompiledQuery::with_params(
//!     "INSERT INTO users (name) VALUES (?)",
//!     vec![Value::Text("Alice".into())],
//! );
//! match conn.execute_query(&cx, &insert).await {
//!     Outcome::Ok(result) => println!("inserted rowid {:?}", result.insert_id),
//!     Outcome::Err(e) => eprintln!("Error: {}", e),
//!     _ => {}
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null` | NULL |
//!
//! Integers always come back as `BigInt`. `Array` parameters are rejected
//! with a binding error.

pub mod compiler;
pub mod connection;
pub mod database;
mod statement;
pub mod stream;
pub mod types;

pub use compiler::SqliteQueryCompiler;
pub use connection::SqliteConnection;
pub use database::{OpenFlags, SqliteConfig, SqliteDatabase};
pub use stream::RowStream;
