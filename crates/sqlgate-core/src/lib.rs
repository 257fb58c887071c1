//! Core types and traits for sqlgate.
//!
//! This crate provides the vocabulary shared by the SQLite backend and the
//! driver facade:
//!
//! - `Value` and `Row` for parameters and results
//! - `CompiledQuery` / `QueryResult` for statements and their outcomes
//! - `QueryNode` / `QueryCompiler` as the boundary to the SQL compiler
//! - `DatabaseConnection`, `QueryStream` and `Driver` traits
//! - `Outcome` and `Cx` re-exported from asupersync

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod compiler;
pub mod connection;
pub mod error;
pub mod identifiers;
pub mod query;
pub mod row;
pub mod value;

pub use compiler::{QueryCompiler, QueryNode};
pub use connection::{BoxFuture, DatabaseConnection, Driver, QueryStream};
pub use error::{DriverErrorKind, Error, QueryErrorKind, Result};
pub use identifiers::quote_ident;
pub use query::{CompiledQuery, QueryId, QueryResult};
pub use row::{FromValue, Row};
pub use value::Value;
