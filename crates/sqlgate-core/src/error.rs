//! Error types for sqlgate operations.

use std::fmt;

/// The primary error type for all driver operations.
#[derive(Debug)]
pub enum Error {
    /// Establishing or preparing the physical connection failed
    Connection(ConnectionError),
    /// Statement preparation, binding or execution failed
    Query(QueryError),
    /// A value could not be converted to the requested Rust type
    Type(TypeError),
    /// The driver was used outside of its ready state
    Driver(DriverError),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Opening the database (or running the connection factory) failed
    Connect,
    /// The `on_create_connection` hook failed
    Hook,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    /// Primary SQLite result code, when the error came from the engine
    pub code: Option<i32>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Parameter count or type did not match the prepared statement
    Binding,
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, check, not null)
    Constraint,
    /// Database file locked by another connection
    Busy,
    /// Write attempted on a read-only database
    ReadOnly,
    /// Statement was interrupted
    Interrupted,
    /// API used incorrectly
    Misuse,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// `init` has not completed successfully
    NotInitialized,
    /// `init` was called on a driver that already ran it
    AlreadyInitialized,
    /// The driver (or its physical connection) has been destroyed
    Closed,
}

impl Error {
    /// Build a [`DriverErrorKind::Closed`] error.
    pub fn closed(message: impl Into<String>) -> Self {
        Error::Driver(DriverError {
            kind: DriverErrorKind::Closed,
            message: message.into(),
        })
    }

    /// Build a [`QueryErrorKind::Binding`] error for the given statement.
    pub fn binding(sql: &str, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Binding,
            sql: Some(sql.to_string()),
            code: None,
            message: message.into(),
            source: None,
        })
    }

    /// Is this the error returned for use after `destroy`?
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::Driver(DriverError {
                kind: DriverErrorKind::Closed,
                ..
            })
        )
    }

    /// Is this a parameter binding failure?
    pub fn is_binding(&self) -> bool {
        matches!(self, Error::Query(q) if q.kind == QueryErrorKind::Binding)
    }

    /// Is this a constraint violation reported by the engine?
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Query(q) if q.kind == QueryErrorKind::Constraint)
    }

    /// Get the driver error kind, if this is a lifecycle error.
    pub fn driver_kind(&self) -> Option<DriverErrorKind> {
        match self {
            Error::Driver(d) => Some(d.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Driver(e) => write!(f, "Driver error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (sqlite code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

/// Result type alias for sqlgate operations.
pub type Result<T> = std::result::Result<T, Error>;
