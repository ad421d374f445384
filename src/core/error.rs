/// Error Module
///
/// This module defines the error types for the data-access layer.
/// Every failure a caller can observe is one of these variants, whether it
/// arrives through a `try_*` operation or is contained behind `has_error()`.
use std::time::Duration;
use thiserror::Error;

/// Error type for the data-access layer.
///
/// The variants fall into three groups:
/// - Connection establishment failures
/// - Statement preparation/execution failures (bad SQL, constraints, timeouts)
/// - Malformed-input rejections, raised before any SQL is sent
///
/// Configuration and I/O errors cover the ambient collaborators.
#[derive(Error, Debug)]
pub enum DbError {
    /// The database connection could not be established (or is unusable)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database-related errors from SQLite operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// SQL statement errors (syntax, execution, missing tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// The number of bound values does not match the statement's placeholders
    #[error("Query error: statement expects {expected} parameter(s), {supplied} supplied")]
    ParameterCount { expected: usize, supplied: usize },

    /// The statement ran past its execution deadline and was interrupted
    #[error("Query error: execution exceeded {0:?} and was interrupted")]
    Timeout(Duration),

    /// INSERT/UPDATE called without any column to write
    #[error("Rejected: no fields supplied")]
    EmptyFields,

    /// A where clause that does not have the `field operator value` shape
    #[error("Rejected: invalid where clause '{0}'")]
    InvalidClause(String),

    /// A where clause whose operator is outside `=, >, <, >=, <=`
    #[error("Rejected: unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// An identifier that is not a plain SQL name
    #[error("Rejected: invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A table that is not in the allow-list
    #[error("Rejected: unknown table '{0}'")]
    UnknownTable(String),

    /// A column that does not belong to the table
    #[error("Rejected: unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Returns true for malformed-input rejections.
    ///
    /// A rejection means no SQL reached the database, so the error flag is
    /// left as it was and nothing is written to the log sink.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DbError::EmptyFields
                | DbError::InvalidClause(_)
                | DbError::UnsupportedOperator(_)
                | DbError::InvalidIdentifier(_)
                | DbError::UnknownTable(_)
                | DbError::UnknownColumn { .. }
        )
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
