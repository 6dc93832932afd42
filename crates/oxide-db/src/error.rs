//! Error types for the database layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized error reported by a backend adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Native error code (driver specific, `0` when unknown).
    pub code: i64,
    /// Native error message.
    pub message: String,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors raised by the query builder, the execution pipeline and result cursors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An empty statement was submitted for execution.
    #[error("invalid query: the statement is empty")]
    EmptyStatement,

    /// The number of bind values does not match the number of markers.
    #[error("bind count mismatch: {expected} markers, {supplied} values")]
    BindCountMismatch {
        /// Markers found outside string literals.
        expected: usize,
        /// Bind values supplied.
        supplied: usize,
    },

    /// The backend refused a connection attempt.
    #[error("unable to connect to the database: {0}")]
    Connect(ErrorInfo),

    /// Every configured host (primary and failovers) refused to connect.
    #[error("unable to connect to the database after {attempts} attempt(s)")]
    ConnectionExhausted {
        /// Number of connection attempts made.
        attempts: usize,
    },

    /// The backend failed to execute a statement.
    #[error("error number {}: {} (query: {sql})", .info.code, .info.message)]
    Execute {
        /// Backend error details.
        info: ErrorInfo,
        /// The statement that failed.
        sql: String,
    },

    /// The adapter does not implement an optional capability.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// A batch update was requested without a match key.
    #[error("a match key is required for batch updates")]
    MissingMatchKey,

    /// A batch update row does not carry the match key.
    #[error("batch row {row} is missing the match key `{index}`")]
    MissingBatchKey {
        /// The match key column.
        index: String,
        /// Zero-based row position in the batch.
        row: usize,
    },

    /// A batch insert row does not have the same columns as the first row.
    #[error("batch row {row} does not have the same columns as the first row")]
    InvalidBatchRow {
        /// Zero-based row position in the batch.
        row: usize,
    },

    /// `group_start` / `group_end` calls are unbalanced.
    #[error("unbalanced condition groups (depth {depth})")]
    UnbalancedGroup {
        /// Group depth at compile time; negative when too many groups were closed.
        depth: i64,
    },

    /// A write statement was compiled without any SET values.
    #[error("you must use the set method to update an entry")]
    MissingSet,

    /// A statement was compiled without a table.
    #[error("you must set the database table to be used with your query")]
    MissingTable,

    /// A DELETE statement was compiled without a WHERE clause.
    #[error("deletes are not allowed unless they contain a where or like clause")]
    DeleteWithoutWhere,

    /// The builder was given an invalid argument.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No adapter is registered under the requested driver name.
    #[error("unknown database driver: {0}")]
    UnknownDriver(String),

    /// The result cursor has already been freed.
    #[error("the result has been freed")]
    ResultFreed,

    /// Serialization or deserialization of a result failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
