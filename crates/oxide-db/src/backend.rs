//! Backend adapter contract.
//!
//! A [`Backend`] translates connect, execute and error reporting into calls
//! on one native database client. Everything SQL-shaped it needs to tell the
//! core (quoting, escaping, LIMIT shape, catalog statements) comes from the
//! [`Dialect`] it hands out.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::error::{DbError, ErrorInfo, Result};
use crate::row::Row;

/// Column metadata reported by a backend statement handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Column name.
    pub name: String,
    /// Declared type, when the backend knows it.
    pub type_name: Option<String>,
    /// Maximum length, when the backend knows it.
    pub max_length: Option<u64>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl FieldMeta {
    /// Creates metadata with only a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: String::from(name),
            ..Self::default()
        }
    }
}

/// Rows produced by a read statement.
pub trait RowStream {
    /// Fetches the next row, or `None` when the stream is exhausted.
    fn next_row(&mut self) -> std::result::Result<Option<Row>, ErrorInfo>;

    /// Returns column metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the backend cannot
    /// describe its columns.
    fn fields(&self) -> Result<Vec<FieldMeta>> {
        Err(DbError::UnsupportedFeature("field metadata"))
    }
}

/// An in-memory row stream.
///
/// Adapters whose native row handles borrow the statement collect into this.
#[derive(Debug, Clone, Default)]
pub struct VecRowStream {
    rows: VecDeque<Row>,
    fields: Option<Vec<FieldMeta>>,
}

impl VecRowStream {
    /// Creates a stream over `rows` with no metadata.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            fields: None,
        }
    }

    /// Attaches column metadata.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldMeta>) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl RowStream for VecRowStream {
    fn next_row(&mut self) -> std::result::Result<Option<Row>, ErrorInfo> {
        Ok(self.rows.pop_front())
    }

    fn fields(&self) -> Result<Vec<FieldMeta>> {
        self.fields
            .clone()
            .ok_or(DbError::UnsupportedFeature("field metadata"))
    }
}

/// Outcome of a successful backend execute.
pub enum Execution {
    /// The statement produced rows.
    Rows(Box<dyn RowStream>),
    /// The statement produced no rows.
    Done,
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows(_) => f.write_str("Execution::Rows(..)"),
            Self::Done => f.write_str("Execution::Done"),
        }
    }
}

/// A database backend adapter.
pub trait Backend: fmt::Debug + Send {
    /// The dialect describing this backend's SQL.
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Opens the connection described by `config`.
    fn connect(&mut self, config: &ConnectionConfig) -> std::result::Result<(), ErrorInfo>;

    /// Re-establishes a dropped connection.
    fn reconnect(&mut self) -> std::result::Result<(), ErrorInfo> {
        Ok(())
    }

    /// Executes one statement.
    fn execute(&mut self, sql: &str) -> std::result::Result<Execution, ErrorInfo>;

    /// Rows changed by the last write statement.
    fn affected_rows(&self) -> u64;

    /// Identifier generated by the last INSERT.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] unless the adapter overrides it.
    fn insert_id(&self) -> Result<i64> {
        Err(DbError::UnsupportedFeature("insert_id"))
    }

    /// The last native error, if any.
    fn last_error(&self) -> Option<ErrorInfo>;

    /// Closes the connection.
    fn close(&mut self);
}

type BackendFactory = Box<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

/// Maps driver names to backend constructors.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under a driver name, replacing any previous one.
    pub fn register<F>(&mut self, driver: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Backend> + Send + Sync + 'static,
    {
        self.factories
            .insert(driver.to_ascii_lowercase(), Box::new(factory));
        self
    }

    /// Returns true if a driver is registered.
    #[must_use]
    pub fn contains(&self, driver: &str) -> bool {
        self.factories.contains_key(&driver.to_ascii_lowercase())
    }

    /// Registered driver names, sorted.
    #[must_use]
    pub fn drivers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Creates a backend for a driver.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownDriver`] when nothing is registered under
    /// that name.
    pub fn create(&self, driver: &str) -> Result<Box<dyn Backend>> {
        self.factories
            .get(&driver.to_ascii_lowercase())
            .map(|factory| factory())
            .ok_or_else(|| DbError::UnknownDriver(String::from(driver)))
    }
}
