//! The `rusqlite` backend.
//!
//! Statements are prepared once per call; rows are collected eagerly along
//! with the declared column types.

use std::sync::Arc;

use oxide_db::dialect::{Dialect, SqliteDialect};
use oxide_db::{
    Backend, ConnectionConfig, ErrorInfo, Execution, FieldMeta, Result, Row, Value, VecRowStream,
};
use rusqlite::types::ValueRef;
use tracing::{debug, warn};

const MEMORY: &str = ":memory:";

/// A [`Backend`] over one `rusqlite` connection.
///
/// `database` in the config is a file path; an empty name or `:memory:`
/// opens a private in-memory database.
#[derive(Debug, Default)]
pub struct SqliteBackend {
    conn: Option<rusqlite::Connection>,
    path: Option<String>,
    affected: u64,
    last_error: Option<ErrorInfo>,
}

impl SqliteBackend {
    /// Creates a backend with no open database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn open(path: &str) -> rusqlite::Result<rusqlite::Connection> {
        if path.is_empty() || path == MEMORY {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
    }

    fn remember(&mut self, info: &ErrorInfo) {
        self.last_error = Some(info.clone());
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect::new())
    }

    fn connect(&mut self, config: &ConnectionConfig) -> std::result::Result<(), ErrorInfo> {
        let conn = Self::open(&config.database).map_err(|err| error_info(&err))?;
        debug!(database = %config.database, "Opened SQLite database");
        self.conn = Some(conn);
        self.path = Some(config.database.clone());
        Ok(())
    }

    fn reconnect(&mut self) -> std::result::Result<(), ErrorInfo> {
        if self.conn.is_some() {
            return Ok(());
        }
        let path = self.path.clone().unwrap_or_default();
        let conn = Self::open(&path).map_err(|err| error_info(&err))?;
        self.conn = Some(conn);
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> std::result::Result<Execution, ErrorInfo> {
        let Some(conn) = &self.conn else {
            let info = ErrorInfo::new(0, "the database is not open");
            self.remember(&info);
            return Err(info);
        };
        match run(conn, sql) {
            Ok(Outcome::Rows(stream)) => Ok(Execution::Rows(Box::new(stream))),
            Ok(Outcome::Changed(rows)) => {
                self.affected = rows;
                Ok(Execution::Done)
            }
            Err(err) => {
                let info = error_info(&err);
                self.remember(&info);
                Err(info)
            }
        }
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn insert_id(&self) -> Result<i64> {
        Ok(self
            .conn
            .as_ref()
            .map_or(0, rusqlite::Connection::last_insert_rowid))
    }

    fn last_error(&self) -> Option<ErrorInfo> {
        self.last_error.clone()
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(error = %err, "Failed to close SQLite database");
            }
        }
    }
}

enum Outcome {
    Rows(VecRowStream),
    Changed(u64),
}

fn run(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<Outcome> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        let changed = stmt.execute([])?;
        return Ok(Outcome::Changed(u64::try_from(changed).unwrap_or(u64::MAX)));
    }

    let fields: Vec<FieldMeta> = stmt
        .columns()
        .iter()
        .map(|column| field_meta(column.name(), column.decl_type()))
        .collect();
    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Row::new();
        for (i, name) in names.iter().enumerate() {
            cells.insert(name, value(row.get_ref(i)?));
        }
        out.push(cells);
    }
    Ok(Outcome::Rows(VecRowStream::new(out).with_fields(fields)))
}

fn field_meta(name: &str, decl_type: Option<&str>) -> FieldMeta {
    // VARCHAR(255) -> 255
    let max_length = decl_type
        .and_then(|t| t.split_once('('))
        .and_then(|(_, rest)| rest.trim_end_matches(')').trim().parse().ok());
    FieldMeta {
        name: String::from(name),
        type_name: decl_type.map(String::from),
        max_length,
        primary_key: false,
    }
}

fn value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn error_info(err: &rusqlite::Error) -> ErrorInfo {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => ErrorInfo::new(
            i64::from(failure.extended_code),
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        other => ErrorInfo::new(0, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_meta_length() {
        let meta = field_meta("email", Some("VARCHAR(255)"));
        assert_eq!(meta.max_length, Some(255));
        assert_eq!(meta.type_name.as_deref(), Some("VARCHAR(255)"));
        assert_eq!(field_meta("n", Some("INTEGER")).max_length, None);
        assert_eq!(field_meta("x", None).type_name, None);
    }

    #[test]
    fn test_value_mapping() {
        assert_eq!(value(ValueRef::Null), Value::Null);
        assert_eq!(value(ValueRef::Integer(3)), Value::Int(3));
        assert_eq!(value(ValueRef::Text(b"hi")), Value::Text(String::from("hi")));
        assert_eq!(value(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
    }

    #[test]
    fn test_execute_before_connect() {
        let mut backend = SqliteBackend::new();
        assert!(backend.execute("SELECT 1").is_err());
        assert!(backend.last_error().is_some());
    }

    #[test]
    fn test_syntax_error_code() {
        let mut backend = SqliteBackend::new();
        backend.connect(&ConnectionConfig::new("sqlite", MEMORY)).unwrap();
        let info = backend.execute("SELEC 1").unwrap_err();
        assert_eq!(info.code, 1);
        assert!(info.message.contains("syntax error"));
    }
}
