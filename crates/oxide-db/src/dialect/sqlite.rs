//! SQLite dialect implementation.

use super::Dialect;
use crate::escape::escape_like_str;

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn random_keyword(&self, _seed: Option<u64>) -> String {
        String::from("RANDOM()")
    }

    fn limit_clause(&self, sql: String, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset.filter(|&o| o > 0)) {
            (Some(limit), Some(offset)) => format!("{sql}\nLIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("{sql}\nLIMIT {limit}"),
            (None, Some(offset)) => format!("{sql}\nLIMIT -1 OFFSET {offset}"),
            (None, None) => sql,
        }
    }

    fn list_tables_statement(&self, _database: &str, prefix: Option<&str>) -> Option<String> {
        let sql = String::from("SELECT \"NAME\" FROM \"SQLITE_MASTER\" WHERE \"TYPE\" = 'table'");
        Some(match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!(
                "{sql} AND \"NAME\" LIKE '{}%'{}",
                escape_like_str(self, prefix),
                self.like_escape_clause()
            ),
            None => sql,
        })
    }

    fn list_columns_statement(&self, table: &str) -> Option<String> {
        Some(format!("PRAGMA TABLE_INFO({})", self.quote_identifier(table)))
    }

    fn version_statement(&self) -> Option<&'static str> {
        Some("SELECT sqlite_version() AS ver")
    }

    fn begin_statement(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn truncate_statement(&self, table: &str) -> String {
        format!("DELETE FROM {table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_dialect() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.name(), "sqlite");
        assert_eq!(dialect.identifier_quotes(), Some(('"', '"')));
        assert_eq!(dialect.truncate_statement("\"t\""), "DELETE FROM \"t\"");
    }

    #[test]
    fn test_sqlite_offset_without_limit() {
        let dialect = SqliteDialect::new();
        assert_eq!(
            dialect.limit_clause(String::from("SELECT *"), None, Some(3)),
            "SELECT *\nLIMIT -1 OFFSET 3"
        );
    }
}
