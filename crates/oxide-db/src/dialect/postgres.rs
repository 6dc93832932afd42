//! PostgreSQL dialect.

use super::Dialect;
use crate::escape::escape_like_str;

/// PostgreSQL dialect.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    schema: String,
}

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect using the `public` schema.
    #[must_use]
    pub fn new() -> Self {
        Self::with_schema("public")
    }

    /// Creates a PostgreSQL dialect whose catalog queries target `schema`.
    #[must_use]
    pub fn with_schema(schema: &str) -> Self {
        Self {
            schema: String::from(schema),
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn random_keyword(&self, _seed: Option<u64>) -> String {
        String::from("RANDOM()")
    }

    fn write_limit(&self, sql: String, _limit: u64) -> String {
        // UPDATE/DELETE ... LIMIT is not PostgreSQL syntax.
        sql
    }

    fn list_tables_statement(&self, _database: &str, prefix: Option<&str>) -> Option<String> {
        let sql = format!(
            "SELECT \"table_name\" FROM \"information_schema\".\"tables\" WHERE \"table_schema\" = '{}'",
            self.escape_string(&self.schema)
        );
        Some(match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!(
                "{sql} AND \"table_name\" LIKE '{}%'{}",
                escape_like_str(self, prefix),
                self.like_escape_clause()
            ),
            None => sql,
        })
    }

    fn list_columns_statement(&self, table: &str) -> Option<String> {
        Some(format!(
            "SELECT \"column_name\" FROM \"information_schema\".\"columns\" WHERE LOWER(\"table_name\") = '{}'",
            self.escape_string(&table.to_lowercase())
        ))
    }

    fn version_statement(&self) -> Option<&'static str> {
        Some("SELECT version() AS ver")
    }
}
