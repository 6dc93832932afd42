//! MySQL / MariaDB dialect.

use super::Dialect;
use crate::escape::escape_like_str;

/// MySQL dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quotes(&self) -> Option<(char, char)> {
        Some(('`', '`'))
    }

    // Same escapes as mysql_real_escape_string().
    fn escape_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 8);
        for c in s.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                _ => out.push(c),
            }
        }
        out
    }

    fn limit_clause(&self, sql: String, limit: Option<u64>, offset: Option<u64>) -> String {
        let offset = offset.filter(|&o| o > 0);
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("{sql}\nLIMIT {offset}, {limit}"),
            (Some(limit), None) => format!("{sql}\nLIMIT {limit}"),
            // MySQL has no OFFSET without LIMIT; use the largest row count.
            (None, Some(offset)) => format!("{sql}\nLIMIT {offset}, {}", u64::MAX),
            (None, None) => sql,
        }
    }

    fn list_tables_statement(&self, database: &str, prefix: Option<&str>) -> Option<String> {
        let sql = format!("SHOW TABLES FROM {}", self.quote_identifier(database));
        Some(match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{sql} LIKE '{}%'", escape_like_str(self, prefix)),
            None => sql,
        })
    }

    fn list_columns_statement(&self, table: &str) -> Option<String> {
        Some(format!("SHOW COLUMNS FROM {}", self.quote_identifier(table)))
    }

    fn begin_statement(&self) -> &'static str {
        "START TRANSACTION"
    }
}
