//! SQL Dialect support.
//!
//! Every database has slightly different SQL syntax. The core never hard-codes
//! any of it: identifier quoting, string escaping, boolean literals, the
//! random-order keyword, the shape of LIMIT/OFFSET and the catalog queries all
//! come from a [`Dialect`] supplied by the backend adapter.

mod generic;
mod mysql;
mod postgres;
mod sqlite;

use std::fmt;

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::escape::remove_invisible_characters;

/// Trait for SQL dialect-specific behavior.
///
/// All methods have ANSI-leaning defaults; a dialect overrides only what differs.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the opening and closing identifier quote characters, or `None`
    /// when the dialect does not quote identifiers.
    fn identifier_quotes(&self) -> Option<(char, char)> {
        Some(('"', '"'))
    }

    /// Identifiers that are never quoted.
    fn reserved_identifiers(&self) -> &[&'static str] {
        &["*"]
    }

    /// Escapes a raw string for inclusion between single quotes.
    fn escape_string(&self, s: &str) -> String {
        remove_invisible_characters(s).replace('\'', "''")
    }

    /// Returns the literal used for a boolean value.
    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    /// Returns the random-order expression, seeded when a seed is given.
    fn random_keyword(&self, seed: Option<u64>) -> String {
        seed.map_or_else(|| String::from("RAND()"), |seed| format!("RAND({seed})"))
    }

    /// Returns the character used to escape LIKE wildcards.
    fn like_escape_char(&self) -> char {
        '!'
    }

    /// Returns the fragment appended to LIKE predicates whose pattern was escaped.
    fn like_escape_clause(&self) -> String {
        format!(" ESCAPE '{}'", self.like_escape_char())
    }

    /// Returns the bind marker replaced by `compile_binds`.
    fn bind_marker(&self) -> &str {
        "?"
    }

    /// Quotes a single identifier.
    fn quote_identifier(&self, name: &str) -> String {
        match self.identifier_quotes() {
            Some((open, close)) => format!("{open}{name}{close}"),
            None => String::from(name),
        }
    }

    /// Renders the FROM table list.
    ///
    /// Multiple tables are parenthesized when a JOIN follows, so the join
    /// binds to the whole list.
    fn from_tables(&self, tables: &[String], has_join: bool) -> String {
        if has_join && tables.len() > 1 {
            format!("({})", tables.join(", "))
        } else {
            tables.join(", ")
        }
    }

    /// Applies LIMIT/OFFSET to a compiled SELECT.
    fn limit_clause(&self, sql: String, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                format!("{sql}\nLIMIT {limit} OFFSET {offset}")
            }
            (Some(limit), _) => format!("{sql}\nLIMIT {limit}"),
            (None, Some(offset)) if offset > 0 => format!("{sql}\nOFFSET {offset}"),
            (None, _) => sql,
        }
    }

    /// Applies a row limit to an UPDATE or DELETE.
    fn write_limit(&self, sql: String, limit: u64) -> String {
        format!("{sql} LIMIT {limit}")
    }

    /// Prefix of row-counting queries; the alias follows.
    fn count_string(&self) -> &'static str {
        "SELECT COUNT(*) AS "
    }

    /// Statement listing the tables of the current database, optionally only
    /// those starting with `prefix`.
    fn list_tables_statement(&self, _database: &str, _prefix: Option<&str>) -> Option<String> {
        None
    }

    /// Statement listing the columns of a table.
    fn list_columns_statement(&self, _table: &str) -> Option<String> {
        None
    }

    /// Statement returning the server version in its first column.
    fn version_statement(&self) -> Option<&'static str> {
        Some("SELECT VERSION() AS ver")
    }

    /// Statement opening a transaction.
    fn begin_statement(&self) -> &'static str {
        "BEGIN"
    }

    /// Statement committing a transaction.
    fn commit_statement(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back a transaction.
    fn rollback_statement(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Statement emptying a table as fast as the backend allows.
    fn truncate_statement(&self, table: &str) -> String {
        format!("TRUNCATE {table}")
    }
}
