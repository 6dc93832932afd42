//! Value escaping and bind substitution.
//!
//! Everything here is a pure function of a [`Dialect`] and its input. The
//! dialect supplies the raw-string escape primitive; this module turns values
//! into literals, escapes LIKE wildcards, and substitutes positional bind
//! markers in raw SQL.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::{DbError, Result};
use crate::value::Value;

static WRITE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^\s*"?(SET|INSERT|UPDATE|DELETE|REPLACE|CREATE|DROP|TRUNCATE|LOAD|COPY|ALTER|RENAME|GRANT|REVOKE|LOCK|UNLOCK|REINDEX)\s"#,
    )
    .expect("write type pattern is valid")
});

/// Removes ASCII control characters that have no place in a SQL literal.
///
/// Tabs, line feeds and carriage returns are kept.
#[must_use]
pub fn remove_invisible_characters(s: &str) -> String {
    s.chars()
        .filter(|&c| !matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f' | '\x7f'))
        .collect()
}

/// Escapes a value into a SQL literal.
///
/// Strings are quoted and escaped by the dialect, booleans use the dialect's
/// boolean literal, `Null` and non-finite floats become `NULL`, numbers pass
/// through, and arrays become a parenthesized, comma-separated list of
/// escaped elements.
#[must_use]
pub fn escape_value(dialect: &dyn Dialect, value: &Value) -> String {
    match value {
        Value::Null => String::from("NULL"),
        Value::Bool(b) => String::from(dialect.bool_literal(*b)),
        Value::Int(n) => n.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => String::from("NULL"),
        Value::Text(s) => format!("'{}'", dialect.escape_string(s)),
        Value::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::Array(items) => format!("({})", escape_values(dialect, items).join(",")),
    }
}

/// Renders a value that is not to be escaped.
///
/// Text is inserted verbatim; other values render as their literal.
#[must_use]
pub fn raw_literal(dialect: &dyn Dialect, value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => escape_value(dialect, other),
    }
}

/// Escapes each value of a list.
#[must_use]
pub fn escape_values(dialect: &dyn Dialect, values: &[Value]) -> Vec<String> {
    values.iter().map(|v| escape_value(dialect, v)).collect()
}

/// Escapes a string for use inside a LIKE pattern.
///
/// The result is not quoted. The LIKE escape character, `%` and `_` are
/// prefixed with the escape character, so the predicate must carry the
/// dialect's `ESCAPE` clause.
#[must_use]
pub fn escape_like_str(dialect: &dyn Dialect, s: &str) -> String {
    let esc = dialect.like_escape_char();
    let mut escaped = dialect.escape_string(s);
    escaped = escaped.replace(esc, &format!("{esc}{esc}"));
    escaped = escaped.replace('%', &format!("{esc}%"));
    escaped.replace('_', &format!("{esc}_"))
}

/// Returns the byte offsets of bind markers outside quoted literals.
fn marker_positions(sql: &str, marker: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let needle = marker.as_bytes();
    let mut positions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            // An unterminated quote does not open a literal.
            if let Some(len) = bytes[i + 1..].iter().position(|&c| c == b) {
                i += len + 2;
                continue;
            }
        }
        if bytes[i..].starts_with(needle) {
            positions.push(i);
            i += needle.len();
            continue;
        }
        i += 1;
    }

    positions
}

/// Substitutes bind markers with escaped values, failing on a count mismatch.
///
/// Markers inside single- or double-quoted literals are left alone.
pub fn try_compile_binds(
    dialect: &dyn Dialect,
    marker: &str,
    sql: &str,
    binds: &[Value],
) -> Result<String> {
    if marker.is_empty() || !sql.contains(marker) {
        if binds.is_empty() {
            return Ok(String::from(sql));
        }
        return Err(DbError::BindCountMismatch {
            expected: 0,
            supplied: binds.len(),
        });
    }

    let positions = marker_positions(sql, marker);
    if positions.len() != binds.len() {
        return Err(DbError::BindCountMismatch {
            expected: positions.len(),
            supplied: binds.len(),
        });
    }

    let mut out = String::with_capacity(sql.len() + binds.len() * 8);
    let mut last = 0;
    for (pos, bind) in positions.iter().zip(binds) {
        out.push_str(&sql[last..*pos]);
        out.push_str(&escape_value(dialect, bind));
        last = pos + marker.len();
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Substitutes bind markers with escaped values.
///
/// When the number of markers outside quoted literals differs from the number
/// of binds, the statement is returned unmodified.
#[must_use]
pub fn compile_binds(dialect: &dyn Dialect, marker: &str, sql: &str, binds: &[Value]) -> String {
    match try_compile_binds(dialect, marker, sql, binds) {
        Ok(compiled) => compiled,
        Err(err) => {
            warn!(sql = %sql, error = %err, "Bind substitution skipped");
            String::from(sql)
        }
    }
}

/// Returns true if the statement writes rather than reads.
///
/// Decided by the leading keyword only, optionally preceded by a double quote.
#[must_use]
pub fn is_write_type(sql: &str) -> bool {
    WRITE_TYPE.is_match(sql)
}
