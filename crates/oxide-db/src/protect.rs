//! Identifier protection.
//!
//! Protecting an identifier means quoting each dotted segment with the
//! dialect's quote characters and inserting the configured table prefix in the
//! right segment. Table aliases seen in FROM and JOIN clauses are tracked so a
//! qualified column such as `u.id` is not mistaken for a table needing a prefix.
//!
//! Malformed input is never rejected; it degrades to a best-effort passthrough.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::Dialect;

static AS_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+AS\s+").expect("alias pattern is valid"));

/// Table-prefix settings shared by a connection and its builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefixes {
    /// Prefix added to table names.
    pub dbprefix: String,
    /// A previous prefix rewritten to `dbprefix` wherever it is found.
    pub swap_pre: String,
}

impl Prefixes {
    /// Creates prefix settings.
    #[must_use]
    pub fn new(dbprefix: &str, swap_pre: &str) -> Self {
        Self {
            dbprefix: String::from(dbprefix),
            swap_pre: String::from(swap_pre),
        }
    }

    /// Replaces a leading swap prefix with the live prefix.
    ///
    /// Returns `None` when the segment does not start with the swap prefix.
    fn swap(&self, segment: &str) -> Option<String> {
        if self.swap_pre.is_empty() || !segment.starts_with(&self.swap_pre) {
            return None;
        }
        let rest = &segment[self.swap_pre.len()..];
        match rest.chars().next() {
            Some(c) if !c.is_whitespace() => Some(format!("{}{rest}", self.dbprefix)),
            _ => Some(String::from(segment)),
        }
    }

    /// Prefixes a table segment unless it already carries the prefix.
    fn apply(&self, segment: &str, add: bool) -> String {
        if let Some(swapped) = self.swap(segment) {
            return swapped;
        }
        if add && !segment.starts_with(&self.dbprefix) {
            return format!("{}{segment}", self.dbprefix);
        }
        String::from(segment)
    }
}

/// A borrowed view of everything identifier protection depends on.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierProtector<'a> {
    dialect: &'a dyn Dialect,
    prefixes: &'a Prefixes,
    aliases: &'a [String],
    protect: bool,
}

impl<'a> IdentifierProtector<'a> {
    /// Creates a protector.
    ///
    /// `protect` is the default used when a call does not say whether to quote.
    #[must_use]
    pub fn new(
        dialect: &'a dyn Dialect,
        prefixes: &'a Prefixes,
        aliases: &'a [String],
        protect: bool,
    ) -> Self {
        Self {
            dialect,
            prefixes,
            aliases,
            protect,
        }
    }

    fn is_reserved(&self, item: &str) -> bool {
        self.dialect.reserved_identifiers().contains(&item)
    }

    fn is_literal_like(&self, item: &str) -> bool {
        if item.contains(['(', ')', '\'']) {
            return true;
        }
        // A double quote is a string delimiter unless it quotes identifiers.
        let quotes_with_double = matches!(self.dialect.identifier_quotes(), Some(('"', _)));
        !quotes_with_double && item.contains('"')
    }

    fn is_wrapped(&self, item: &str) -> bool {
        match self.dialect.identifier_quotes() {
            Some((open, close)) => {
                item.chars().count() >= 2 && item.starts_with(open) && item.ends_with(close)
            }
            None => false,
        }
    }

    /// Quotes every dotted segment of an identifier.
    #[must_use]
    pub fn escape_identifiers(&self, item: &str) -> String {
        escape_identifiers(self.dialect, item)
    }

    /// Protects an identifier.
    ///
    /// - `prefix_single`: add the table prefix to an unqualified name.
    /// - `protect`: quote the result; `None` uses the protector's default.
    /// - `field_exists`: the dotted path ends with a column name. Pass `false`
    ///   for table references (FROM and JOIN), so the prefix lands one segment
    ///   further right.
    #[must_use]
    pub fn protect(
        &self,
        item: &str,
        prefix_single: bool,
        protect: Option<bool>,
        field_exists: bool,
    ) -> String {
        let protect = protect.unwrap_or(self.protect);

        if self.is_literal_like(item) {
            return String::from(item);
        }

        let item = item.split_whitespace().collect::<Vec<_>>().join(" ");
        if item.is_empty()
            || item.bytes().all(|b| b.is_ascii_digit())
            || self.is_reserved(&item)
            || self.is_wrapped(&item)
        {
            return item;
        }

        let (item, alias) = self.split_alias(&item, protect);

        if item.contains('.') {
            let mut parts: Vec<String> = item.split('.').map(String::from).collect();

            if !self.aliases.is_empty() && self.aliases.contains(&parts[0]) {
                if protect {
                    for part in &mut parts {
                        if !self.is_reserved(part) {
                            *part = self.escape_identifiers(part);
                        }
                    }
                }
                return format!("{}{alias}", parts.join("."));
            }

            let mut item = item.clone();
            if !self.prefixes.dbprefix.is_empty() {
                // host.db.table.column -> 2, db.table.column -> 1, table.column -> 0
                let mut i = match parts.len() {
                    n if n >= 4 => 2,
                    3 => 1,
                    _ => 0,
                };
                if !field_exists {
                    i += 1;
                }
                if let Some(part) = parts.get_mut(i) {
                    *part = self.prefixes.apply(part, true);
                }
                item = parts.join(".");
            }

            if protect {
                item = self.escape_identifiers(&item);
            }
            return format!("{item}{alias}");
        }

        let mut item = item.clone();
        if !self.prefixes.dbprefix.is_empty() {
            item = self.prefixes.apply(&item, prefix_single);
        }

        if protect && !self.is_reserved(&item) {
            item = self.escape_identifiers(&item);
        }
        format!("{item}{alias}")
    }

    /// Splits a trailing alias (` AS name` or ` name`) from an item.
    fn split_alias(&self, item: &str, protect: bool) -> (String, String) {
        let upper = item.to_ascii_uppercase();
        if let Some(offset) = upper.rfind(" AS ").filter(|&o| o > 0) {
            let alias = if protect {
                format!(
                    "{}{}",
                    &item[offset..offset + 4],
                    self.escape_identifiers(&item[offset + 4..])
                )
            } else {
                String::from(&item[offset..])
            };
            return (String::from(&item[..offset]), alias);
        }

        if let Some(offset) = item.rfind(' ').filter(|&o| o > 0) {
            let alias = if protect {
                format!(" {}", self.escape_identifiers(&item[offset + 1..]))
            } else {
                String::from(&item[offset..])
            };
            return (String::from(&item[..offset]), alias);
        }

        (String::from(item), String::new())
    }
}

/// Quotes every dotted segment of an identifier with the dialect's quotes.
///
/// Function calls, string literals, numbers and reserved identifiers are left
/// untouched; segments that are already quoted are not quoted twice.
#[must_use]
pub fn escape_identifiers(dialect: &dyn Dialect, item: &str) -> String {
    let Some((open, close)) = dialect.identifier_quotes() else {
        return String::from(item);
    };
    let reserved = dialect.reserved_identifiers();
    if item.is_empty() || reserved.contains(&item) {
        return String::from(item);
    }
    let first = item.chars().next().unwrap_or_default();
    if item.bytes().all(|b| b.is_ascii_digit())
        || first == '\''
        || (open != '"' && first == '"')
        || item.contains('(')
    {
        return String::from(item);
    }

    // With `table.*` only the segments followed by a dot are quoted.
    let only_dotted = reserved.iter().any(|id| item.contains(&format!(".{id}")));
    quote_segments(item, open, close, only_dotted)
}

fn quote_segments(item: &str, open: char, close: char, only_dotted: bool) -> String {
    let chars: Vec<char> = item.chars().collect();
    let mut out = String::with_capacity(item.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        let mut j = i;
        if chars[j] == open {
            j += 1;
        }
        let body_start = j;
        while j < chars.len() && chars[j] != close && chars[j] != '.' {
            j += 1;
        }
        if j == body_start {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let body_end = j;
        if j < chars.len() && chars[j] == close {
            j += 1;
        }
        let dotted = j < chars.len() && chars[j] == '.';
        if only_dotted && !dotted {
            out.extend(&chars[i..j]);
            i = j;
            continue;
        }

        out.push(open);
        out.extend(&chars[body_start..body_end]);
        out.push(close);
        if dotted {
            out.push('.');
            j += 1;
        }
        i = j;
    }

    out
}

/// Records the aliases declared in a table expression.
///
/// `users u`, `users AS u` and comma-separated lists of those are recognized.
pub fn track_aliases(aliases: &mut Vec<String>, table: &str) {
    if table.contains(',') {
        for part in table.split(',') {
            track_aliases(aliases, part);
        }
        return;
    }

    let table = table.trim();
    if !table.contains(char::is_whitespace) {
        return;
    }

    let normalized = AS_KEYWORD.replace_all(table, " ");
    if let Some(alias) = normalized.split_whitespace().last() {
        if !aliases.iter().any(|a| a == alias) {
            aliases.push(String::from(alias));
        }
    }
}
