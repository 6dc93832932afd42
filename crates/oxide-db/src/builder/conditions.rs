//! WHERE and HAVING accumulation and compilation.
//!
//! Conditions are stored as raw text with the value already escaped. At
//! compile time each condition is split on `AND`/`OR` and every fragment is
//! matched against an operator grammar so its left-hand field can be
//! protected. The split does not track parentheses or string literals, so a
//! literal `AND` inside a raw condition is split as well.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Clauses, Condition, QueryBuilder};
use crate::error::{DbError, Result};
use crate::escape::{escape_like_str, escape_value, raw_literal};
use crate::value::{ToValue, Value};

static HAS_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<|>|!|=|\sIS NULL|\sIS NOT NULL|\sEXISTS\s*\(.*\)|\sBETWEEN|\sLIKE|\sIN\s*\(|\s)")
        .expect("operator detection pattern is valid")
});

static TRAILING_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(!?=|<>|\sIS(?:\s+NOT)?)\s*$").expect("trailing comparison pattern is valid")
});

static CONJUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s+)(?:AND|OR)\s+").expect("conjunction pattern is valid")
});

static OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)",
        r"\s*(?:<|>|!)?=\s*",
        r"|\s*<>?\s*",
        r"|\s*>\s*",
        r"|\s+IS NULL",
        r"|\s+IS NOT NULL",
        r"|\s+EXISTS\s*\(.*\)",
        r"|\s+NOT EXISTS\s*\(.*\)",
        r"|\s+BETWEEN\s+",
        r"|\s+IN\s*\(.*\)",
        r"|\s+NOT IN\s*\(.*\)",
        r"|\s+LIKE(?:\s+\S.*)?",
        r"|\s+NOT LIKE(?:\s+\S.*)?",
    ))
    .expect("operator grammar is valid")
});

/// Where the wildcard goes in a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    /// `'%match'`
    Before,
    /// `'match%'`
    After,
    /// `'%match%'`
    #[default]
    Both,
    /// `'match'`, no wildcard.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ClauseKind {
    Where,
    Having,
}

impl ClauseKind {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Where => "\nWHERE ",
            Self::Having => "\nHAVING ",
        }
    }
}

const fn list(clauses: &Clauses, kind: ClauseKind) -> &Vec<Condition> {
    match kind {
        ClauseKind::Where => &clauses.wheres,
        ClauseKind::Having => &clauses.having,
    }
}

fn list_mut(clauses: &mut Clauses, kind: ClauseKind) -> &mut Vec<Condition> {
    match kind {
        ClauseKind::Where => &mut clauses.wheres,
        ClauseKind::Having => &mut clauses.having,
    }
}

pub(super) fn has_operator(key: &str) -> bool {
    HAS_OPERATOR.is_match(key.trim())
}

/// Expands a `field:op` suffix into the SQL operator.
fn expand_operator_suffix(key: &str) -> String {
    if let Some((field, suffix)) = key.rsplit_once(':') {
        let op = match suffix.trim().to_ascii_lowercase().as_str() {
            "equal" => "=",
            "not" => "!=",
            "greater" => ">",
            "less" => "<",
            "greater_equal" => ">=",
            "less_equal" => "<=",
            _ => return String::from(key),
        };
        return format!("{} {op}", field.trim_end());
    }
    String::from(key)
}

/// Rewrites a key compared against NULL into `IS NULL` / `IS NOT NULL`.
fn null_comparison(key: String) -> String {
    if !has_operator(&key) {
        return format!("{key} IS NULL");
    }
    let trailing = TRAILING_COMPARISON.captures(&key).and_then(|caps| {
        let start = caps.get(0)?.start();
        let op = caps.get(1)?.as_str().trim().to_ascii_uppercase();
        Some((start, op))
    });
    match trailing {
        Some((start, op)) => {
            let test = if op == "=" || op == "IS" {
                " IS NULL"
            } else {
                " IS NOT NULL"
            };
            format!("{}{test}", &key[..start])
        }
        None => key,
    }
}

/// Returns the first operator found in a condition fragment.
pub(super) fn find_operator(fragment: &str) -> Option<&str> {
    OPERATOR.find(fragment).map(|m| m.as_str())
}

fn split_conjunctions(condition: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in CONJUNCTION.find_iter(condition) {
        if m.start() > last {
            parts.push(&condition[last..m.start()]);
        }
        parts.push(m.as_str());
        last = m.end();
    }
    if last < condition.len() {
        parts.push(&condition[last..]);
    }
    parts
}

struct OperatorSplit<'a> {
    open: &'a str,
    field: &'a str,
    rest: &'a str,
    close: &'a str,
}

/// Splits `[(]field OP rest[)]` on the last usable occurrence of `op`.
///
/// The right-hand side may end with at most one closing parenthesis that
/// does not belong to it.
fn split_on_operator<'a>(fragment: &'a str, op: &str) -> Option<OperatorSplit<'a>> {
    let (open, body) = fragment
        .strip_prefix('(')
        .map_or(("", fragment), |body| ("(", body));

    for (pos, _) in body.rmatch_indices(op) {
        let tail = body[pos + op.len()..].trim_start();
        let (rest, close) = tail
            .strip_suffix(')')
            .map_or((tail, ""), |rest| (rest, ")"));
        if rest.ends_with(')') {
            continue;
        }
        return Some(OperatorSplit {
            open,
            field: &body[..pos],
            rest,
            close,
        });
    }
    None
}

fn is_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let valid = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    valid(whole) && parts.next().map_or(true, valid)
}

impl QueryBuilder {
    /// Returns the conjunction for a new condition, consuming a pending group start.
    fn conjunction(&mut self, kind: ClauseKind, conj: &'static str) -> &'static str {
        let conj = if self.group_started { "" } else { conj };
        self.group_started = false;
        if list(&self.live, kind).is_empty() && list(&self.cache, kind).is_empty() {
            ""
        } else {
            conj
        }
    }

    fn push_condition(
        &mut self,
        kind: ClauseKind,
        key: &str,
        value: Option<Value>,
        conj: &'static str,
        escape: Option<bool>,
    ) -> &mut Self {
        let protect = self.escape_default(escape);
        let escape_values = escape.unwrap_or(true);
        let prefix = self.conjunction(kind, conj);
        let mut key = expand_operator_suffix(key);

        let value = match value.filter(|v| !v.is_null()) {
            Some(value) => {
                if !has_operator(&key) {
                    key.push_str(" =");
                }
                Some(if escape_values {
                    escape_value(self.dialect(), &value)
                } else {
                    raw_literal(self.dialect(), &value)
                })
            }
            None => {
                key = null_comparison(key);
                None
            }
        };

        let entry = Condition {
            condition: format!("{prefix}{key}"),
            value,
            escape: protect,
        };
        self.record(|c| list_mut(c, kind).push(entry.clone()));
        self
    }

    /// Adds `key = value`, joined with AND.
    ///
    /// The key may carry an operator (`"age >"`, `"name LIKE"`) or a
    /// `field:op` suffix where `op` is one of `equal`, `not`, `greater`,
    /// `less`, `greater_equal`, `less_equal`. A `Null` value produces
    /// `IS NULL` (or `IS NOT NULL` for negated operators).
    pub fn where_<T: ToValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.push_condition(ClauseKind::Where, key, Some(value.to_value()), "AND ", None)
    }

    /// Adds `key = value`, joined with OR.
    pub fn or_where<T: ToValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.push_condition(ClauseKind::Where, key, Some(value.to_value()), "OR ", None)
    }

    /// Adds a raw condition with no value, joined with AND.
    pub fn where_expr(&mut self, condition: &str) -> &mut Self {
        self.push_condition(ClauseKind::Where, condition, None, "AND ", None)
    }

    /// Adds a raw condition with no value, joined with OR.
    pub fn or_where_expr(&mut self, condition: &str) -> &mut Self {
        self.push_condition(ClauseKind::Where, condition, None, "OR ", None)
    }

    /// Adds a condition with an explicit escape flag.
    ///
    /// With `escape == false` neither the key is protected nor the value
    /// escaped; text values are inserted verbatim.
    pub fn where_with<T: ToValue>(&mut self, key: &str, value: T, escape: bool) -> &mut Self {
        self.push_condition(ClauseKind::Where, key, Some(value.to_value()), "AND ", Some(escape))
    }

    /// Adds `key = value` to HAVING, joined with AND.
    pub fn having<T: ToValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.push_condition(ClauseKind::Having, key, Some(value.to_value()), "AND ", None)
    }

    /// Adds `key = value` to HAVING, joined with OR.
    pub fn or_having<T: ToValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.push_condition(ClauseKind::Having, key, Some(value.to_value()), "OR ", None)
    }

    /// Adds a raw HAVING condition with no value.
    pub fn having_expr(&mut self, condition: &str) -> &mut Self {
        self.push_condition(ClauseKind::Having, condition, None, "AND ", None)
    }

    /// Adds a HAVING condition with an explicit escape flag.
    pub fn having_with<T: ToValue>(&mut self, key: &str, value: T, escape: bool) -> &mut Self {
        self.push_condition(ClauseKind::Having, key, Some(value.to_value()), "AND ", Some(escape))
    }

    fn push_in<I>(&mut self, key: &str, values: I, not: bool, conj: &'static str) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        let escape = self.escape_default(None);
        let items: Vec<String> = values
            .into_iter()
            .map(|v| escape_value(self.dialect(), &v.to_value()))
            .collect();
        let prefix = self.conjunction(ClauseKind::Where, conj);
        let not = if not { " NOT" } else { "" };

        let entry = Condition {
            condition: format!("{prefix}{key}{not} IN({})", items.join(", ")),
            value: None,
            escape,
        };
        self.record(|c| c.wheres.push(entry.clone()));
        self
    }

    /// Adds `key IN(values)`, joined with AND.
    ///
    /// An empty list compiles to `IN()`, which most backends reject.
    pub fn where_in<I>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.push_in(key, values, false, "AND ")
    }

    /// Adds `key IN(values)`, joined with OR.
    pub fn or_where_in<I>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.push_in(key, values, false, "OR ")
    }

    /// Adds `key NOT IN(values)`, joined with AND.
    pub fn where_not_in<I>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.push_in(key, values, true, "AND ")
    }

    /// Adds `key NOT IN(values)`, joined with OR.
    pub fn or_where_not_in<I>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.push_in(key, values, true, "OR ")
    }

    fn push_like(
        &mut self,
        field: &str,
        pattern: &str,
        side: LikeSide,
        not: bool,
        conj: &'static str,
    ) -> &mut Self {
        let escape = self.escape_default(None);
        let dialect = self.dialect();
        let body = if escape {
            escape_like_str(dialect, pattern)
        } else {
            String::from(pattern)
        };
        let mut value = match side {
            LikeSide::None => format!("'{body}'"),
            LikeSide::Before => format!("'%{body}'"),
            LikeSide::After => format!("'{body}%'"),
            LikeSide::Both => format!("'%{body}%'"),
        };
        if escape {
            value.push_str(&dialect.like_escape_clause());
        }

        let prefix = self.conjunction(ClauseKind::Where, conj);
        let not = if not { "NOT " } else { "" };
        let entry = Condition {
            condition: format!("{prefix}{field} {not}LIKE"),
            value: Some(value),
            escape,
        };
        self.record(|c| c.wheres.push(entry.clone()));
        self
    }

    /// Adds `field LIKE '%match%'` (wildcards per `side`), joined with AND.
    pub fn like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.push_like(field, pattern, side, false, "AND ")
    }

    /// Adds a LIKE predicate joined with OR.
    pub fn or_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.push_like(field, pattern, side, false, "OR ")
    }

    /// Adds a NOT LIKE predicate joined with AND.
    pub fn not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.push_like(field, pattern, side, true, "AND ")
    }

    /// Adds a NOT LIKE predicate joined with OR.
    pub fn or_not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.push_like(field, pattern, side, true, "OR ")
    }

    fn open_group(&mut self, not: bool, conj: &'static str) -> &mut Self {
        let prefix = self.conjunction(ClauseKind::Where, conj);
        self.group_started = true;
        self.group_depth += 1;
        let indent = " ".repeat(usize::try_from(self.group_depth).unwrap_or_default());
        let not = if not { "NOT " } else { "" };

        let entry = Condition {
            condition: format!("{prefix}{not}{indent} ("),
            value: None,
            escape: false,
        };
        self.record(|c| c.wheres.push(entry.clone()));
        self
    }

    /// Opens a parenthesized group joined with AND.
    pub fn group_start(&mut self) -> &mut Self {
        self.open_group(false, "AND ")
    }

    /// Opens a parenthesized group joined with OR.
    pub fn or_group_start(&mut self) -> &mut Self {
        self.open_group(false, "OR ")
    }

    /// Opens a negated group joined with AND.
    pub fn not_group_start(&mut self) -> &mut Self {
        self.open_group(true, "AND ")
    }

    /// Opens a negated group joined with OR.
    pub fn or_not_group_start(&mut self) -> &mut Self {
        self.open_group(true, "OR ")
    }

    /// Closes the innermost group.
    ///
    /// Closing a group that was never opened is reported by the next compile.
    pub fn group_end(&mut self) -> &mut Self {
        if self.group_depth <= 0 {
            self.park(DbError::UnbalancedGroup {
                depth: self.group_depth - 1,
            });
            return self;
        }
        self.group_started = false;
        let indent = " ".repeat(usize::try_from(self.group_depth).unwrap_or_default());
        self.group_depth -= 1;

        let entry = Condition {
            condition: format!("{indent})"),
            value: None,
            escape: false,
        };
        self.record(|c| c.wheres.push(entry.clone()));
        self
    }

    pub(super) fn is_literal(&self, s: &str) -> bool {
        let s = s.trim();
        if s.is_empty()
            || is_number(s)
            || s.eq_ignore_ascii_case("TRUE")
            || s.eq_ignore_ascii_case("FALSE")
        {
            return true;
        }
        let quotes_with_double = matches!(self.dialect().identifier_quotes(), Some(('"', _)));
        s.starts_with('\'') || (!quotes_with_double && s.starts_with('"'))
    }

    /// Protects the field (and non-literal right-hand side) of one fragment.
    fn protect_fragment(&self, fragment: &str) -> String {
        let Some(op) = find_operator(fragment) else {
            return String::from(fragment);
        };
        let Some(split) = split_on_operator(fragment, op) else {
            return String::from(fragment);
        };

        let field = self.protect_identifiers(split.field.trim(), false, None, true);
        let mut out = format!("{}{field} {}", split.open, op.trim());
        if !split.rest.is_empty() {
            out.push(' ');
            if self.is_literal(split.rest) {
                out.push_str(split.rest);
            } else {
                out.push_str(&self.protect_identifiers(split.rest.trim(), false, None, true));
            }
        }
        out.push_str(split.close);
        out
    }

    fn compile_condition(&self, entry: &Condition) -> String {
        let mut out = if entry.escape {
            split_conjunctions(&entry.condition)
                .into_iter()
                .map(|fragment| self.protect_fragment(fragment))
                .collect::<String>()
        } else {
            entry.condition.clone()
        };
        if let Some(value) = &entry.value {
            out.push(' ');
            out.push_str(value);
        }
        out
    }

    fn compile_entries(&self, entries: &[Condition], keyword: &str) -> String {
        if entries.is_empty() {
            return String::new();
        }
        let compiled: Vec<String> = entries.iter().map(|c| self.compile_condition(c)).collect();
        format!("{keyword}{}", compiled.join("\n"))
    }

    /// Compiles the WHERE or HAVING clause, including the leading keyword.
    pub(super) fn compile_conditions(&self, kind: ClauseKind) -> Result<String> {
        if kind == ClauseKind::Where && self.group_depth != 0 {
            return Err(DbError::UnbalancedGroup {
                depth: self.group_depth,
            });
        }
        Ok(self.compile_entries(list(&self.live, kind), kind.keyword()))
    }

    /// Compiles the WHERE clause with one extra condition appended.
    pub(super) fn compile_where_with(&self, extra: Condition) -> Result<String> {
        if self.group_depth != 0 {
            return Err(DbError::UnbalancedGroup {
                depth: self.group_depth,
            });
        }
        let mut entries = self.live.wheres.clone();
        let extra = if entries.is_empty() {
            extra
        } else {
            Condition {
                condition: format!("AND {}", extra.condition),
                ..extra
            }
        };
        entries.push(extra);
        Ok(self.compile_entries(&entries, ClauseKind::Where.keyword()))
    }
}
