//! Query builder.
//!
//! [`QueryBuilder`] accumulates clauses through `&mut Self` chaining and
//! compiles them into one SQL string per statement kind. Identifiers are
//! protected through the connection's [`Dialect`] and table prefix; values are
//! escaped into literals as they are accumulated.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_db::builder::QueryBuilder;
//! use oxide_db::dialect::GenericDialect;
//!
//! let mut qb = QueryBuilder::new(Arc::new(GenericDialect::unquoted()));
//! qb.select("id,name").from("users").where_("age", 30);
//!
//! assert_eq!(
//!     qb.get_compiled_select("", true).unwrap(),
//!     "SELECT id, name\nFROM users\nWHERE age = 30"
//! );
//! ```
//!
//! Misuse detected while accumulating (an empty aggregate field, an unmatched
//! `group_end`, batch rows with different columns) is parked in the builder
//! and returned by the next compile.

mod conditions;
mod select;
mod write;

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{DbError, Result};
use crate::protect::{IdentifierProtector, Prefixes};

pub use conditions::LikeSide;
pub use select::{Aggregate, JoinType, OrderDirection};

/// Default number of rows per batch statement.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A SELECT list item.
#[derive(Debug, Clone, PartialEq)]
struct SelectItem {
    expr: String,
    escape: Option<bool>,
}

/// A WHERE or HAVING entry.
///
/// `value` is an already escaped literal, appended after the condition has
/// been compiled. Group markers are entries with `escape == false`.
#[derive(Debug, Clone, PartialEq)]
struct Condition {
    condition: String,
    value: Option<String>,
    escape: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct GroupItem {
    field: String,
    escape: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct OrderItem {
    field: String,
    direction: String,
    escape: bool,
}

/// One row of a batch update: protected column, escaped value.
#[derive(Debug, Clone, PartialEq)]
struct UpdateBatchRow {
    index_value: String,
    cells: Vec<(String, String)>,
}

/// The cacheable clauses of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
struct Clauses {
    select: Vec<SelectItem>,
    from: Vec<String>,
    join: Vec<String>,
    wheres: Vec<Condition>,
    having: Vec<Condition>,
    group_by: Vec<GroupItem>,
    order_by: Vec<OrderItem>,
    set: Vec<(String, String)>,
    aliases: Vec<String>,
}

fn merge_into<T: Clone + PartialEq>(cache: &[T], live: &mut Vec<T>) {
    if cache.is_empty() {
        return;
    }
    let mut merged = cache.to_vec();
    for item in live.drain(..) {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    *live = merged;
}

impl Clauses {
    /// Merges cached entries in front of live ones, dropping duplicates.
    fn merge_from(&mut self, cache: &Self) {
        merge_into(&cache.select, &mut self.select);
        merge_into(&cache.from, &mut self.from);
        merge_into(&cache.join, &mut self.join);
        merge_into(&cache.wheres, &mut self.wheres);
        merge_into(&cache.having, &mut self.having);
        merge_into(&cache.group_by, &mut self.group_by);
        merge_into(&cache.order_by, &mut self.order_by);
        merge_into(&cache.set, &mut self.set);
        merge_into(&cache.aliases, &mut self.aliases);
    }
}

/// A CodeIgniter-style SQL query builder.
///
/// The builder is bound to one [`Dialect`]. It is usually owned by a
/// [`Connection`](crate::Connection) and reached through
/// [`Connection::builder`](crate::Connection::builder), but it compiles SQL on
/// its own as well.
#[derive(Debug)]
pub struct QueryBuilder {
    dialect: Arc<dyn Dialect>,
    prefixes: Prefixes,
    protect_identifiers: bool,
    live: Clauses,
    cache: Clauses,
    caching: bool,
    distinct: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    keys: Vec<String>,
    insert_rows: Vec<String>,
    update_rows: Vec<UpdateBatchRow>,
    update_index: Option<String>,
    group_depth: i64,
    group_started: bool,
    error: Option<DbError>,
}

impl QueryBuilder {
    /// Creates a builder for the given dialect, with no table prefix.
    #[must_use]
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            prefixes: Prefixes::default(),
            protect_identifiers: true,
            live: Clauses::default(),
            cache: Clauses::default(),
            caching: false,
            distinct: false,
            limit: None,
            offset: None,
            keys: Vec::new(),
            insert_rows: Vec::new(),
            update_rows: Vec::new(),
            update_index: None,
            group_depth: 0,
            group_started: false,
            error: None,
        }
    }

    /// Sets the table prefix settings.
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: Prefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Returns the table prefix settings.
    #[must_use]
    pub const fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Replaces the table prefix settings.
    pub fn set_prefixes(&mut self, prefixes: Prefixes) {
        self.prefixes = prefixes;
    }

    /// Turns identifier protection on or off for subsequent calls.
    ///
    /// Returns the previous setting.
    pub fn set_protect_identifiers(&mut self, protect: bool) -> bool {
        std::mem::replace(&mut self.protect_identifiers, protect)
    }

    /// Returns the identifier protector for the current state.
    #[must_use]
    pub fn protector(&self) -> IdentifierProtector<'_> {
        IdentifierProtector::new(
            self.dialect.as_ref(),
            &self.prefixes,
            &self.live.aliases,
            self.protect_identifiers,
        )
    }

    /// Protects an identifier against the current alias set and prefix.
    #[must_use]
    pub fn protect_identifiers(
        &self,
        item: &str,
        prefix_single: bool,
        protect: Option<bool>,
        field_exists: bool,
    ) -> String {
        self.protector()
            .protect(item, prefix_single, protect, field_exists)
    }

    /// Returns the table aliases seen so far.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.live.aliases
    }

    /// Returns the current WHERE group depth.
    #[must_use]
    pub const fn group_depth(&self) -> i64 {
        self.group_depth
    }

    fn escape_default(&self, escape: Option<bool>) -> bool {
        escape.unwrap_or(self.protect_identifiers)
    }

    /// Applies a change to the live clauses, and to the cache while caching.
    fn record(&mut self, apply: impl Fn(&mut Clauses)) {
        apply(&mut self.live);
        if self.caching {
            apply(&mut self.cache);
        }
    }

    fn park(&mut self, err: DbError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Returns a parked error, if any, clearing it.
    fn take_error(&mut self) -> Result<()> {
        self.error.take().map_or(Ok(()), Err)
    }

    fn merge_cache(&mut self) {
        let cache = std::mem::take(&mut self.cache);
        self.live.merge_from(&cache);
        self.cache = cache;
    }

    /// Starts recording clauses into the cache.
    pub fn start_cache(&mut self) -> &mut Self {
        self.caching = true;
        self
    }

    /// Stops recording clauses into the cache.
    pub fn stop_cache(&mut self) -> &mut Self {
        self.caching = false;
        self
    }

    /// Empties the cache.
    pub fn flush_cache(&mut self) -> &mut Self {
        self.cache = Clauses::default();
        self
    }

    /// Clears the read-family state.
    pub fn reset_select(&mut self) {
        let live = &mut self.live;
        live.select.clear();
        live.from.clear();
        live.join.clear();
        live.wheres.clear();
        live.group_by.clear();
        live.having.clear();
        live.order_by.clear();
        live.aliases.clear();
        self.distinct = false;
        self.limit = None;
        self.offset = None;
        self.group_depth = 0;
        self.group_started = false;
    }

    /// Clears the write-family state.
    pub fn reset_write(&mut self) {
        let live = &mut self.live;
        live.set.clear();
        live.from.clear();
        live.join.clear();
        live.wheres.clear();
        live.order_by.clear();
        self.keys.clear();
        self.insert_rows.clear();
        self.update_rows.clear();
        self.update_index = None;
        self.limit = None;
        self.group_depth = 0;
        self.group_started = false;
    }

    /// Clears both state families and any parked error. The cache survives.
    pub fn reset_query(&mut self) {
        self.reset_select();
        self.reset_write();
        self.error = None;
    }
}
