//! Connections and the query execution pipeline.
//!
//! A [`Connection`] owns one backend, one [`QueryBuilder`] and the
//! transaction state. Every statement, whether raw or compiled by the
//! builder, runs through [`Connection::query_binds`]: prefix swap, bind
//! substitution, logging, timing, execution and result wrapping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};
use tracing::{debug, error, info, warn};

use crate::backend::{AdapterRegistry, Backend, Execution};
use crate::builder::{QueryBuilder, DEFAULT_BATCH_SIZE};
use crate::config::ConnectionConfig;
use crate::cursor::ResultCursor;
use crate::dialect::Dialect;
use crate::error::{DbError, ErrorInfo, Result};
use crate::escape::{compile_binds, escape_like_str, escape_value, is_write_type};
use crate::row::Row;
use crate::transaction::{TransactionState, TransactionStep};
use crate::value::{ToValue, Value};

/// Outcome of a statement that reached the backend.
#[derive(Debug)]
pub enum QueryResult {
    /// A read statement and its rows.
    Rows(ResultCursor),
    /// A write statement succeeded.
    Done,
    /// The backend rejected the statement (debug mode off).
    Failed(ErrorInfo),
}

impl QueryResult {
    /// Returns true unless the statement failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// The backend error of a failed statement.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Failed(info) => Some(info),
            _ => None,
        }
    }

    /// The rows of a read statement.
    #[must_use]
    pub fn into_cursor(self) -> Option<ResultCursor> {
        match self {
            Self::Rows(cursor) => Some(cursor),
            _ => None,
        }
    }
}

/// Catalog answers cached for the lifetime of a connection.
#[derive(Debug, Clone, Default)]
struct DataCache {
    tables: Option<Vec<String>>,
    fields: HashMap<String, Vec<String>>,
    version: Option<String>,
}

/// Executed statements and their timings.
#[derive(Debug, Clone, Default)]
struct QueryLog {
    queries: Vec<String>,
    times: Vec<Duration>,
    elapsed: Duration,
    count: usize,
    last: Option<String>,
}

/// A database connection.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    backend: Box<dyn Backend>,
    dialect: Arc<dyn Dialect>,
    builder: QueryBuilder,
    transaction: TransactionState,
    swap: Option<Regex>,
    log: QueryLog,
    cache: DataCache,
    connected: bool,
    last_error: Option<ErrorInfo>,
}

impl Connection {
    /// Wraps a backend without connecting. The first statement connects.
    #[must_use]
    pub fn new(config: ConnectionConfig, backend: Box<dyn Backend>) -> Self {
        let dialect = backend.dialect();
        let builder = QueryBuilder::new(Arc::clone(&dialect)).with_prefixes(config.prefixes());
        let transaction = TransactionState::new(config.trans_enabled, config.trans_strict);
        let swap = swap_pattern(&config);
        Self {
            config,
            backend,
            dialect,
            builder,
            transaction,
            swap,
            log: QueryLog::default(),
            cache: DataCache::default(),
            connected: false,
            last_error: None,
        }
    }

    /// Looks up the configured driver in `registry` and connects.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownDriver`] for an unregistered driver, or the
    /// connect error from [`initialize`](Self::initialize).
    pub fn open(config: ConnectionConfig, registry: &AdapterRegistry) -> Result<Self> {
        let backend = registry.create(&config.driver)?;
        let mut connection = Self::new(config, backend);
        connection.initialize()?;
        Ok(connection)
    }

    /// Connects, walking the failover list when the primary host refuses.
    ///
    /// Does nothing when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connect`] when there is no failover list, or
    /// [`DbError::ConnectionExhausted`] when every alternate refused too.
    pub fn initialize(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        let primary = match self.backend.connect(&self.config) {
            Ok(()) => {
                info!(driver = %self.config.driver, database = %self.config.database, "Connected to database");
                self.connected = true;
                return Ok(());
            }
            Err(info) => info,
        };
        warn!(database = %self.config.database, error = %primary, "Unable to connect to the database");
        if self.config.failover.is_empty() {
            self.last_error = Some(primary.clone());
            return Err(DbError::Connect(primary));
        }

        let alternates = self.config.failover.clone();
        for alternate in &alternates {
            let candidate = self.config.overlay(alternate);
            match self.backend.connect(&candidate) {
                Ok(()) => {
                    info!(database = %candidate.database, hostname = %candidate.hostname, "Connected using failover");
                    self.config = ConnectionConfig {
                        failover: alternates.clone(),
                        ..candidate
                    };
                    self.apply_prefixes();
                    self.connected = true;
                    return Ok(());
                }
                Err(info) => {
                    warn!(database = %candidate.database, hostname = %candidate.hostname, error = %info, "Failover connect failed");
                    self.last_error = Some(info);
                }
            }
        }

        error!("Unable to connect to the database");
        Err(DbError::ConnectionExhausted {
            attempts: alternates.len() + 1,
        })
    }

    /// Returns true while connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Closes the connection. Calling it again is a no-op.
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.backend.close();
        self.connected = false;
        debug!("Connection closed");
    }

    /// Re-establishes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connect`] when the backend cannot reconnect.
    pub fn reconnect(&mut self) -> Result<()> {
        if !self.connected {
            return self.initialize();
        }
        self.backend.reconnect().map_err(|info| {
            self.last_error = Some(info.clone());
            DbError::Connect(info)
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The backend dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Name of the backend platform.
    #[must_use]
    pub fn platform(&self) -> &'static str {
        self.dialect.name()
    }

    /// The query builder bound to this connection.
    pub fn builder(&mut self) -> &mut QueryBuilder {
        &mut self.builder
    }

    /// Prepends the table prefix.
    #[must_use]
    pub fn dbprefix(&self, table: &str) -> String {
        format!("{}{table}", self.config.dbprefix)
    }

    /// Changes the table prefix for the builder and the prefix swap.
    pub fn set_dbprefix(&mut self, prefix: &str) -> &str {
        self.config.dbprefix = String::from(prefix);
        self.apply_prefixes();
        &self.config.dbprefix
    }

    fn apply_prefixes(&mut self) {
        self.builder.set_prefixes(self.config.prefixes());
        self.swap = swap_pattern(&self.config);
    }

    /// Escapes a value into a SQL literal.
    #[must_use]
    pub fn escape<T: ToValue>(&self, value: T) -> String {
        escape_value(self.dialect(), &value.to_value())
    }

    /// Escapes a string without adding quotes.
    #[must_use]
    pub fn escape_str(&self, s: &str) -> String {
        self.dialect.escape_string(s)
    }

    /// Escapes a string for use inside a LIKE pattern.
    #[must_use]
    pub fn escape_like_str(&self, s: &str) -> String {
        escape_like_str(self.dialect(), s)
    }

    /// Substitutes bind markers in `sql`.
    ///
    /// A marker/value count mismatch leaves the statement unchanged.
    #[must_use]
    pub fn compile_binds(&self, sql: &str, binds: &[Value]) -> String {
        let marker = self
            .config
            .bind_marker
            .as_deref()
            .unwrap_or_else(|| self.dialect.bind_marker());
        compile_binds(self.dialect(), marker, sql, binds)
    }

    /// Runs a statement without binds.
    ///
    /// # Errors
    ///
    /// See [`query_binds`](Self::query_binds).
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.query_binds(sql, &[])
    }

    /// Runs a statement through the full pipeline.
    ///
    /// A backend failure yields [`QueryResult::Failed`], unless debug mode is
    /// on: then open transactions are rolled back and the failure is returned
    /// as [`DbError::Execute`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmptyStatement`] for blank SQL, a connect error when
    /// the lazy connect fails, or [`DbError::Execute`] in debug mode.
    pub fn query_binds(&mut self, sql: &str, binds: &[Value]) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            error!("Invalid query: the statement is empty");
            return Err(DbError::EmptyStatement);
        }
        self.initialize()?;

        let mut sql = self.swap_prefix(sql);
        if !binds.is_empty() {
            sql = self.compile_binds(&sql, binds);
        }
        if self.config.save_queries {
            self.log.queries.push(sql.clone());
        }
        self.log.last = Some(sql.clone());

        debug!(sql = %sql, "Executing SQL");
        let start = Instant::now();
        let outcome = self.backend.execute(&sql);
        let elapsed = start.elapsed();
        self.log.elapsed += elapsed;
        if self.config.save_queries {
            self.log.times.push(elapsed);
        }

        let execution = match outcome {
            Ok(execution) => execution,
            Err(info) => return self.fail(info, sql),
        };
        self.log.count += 1;

        if is_write_type(&sql) {
            return Ok(QueryResult::Done);
        }
        match execution {
            Execution::Rows(stream) => match ResultCursor::from_stream(stream) {
                Ok(cursor) => Ok(QueryResult::Rows(cursor)),
                Err(info) => self.fail(info, sql),
            },
            Execution::Done => Ok(QueryResult::Rows(ResultCursor::default())),
        }
    }

    fn fail(&mut self, info: ErrorInfo, sql: String) -> Result<QueryResult> {
        self.transaction.record_statement(false);
        error!(code = info.code, message = %info.message, sql = %sql, "Query error");
        self.last_error = Some(info.clone());

        if self.config.db_debug {
            self.unwind_transactions();
            return Err(DbError::Execute { info, sql });
        }
        Ok(QueryResult::Failed(info))
    }

    /// Completes every open transaction level; the outermost one rolls back
    /// because the status is already failed.
    fn unwind_transactions(&mut self) {
        let mut depth = self.transaction.depth();
        while depth > 0 {
            self.trans_complete();
            let now = self.transaction.depth();
            if now >= depth {
                warn!(depth, "Transaction depth did not decrease");
                break;
            }
            depth = now;
        }
    }

    fn swap_prefix(&self, sql: &str) -> String {
        let Some(pattern) = &self.swap else {
            return String::from(sql);
        };
        let prefix = &self.config.dbprefix;
        pattern
            .replace_all(sql, |caps: &Captures<'_>| format!("{}{prefix}{}", &caps[1], &caps[2]))
            .into_owned()
    }

    /// Runs a statement that bypasses logging and result wrapping.
    fn simple_query(&mut self, sql: &str) -> bool {
        if self.initialize().is_err() {
            return false;
        }
        debug!(sql = %sql, "Executing SQL");
        match self.backend.execute(sql) {
            Ok(_) => true,
            Err(info) => {
                error!(code = info.code, message = %info.message, sql = %sql, "Query error");
                self.last_error = Some(info);
                false
            }
        }
    }

    fn run_step(&mut self, step: TransactionStep) -> bool {
        let sql = match step {
            TransactionStep::None => return true,
            TransactionStep::Begin => self.dialect.begin_statement(),
            TransactionStep::Commit => self.dialect.commit_statement(),
            TransactionStep::Rollback => self.dialect.rollback_statement(),
        };
        self.simple_query(sql)
    }

    /// Opens a tracked transaction level. Only the outermost level issues
    /// BEGIN.
    pub fn trans_start(&mut self, test_mode: bool) -> bool {
        let step = self.transaction.start(test_mode);
        self.enter_level(step)
    }

    fn enter_level(&mut self, step: TransactionStep) -> bool {
        let ok = self.run_step(step);
        if !ok && step == TransactionStep::Begin {
            warn!("BEGIN failed, transaction not opened");
            self.transaction.begin_failed();
        }
        ok
    }

    /// Closes a tracked transaction level.
    ///
    /// Leaving the outermost level commits, or rolls back if any statement
    /// failed (or test mode was requested). Returns false after a rollback.
    pub fn trans_complete(&mut self) -> bool {
        match self.transaction.complete() {
            TransactionStep::Rollback => {
                self.run_step(TransactionStep::Rollback);
                debug!("Transaction failure, rolled back");
                false
            }
            step => self.run_step(step),
        }
    }

    /// Manual BEGIN. Inside an open transaction it only deepens the nesting.
    pub fn trans_begin(&mut self, test_mode: bool) -> bool {
        let step = self.transaction.begin(test_mode);
        self.enter_level(step)
    }

    /// Manual COMMIT of the current level.
    pub fn trans_commit(&mut self) -> bool {
        let step = self.transaction.commit();
        self.run_step(step)
    }

    /// Manual ROLLBACK of the current level.
    pub fn trans_rollback(&mut self) -> bool {
        let step = self.transaction.rollback();
        self.run_step(step)
    }

    /// False once a statement inside a transaction has failed.
    #[must_use]
    pub const fn trans_status(&self) -> bool {
        self.transaction.status()
    }

    /// Sets strict mode: a failed group keeps later groups failing.
    pub fn trans_strict(&mut self, strict: bool) {
        self.transaction.set_strict(strict);
    }

    /// Disables transactions for this connection.
    pub fn trans_off(&mut self) {
        self.transaction.disable();
    }

    /// Current transaction nesting depth.
    #[must_use]
    pub const fn trans_depth(&self) -> u32 {
        self.transaction.depth()
    }

    /// Rows changed by the last write.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.backend.affected_rows()
    }

    /// Identifier generated by the last INSERT.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the backend has none.
    pub fn insert_id(&self) -> Result<i64> {
        self.backend.insert_id()
    }

    /// The last backend error seen by this connection.
    #[must_use]
    pub fn error(&self) -> Option<ErrorInfo> {
        self.last_error.clone().or_else(|| self.backend.last_error())
    }

    /// Statements run so far, when query saving is on.
    #[must_use]
    pub fn queries(&self) -> &[String] {
        &self.log.queries
    }

    /// Durations matching [`queries`](Self::queries).
    #[must_use]
    pub fn query_times(&self) -> &[Duration] {
        &self.log.times
    }

    /// The last statement sent, saved or not.
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.log.last.as_deref()
    }

    /// Number of statements executed successfully.
    #[must_use]
    pub const fn total_queries(&self) -> usize {
        self.log.count
    }

    /// Total time spent in the backend.
    #[must_use]
    pub const fn elapsed_time(&self) -> Duration {
        self.log.elapsed
    }

    /// Turns query saving on or off.
    pub fn save_queries(&mut self, save: bool) {
        self.config.save_queries = save;
    }

    fn query_rows(&mut self, sql: &str) -> Result<ResultCursor> {
        match self.query(sql)? {
            QueryResult::Rows(cursor) => Ok(cursor),
            QueryResult::Done => Ok(ResultCursor::default()),
            QueryResult::Failed(info) => Err(DbError::Execute {
                info,
                sql: String::from(sql),
            }),
        }
    }

    /// Tables of the current database, optionally only those carrying the
    /// table prefix. The full list is cached.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the dialect has no
    /// catalog statement, or the execution error.
    pub fn list_tables(&mut self, constrain_by_prefix: bool) -> Result<Vec<String>> {
        let tables = match &self.cache.tables {
            Some(tables) => tables.clone(),
            None => {
                let sql = self
                    .dialect
                    .list_tables_statement(&self.config.database, None)
                    .ok_or(DbError::UnsupportedFeature("list_tables"))?;
                let cursor = self.query_rows(&sql)?;
                let tables: Vec<String> = cursor
                    .rows()
                    .iter()
                    .filter_map(|row| catalog_name(row, &["table_name", "name"]))
                    .collect();
                self.cache.tables = Some(tables.clone());
                tables
            }
        };

        let prefix = &self.config.dbprefix;
        if constrain_by_prefix && !prefix.is_empty() {
            return Ok(tables.into_iter().filter(|t| t.starts_with(prefix.as_str())).collect());
        }
        Ok(tables)
    }

    /// Returns true if the prefixed table exists.
    ///
    /// # Errors
    ///
    /// See [`list_tables`](Self::list_tables).
    pub fn table_exists(&mut self, table: &str) -> Result<bool> {
        let table = self.dbprefix(table);
        Ok(self.list_tables(false)?.contains(&table))
    }

    /// Column names of a table. Cached per table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the dialect has no
    /// catalog statement, or the execution error.
    pub fn list_fields(&mut self, table: &str) -> Result<Vec<String>> {
        let table = self.dbprefix(table);
        if let Some(fields) = self.cache.fields.get(&table) {
            return Ok(fields.clone());
        }
        let sql = self
            .dialect
            .list_columns_statement(&table)
            .ok_or(DbError::UnsupportedFeature("list_fields"))?;
        let cursor = self.query_rows(&sql)?;
        let fields: Vec<String> = cursor
            .rows()
            .iter()
            .filter_map(|row| catalog_name(row, &["column_name", "field", "name"]))
            .collect();
        self.cache.fields.insert(table, fields.clone());
        Ok(fields)
    }

    /// Returns true if the table has the column.
    ///
    /// # Errors
    ///
    /// See [`list_fields`](Self::list_fields).
    pub fn field_exists(&mut self, field: &str, table: &str) -> Result<bool> {
        Ok(self.list_fields(table)?.iter().any(|f| f == field))
    }

    /// Server version string. Cached.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the dialect cannot report
    /// a version, or the execution error.
    pub fn version(&mut self) -> Result<String> {
        if let Some(version) = &self.cache.version {
            return Ok(version.clone());
        }
        let sql = self
            .dialect
            .version_statement()
            .ok_or(DbError::UnsupportedFeature("version"))?;
        let cursor = self.query_rows(sql)?;
        let version = cursor
            .rows()
            .first()
            .and_then(|row| catalog_name(row, &["ver"]))
            .ok_or(DbError::UnsupportedFeature("version"))?;
        self.cache.version = Some(version.clone());
        Ok(version)
    }

    /// Runs the builder's SELECT against `table` and resets the builder.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn get(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.get_compiled_select(table, true)?;
        self.query(&sql)
    }

    /// Like [`get`](Self::get), adding one equality condition per column of
    /// `conditions`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_where(&mut self, table: &str, conditions: &Row) -> Result<QueryResult> {
        for (key, value) in conditions.iter() {
            self.builder.where_(key, value);
        }
        self.get(table)
    }

    /// Counts every row of a table.
    ///
    /// # Errors
    ///
    /// Returns execution errors.
    pub fn count_all(&mut self, table: &str) -> Result<u64> {
        if table.trim().is_empty() {
            return Ok(0);
        }
        let sql = self.builder.compile_count_all(table)?;
        self.builder.reset_select();
        let cursor = self.query_rows(&sql)?;
        Ok(numrows(&cursor))
    }

    /// Counts the rows the builder's current query would return.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn count_all_results(&mut self, table: &str, reset: bool) -> Result<u64> {
        let sql = self.builder.compile_count_all_results(table)?;
        if reset {
            self.builder.reset_select();
        }
        let cursor = self.query_rows(&sql)?;
        Ok(numrows(&cursor))
    }

    /// Runs the builder's INSERT.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn insert(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.get_compiled_insert(table, true)?;
        self.query(&sql)
    }

    /// Runs the builder's REPLACE.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn replace(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.compile_replace(table);
        self.builder.reset_write();
        self.query(&sql?)
    }

    /// Runs the builder's UPDATE.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn update(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.get_compiled_update(table, true)?;
        self.query(&sql)
    }

    /// Runs the builder's DELETE.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DeleteWithoutWhere`] without conditions, other
    /// builder compile errors, or execution errors.
    pub fn delete(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.get_compiled_delete(table, true)?;
        self.query(&sql)
    }

    /// Deletes every row of a table.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn empty_table(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.compile_empty_table(table);
        self.builder.reset_write();
        self.query(&sql?)
    }

    /// Truncates a table.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or execution errors.
    pub fn truncate(&mut self, table: &str) -> Result<QueryResult> {
        let sql = self.builder.compile_truncate(table);
        self.builder.reset_write();
        self.query(&sql?)
    }

    /// Inserts rows in batches and returns the total affected rows.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors or, in debug mode, execution errors.
    pub fn insert_batch(&mut self, table: &str, rows: &[Row]) -> Result<u64> {
        self.builder.set_insert_batch(rows);
        let statements = self.builder.compile_insert_batch(table, DEFAULT_BATCH_SIZE);
        self.builder.reset_write();
        self.run_batch(&statements?)
    }

    /// Updates rows in batches matched on `index` and returns the total
    /// affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingMatchKey`] or [`DbError::MissingBatchKey`]
    /// for bad input, other builder compile errors or, in debug mode,
    /// execution errors.
    pub fn update_batch(&mut self, table: &str, rows: &[Row], index: &str) -> Result<u64> {
        let statements = self
            .builder
            .set_update_batch(rows, index)
            .and_then(|builder| builder.compile_update_batch(table, DEFAULT_BATCH_SIZE));
        self.builder.reset_write();
        self.run_batch(&statements?)
    }

    fn run_batch(&mut self, statements: &[String]) -> Result<u64> {
        let mut affected = 0;
        for sql in statements {
            if self.query(sql)?.is_success() {
                affected += self.affected_rows();
            }
        }
        Ok(affected)
    }

    /// Compiles an INSERT for `data` without touching the builder.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors.
    pub fn insert_string(&self, table: &str, data: &Row) -> Result<String> {
        let mut builder = self.scratch_builder();
        builder.set_row(data);
        builder.get_compiled_insert(table, true)
    }

    /// Compiles an UPDATE for `data` restricted by equality on `conditions`,
    /// without touching the builder.
    ///
    /// # Errors
    ///
    /// Returns builder compile errors.
    pub fn update_string(&self, table: &str, data: &Row, conditions: &Row) -> Result<String> {
        let mut builder = self.scratch_builder();
        builder.set_row(data);
        for (key, value) in conditions.iter() {
            builder.where_(key, value);
        }
        builder.get_compiled_update(table, true)
    }

    fn scratch_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.dialect)).with_prefixes(self.config.prefixes())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn swap_pattern(config: &ConnectionConfig) -> Option<Regex> {
    let (prefix, swap) = (&config.dbprefix, &config.swap_pre);
    if prefix.is_empty() || swap.is_empty() || prefix == swap {
        return None;
    }
    Regex::new(&format!(r"(\W){}(\S)", regex::escape(swap))).ok()
}

/// Picks a name column out of a catalog row, falling back to the first cell.
fn catalog_name(row: &Row, columns: &[&str]) -> Option<String> {
    let cell = columns
        .iter()
        .find_map(|wanted| {
            row.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value)
        })
        .or_else(|| row.get_index(0))?;
    match cell {
        Value::Text(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn numrows(cursor: &ResultCursor) -> u64 {
    cursor
        .rows()
        .first()
        .and_then(|row| row.get("numrows").or_else(|| row.get_index(0)))
        .and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_pattern() {
        let config = ConnectionConfig::new("mysql", "app").with_prefix("app_", "db_");
        let pattern = swap_pattern(&config).unwrap();
        let swapped = pattern.replace_all("SELECT * FROM db_users JOIN db_ x", |caps: &Captures<'_>| {
            format!("{}app_{}", &caps[1], &caps[2])
        });
        assert_eq!(swapped, "SELECT * FROM app_users JOIN db_ x");
    }

    #[test]
    fn test_swap_pattern_disabled() {
        assert!(swap_pattern(&ConnectionConfig::default()).is_none());
        let same = ConnectionConfig::default().with_prefix("app_", "app_");
        assert!(swap_pattern(&same).is_none());
    }

    #[test]
    fn test_catalog_name() {
        let row = Row::new().with("cid", 0).with("NAME", "email");
        assert_eq!(catalog_name(&row, &["column_name", "name"]), Some(String::from("email")));
        let row = Row::new().with("Tables_in_app", "users");
        assert_eq!(catalog_name(&row, &["table_name"]), Some(String::from("users")));
    }

    #[test]
    fn test_numrows() {
        let cursor = ResultCursor::from_rows(vec![Row::new().with("numrows", 42)]);
        assert_eq!(numrows(&cursor), 42);
        assert_eq!(numrows(&ResultCursor::default()), 0);
    }
}
