//! INSERT, UPDATE, DELETE and REPLACE compilation, including batches.

use std::collections::BTreeSet;

use super::conditions::ClauseKind;
use super::{Condition, QueryBuilder, UpdateBatchRow};
use crate::error::{DbError, Result};
use crate::escape::{escape_value, raw_literal};
use crate::row::Row;
use crate::value::{ToValue, Value};

impl QueryBuilder {
    fn push_set(&mut self, key: &str, value: &Value, escape: bool) {
        let key = self.protect_identifiers(key, false, None, true);
        let value = if escape {
            escape_value(self.dialect(), value)
        } else {
            raw_literal(self.dialect(), value)
        };
        self.record(|c| match c.set.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => c.set.push((key.clone(), value.clone())),
        });
    }

    /// Sets a column for INSERT, UPDATE or REPLACE. The value is escaped.
    ///
    /// Setting the same column twice keeps the last value.
    pub fn set<T: ToValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.push_set(key, &value.to_value(), true);
        self
    }

    /// Sets a column to an unescaped expression, such as `count + 1`.
    ///
    /// The column name is still protected.
    pub fn set_raw(&mut self, key: &str, expr: &str) -> &mut Self {
        self.push_set(key, &Value::Text(String::from(expr)), false);
        self
    }

    /// Sets every column of a row.
    pub fn set_row(&mut self, row: &Row) -> &mut Self {
        for (key, value) in row.iter() {
            self.push_set(key, value, true);
        }
        self
    }

    /// Queues rows for a batch INSERT.
    ///
    /// Every row must have the same columns as the first; columns are emitted
    /// in sorted order.
    pub fn set_insert_batch(&mut self, rows: &[Row]) -> &mut Self {
        let Some(first) = rows.first() else {
            return self;
        };
        let columns: BTreeSet<&str> = first.columns().collect();

        let mut literals = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row_columns: BTreeSet<&str> = row.columns().collect();
            if row_columns != columns || row.len() != columns.len() {
                self.park(DbError::InvalidBatchRow { row: i });
                return self;
            }
            let values: Vec<String> = columns
                .iter()
                .map(|c| {
                    row.get(c)
                        .map_or_else(|| String::from("NULL"), |v| escape_value(self.dialect(), v))
                })
                .collect();
            literals.push(format!("({})", values.join(",")));
        }

        let keys: Vec<String> = columns
            .iter()
            .map(|c| self.protect_identifiers(c, false, None, true))
            .collect();
        if !self.keys.is_empty() && self.keys != keys {
            self.park(DbError::InvalidBatchRow { row: 0 });
            return self;
        }
        self.keys = keys;
        self.insert_rows.extend(literals);
        self
    }

    /// Queues rows for a batch UPDATE matched on the `index` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MissingMatchKey`] when `index` is empty and
    /// [`DbError::MissingBatchKey`] when a row lacks the `index` column. No
    /// row is queued on error.
    pub fn set_update_batch(&mut self, rows: &[Row], index: &str) -> Result<&mut Self> {
        let index = index.trim();
        if index.is_empty() {
            return Err(DbError::MissingMatchKey);
        }

        let mut batch = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let Some(index_value) = row.get(index) else {
                return Err(DbError::MissingBatchKey {
                    index: String::from(index),
                    row: i,
                });
            };
            let cells = row
                .iter()
                .filter(|(column, _)| *column != index)
                .map(|(column, value)| {
                    (
                        self.protect_identifiers(column, false, None, true),
                        escape_value(self.dialect(), value),
                    )
                })
                .collect();
            batch.push(UpdateBatchRow {
                index_value: escape_value(self.dialect(), index_value),
                cells,
            });
        }

        self.update_index = Some(self.protect_identifiers(index, false, None, true));
        self.update_rows.extend(batch);
        Ok(self)
    }

    fn prepare_write(&mut self) -> Result<()> {
        self.take_error()?;
        self.merge_cache();
        Ok(())
    }

    /// Resolves the target table: the argument, else the first FROM table.
    fn write_table(&self, table: &str) -> Result<String> {
        let table = table.trim();
        if !table.is_empty() {
            return Ok(self.protect_identifiers(table, true, None, false));
        }
        self.live
            .from
            .first()
            .map(|t| self.protect_identifiers(t, true, None, false))
            .ok_or(DbError::MissingTable)
    }

    fn render_insert(&self, verb: &str, table: &str) -> Result<String> {
        if self.live.set.is_empty() {
            return Err(DbError::MissingSet);
        }
        let table = self.write_table(table)?;
        let (keys, values): (Vec<&str>, Vec<&str>) = self
            .live
            .set
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .unzip();
        Ok(format!(
            "{verb} {table} ({}) VALUES ({})",
            keys.join(", "),
            values.join(", ")
        ))
    }

    fn render_update(&self, table: &str) -> Result<String> {
        if self.live.set.is_empty() {
            return Err(DbError::MissingSet);
        }
        let table = self.write_table(table)?;
        let sets: Vec<String> = self
            .live
            .set
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect();
        let mut sql = format!(
            "UPDATE {table} SET {}{}{}",
            sets.join(", "),
            self.compile_conditions(ClauseKind::Where)?,
            self.compile_order_by()
        );
        if let Some(limit) = self.limit {
            sql = self.dialect().write_limit(sql, limit);
        }
        Ok(sql)
    }

    fn render_delete(&self, table: &str) -> Result<String> {
        let table = self.write_table(table)?;
        if self.live.wheres.is_empty() {
            return Err(DbError::DeleteWithoutWhere);
        }
        let mut sql = format!(
            "DELETE FROM {table}{}",
            self.compile_conditions(ClauseKind::Where)?
        );
        if let Some(limit) = self.limit {
            sql = self.dialect().write_limit(sql, limit);
        }
        Ok(sql)
    }

    fn finish_write(&mut self, sql: Result<String>, reset: bool) -> Result<String> {
        if reset {
            self.reset_write();
        }
        sql
    }

    /// Compiles an INSERT from the values given to `set`.
    ///
    /// An empty `table` uses the first FROM table.
    pub fn get_compiled_insert(&mut self, table: &str, reset: bool) -> Result<String> {
        let sql = self.prepare_write().and_then(|()| self.render_insert("INSERT INTO", table));
        self.finish_write(sql, reset)
    }

    /// Compiles an UPDATE from the values given to `set` and the WHERE clause.
    pub fn get_compiled_update(&mut self, table: &str, reset: bool) -> Result<String> {
        let sql = self.prepare_write().and_then(|()| self.render_update(table));
        self.finish_write(sql, reset)
    }

    /// Compiles a DELETE. A WHERE clause is required.
    pub fn get_compiled_delete(&mut self, table: &str, reset: bool) -> Result<String> {
        let sql = self.prepare_write().and_then(|()| self.render_delete(table));
        self.finish_write(sql, reset)
    }

    /// Compiles a REPLACE from the values given to `set`.
    pub fn compile_replace(&mut self, table: &str) -> Result<String> {
        self.prepare_write()?;
        self.render_insert("REPLACE INTO", table)
    }

    /// Compiles `DELETE FROM table` with no WHERE clause.
    pub fn compile_empty_table(&mut self, table: &str) -> Result<String> {
        self.prepare_write()?;
        Ok(format!("DELETE FROM {}", self.write_table(table)?))
    }

    /// Compiles the dialect's TRUNCATE statement.
    pub fn compile_truncate(&mut self, table: &str) -> Result<String> {
        self.prepare_write()?;
        let table = self.write_table(table)?;
        Ok(self.dialect().truncate_statement(&table))
    }

    /// Compiles the queued batch INSERT, one statement per `batch_size` rows.
    pub fn compile_insert_batch(&mut self, table: &str, batch_size: usize) -> Result<Vec<String>> {
        self.prepare_write()?;
        if self.insert_rows.is_empty() {
            return Err(DbError::MissingSet);
        }
        let table = self.write_table(table)?;
        let keys = self.keys.join(", ");
        Ok(self
            .insert_rows
            .chunks(batch_size.max(1))
            .map(|chunk| format!("INSERT INTO {table} ({keys}) VALUES {}", chunk.join(", ")))
            .collect())
    }

    /// Compiles the queued batch UPDATE, one statement per `batch_size` rows.
    ///
    /// Each statement sets every changed column through
    /// `CASE key WHEN id THEN value ... ELSE column END` and is restricted to
    /// its chunk by `key IN(...)`, in addition to any WHERE clause.
    pub fn compile_update_batch(&mut self, table: &str, batch_size: usize) -> Result<Vec<String>> {
        self.prepare_write()?;
        let Some(index) = self.update_index.clone() else {
            return Err(DbError::MissingMatchKey);
        };
        if self.update_rows.is_empty() {
            return Err(DbError::MissingSet);
        }
        let table = self.write_table(table)?;

        let mut statements = Vec::new();
        for chunk in self.update_rows.chunks(batch_size.max(1)) {
            let mut columns: Vec<(&str, Vec<String>)> = Vec::new();
            for row in chunk {
                for (field, value) in &row.cells {
                    let when = format!("WHEN {} THEN {value}", row.index_value);
                    match columns.iter_mut().find(|entry| entry.0 == field.as_str()) {
                        Some(entry) => entry.1.push(when),
                        None => columns.push((field.as_str(), vec![when])),
                    }
                }
            }
            if columns.is_empty() {
                return Err(DbError::MissingSet);
            }

            let cases: Vec<String> = columns
                .iter()
                .map(|(field, whens)| {
                    format!("{field} = CASE {index}\n{}\nELSE {field} END", whens.join("\n"))
                })
                .collect();
            let ids: Vec<&str> = chunk.iter().map(|r| r.index_value.as_str()).collect();
            let restrict = Condition {
                condition: format!("{index} IN({})", ids.join(",")),
                value: None,
                escape: false,
            };

            statements.push(format!(
                "UPDATE {table} SET {}{}",
                cases.join(", "),
                self.compile_where_with(restrict)?
            ));
        }
        Ok(statements)
    }
}
