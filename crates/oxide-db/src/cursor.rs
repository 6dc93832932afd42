//! Buffered result sets.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::{FieldMeta, RowStream};
use crate::error::{DbError, ErrorInfo, Result};
use crate::row::Row;

/// Rows returned by a read statement, with a movable cursor.
///
/// All rows are fetched when the cursor is built, so counting and seeking
/// never touch the backend again. Column metadata is captured at the same
/// time, while the statement handle is still alive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCursor {
    rows: Vec<Row>,
    #[serde(skip)]
    position: usize,
    fields: Option<Vec<FieldMeta>>,
    #[serde(skip)]
    freed: bool,
}

impl ResultCursor {
    /// Wraps rows that carry no column metadata.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Drains a backend row stream.
    ///
    /// # Errors
    ///
    /// Returns the backend error if a fetch fails part way.
    pub fn from_stream(mut stream: Box<dyn RowStream>) -> std::result::Result<Self, ErrorInfo> {
        let fields = stream.fields().ok();
        let mut rows = Vec::new();
        while let Some(row) = stream.next_row()? {
            rows.push(row);
        }
        Ok(Self {
            rows,
            fields,
            ..Self::default()
        })
    }

    /// Attaches column metadata.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldMeta>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the cursor, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Current cursor position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Moves to row `n` and returns it.
    ///
    /// Returns `None` and leaves the position unchanged when `n` is out of
    /// range.
    pub fn seek(&mut self, n: usize) -> Option<&Row> {
        if n >= self.rows.len() {
            return None;
        }
        self.position = n;
        self.rows.get(n)
    }

    /// Moves back to the first row.
    pub fn rewind(&mut self) -> Option<&Row> {
        self.position = 0;
        self.rows.first()
    }

    /// The row under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Row> {
        self.rows.get(self.position)
    }

    /// Moves to the first row.
    pub fn first(&mut self) -> Option<&Row> {
        self.seek(0)
    }

    /// Moves to the last row.
    pub fn last(&mut self) -> Option<&Row> {
        let last = self.rows.len().checked_sub(1)?;
        self.seek(last)
    }

    /// Advances the cursor. Returns `None` at the end.
    pub fn next(&mut self) -> Option<&Row> {
        self.seek(self.position + 1)
    }

    /// Steps the cursor back. Returns `None` at the start.
    pub fn previous(&mut self) -> Option<&Row> {
        let previous = self.position.checked_sub(1)?;
        self.seek(previous)
    }

    /// Deserializes row `n` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ResultFreed`] after [`free`](Self::free), or a
    /// serialization error when the row does not fit `T`.
    pub fn row_as<T: DeserializeOwned>(&self, n: usize) -> Result<Option<T>> {
        self.ensure_live()?;
        self.rows.get(n).map(Row::deserialize).transpose()
    }

    /// Deserializes every row into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ResultFreed`] after [`free`](Self::free), or a
    /// serialization error when a row does not fit `T`.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.ensure_live()?;
        self.rows.iter().map(Row::deserialize).collect()
    }

    /// Serializes the rows, keeping column order and value types, so that
    /// [`from_json`](Self::from_json) restores them exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ResultFreed`] after [`free`](Self::free).
    pub fn to_json(&self) -> Result<String> {
        self.ensure_live()?;
        Ok(serde_json::to_string(&self.rows)?)
    }

    /// Builds a cursor from rows written by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns a serialization error on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<Row> = serde_json::from_str(json)?;
        Ok(Self::from_rows(rows))
    }

    /// Exports the rows as a JSON array of plain objects, one per row.
    ///
    /// Meant for display: blobs become byte arrays and non-finite floats
    /// become `null`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ResultFreed`] after [`free`](Self::free).
    pub fn to_json_objects(&self) -> Result<serde_json::Value> {
        self.ensure_live()?;
        Ok(serde_json::Value::Array(
            self.rows.iter().map(Row::to_json).collect(),
        ))
    }

    /// Column names.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedFeature`] when the backend reported no
    /// metadata, or [`DbError::ResultFreed`] after [`free`](Self::free).
    pub fn field_names(&self) -> Result<Vec<String>> {
        Ok(self
            .field_data()?
            .iter()
            .map(|field| field.name.clone())
            .collect())
    }

    /// Column metadata.
    ///
    /// # Errors
    ///
    /// Same as [`field_names`](Self::field_names).
    pub fn field_data(&self) -> Result<&[FieldMeta]> {
        self.ensure_live()?;
        self.fields
            .as_deref()
            .ok_or(DbError::UnsupportedFeature("field metadata"))
    }

    /// Number of columns, from metadata or else the first row.
    #[must_use]
    pub fn num_fields(&self) -> usize {
        match &self.fields {
            Some(fields) => fields.len(),
            None => self.rows.first().map_or(0, Row::len),
        }
    }

    /// Releases the buffered rows. Calling it again is a no-op.
    pub fn free(&mut self) {
        if self.freed {
            return;
        }
        self.rows = Vec::new();
        self.fields = None;
        self.position = 0;
        self.freed = true;
    }

    /// Returns true once [`free`](Self::free) has run.
    #[must_use]
    pub const fn is_freed(&self) -> bool {
        self.freed
    }

    const fn ensure_live(&self) -> Result<()> {
        if self.freed {
            return Err(DbError::ResultFreed);
        }
        Ok(())
    }
}

impl IntoIterator for ResultCursor {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VecRowStream;
    use crate::value::Value;

    fn cursor() -> ResultCursor {
        ResultCursor::from_rows(vec![
            Row::new().with("id", 1).with("name", "a"),
            Row::new().with("id", 2).with("name", "b"),
            Row::new().with("id", 3).with("name", "c"),
        ])
    }

    fn id(row: Option<&Row>) -> Option<i64> {
        row.and_then(|r| r.get("id")).and_then(crate::Value::as_i64)
    }

    #[test]
    fn test_navigation() {
        let mut c = cursor();
        assert_eq!(c.count(), 3);
        assert_eq!(id(c.current()), Some(1));
        assert_eq!(id(c.previous()), None);
        assert_eq!(id(c.next()), Some(2));
        assert_eq!(id(c.next()), Some(3));
        assert_eq!(id(c.next()), None);
        assert_eq!(c.position(), 2);
        assert_eq!(id(c.previous()), Some(2));
        assert_eq!(id(c.first()), Some(1));
        assert_eq!(id(c.last()), Some(3));
        assert_eq!(id(c.rewind()), Some(1));
    }

    #[test]
    fn test_seek_out_of_range_keeps_position() {
        let mut c = cursor();
        c.seek(1);
        assert!(c.seek(10).is_none());
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn test_empty_cursor() {
        let mut c = ResultCursor::default();
        assert!(c.is_empty());
        assert!(c.first().is_none());
        assert!(c.last().is_none());
        assert_eq!(c.num_fields(), 0);
    }

    #[test]
    fn test_field_metadata() {
        let c = cursor();
        assert!(matches!(
            c.field_names(),
            Err(DbError::UnsupportedFeature(_))
        ));
        assert_eq!(c.num_fields(), 2);

        let c = c.with_fields(vec![FieldMeta::named("id"), FieldMeta::named("name")]);
        assert_eq!(c.field_names().unwrap(), vec!["id", "name"]);
    }

    #[test]
    fn test_from_stream_captures_fields() {
        let stream = VecRowStream::new(vec![Row::new().with("x", 1)])
            .with_fields(vec![FieldMeta::named("x")]);
        let c = ResultCursor::from_stream(Box::new(stream)).unwrap();
        assert_eq!(c.count(), 1);
        assert_eq!(c.field_names().unwrap(), vec!["x"]);
    }

    #[test]
    fn test_free_is_idempotent() {
        let mut c = cursor();
        c.free();
        c.free();
        assert!(c.is_freed());
        assert_eq!(c.count(), 0);
        assert!(matches!(c.to_json(), Err(DbError::ResultFreed)));
        assert!(matches!(c.field_data(), Err(DbError::ResultFreed)));
    }

    #[test]
    fn test_to_json_objects() {
        let c = cursor();
        let json = c.to_json_objects().unwrap();
        assert_eq!(json[1]["name"], "b");
        assert_eq!(json[2]["id"], 3);
    }

    #[test]
    fn test_json_round_trip_keeps_order_and_types() {
        let c = ResultCursor::from_rows(vec![
            Row::new()
                .with("name", "a")
                .with("id", 1)
                .with("data", Value::Blob(vec![1, 2])),
            Row::new()
                .with("name", Value::Null)
                .with("id", 2)
                .with("data", Value::Float(f64::INFINITY)),
        ]);
        let restored = ResultCursor::from_json(&c.to_json().unwrap()).unwrap();
        assert_eq!(restored.rows(), c.rows());
        assert_eq!(restored.rows()[0].get_index(0), Some(&Value::Text(String::from("a"))));
        assert_eq!(restored.rows()[0].get("data"), Some(&Value::Blob(vec![1, 2])));
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            ResultCursor::from_json("[{\"id\": 1}]"),
            Err(DbError::Serialization(_))
        ));
    }
}
