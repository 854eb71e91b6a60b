//! FILENAME: engine/src/row.rs
//! Rows and datasets - the raw material the pipeline consumes.
//!
//! A `DataSet` owns the column metadata and the row storage. The pipeline
//! never mutates rows; every stage works on row positions (`u32` indices
//! into the dataset) so the derived structures stay cheap to rebuild.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::column::ColumnMeta;
use crate::value::RowValue;

/// A single record, stored as ordered values matching the dataset's columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// The original position in the source data (0-based).
    pub source_row: u32,

    /// Values indexed by column position.
    pub values: Vec<RowValue>,
}

/// Externally stable identity for a record, independent of its position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKey {
    Int(i64),
    Text(String),
    /// Positional fallback when no id-like field exists.
    Index(u32),
}

/// The in-memory dataset: column metadata plus row storage.
///
/// `revision` bumps whenever the rows are replaced; derived caches (the
/// search index, query result cache) compare against it to decide whether
/// they are stale.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    columns: Vec<ColumnMeta>,
    field_to_index: FxHashMap<String, usize>,
    rows: Vec<Row>,
    revision: u64,
}

impl DataSet {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        let field_to_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.field.clone(), i))
            .collect();
        DataSet {
            columns,
            field_to_index,
            rows: Vec::new(),
            revision: 0,
        }
    }

    /// Builds a dataset from pre-shaped rows in one pass.
    pub fn from_rows(columns: Vec<ColumnMeta>, rows: Vec<Vec<RowValue>>) -> Self {
        let mut data = DataSet::new(columns);
        for values in rows {
            data.push_row(values);
        }
        data
    }

    /// Appends a record. Missing trailing values are padded with `Empty`,
    /// extra values are truncated to the column count.
    pub fn push_row(&mut self, mut values: Vec<RowValue>) {
        values.resize(self.columns.len(), RowValue::Empty);
        let source_row = self.rows.len() as u32;
        self.rows.push(Row { source_row, values });
    }

    /// Replaces the entire row set and bumps the revision, invalidating
    /// derived caches on their next use.
    pub fn replace_rows(&mut self, rows: Vec<Vec<RowValue>>) {
        self.rows.clear();
        for values in rows {
            self.push_row(values);
        }
        self.revision += 1;
    }

    /// Replaces the column set (and field lookup) and bumps the revision.
    pub fn replace_columns(&mut self, columns: Vec<ColumnMeta>) {
        self.field_to_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.field.clone(), i))
            .collect();
        self.columns = columns;
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: u32) -> Option<&Row> {
        self.rows.get(index as usize)
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.field_to_index.get(field).copied()
    }

    pub fn column(&self, field: &str) -> Option<&ColumnMeta> {
        self.column_index(field).map(|i| &self.columns[i])
    }

    /// Value of `field` in row `index`; `None` when either is unknown.
    pub fn value(&self, index: u32, field: &str) -> Option<&RowValue> {
        let col = self.column_index(field)?;
        self.rows.get(index as usize)?.values.get(col)
    }

    /// Value of `field` within an already-fetched row.
    pub fn value_in<'a>(&self, row: &'a Row, field: &str) -> Option<&'a RowValue> {
        let col = self.column_index(field)?;
        row.values.get(col)
    }

    /// Columns the quick filter and search index consult.
    pub fn searchable_columns(&self) -> impl Iterator<Item = (usize, &ColumnMeta)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.searchable)
    }
}

/// Fields probed, in order, by the default row-key extractor.
const ID_FIELDS: [&str; 3] = ["id", "key", "uuid"];

/// Default row-key extraction: the first non-blank id-like field wins
/// (integral numbers become `Int`, text becomes `Text`), otherwise the row
/// position is the identity.
pub fn default_row_key(data: &DataSet, index: u32) -> RowKey {
    for field in ID_FIELDS {
        let hit = data
            .columns()
            .iter()
            .position(|c| c.field.eq_ignore_ascii_case(field));
        let Some(col) = hit else { continue };
        let Some(row) = data.row(index) else { continue };
        match row.values.get(col) {
            Some(RowValue::Number(n)) if n.fract() == 0.0 && n.is_finite() => {
                return RowKey::Int(*n as i64);
            }
            Some(RowValue::Text(s)) if !s.is_empty() => {
                return RowKey::Text(s.clone());
            }
            _ => {}
        }
    }
    RowKey::Index(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::DataType;

    fn create_test_data() -> DataSet {
        DataSet::from_rows(
            vec![
                ColumnMeta::new("id", DataType::Number),
                ColumnMeta::new("name", DataType::Text),
            ],
            vec![
                vec![RowValue::Number(1.0), RowValue::text("Ada")],
                vec![RowValue::Number(2.0), RowValue::text("Grace")],
            ],
        )
    }

    #[test]
    fn test_field_lookup() {
        let data = create_test_data();
        assert_eq!(data.column_index("name"), Some(1));
        assert_eq!(data.column_index("missing"), None);
        assert_eq!(data.value(1, "name"), Some(&RowValue::text("Grace")));
        assert_eq!(data.value(9, "name"), None);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut data = create_test_data();
        data.push_row(vec![RowValue::Number(3.0)]);
        assert_eq!(data.value(2, "name"), Some(&RowValue::Empty));
    }

    #[test]
    fn test_revision_bumps_on_replace() {
        let mut data = create_test_data();
        let before = data.revision();
        data.replace_rows(vec![vec![RowValue::Number(9.0), RowValue::text("Joan")]]);
        assert_eq!(data.revision(), before + 1);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_default_row_key_fallbacks() {
        let data = create_test_data();
        assert_eq!(default_row_key(&data, 0), RowKey::Int(1));

        let keyless = DataSet::from_rows(
            vec![ColumnMeta::new("name", DataType::Text)],
            vec![vec![RowValue::text("Ada")]],
        );
        assert_eq!(default_row_key(&keyless, 0), RowKey::Index(0));
    }
}
