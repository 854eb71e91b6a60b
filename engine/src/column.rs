//! FILENAME: engine/src/column.rs
//! Column metadata - the per-field configuration the pipeline reads.

use serde::{Deserialize, Serialize};

/// Declared data type of a column. Drives coercion in typed sorting and
/// relational filtering; columns without a declaration default to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    Text,
    Number,
    Date,
    Bool,
}

/// Metadata for a single column (field) of the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Field name used to address values inside a row.
    pub field: String,

    /// Display title (defaults to the field name when absent).
    #[serde(default)]
    pub title: Option<String>,

    /// Declared type for coercion.
    #[serde(default)]
    pub data_type: DataType,

    /// Whether the quick filter and the search index look at this column.
    #[serde(default = "default_true")]
    pub searchable: bool,

    /// Whether sort descriptors may target this column.
    #[serde(default = "default_true")]
    pub sortable: bool,

    /// Whether group descriptors may target this column.
    #[serde(default = "default_true")]
    pub groupable: bool,

    /// Relative weight applied to search scores from this column.
    #[serde(default = "default_weight")]
    pub search_weight: f32,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

impl ColumnMeta {
    pub fn new(field: impl Into<String>, data_type: DataType) -> Self {
        ColumnMeta {
            field: field.into(),
            title: None,
            data_type,
            searchable: true,
            sortable: true,
            groupable: true,
            search_weight: 1.0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn with_search_weight(mut self, weight: f32) -> Self {
        self.search_weight = weight;
        self
    }

    /// Display title, falling back to the field name.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let col = ColumnMeta::new("age", DataType::Number);
        assert!(col.searchable);
        assert!(col.sortable);
        assert_eq!(col.search_weight, 1.0);
        assert_eq!(col.title(), "age");
    }

    #[test]
    fn test_serde_defaults_fill_in() {
        let col: ColumnMeta = serde_json::from_str(r#"{"field":"name"}"#).unwrap();
        assert_eq!(col.data_type, DataType::Text);
        assert!(col.searchable);
        assert_eq!(col.search_weight, 1.0);
    }
}
