//! Tabular record batches
//!
//! The record-conversion collaborator hands over data as column batches: a
//! mapping from column name to a typed column, with a per-cell mask. The
//! engine consumes these and never touches raw files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// One typed column; `None` cells are masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_masked(&self, row: usize) -> bool {
        match self {
            ColumnValues::Int(v) => v.get(row).map_or(true, Option::is_none),
            ColumnValues::Float(v) => v.get(row).map_or(true, Option::is_none),
            ColumnValues::Text(v) => v.get(row).map_or(true, Option::is_none),
        }
    }
}

/// A rectangular batch of rows for one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBatch {
    columns: BTreeMap<String, ColumnValues>,
    nrows: usize,
}

impl TableBatch {
    pub fn new() -> TableBatch {
        TableBatch::default()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Add a column. Every column in a batch must have the same length.
    pub fn push_column(&mut self, name: &str, values: ColumnValues) -> Result<(), BatchError> {
        if !self.columns.is_empty() && values.len() != self.nrows {
            return Err(BatchError::ColumnLength {
                column: name.to_string(),
                expected: self.nrows,
                actual: values.len(),
            });
        }
        self.nrows = values.len();
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&ColumnValues, BatchError> {
        self.columns.get(name).ok_or_else(|| BatchError::UnknownColumn {
            column: name.to_string(),
        })
    }

    pub fn int_column(&self, name: &str) -> Result<&[Option<i64>], BatchError> {
        match self.column(name)? {
            ColumnValues::Int(v) => Ok(v),
            other => Err(BatchError::type_mismatch(name, "int", other)),
        }
    }

    pub fn float_column(&self, name: &str) -> Result<&[Option<f64>], BatchError> {
        match self.column(name)? {
            ColumnValues::Float(v) => Ok(v),
            other => Err(BatchError::type_mismatch(name, "float", other)),
        }
    }

    pub fn text_column(&self, name: &str) -> Result<&[Option<String>], BatchError> {
        match self.column(name)? {
            ColumnValues::Text(v) => Ok(v),
            other => Err(BatchError::type_mismatch(name, "text", other)),
        }
    }
}

impl BatchError {
    fn type_mismatch(column: &str, expected: &'static str, actual: &ColumnValues) -> BatchError {
        BatchError::TypeMismatch {
            column: column.to_string(),
            expected,
            actual: match actual {
                ColumnValues::Int(_) => "int",
                ColumnValues::Float(_) => "float",
                ColumnValues::Text(_) => "text",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_batch() -> TableBatch {
        let mut batch = TableBatch::new();
        batch
            .push_column("tileid", ColumnValues::Int(vec![Some(80615), Some(80616)]))
            .unwrap();
        batch
            .push_column(
                "efftime_spec",
                ColumnValues::Float(vec![Some(120.0), None]),
            )
            .unwrap();
        batch
    }

    #[test]
    fn test_batch_accessors() {
        let batch = make_test_batch();
        assert_eq!(batch.nrows(), 2);
        assert_eq!(batch.int_column("tileid").unwrap()[0], Some(80615));
        assert!(batch.column("efftime_spec").unwrap().is_masked(1));
        assert!(!batch.column("tileid").unwrap().is_masked(0));
    }

    #[test]
    fn test_ragged_column_rejected() {
        let mut batch = make_test_batch();
        let err = batch
            .push_column("night", ColumnValues::Int(vec![Some(20210610)]))
            .unwrap_err();
        assert!(matches!(err, BatchError::ColumnLength { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_type_mismatch() {
        let batch = make_test_batch();
        assert!(batch.float_column("tileid").is_err());
        assert!(batch.int_column("missing").is_err());
    }
}
