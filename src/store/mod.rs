//! Record stores hold the dataset being enriched.
//!
//! A [`RecordStore`] exposes rows by 0-based index and accepts per-row writes.
//! Every `write` is atomic: all named cells land, or none do, and the change is
//! persisted before the call returns.
//!
//! # Stores
//!
//! - [`CsvStore`] - a CSV file, rewritten through a temporary file on each write
//! - [`MemoryStore`] - an in-memory table with injectable write faults

mod csv_store;
mod memory;

pub use csv_store::CsvStore;
pub use memory::MemoryStore;

use std::collections::HashSet;
use std::path::PathBuf;

use crate::models::Row;
use crate::utils::{ResolvedRows, RowSelection};

/// Errors raised by record stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed dataset: {0}")]
    Malformed(String),

    #[error("Duplicate column names: {}", .0.join(", "))]
    DuplicateHeaders(Vec<String>),

    #[error("Row index {index} is out of bounds ({len} rows)")]
    RowOutOfBounds { index: usize, len: usize },

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// Injected failure (see [`MemoryStore::fail_writes_after`])
    #[error("Write fault: {0}")]
    Fault(String),
}

/// Tabular dataset the enrichment driver reads from and writes to
pub trait RecordStore {
    /// Column names in file order
    fn columns(&self) -> &[String];

    /// Number of data rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one row by 0-based index
    fn row(&self, index: usize) -> Result<Row, StoreError>;

    /// Append any missing columns (with empty cells) and persist.
    ///
    /// Returns the names that were added.
    fn ensure_columns(&mut self, names: &[String]) -> Result<Vec<String>, StoreError>;

    /// Set cells of one row atomically and persist before returning
    fn write(&mut self, index: usize, values: &[(String, String)]) -> Result<(), StoreError>;

    fn has_column(&self, name: &str) -> bool {
        self.columns().iter().any(|c| c == name)
    }

    /// Read every selected row that exists; rows past the end are skipped
    fn read(&self, selection: &RowSelection) -> Result<Vec<Row>, StoreError> {
        let ResolvedRows { indexes, .. } = selection.resolve(self.len());
        indexes.into_iter().map(|i| self.row(i)).collect()
    }
}

/// Column names plus string cells, shared by the store implementations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Table {
    columns: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Table {
    /// Validate headers and normalize record widths.
    ///
    /// Short records are padded with empty cells; long records are malformed.
    pub(crate) fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Result<Self, StoreError> {
        validate_headers(&columns)?;

        let width = columns.len();
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                if record.len() > width {
                    return Err(StoreError::Malformed(format!(
                        "row {} has {} fields but the header has {}",
                        i + 1,
                        record.len(),
                        width
                    )));
                }
                record.resize(width, String::new());
                Ok(record)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns, records })
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub(crate) fn row(&self, index: usize) -> Result<Row, StoreError> {
        let record = self.records.get(index).ok_or(StoreError::RowOutOfBounds {
            index,
            len: self.records.len(),
        })?;

        Ok(Row::new(
            index,
            self.columns
                .iter()
                .cloned()
                .zip(record.iter().cloned())
                .collect(),
        ))
    }

    pub(crate) fn cell(&self, index: usize, column: &str) -> Option<&str> {
        let pos = self.position(column)?;
        self.records.get(index).map(|r| r[pos].as_str())
    }

    /// Append missing columns, returning the ones added
    pub(crate) fn add_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for name in names {
            if self.position(name).is_none() && !added.contains(name) {
                added.push(name.clone());
            }
        }
        if !added.is_empty() {
            self.columns.extend(added.iter().cloned());
            let width = self.columns.len();
            for record in &mut self.records {
                record.resize(width, String::new());
            }
        }
        added
    }

    /// Undo [`Table::add_columns`]
    pub(crate) fn drop_trailing_columns(&mut self, count: usize) {
        let width = self.columns.len().saturating_sub(count);
        self.columns.truncate(width);
        for record in &mut self.records {
            record.truncate(width);
        }
    }

    /// Set cells of one row, returning the previous values for [`Table::restore`].
    ///
    /// Every column is resolved before anything changes.
    pub(crate) fn apply(
        &mut self,
        index: usize,
        values: &[(String, String)],
    ) -> Result<Vec<(usize, String)>, StoreError> {
        let len = self.records.len();
        if index >= len {
            return Err(StoreError::RowOutOfBounds { index, len });
        }

        let positions = values
            .iter()
            .map(|(column, _)| {
                self.position(column)
                    .ok_or_else(|| StoreError::UnknownColumn(column.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let record = &mut self.records[index];
        let mut previous = Vec::with_capacity(values.len());
        for (pos, (_, value)) in positions.into_iter().zip(values) {
            previous.push((pos, std::mem::replace(&mut record[pos], value.clone())));
        }
        Ok(previous)
    }

    pub(crate) fn restore(&mut self, index: usize, previous: Vec<(usize, String)>) {
        if let Some(record) = self.records.get_mut(index) {
            for (pos, value) in previous.into_iter().rev() {
                record[pos] = value;
            }
        }
    }
}

/// Reject empty and repeated header names
fn validate_headers(columns: &[String]) -> Result<(), StoreError> {
    if columns.is_empty() {
        return Err(StoreError::Malformed("no header row".to_string()));
    }
    if let Some(pos) = columns.iter().position(|c| c.trim().is_empty()) {
        return Err(StoreError::Malformed(format!(
            "column {} has an empty name",
            pos + 1
        )));
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for column in columns {
        if !seen.insert(column.as_str()) && !duplicates.contains(column) {
            duplicates.push(column.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(StoreError::DuplicateHeaders(duplicates));
    }
    Ok(())
}
