//! In-memory store.

use super::{RecordStore, StoreError, Table};
use crate::models::Row;

/// An in-memory dataset, mostly for tests
///
/// Writes can be made to fail after a number of successes to simulate a disk
/// going away mid-batch.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Table,
    writes: usize,
    fail_after: Option<usize>,
}

impl MemoryStore {
    /// Build a store from column names and records
    pub fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Result<Self, StoreError> {
        Ok(Self {
            table: Table::new(columns, records)?,
            writes: 0,
            fail_after: None,
        })
    }

    /// Convenience constructor from string slices
    pub fn from_rows(columns: &[&str], records: &[&[&str]]) -> Result<Self, StoreError> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            records
                .iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    /// Let `n` more row writes succeed, then fail every one after that
    pub fn fail_writes_after(&mut self, n: usize) {
        self.fail_after = Some(self.writes + n);
    }

    /// Number of successful row writes
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn cell(&self, index: usize, column: &str) -> Option<&str> {
        self.table.cell(index, column)
    }
}

impl RecordStore for MemoryStore {
    fn columns(&self) -> &[String] {
        self.table.columns()
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn row(&self, index: usize) -> Result<Row, StoreError> {
        self.table.row(index)
    }

    fn ensure_columns(&mut self, names: &[String]) -> Result<Vec<String>, StoreError> {
        Ok(self.table.add_columns(names))
    }

    fn write(&mut self, index: usize, values: &[(String, String)]) -> Result<(), StoreError> {
        if self.fail_after.is_some_and(|limit| self.writes >= limit) {
            return Err(StoreError::Fault(format!(
                "injected failure writing row index {}",
                index
            )));
        }

        self.table.apply(index, values)?;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RowSelection;

    fn store() -> MemoryStore {
        MemoryStore::from_rows(
            &["paper_title", "doi"],
            &[&["A", ""], &["B", ""], &["C", "10.1/c"]],
        )
        .unwrap()
    }

    #[test]
    fn test_read_selection() {
        let store = store();
        let rows = store.read(&"3:5".parse::<RowSelection>().unwrap()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[1].get("doi"), Some("10.1/c"));
    }

    #[test]
    fn test_injected_write_fault() {
        let mut store = store();
        store.fail_writes_after(1);

        store
            .write(0, &[("doi".to_string(), "10.1/a".to_string())])
            .unwrap();
        let err = store
            .write(1, &[("doi".to_string(), "10.1/b".to_string())])
            .unwrap_err();

        assert!(matches!(err, StoreError::Fault(_)));
        assert_eq!(store.cell(0, "doi"), Some("10.1/a"));
        assert_eq!(store.cell(1, "doi"), Some(""));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_ensure_columns_is_idempotent() {
        let mut store = store();
        let names = vec!["venue".to_string(), "doi".to_string()];

        assert_eq!(store.ensure_columns(&names).unwrap(), vec!["venue"]);
        assert!(store.ensure_columns(&names).unwrap().is_empty());
        assert_eq!(store.cell(2, "venue"), Some(""));
    }
}
