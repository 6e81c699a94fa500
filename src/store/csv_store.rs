//! CSV file store.

use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{RecordStore, StoreError, Table};
use crate::config::DatasetSettings;
use crate::models::Row;

/// A CSV dataset loaded into memory and written back on every change
///
/// Writes go to a temporary file in the target's directory which then replaces
/// the target, so a crash mid-write leaves the previous file intact. If the
/// write fails the in-memory table is rolled back as well.
#[derive(Debug)]
pub struct CsvStore {
    source: PathBuf,
    target: PathBuf,
    delimiter: u8,
    table: Table,
}

impl CsvStore {
    /// Open a CSV file for in-place enrichment
    pub fn open(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, StoreError> {
        let path = path.as_ref();
        Ok(Self {
            source: path.to_path_buf(),
            target: path.to_path_buf(),
            delimiter,
            table: load(path, delimiter)?,
        })
    }

    /// Open a CSV file and write results to a timestamped copy next to it.
    ///
    /// The copy is created immediately, before any row is enriched.
    pub fn open_copy(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self {
            source: path.to_path_buf(),
            target: copy_path(path, Local::now()),
            delimiter,
            table: load(path, delimiter)?,
        };
        store.persist()?;
        Ok(store)
    }

    /// Open according to the dataset settings (in place or copy, delimiter)
    pub fn from_settings(
        path: impl AsRef<Path>,
        settings: &DatasetSettings,
    ) -> Result<Self, StoreError> {
        let delimiter = settings.delimiter_byte().ok_or_else(|| {
            StoreError::Malformed(format!(
                "delimiter must be a single ASCII character, got '{}'",
                settings.delimiter
            ))
        })?;

        if settings.in_place {
            Self::open(path, delimiter)
        } else {
            Self::open_copy(path, delimiter)
        }
    }

    /// The file that was read
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The file that receives writes
    pub fn path(&self) -> &Path {
        &self.target
    }

    /// Current value of one cell
    pub fn cell(&self, index: usize, column: &str) -> Option<&str> {
        self.table.cell(index, column)
    }

    /// Rewrite the target file from the in-memory table
    fn persist(&self) -> Result<(), StoreError> {
        let io_error = |source: std::io::Error| StoreError::Io {
            path: self.target.clone(),
            source,
        };
        let dir = self
            .target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(&mut tmp);
            writer.write_record(self.table.columns())?;
            for record in self.table.records() {
                writer.write_record(record)?;
            }
            writer.flush().map_err(io_error)?;
        }

        // Keep the original file mode instead of the temp file's 0600
        if let Ok(meta) = std::fs::metadata(&self.target) {
            let _ = tmp.as_file().set_permissions(meta.permissions());
        }
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(&self.target).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl RecordStore for CsvStore {
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
        let added = self.table.add_columns(names);
        if added.is_empty() {
            return Ok(added);
        }

        if let Err(e) = self.persist() {
            self.table.drop_trailing_columns(added.len());
            return Err(e);
        }
        tracing::debug!("Added columns {:?} to {}", added, self.target.display());
        Ok(added)
    }

    fn write(&mut self, index: usize, values: &[(String, String)]) -> Result<(), StoreError> {
        let previous = self.table.apply(index, values)?;

        if let Err(e) = self.persist() {
            self.table.restore(index, previous);
            return Err(e);
        }
        Ok(())
    }
}

fn load(path: &Path, delimiter: u8) -> Result<Table, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(record.iter().map(str::to_string).collect());
    }

    let table = Table::new(columns, records)?;
    tracing::debug!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// `<stem>_enriched_<YYYYmmddHHMMSS>.<ext>` in the same directory as `path`
fn copy_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());

    path.with_file_name(format!(
        "{}_enriched_{}.{}",
        stem,
        now.format("%Y%m%d%H%M%S"),
        ext
    ))
}
