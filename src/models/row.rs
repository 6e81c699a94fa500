//! Row and query models.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One record of the dataset under enrichment
///
/// `index` is the 0-based position among data rows (the header is not a row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub index: usize,
    pub cells: Vec<(String, String)>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<(String, String)>) -> Self {
        Self { index, cells }
    }

    /// Get a cell by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// A missing column and a whitespace-only cell both count as blank
    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).map_or(true, |v| v.trim().is_empty())
    }

    /// Spreadsheet row number as users see it (the header is row 1)
    pub fn number(&self) -> usize {
        crate::utils::row_number(self.index)
    }
}

/// Names of the columns a [`Query`] is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumns {
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
}

/// Lookup query derived from one row's input fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
}

impl Query {
    /// Query with only a title
    pub fn from_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Build a query from a row. Columns that are absent from the row are ignored.
    pub fn from_row(row: &Row, columns: &InputColumns) -> Self {
        let cell = |name: Option<&str>| {
            name.and_then(|n| row.get(n))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Self {
            title: cell(Some(&columns.title))
                .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" ")),
            authors: cell(columns.authors.as_deref())
                .map(split_authors)
                .unwrap_or_default(),
            year: cell(columns.year.as_deref()).and_then(parse_year),
            doi: cell(columns.doi.as_deref()).and_then(extract_doi),
        }
    }

    /// True when there is nothing to look up
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.doi.is_none()
    }

    /// Free-text search string sent to backends
    pub fn search_text(&self) -> String {
        self.title.clone().unwrap_or_default()
    }
}

/// Split an author cell on `;` and on the word "and"
pub fn split_authors(cell: &str) -> Vec<String> {
    static AND: OnceLock<Regex> = OnceLock::new();
    let and = AND.get_or_init(|| Regex::new(r"(?i)\s+and\s+|\s*&\s*").expect("valid regex"));

    cell.split(';')
        .flat_map(|part| and.split(part).map(str::to_string).collect::<Vec<_>>())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// First four-digit number in the cell
pub fn parse_year(cell: &str) -> Option<i32> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let year = YEAR.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

    year.captures(cell)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extract a DOI from a bare DOI, a `doi:` prefix, or a doi.org URL (lower-cased)
pub fn extract_doi(cell: &str) -> Option<String> {
    static DOI: OnceLock<Regex> = OnceLock::new();
    let doi = DOI.get_or_init(|| Regex::new(r"(10\.\d{4,9}/[^\s]+)").expect("valid regex"));

    doi.captures(cell)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | ']'))
                .to_lowercase()
        })
}
