//! Row selection parsing.
//!
//! Selections are comma-separated items of the form `N`, `A:B`, `A:`, `:B` or `:`.
//! Numbers follow spreadsheet rows: the header is row 1, so the first data row
//! is row 2. Ranges are inclusive. An empty selection or `:` selects every row.

use std::collections::BTreeSet;
use std::str::FromStr;

/// Spreadsheet row number of the first data row (row 1 is the header)
pub const FIRST_DATA_ROW: usize = 2;

/// Spreadsheet row number of the 0-based data row `index`
pub fn row_number(index: usize) -> usize {
    index + FIRST_DATA_ROW
}

/// Errors produced while parsing a row selection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid row number '{0}' in row selection")]
    InvalidNumber(String),

    #[error("Row {0} is the header; data starts at row 2")]
    Header(usize),

    #[error("Row range {start}:{end} is reversed")]
    Reversed { start: usize, end: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Single(usize),
    Span {
        start: Option<usize>,
        end: Option<usize>,
    },
}

/// A parsed row selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSelection {
    items: Vec<Item>,
}

/// Rows a selection resolves to against a dataset of known length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRows {
    /// 0-based indexes present in the dataset, ascending, without duplicates
    pub indexes: Vec<usize>,
    /// Row numbers that were selected but do not exist
    pub out_of_range: Vec<usize>,
}

impl RowSelection {
    /// Select every row
    pub fn all() -> Self {
        Self {
            items: vec![Item::Span {
                start: None,
                end: None,
            }],
        }
    }

    /// Select one row by its spreadsheet number
    pub fn single(number: usize) -> Self {
        Self {
            items: vec![Item::Single(number)],
        }
    }

    /// Select an inclusive span of spreadsheet rows
    pub fn span(start: usize, end: usize) -> Self {
        Self {
            items: vec![Item::Span {
                start: Some(start),
                end: Some(end),
            }],
        }
    }

    /// Resolve against a dataset with `len` data rows
    pub fn resolve(&self, len: usize) -> ResolvedRows {
        let mut indexes = BTreeSet::new();
        let mut out_of_range = BTreeSet::new();

        for item in &self.items {
            let (start, end) = match *item {
                Item::Single(n) => (n, n),
                Item::Span { start, end } => (
                    start.unwrap_or(FIRST_DATA_ROW),
                    end.unwrap_or(row_number(len) - 1),
                ),
            };
            for number in start..=end {
                let index = number - FIRST_DATA_ROW;
                if index < len {
                    indexes.insert(index);
                } else {
                    out_of_range.insert(number);
                }
            }
        }

        ResolvedRows {
            indexes: indexes.into_iter().collect(),
            out_of_range: out_of_range.into_iter().collect(),
        }
    }
}

impl Default for RowSelection {
    fn default() -> Self {
        Self::all()
    }
}

fn parse_number(s: &str) -> Result<usize, RangeError> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| RangeError::InvalidNumber(s.trim().to_string()))?;
    if n < FIRST_DATA_ROW {
        return Err(RangeError::Header(n));
    }
    Ok(n)
}

impl FromStr for RowSelection {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = Vec::new();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((left, right)) = part.split_once(':') {
                let start = match left.trim() {
                    "" => None,
                    l => Some(parse_number(l)?),
                };
                let end = match right.trim() {
                    "" => None,
                    r => Some(parse_number(r)?),
                };
                if let (Some(start), Some(end)) = (start, end) {
                    if start > end {
                        return Err(RangeError::Reversed { start, end });
                    }
                }
                items.push(Item::Span { start, end });
            } else {
                items.push(Item::Single(parse_number(part)?));
            }
        }

        if items.is_empty() {
            return Ok(Self::all());
        }
        Ok(Self { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_selection() {
        let selection: RowSelection = "2:4,7,9:".parse().unwrap();
        let rows = selection.resolve(10);
        assert_eq!(rows.indexes, vec![0, 1, 2, 5, 7, 8, 9]);
        assert!(rows.out_of_range.is_empty());
    }

    #[test]
    fn test_empty_and_colon_select_all() {
        for s in ["", ":", " , "] {
            let selection: RowSelection = s.parse().unwrap();
            assert_eq!(selection.resolve(3).indexes, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_constructors_match_parsed_forms() {
        assert_eq!(RowSelection::span(2, 4), "2:4".parse().unwrap());
        assert_eq!(RowSelection::single(3), "3".parse().unwrap());
        assert_eq!(RowSelection::default(), RowSelection::all());
    }

    #[test]
    fn test_overlapping_items_are_deduplicated() {
        let selection: RowSelection = ":3,2,3:4".parse().unwrap();
        assert_eq!(selection.resolve(5).indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_rows_are_reported() {
        let selection: RowSelection = "3,6:7".parse().unwrap();
        let rows = selection.resolve(4);
        assert_eq!(rows.indexes, vec![1]);
        assert_eq!(rows.out_of_range, vec![6, 7]);
    }

    #[test]
    fn test_numbers_follow_spreadsheet_rows() {
        let rows = "2,5:".parse::<RowSelection>().unwrap().resolve(4);
        assert_eq!(rows.indexes, vec![0, 3]);
        assert!(rows.out_of_range.is_empty());

        let rows = ":3".parse::<RowSelection>().unwrap().resolve(4);
        assert_eq!(rows.indexes, vec![0, 1]);

        assert_eq!(row_number(0), 2);
        assert_eq!(RowSelection::single(5).resolve(4).indexes, vec![3]);
        assert_eq!(RowSelection::single(6).resolve(4).out_of_range, vec![6]);
    }

    #[test]
    fn test_invalid_selections() {
        assert_eq!(
            "a:3".parse::<RowSelection>(),
            Err(RangeError::InvalidNumber("a".to_string()))
        );
        assert_eq!("0".parse::<RowSelection>(), Err(RangeError::Header(0)));
        assert_eq!("1:4".parse::<RowSelection>(), Err(RangeError::Header(1)));
        assert_eq!(
            "5:2".parse::<RowSelection>(),
            Err(RangeError::Reversed { start: 5, end: 2 })
        );
    }
}
