//! Data models for enrichment.

mod candidate;
mod outcome;
mod row;

pub use candidate::{Candidate, CandidateBuilder, CandidateField};
pub use outcome::{EnrichReport, MatchResult, RowFailure, RowOutcome, RowState};
pub use row::{extract_doi, parse_year, split_authors, InputColumns, Query, Row};
