//! # paper-enrich
//!
//! Incremental enrichment of tabular paper records (CSV) with metadata from
//! bibliographic APIs such as Semantic Scholar and CrossRef.
//!
//! Rows are processed one at a time. Each accepted match is persisted before the
//! next row starts, rows that are already filled are skipped, and rows that
//! cannot be resolved get a sentinel in their status column so a rerun only
//! targets them.
//!
//! ## Architecture
//!
//! - [`models`]: Rows, queries, candidates, verdicts and reports
//! - [`store`]: Record stores (CSV file, in-memory) with atomic per-row writes
//! - [`lookup`]: Backend trait, HTTP backends and the retrying lookup client
//! - [`matching`]: Candidate scoring and match resolution
//! - [`driver`]: The per-row enrichment state machine
//! - [`config`]: Configuration management
//! - [`utils`]: Retry, HTTP, rate limiting, row selections and progress

pub mod config;
pub mod driver;
pub mod lookup;
pub mod matching;
pub mod models;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use driver::{EnrichError, EnrichmentDriver};
pub use lookup::{Lookup, LookupClient, LookupError};
pub use matching::MatchResolver;
pub use models::{Candidate, EnrichReport, Row};
pub use store::{CsvStore, MemoryStore, RecordStore, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
