//! Configuration management.
//!
//! Every component takes its section of [`Settings`] at construction time;
//! there is no process-wide configuration state.

mod file_config;

pub use file_config::{default_config_path, find_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::{CandidateField, InputColumns};
use crate::utils::RetryConfig;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Lookup backend settings
    #[serde(default)]
    pub lookup: LookupSettings,

    /// Retry settings for lookup calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Match acceptance settings
    #[serde(default)]
    pub matching: MatchSettings,

    /// Which columns are read and written
    #[serde(default)]
    pub enrich: EnrichSettings,

    /// Dataset file handling
    #[serde(default)]
    pub dataset: DatasetSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mut settings = self.clone();
        let mask = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some("********".to_string());
            }
        };
        mask(&mut settings.lookup.semantic_scholar_api_key);
        settings
    }
}

/// Lookup backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSettings {
    /// Backend id: "semantic" or "crossref"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Override the backend's API base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default = "default_semantic_key")]
    pub semantic_scholar_api_key: Option<String>,

    /// Contact address sent to CrossRef's polite pool
    #[serde(default = "default_crossref_mailto")]
    pub crossref_mailto: Option<String>,

    /// Requests per second; 0 disables client-side pacing
    #[serde(default = "default_rps")]
    pub requests_per_second: f32,

    /// Number of candidates requested per title search
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: None,
            semantic_scholar_api_key: default_semantic_key(),
            crossref_mailto: default_crossref_mailto(),
            requests_per_second: default_rps(),
            max_candidates: default_max_candidates(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LookupSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_backend() -> String {
    "semantic".to_string()
}

fn default_semantic_key() -> Option<String> {
    std::env::var("SEMANTIC_SCHOLAR_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

fn default_crossref_mailto() -> Option<String> {
    std::env::var("CROSSREF_MAILTO").ok().filter(|m| !m.is_empty())
}

fn default_rps() -> f32 {
    1.0
}

fn default_max_candidates() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

/// Retry configuration for transient lookup failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of calls per lookup, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetrySettings {
    /// Build the runtime retry policy; each attempt is bounded by `attempt_timeout`
    pub fn to_retry_config(&self, attempt_timeout: Duration) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            attempt_timeout,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// What to do when several candidates are too close to call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Mark the row as failed
    #[default]
    Fail,
    /// Accept the highest-scoring contender anyway
    TakeBest,
}

/// Match acceptance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Minimum score for the best candidate to be accepted
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Runner-up scores within this distance of the best make the match ambiguous
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f64,

    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,

    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    #[serde(default = "default_author_weight")]
    pub author_weight: f64,

    #[serde(default = "default_year_weight")]
    pub year_weight: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            tie_margin: default_tie_margin(),
            ambiguity: AmbiguityPolicy::default(),
            title_weight: default_title_weight(),
            author_weight: default_author_weight(),
            year_weight: default_year_weight(),
        }
    }
}

fn default_threshold() -> f64 {
    0.85
}

fn default_tie_margin() -> f64 {
    0.05
}

fn default_title_weight() -> f64 {
    0.7
}

fn default_author_weight() -> f64 {
    0.2
}

fn default_year_weight() -> f64 {
    0.1
}

/// Input and output column configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichSettings {
    #[serde(default = "default_title_column")]
    pub title_column: String,

    #[serde(default = "default_authors_column")]
    pub authors_column: Option<String>,

    #[serde(default = "default_year_column")]
    pub year_column: Option<String>,

    #[serde(default = "default_doi_column")]
    pub doi_column: Option<String>,

    /// Metadata fields written to the dataset
    #[serde(default = "default_output_fields")]
    pub output_fields: Vec<CandidateField>,

    /// Prepended to each output field key to form its column name
    #[serde(default)]
    pub column_prefix: String,

    /// Column holding the matched marker or the failure sentinel
    #[serde(default = "default_status_column")]
    pub status_column: String,

    #[serde(default = "default_matched_marker")]
    pub matched_marker: String,

    /// Prefix of the status value written for unresolved rows
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Re-process rows whose outputs are already filled
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            title_column: default_title_column(),
            authors_column: default_authors_column(),
            year_column: default_year_column(),
            doi_column: default_doi_column(),
            output_fields: default_output_fields(),
            column_prefix: String::new(),
            status_column: default_status_column(),
            matched_marker: default_matched_marker(),
            sentinel: default_sentinel(),
            overwrite: false,
        }
    }
}

impl EnrichSettings {
    /// Columns the query is built from
    pub fn input_columns(&self) -> InputColumns {
        InputColumns {
            title: self.title_column.clone(),
            authors: self.authors_column.clone().filter(|c| !c.is_empty()),
            year: self.year_column.clone().filter(|c| !c.is_empty()),
            doi: self.doi_column.clone().filter(|c| !c.is_empty()),
        }
    }

    /// Output field to column name pairs, in configured order
    pub fn output_columns(&self) -> Vec<(CandidateField, String)> {
        self.output_fields
            .iter()
            .map(|field| (*field, format!("{}{}", self.column_prefix, field.key())))
            .collect()
    }
}

fn default_title_column() -> String {
    "paper_title".to_string()
}

fn default_authors_column() -> Option<String> {
    Some("authors".to_string())
}

fn default_year_column() -> Option<String> {
    Some("year".to_string())
}

fn default_doi_column() -> Option<String> {
    Some("doi".to_string())
}

fn default_output_fields() -> Vec<CandidateField> {
    vec![
        CandidateField::PaperId,
        CandidateField::Doi,
        CandidateField::Abstract,
        CandidateField::Venue,
        CandidateField::CitationCount,
    ]
}

fn default_status_column() -> String {
    "enrichment_status".to_string()
}

fn default_matched_marker() -> String {
    "matched".to_string()
}

fn default_sentinel() -> String {
    "UNRESOLVED".to_string()
}

/// Dataset file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Write results into the input file instead of a timestamped copy
    #[serde(default = "default_true")]
    pub in_place: bool,

    /// Single-character field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Row selection, e.g. "2:10,12,15:"
    #[serde(default = "default_rows")]
    pub rows: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            in_place: true,
            delimiter: default_delimiter(),
            rows: default_rows(),
        }
    }
}

impl DatasetSettings {
    /// Delimiter as a byte, if it is a single ASCII character
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_rows() -> String {
    ":".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" for structured output, anything else for human-readable
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with `PAPER_ENRICH__SECTION__KEY` environment overrides
pub fn load_config(path: &Path) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Load configuration from environment overrides and defaults only
pub fn load_from_env() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("PAPER_ENRICH")
        .separator("__")
        .try_parsing(true)
}
