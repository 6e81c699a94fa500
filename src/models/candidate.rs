//! Candidate model representing one metadata record returned by a lookup backend.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A metadata field that can be written back into the dataset.
///
/// Keys follow the Semantic Scholar field names so configuration files read
/// naturally to anyone who has used that API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateField {
    #[serde(rename = "paperId")]
    PaperId,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "authors")]
    Authors,
    #[serde(rename = "abstract")]
    Abstract,
    #[serde(rename = "year")]
    Year,
    #[serde(rename = "venue")]
    Venue,
    #[serde(rename = "doi")]
    Doi,
    #[serde(rename = "citationCount")]
    CitationCount,
    #[serde(rename = "url")]
    Url,
}

impl CandidateField {
    /// All fields, in the order they are documented
    pub const ALL: [CandidateField; 9] = [
        CandidateField::PaperId,
        CandidateField::Title,
        CandidateField::Authors,
        CandidateField::Abstract,
        CandidateField::Year,
        CandidateField::Venue,
        CandidateField::Doi,
        CandidateField::CitationCount,
        CandidateField::Url,
    ];

    /// Returns the stable key of this field (also the default column name)
    pub fn key(&self) -> &'static str {
        match self {
            CandidateField::PaperId => "paperId",
            CandidateField::Title => "title",
            CandidateField::Authors => "authors",
            CandidateField::Abstract => "abstract",
            CandidateField::Year => "year",
            CandidateField::Venue => "venue",
            CandidateField::Doi => "doi",
            CandidateField::CitationCount => "citationCount",
            CandidateField::Url => "url",
        }
    }
}

impl std::fmt::Display for CandidateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for CandidateField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CandidateField::ALL
            .iter()
            .copied()
            .find(|field| field.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "unknown field '{}' (expected one of: {})",
                    wanted,
                    CandidateField::ALL
                        .iter()
                        .map(|f| f.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// One record returned by a bibliographic lookup
///
/// Candidates are ephemeral: they are scored against a row and, if accepted,
/// rendered into cell values. They are never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Backend-specific identifier (Semantic Scholar paper id, DOI for CrossRef)
    pub external_id: String,

    /// Paper title
    pub title: String,

    /// Author display names, in publication order
    pub authors: Vec<String>,

    /// Abstract text
    pub abstract_text: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Journal or conference name
    pub venue: Option<String>,

    /// Digital Object Identifier (lower-cased)
    pub doi: Option<String>,

    /// Number of citing papers known to the backend
    pub citation_count: Option<u64>,

    /// Landing page URL
    pub url: Option<String>,

    /// Id of the backend that produced this candidate
    pub source: String,
}

impl Candidate {
    /// Create a new candidate with required fields
    pub fn new(external_id: String, title: String, source: String) -> Self {
        Self {
            external_id,
            title,
            authors: Vec::new(),
            abstract_text: None,
            year: None,
            venue: None,
            doi: None,
            citation_count: None,
            url: None,
            source,
        }
    }

    /// Render one field as a cell value; absent values become empty strings
    pub fn field_value(&self, field: CandidateField) -> String {
        match field {
            CandidateField::PaperId => self.external_id.clone(),
            CandidateField::Title => self.title.clone(),
            CandidateField::Authors => self.authors.join("; "),
            CandidateField::Abstract => self.abstract_text.clone().unwrap_or_default(),
            CandidateField::Year => self.year.map(|y| y.to_string()).unwrap_or_default(),
            CandidateField::Venue => self.venue.clone().unwrap_or_default(),
            CandidateField::Doi => self.doi.clone().unwrap_or_default(),
            CandidateField::CitationCount => self
                .citation_count
                .map(|c| c.to_string())
                .unwrap_or_default(),
            CandidateField::Url => self.url.clone().unwrap_or_default(),
        }
    }
}

/// Builder for constructing Candidate objects
#[derive(Debug, Clone)]
pub struct CandidateBuilder {
    candidate: Candidate,
}

impl CandidateBuilder {
    /// Create a new builder with required fields
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            candidate: Candidate::new(external_id.into(), title.into(), source.into()),
        }
    }

    /// Add one author
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.candidate.authors.push(name.into());
        self
    }

    /// Set all authors
    pub fn authors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate.authors = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract; blank text is treated as absent
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.candidate.abstract_text = Some(text);
        }
        self
    }

    /// Set publication year
    pub fn year(mut self, year: i32) -> Self {
        self.candidate.year = Some(year);
        self
    }

    /// Set venue; blank names are treated as absent
    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        let venue = venue.into();
        if !venue.trim().is_empty() {
            self.candidate.venue = Some(venue);
        }
        self
    }

    /// Set DOI (stored lower-cased)
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.trim().is_empty() {
            self.candidate.doi = Some(doi.trim().to_lowercase());
        }
        self
    }

    /// Set citation count
    pub fn citation_count(mut self, count: u64) -> Self {
        self.candidate.citation_count = Some(count);
        self
    }

    /// Set landing page URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.trim().is_empty() {
            self.candidate.url = Some(url);
        }
        self
    }

    /// Build the Candidate
    pub fn build(self) -> Candidate {
        self.candidate
    }
}
