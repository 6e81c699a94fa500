//! Match verdicts, row states, and batch reports.

use serde::{Deserialize, Serialize};

use super::Candidate;

/// The resolver's verdict on a row's candidate list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum MatchResult {
    /// One candidate clearly matches the row
    Accepted { candidate: Candidate, score: f64 },
    /// No candidate scored above the acceptance threshold
    Rejected { best_score: f64 },
    /// Several candidates scored within the tie margin of the best one
    Ambiguous { contenders: Vec<(String, f64)> },
}

impl MatchResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MatchResult::Accepted { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, MatchResult::Ambiguous { .. })
    }
}

/// Per-row processing state: `Pending -> Queried -> {Accepted, Skipped, Failed}`
///
/// `Pending` rows whose outputs are already filled go straight to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Pending,
    Queried,
    Accepted,
    Skipped,
    Failed,
}

impl RowState {
    /// Terminal states end a row's processing
    pub fn is_terminal(&self) -> bool {
        matches!(self, RowState::Accepted | RowState::Skipped | RowState::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RowState) -> bool {
        matches!(
            (self, next),
            (RowState::Pending, RowState::Queried)
                | (RowState::Pending, RowState::Skipped)
                | (RowState::Pending, RowState::Failed)
                | (RowState::Queried, RowState::Accepted)
                | (RowState::Queried, RowState::Failed)
        )
    }
}

impl std::fmt::Display for RowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RowState::Pending => "pending",
            RowState::Queried => "queried",
            RowState::Accepted => "accepted",
            RowState::Skipped => "skipped",
            RowState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Why a row could not be resolved automatically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RowFailure {
    /// The lookup backend stayed unavailable after all retries
    LookupUnavailable { attempts: u32, message: String },
    /// The backend answered with something unusable for this row
    LookupFailed { message: String },
    /// Several candidates were too close to call
    AmbiguousMatch { contenders: usize },
    /// Nothing scored above the acceptance threshold
    NoMatch { best_score: f64 },
    /// The row has neither a title nor a DOI
    MissingInput,
}

impl RowFailure {
    /// Short human-readable reason, used after the sentinel prefix
    pub fn reason(&self) -> String {
        match self {
            RowFailure::LookupUnavailable { attempts, .. } => {
                format!("lookup unavailable after {} attempts", attempts)
            }
            RowFailure::LookupFailed { message } => format!("lookup failed ({})", message),
            RowFailure::AmbiguousMatch { contenders } => {
                format!("ambiguous match ({} candidates)", contenders)
            }
            RowFailure::NoMatch { best_score } => {
                format!("no match (best score {:.2})", best_score)
            }
            RowFailure::MissingInput => "missing title".to_string(),
        }
    }

    /// Cell value written to the status column
    pub fn sentinel(&self, prefix: &str) -> String {
        format!("{}: {}", prefix, self.reason())
    }
}

/// Final outcome of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// 0-based data row index
    pub index: usize,
    pub state: RowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RowFailure>,
}

impl RowOutcome {
    pub fn skipped(index: usize) -> Self {
        Self {
            index,
            state: RowState::Skipped,
            score: None,
            external_id: None,
            failure: None,
        }
    }

    pub fn accepted(index: usize, external_id: String, score: f64) -> Self {
        Self {
            index,
            state: RowState::Accepted,
            score: Some(score),
            external_id: Some(external_id),
            failure: None,
        }
    }

    pub fn failed(index: usize, failure: RowFailure) -> Self {
        Self {
            index,
            state: RowState::Failed,
            score: None,
            external_id: None,
            failure: Some(failure),
        }
    }
}

/// Summary of one enrichment batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichReport {
    pub accepted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Selected row numbers that do not exist in the dataset
    pub out_of_range: Vec<usize>,
    pub outcomes: Vec<RowOutcome>,
}

impl EnrichReport {
    /// Record a row outcome and update the counters
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome.state {
            RowState::Accepted => self.accepted += 1,
            RowState::Skipped => self.skipped += 1,
            RowState::Failed => self.failed += 1,
            RowState::Pending | RowState::Queried => {}
        }
        self.outcomes.push(outcome);
    }

    /// Rows that reached a terminal state
    pub fn processed(&self) -> usize {
        self.accepted + self.skipped + self.failed
    }

    /// Outcome for a given 0-based row index
    pub fn outcome(&self, index: usize) -> Option<&RowOutcome> {
        self.outcomes.iter().find(|o| o.index == index)
    }
}
