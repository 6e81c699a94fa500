//! Mock backend for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::lookup::{Lookup, LookupCapabilities, LookupError};
use crate::matching::normalize_text;
use crate::models::{Candidate, CandidateBuilder, Query};

/// A mock backend that returns predefined responses.
///
/// Title responses are keyed by normalized title, so punctuation and case in
/// the row do not matter. Injected failures are consumed before any response.
#[derive(Debug, Default)]
pub struct MockLookup {
    title_responses: Mutex<HashMap<String, Vec<Candidate>>>,
    doi_responses: Mutex<HashMap<String, Candidate>>,
    pending_failures: Mutex<VecDeque<LookupError>>,
    permanent_failure: Mutex<Option<LookupError>>,
    calls: AtomicUsize,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLookup {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidates returned for a title.
    pub fn add_response(&self, title: &str, candidates: Vec<Candidate>) {
        guard(&self.title_responses).insert(normalize_text(title), candidates);
    }

    /// Set the candidate returned for a DOI.
    pub fn add_doi_response(&self, doi: &str, candidate: Candidate) {
        guard(&self.doi_responses).insert(doi.to_lowercase(), candidate);
    }

    /// Fail the next call with `error`; repeated calls queue further failures.
    pub fn fail_next(&self, error: LookupError) {
        guard(&self.pending_failures).push_back(error);
    }

    /// Fail every call with `error` until [`MockLookup::clear_failures`].
    pub fn fail_always(&self, error: LookupError) {
        *guard(&self.permanent_failure) = Some(error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        guard(&self.pending_failures).clear();
        *guard(&self.permanent_failure) = None;
    }

    /// Number of backend calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        guard(&self.pending_failures)
            .pop_front()
            .or_else(|| guard(&self.permanent_failure).clone())
    }
}

#[async_trait]
impl Lookup for MockLookup {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Lookup"
    }

    fn capabilities(&self) -> LookupCapabilities {
        LookupCapabilities::TITLE_SEARCH | LookupCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &Query, _limit: usize) -> Result<Vec<Candidate>, LookupError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        let key = normalize_text(&query.search_text());
        Ok(guard(&self.title_responses)
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Candidate>, LookupError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        Ok(guard(&self.doi_responses).get(&doi.to_lowercase()).cloned())
    }
}

/// Helper function to create a mock candidate for testing.
pub fn make_candidate(external_id: &str, title: &str) -> Candidate {
    CandidateBuilder::new(external_id, title, "mock")
        .url(format!("http://example.com/{}", external_id))
        .build()
}
