//! Bibliographic lookup backends with an extensible trait-based architecture.
//!
//! This module defines the [`Lookup`] trait that every backend implements and
//! the [`LookupClient`] the enrichment driver talks to. The client owns the
//! policy (retry with backoff, request pacing, DOI-before-title ordering); the
//! backends only translate one request into one API call.
//!
//! # Backends
//!
//! - `semantic` - Semantic Scholar Graph API ([`SemanticScholarLookup`])
//! - `crossref` - CrossRef REST API ([`CrossRefLookup`])
//! - [`MockLookup`] - scripted responses for tests

mod crossref;
pub mod mock;
mod registry;
mod semantic;

pub use crossref::CrossRefLookup;
pub use mock::MockLookup;
pub use registry::BackendRegistry;
pub use semantic::SemanticScholarLookup;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LookupSettings, RetrySettings};
use crate::models::{Candidate, Query};
use crate::utils::{with_retry, RateLimiter, RetryConfig, TransientError};

bitflags::bitflags! {
    /// Capabilities that a backend can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LookupCapabilities: u32 {
        const TITLE_SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
    }
}

/// The Lookup trait defines the interface for all bibliographic backends.
///
/// "No results" is never an error: `search` returns an empty list and
/// `get_by_doi` returns `None`.
#[async_trait]
pub trait Lookup: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this backend (e.g., "semantic", "crossref")
    fn id(&self) -> &str;

    /// Human-readable name of this backend
    fn name(&self) -> &str;

    /// Describe the capabilities of this backend
    fn capabilities(&self) -> LookupCapabilities {
        LookupCapabilities::TITLE_SEARCH
    }

    /// Search by title (and whatever else the backend can use), best-first
    async fn search(&self, _query: &Query, _limit: usize) -> Result<Vec<Candidate>, LookupError> {
        Err(LookupError::NotImplemented)
    }

    /// Fetch a single record by DOI
    async fn get_by_doi(&self, _doi: &str) -> Result<Option<Candidate>, LookupError> {
        Err(LookupError::NotImplemented)
    }
}

/// Errors that can occur when talking to a backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    /// The requested operation is not implemented for this backend
    #[error("Operation not implemented for this backend")]
    NotImplemented,

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Rate limit exceeded (with optional retry-after seconds)
    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    /// Unexpected HTTP status from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend rejected the request itself
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transient failures persisted through every retry
    #[error("Lookup unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}

impl LookupError {
    /// Errors worth retrying (network, timeout, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        TransientError::from_lookup_error(self).is_some()
    }

    /// Structural errors that will fail for every row; the batch should stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LookupError::Unauthorized(_)
                | LookupError::InvalidRequest(_)
                | LookupError::NotImplemented
        )
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Parse(format!("JSON: {}", err))
    }
}

/// Lookup client used by the enrichment driver
///
/// Wraps one backend with retry, pacing and candidate limits. Not meant to be
/// shared between concurrent batches.
#[derive(Debug, Clone)]
pub struct LookupClient {
    backend: Arc<dyn Lookup>,
    retry: RetryConfig,
    limiter: Option<RateLimiter>,
    max_candidates: usize,
}

impl LookupClient {
    pub fn new(backend: Arc<dyn Lookup>, retry: RetryConfig) -> Self {
        Self {
            backend,
            retry,
            limiter: None,
            max_candidates: 5,
        }
    }

    /// Build the configured backend with its retry and pacing policy
    pub fn from_settings(
        lookup: &LookupSettings,
        retry: &RetrySettings,
    ) -> Result<Self, LookupError> {
        let registry = BackendRegistry::from_settings(lookup)?;
        let backend = registry.get_required(&lookup.backend)?.clone();

        Ok(Self::new(backend, retry.to_retry_config(lookup.timeout()))
            .with_rate_limit(lookup.requests_per_second)
            .with_max_candidates(lookup.max_candidates))
    }

    /// Pace backend calls; zero disables pacing
    pub fn with_rate_limit(mut self, requests_per_second: f32) -> Self {
        self.limiter = RateLimiter::per_second(requests_per_second);
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<dyn Lookup> {
        &self.backend
    }

    /// Look up candidates for a query, best-first
    ///
    /// A DOI hit short-circuits to a single candidate; otherwise the title is
    /// searched. Transient failures are retried; once retries are exhausted the
    /// error is [`LookupError::Unavailable`].
    pub async fn search(&self, query: &Query) -> Result<Vec<Candidate>, LookupError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let backend = self.backend.as_ref();
        let limiter = self.limiter.as_ref();

        if let Some(doi) = query.doi.as_deref() {
            if backend.capabilities().contains(LookupCapabilities::DOI_LOOKUP) {
                let found = with_retry(self.retry, move || async move {
                    if let Some(limiter) = limiter {
                        limiter.until_ready().await;
                    }
                    backend.get_by_doi(doi).await
                })
                .await?;

                if let Some(candidate) = found {
                    tracing::debug!("DOI {} resolved by {}", doi, backend.id());
                    return Ok(vec![candidate]);
                }
                tracing::debug!("DOI {} not found by {}, falling back to title", doi, backend.id());
            }
        }

        if query.title.is_none() {
            return Ok(Vec::new());
        }

        let limit = self.max_candidates;
        let mut candidates = with_retry(self.retry, move || async move {
            if let Some(limiter) = limiter {
                limiter.until_ready().await;
            }
            backend.search(query, limit).await
        })
        .await?;

        candidates.truncate(limit);
        Ok(candidates)
    }
}
