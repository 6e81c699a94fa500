//! Match resolution between a row's query and lookup candidates.
//!
//! Scoring is a weighted mean of the components both sides have:
//!
//! - title similarity: normalized Levenshtein over [`normalize_text`] output
//! - author overlap: share of the row's surnames found among the candidate's
//! - year agreement: 1.0 when equal, 0.5 when one year apart, 0.0 otherwise
//!
//! Equal DOIs short-circuit to a perfect score.

mod normalize;

pub use normalize::{normalize_text, surname};

use std::collections::HashSet;
use strsim::normalized_levenshtein;

use crate::config::MatchSettings;
use crate::models::{Candidate, MatchResult, Query};

/// Float slack when comparing scores against the tie margin
const EPSILON: f64 = 1e-9;

/// Decides whether a candidate corresponds to a row
#[derive(Debug, Clone)]
pub struct MatchResolver {
    settings: MatchSettings,
}

impl MatchResolver {
    pub fn new(settings: MatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Score one candidate against a query, in `[0, 1]`
    pub fn score(&self, query: &Query, candidate: &Candidate) -> f64 {
        if let (Some(a), Some(b)) = (&query.doi, &candidate.doi) {
            if a.eq_ignore_ascii_case(b) {
                return 1.0;
            }
        }

        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        if let Some(title) = &query.title {
            weighted += self.settings.title_weight * title_similarity(title, &candidate.title);
            total_weight += self.settings.title_weight;
        }

        if let Some(overlap) = author_overlap(&query.authors, &candidate.authors) {
            weighted += self.settings.author_weight * overlap;
            total_weight += self.settings.author_weight;
        }

        if let (Some(a), Some(b)) = (query.year, candidate.year) {
            let agreement = match (a - b).abs() {
                0 => 1.0,
                1 => 0.5,
                _ => 0.0,
            };
            weighted += self.settings.year_weight * agreement;
            total_weight += self.settings.year_weight;
        }

        if total_weight <= 0.0 {
            return 0.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }

    /// Pick the matching candidate, if there is exactly one clear winner
    ///
    /// The result depends only on the inputs: candidates with equal scores are
    /// ordered by their position in `candidates`.
    pub fn resolve(&self, query: &Query, candidates: &[Candidate]) -> MatchResult {
        let unique = dedup_candidates(candidates);

        let mut scored: Vec<(usize, f64)> = unique
            .iter()
            .enumerate()
            .map(|(pos, c)| (pos, self.score(query, c)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let Some(&(best_pos, best_score)) = scored.first() else {
            return MatchResult::Rejected { best_score: 0.0 };
        };

        if best_score + EPSILON < self.settings.threshold {
            return MatchResult::Rejected { best_score };
        }

        let contenders: Vec<(String, f64)> = scored
            .iter()
            .take_while(|(_, score)| best_score - score <= self.settings.tie_margin + EPSILON)
            .map(|(pos, score)| (unique[*pos].external_id.clone(), *score))
            .collect();

        if contenders.len() > 1 {
            return MatchResult::Ambiguous { contenders };
        }

        MatchResult::Accepted {
            candidate: unique[best_pos].clone(),
            score: best_score,
        }
    }
}

/// Similarity of two titles after normalization
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(&a, &b)
}

/// Share of the row's author surnames present in the candidate's, if both have authors
fn author_overlap(row_authors: &[String], candidate_authors: &[String]) -> Option<f64> {
    let row: HashSet<String> = row_authors.iter().filter_map(|a| surname(a)).collect();
    let candidate: HashSet<String> = candidate_authors.iter().filter_map(|a| surname(a)).collect();

    if row.is_empty() || candidate.is_empty() {
        return None;
    }
    Some(row.intersection(&candidate).count() as f64 / row.len() as f64)
}

/// Drop repeated candidates (same external id or same DOI), keeping the first
pub fn dedup_candidates(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_dois: HashSet<String> = HashSet::new();

    candidates
        .iter()
        .filter(|c| {
            let new_id = seen_ids.insert(c.external_id.as_str());
            let new_doi = match &c.doi {
                Some(doi) => seen_dois.insert(doi.to_lowercase()),
                None => true,
            };
            new_id && new_doi
        })
        .collect()
}
