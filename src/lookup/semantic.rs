//! Semantic Scholar lookup backend.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::lookup::{Lookup, LookupCapabilities, LookupError};
use crate::models::{Candidate, CandidateBuilder, Query};
use crate::utils::{check_response, encode_doi, map_send_error, HttpClient};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,authors,year,venue,abstract,citationCount,externalIds,url";

/// Semantic Scholar lookup backend
///
/// Uses the Graph API paper search and DOI endpoints.
#[derive(Debug, Clone)]
pub struct SemanticScholarLookup {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarLookup {
    /// Create a new Semantic Scholar backend
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, LookupError> {
        Ok(Self {
            client: HttpClient::with_user_agent(
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
                timeout,
            )?,
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Point the backend at a different API root (used for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build request URL
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    /// Parse Semantic Scholar paper data
    fn parse_paper(data: S2Paper) -> Option<Candidate> {
        let paper_id = data.paper_id?;
        let title = data.title.filter(|t| !t.trim().is_empty())?;

        let mut builder = CandidateBuilder::new(paper_id, title, "semantic")
            .authors(data.authors.into_iter().filter_map(|a| a.name))
            .abstract_text(data.r#abstract.unwrap_or_default())
            .venue(data.venue.unwrap_or_default())
            .url(data.url.unwrap_or_default());

        if let Some(doi) = data.external_ids.and_then(|ids| ids.doi) {
            builder = builder.doi(doi);
        }
        if let Some(year) = data.year {
            builder = builder.year(year);
        }
        if let Some(count) = data.citation_count {
            builder = builder.citation_count(count);
        }

        Some(builder.build())
    }
}

#[async_trait]
impl Lookup for SemanticScholarLookup {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> LookupCapabilities {
        LookupCapabilities::TITLE_SEARCH | LookupCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &Query, limit: usize) -> Result<Vec<Candidate>, LookupError> {
        let url = format!(
            "/paper/search?query={}&limit={}&fields={}",
            urlencoding::encode(&query.search_text()),
            limit,
            PAPER_FIELDS
        );

        let response = self
            .add_api_key_if_present(self.client.client().get(self.build_url(&url)))
            .send()
            .await
            .map_err(|e| map_send_error(e, "Failed to search Semantic Scholar"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check_response(response, "Semantic Scholar").await?;

        let data: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data.data.into_iter().filter_map(Self::parse_paper).collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Candidate>, LookupError> {
        let url = format!("/paper/DOI:{}?fields={}", encode_doi(doi), PAPER_FIELDS);

        let response = self
            .add_api_key_if_present(self.client.client().get(self.build_url(&url)))
            .send()
            .await
            .map_err(|e| map_send_error(e, "Failed to fetch DOI from Semantic Scholar"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_response(response, "Semantic Scholar").await?;

        let data: S2Paper = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(Self::parse_paper(data))
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    year: Option<i32>,
    venue: Option<String>,
    r#abstract: Option<String>,
    citation_count: Option<u64>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "total": 2,
        "offset": 0,
        "data": [
            {
                "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
                "externalIds": {"DOI": "10.5555/3295222.3295349", "ArXiv": "1706.03762"},
                "url": "https://www.semanticscholar.org/paper/204e3073",
                "title": "Attention is All you Need",
                "abstract": "The dominant sequence transduction models are based on complex recurrent networks.",
                "venue": "Neural Information Processing Systems",
                "year": 2017,
                "citationCount": 120000,
                "authors": [{"authorId": "40348417", "name": "Ashish Vaswani"}, {"authorId": "1846258", "name": "Noam Shazeer"}]
            },
            {
                "paperId": null,
                "title": "Dropped because it has no id"
            }
        ]
    }"#;

    fn backend(server: &mockito::ServerGuard) -> SemanticScholarLookup {
        SemanticScholarLookup::new(Some("test-key".to_string()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_search_parses_candidates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query".into(), "Attention Is All You Need".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let candidates = backend(&server)
            .search(&Query::from_title("Attention Is All You Need"), 5)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candidates.len(), 1);
        let paper = &candidates[0];
        assert_eq!(paper.title, "Attention is All you Need");
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(paper.doi.as_deref(), Some("10.5555/3295222.3295349"));
        assert_eq!(paper.year, Some(2017));
        assert_eq!(paper.citation_count, Some(120000));
        assert_eq!(paper.source, "semantic");
    }

    #[tokio::test]
    async fn test_search_without_data_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"total": 0, "offset": 0}"#)
            .create_async()
            .await;

        let candidates = backend(&server)
            .search(&Query::from_title("zzzz"), 5)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_status_maps_to_rate_limit_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body(r#"{"message": "Too Many Requests"}"#)
            .create_async()
            .await;

        let err = backend(&server)
            .search(&Query::from_title("anything"), 5)
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::RateLimit(Some(7)));
    }

    #[tokio::test]
    async fn test_forbidden_is_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let err = backend(&server)
            .search(&Query::from_title("anything"), 5)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_doi_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper/DOI:10.1000/missing")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": "Paper with id DOI:10.1000/missing not found"}"#)
            .create_async()
            .await;

        let found = backend(&server).get_by_doi("10.1000/missing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_doi_with_fragment_character_is_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/DOI:10.1002/abc%3B2-%23")
            .match_query(mockito::Matcher::Regex("fields=".into()))
            .with_status(200)
            .with_body(
                r#"{"paperId": "sici1", "title": "SICI paper", "externalIds": {"DOI": "10.1002/abc;2-#"}}"#,
            )
            .create_async()
            .await;

        let paper = backend(&server)
            .get_by_doi("10.1002/abc;2-#")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paper.external_id, "sici1");
        mock.assert_async().await;
    }
}
