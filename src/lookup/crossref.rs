//! CrossRef lookup backend.

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

use crate::lookup::{Lookup, LookupCapabilities, LookupError};
use crate::models::{Candidate, CandidateBuilder, Query};
use crate::utils::{check_response, encode_doi, map_send_error, HttpClient};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef lookup backend
///
/// Uses the CrossRef REST API bibliographic search and DOI metadata lookup.
/// Candidates are identified by their DOI.
#[derive(Debug, Clone)]
pub struct CrossRefLookup {
    client: HttpClient,
    base_url: String,
    mailto: Option<String>,
}

impl CrossRefLookup {
    /// Create a new CrossRef backend; `mailto` opts into the polite pool
    pub fn new(mailto: Option<String>, timeout: Duration) -> Result<Self, LookupError> {
        let mailto = mailto.filter(|m| !m.is_empty());
        let user_agent = match &mailto {
            Some(mail) => format!(
                "{}/{} (mailto:{})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                mail
            ),
            None => format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        };

        Ok(Self {
            client: HttpClient::with_user_agent(&user_agent, timeout)?,
            base_url: CROSSREF_API_BASE.to_string(),
            mailto,
        })
    }

    /// Point the backend at a different API root (used for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn mailto_param(&self) -> String {
        self.mailto
            .as_ref()
            .map(|m| format!("&mailto={}", urlencoding::encode(m)))
            .unwrap_or_default()
    }

    fn parse_item(item: CRItem) -> Option<Candidate> {
        let doi = item.doi.filter(|d| !d.is_empty())?;
        let title = item.title.into_iter().next().filter(|t| !t.trim().is_empty())?;

        let authors = item.author.into_iter().filter_map(|a| match (a.given, a.family, a.name) {
            (Some(given), Some(family), _) => Some(format!("{} {}", given, family)),
            (None, Some(family), _) => Some(family),
            (_, None, Some(name)) => Some(name),
            _ => None,
        });

        let mut builder = CandidateBuilder::new(doi.clone(), title, "crossref")
            .authors(authors)
            .doi(doi)
            .venue(item.container_title.into_iter().next().unwrap_or_default())
            .url(item.url.unwrap_or_default())
            .abstract_text(item.r#abstract.as_deref().map(strip_markup).unwrap_or_default());

        if let Some(year) = item.issued.and_then(|d| d.year()) {
            builder = builder.year(year);
        }
        if let Some(count) = item.is_referenced_by_count {
            builder = builder.citation_count(count);
        }

        Some(builder.build())
    }
}

/// Remove JATS/XML tags from CrossRef abstracts and collapse whitespace
fn strip_markup(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    tag.replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Lookup for CrossRefLookup {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> LookupCapabilities {
        LookupCapabilities::TITLE_SEARCH | LookupCapabilities::DOI_LOOKUP
    }

    async fn search(&self, query: &Query, limit: usize) -> Result<Vec<Candidate>, LookupError> {
        let mut url = format!(
            "{}/works?query.bibliographic={}&rows={}",
            self.base_url,
            urlencoding::encode(&query.search_text()),
            limit
        );

        if !query.authors.is_empty() {
            url.push_str(&format!(
                "&query.author={}",
                urlencoding::encode(&query.authors.join(" "))
            ));
        }
        url.push_str(&self.mailto_param());

        let response = self
            .client
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| map_send_error(e, "Failed to search CrossRef"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check_response(response, "CrossRef").await?;

        let data: CRListResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data
            .message
            .items
            .into_iter()
            .filter_map(Self::parse_item)
            .collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Candidate>, LookupError> {
        let url = format!("{}/works/{}", self.base_url, encode_doi(doi));
        let url = match self.mailto_param().strip_prefix('&') {
            Some(param) => format!("{}?{}", url, param),
            None => url,
        };

        let response = self
            .client
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| map_send_error(e, "Failed to fetch DOI from CrossRef"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_response(response, "CrossRef").await?;

        let data: CRWorkResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(Self::parse_item(data.message))
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRListResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRWorkResponse {
    message: CRItem,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(default)]
    container_title: Vec<String>,
    is_referenced_by_count: Option<u64>,
    issued: Option<CRDate>,
    r#abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CRDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|p| p.first().copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKS_BODY: &str = r#"{
        "status": "ok",
        "message": {
            "total-results": 2,
            "items": [
                {
                    "DOI": "10.1038/nature14539",
                    "URL": "https://doi.org/10.1038/nature14539",
                    "title": ["Deep learning"],
                    "author": [
                        {"given": "Yann", "family": "LeCun"},
                        {"given": "Yoshua", "family": "Bengio"},
                        {"name": "Deep Learning Consortium"}
                    ],
                    "container-title": ["Nature"],
                    "is-referenced-by-count": 50000,
                    "issued": {"date-parts": [[2015, 5, 27]]},
                    "abstract": "<jats:p>Deep learning allows <jats:italic>computational</jats:italic> models.</jats:p>"
                },
                {
                    "DOI": "10.1000/untitled",
                    "title": []
                }
            ]
        }
    }"#;

    fn backend(server: &mockito::ServerGuard) -> CrossRefLookup {
        CrossRefLookup::new(Some("lab@example.org".into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<jats:p>Deep  learning <jats:bold>works</jats:bold>.</jats:p>"),
            "Deep learning works ."
        );
    }

    #[tokio::test]
    async fn test_search_parses_items() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query.bibliographic".into(), "Deep learning".into()),
                mockito::Matcher::UrlEncoded("rows".into(), "3".into()),
                mockito::Matcher::UrlEncoded("mailto".into(), "lab@example.org".into()),
            ]))
            .with_status(200)
            .with_body(WORKS_BODY)
            .create_async()
            .await;

        let candidates = backend(&server)
            .search(&Query::from_title("Deep learning"), 3)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candidates.len(), 1);
        let paper = &candidates[0];
        assert_eq!(paper.external_id, "10.1038/nature14539");
        assert_eq!(
            paper.authors,
            vec!["Yann LeCun", "Yoshua Bengio", "Deep Learning Consortium"]
        );
        assert_eq!(paper.venue.as_deref(), Some("Nature"));
        assert_eq!(paper.year, Some(2015));
        assert_eq!(paper.citation_count, Some(50000));
        assert_eq!(
            paper.abstract_text.as_deref(),
            Some("Deep learning allows computational models.")
        );
    }

    #[tokio::test]
    async fn test_get_by_doi() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works/10.1038/nature14539")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status": "ok", "message": {"DOI": "10.1038/nature14539", "title": ["Deep learning"], "issued": {"date-parts": [[null]]}}}"#,
            )
            .create_async()
            .await;

        let paper = backend(&server)
            .get_by_doi("10.1038/nature14539")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paper.title, "Deep learning");
        assert_eq!(paper.year, None);
    }

    #[tokio::test]
    async fn test_get_by_doi_encodes_reserved_characters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works/10.1002/abc%3B2-%23")
            .match_query(mockito::Matcher::UrlEncoded(
                "mailto".into(),
                "lab@example.org".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"status": "ok", "message": {"DOI": "10.1002/abc;2-#", "title": ["SICI paper"]}}"#,
            )
            .create_async()
            .await;

        let paper = backend(&server)
            .get_by_doi("10.1002/abc;2-#")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paper.doi.as_deref(), Some("10.1002/abc;2-#"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let err = backend(&server)
            .search(&Query::from_title("Deep learning"), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Api { status: 502, .. }));
    }
}
