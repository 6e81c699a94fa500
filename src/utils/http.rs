//! HTTP client utilities.

use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::lookup::LookupError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with a custom user agent and request timeout
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                LookupError::InvalidRequest(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Percent-encode a DOI for use in a URL path
///
/// Each `/`-separated part is encoded on its own so the path keeps its
/// slashes while `#`, `?` and friends cannot cut the URL short.
pub fn encode_doi(doi: &str) -> String {
    doi.split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Map a transport error onto the lookup error taxonomy
pub fn map_send_error(err: reqwest::Error, context: &str) -> LookupError {
    if err.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Network(format!("{}: {}", context, err))
    }
}

/// Turn a non-success response into a [`LookupError`]
///
/// Successful responses pass through untouched. Callers that treat 404 as
/// "no results" must check for it before calling this.
pub async fn check_response(response: Response, api: &str) -> Result<Response, LookupError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        format!("{} API returned status: {}", api, status)
    } else {
        format!("{} API returned status {}: {}", api, status, truncate(&body, 200))
    };

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => LookupError::RateLimit(retry_after),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LookupError::Unauthorized(message),
        StatusCode::BAD_REQUEST => LookupError::InvalidRequest(message),
        _ => LookupError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
