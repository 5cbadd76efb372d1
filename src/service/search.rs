//! Web-source search collaborator
//!
//! Given chunk text, returns candidate published sources. The production
//! adapter calls a hosted JSON search API; similarity against each candidate
//! is judged separately by the scoring service.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::model::SourceMatch;
use crate::service::CollaboratorError;

const ENV_SEARCH_API_KEY: &str = "ORIGINALITY_SEARCH_API_KEY";
const ENV_SEARCH_URL: &str = "ORIGINALITY_SEARCH_URL";
const DEFAULT_SEARCH_URL: &str = "https://google.serper.dev/search";

/// Longest query sent to the search API, in characters
const MAX_QUERY_CHARS: usize = 300;

/// Collaborator interface: find published sources that may contain the chunk text
#[async_trait]
pub trait SourceFinder: Send + Sync {
    /// May return an empty list; scores on the returned matches are
    /// provisional (the scorer assigns the real ones).
    async fn find_sources(&self, chunk_text: &str) -> Result<Vec<SourceMatch>, CollaboratorError>;
}

/// Search API response shape
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    link: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

/// Client for the hosted web-search API
///
/// The base URL is resolved in this order:
/// 1. `ORIGINALITY_SEARCH_URL` environment variable if set
/// 2. Default Serper endpoint
///
/// The API key comes from `ORIGINALITY_SEARCH_API_KEY`; a missing key is a
/// configuration error, not a transient failure.
pub struct WebSearchClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WebSearchClient {
    pub fn from_env() -> Self {
        let base_url = env::var(ENV_SEARCH_URL)
            .ok()
            .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string());

        Self {
            client: Client::builder()
                .user_agent(concat!("originality-intel/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            api_key: env::var(ENV_SEARCH_API_KEY).ok().filter(|k| !k.is_empty()),
        }
    }

    /// Build the search query from chunk text: an exact-phrase prefix of the
    /// chunk, clipped on a word boundary.
    fn build_query(chunk_text: &str) -> String {
        let condensed = chunk_text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut query: String = condensed.chars().take(MAX_QUERY_CHARS).collect();
        if condensed.chars().count() > MAX_QUERY_CHARS {
            if let Some(cut) = query.rfind(' ') {
                query.truncate(cut);
            }
        }
        format!("\"{}\"", query)
    }
}

#[async_trait]
impl SourceFinder for WebSearchClient {
    async fn find_sources(&self, chunk_text: &str) -> Result<Vec<SourceMatch>, CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CollaboratorError::NotConfigured(ENV_SEARCH_API_KEY))?;

        let query = Self::build_query(chunk_text);
        tracing::debug!(url = %self.base_url, query_len = query.len(), "Searching for chunk sources");

        let response = self
            .client
            .post(&self.base_url)
            .header("X-API-KEY", api_key)
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CollaboratorError::RateLimited);
        }
        if !status.is_success() {
            return Err(CollaboratorError::Status(status.as_u16()));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("search response: {}", e)))?;

        let sources: Vec<SourceMatch> = parsed
            .organic
            .into_iter()
            .filter(|hit| Url::parse(&hit.link).is_ok())
            .map(|hit| SourceMatch {
                url: hit.link,
                title: hit.title,
                snippet: hit.snippet,
                similarity_score: 0.0,
            })
            .collect();

        tracing::debug!(candidates = sources.len(), "Search returned candidate sources");
        Ok(sources)
    }
}
