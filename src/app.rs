//! Application state and service initialization
//!
//! Centralizes the dependency graph so handlers receive fully wired services.

use std::sync::Arc;

use crate::model::Config;
use crate::service::{
    AnalysisCache, AnalysisPipeline, AuthorshipService, LlmClient, PlainTextExtractor,
    SimilarityService, WebSearchClient,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Analysis cache, Redis-backed with a local in-process fallback
    pub cache: AnalysisCache,
    /// Fully wired analysis pipeline
    pub pipeline: Arc<AnalysisPipeline>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// The LLM client is required; the web-search client and the cache
    /// initialize from the environment and report missing configuration at
    /// request time rather than at startup.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let llm_client = LlmClient::from_env().map_err(|e| match e {
            crate::service::llm::LlmError::MissingKey(key) => AppError::MissingConfig(key),
        })?;

        let cache = AnalysisCache::from_env();

        let finder = Arc::new(WebSearchClient::from_env());
        let scorer = Arc::new(SimilarityService::new(llm_client.clone()));
        let classifier = Arc::new(AuthorshipService::new(llm_client));
        let extractor = Arc::new(PlainTextExtractor);

        let pipeline = Arc::new(AnalysisPipeline::new(
            finder,
            scorer,
            classifier,
            extractor,
            cache.clone(),
            config.analysis,
        ));

        Ok(Self { cache, pipeline })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),
}
