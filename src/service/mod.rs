pub mod analysis;
pub mod authorship;
pub mod cache;
pub mod cache_keys;
pub mod chunk;
pub mod extract;
pub mod llm;
pub mod normalize;
pub mod retry;
pub mod scoring;
pub mod search;

pub use analysis::{AnalysisInput, AnalysisPipeline};
pub use authorship::{AuthorshipClassifier, AuthorshipService};
pub use cache::AnalysisCache;
pub use extract::{PlainTextExtractor, TextExtractor};
pub use llm::LlmClient;
pub use scoring::{SimilarityScorer, SimilarityService};
pub use search::{SourceFinder, WebSearchClient};

use retry::RetryClass;

/// Errors shared by the three external judgment services (web-source search,
/// similarity scoring, authorship classification)
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CollaboratorError {
    /// A credential or endpoint for the collaborator is not configured.
    /// Distinct from runtime failure of a configured collaborator.
    #[error("missing credential: {0}")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by upstream service")]
    RateLimited,

    #[error("upstream service returned status {0}")]
    Status(u16),

    /// The collaborator responded but the response was not usable
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Hosted model call failed in transport
    #[error("model call failed: {0}")]
    Model(String),
}

impl RetryClass for CollaboratorError {
    fn is_retryable(&self) -> bool {
        match self {
            CollaboratorError::Http(_) | CollaboratorError::RateLimited => true,
            CollaboratorError::Status(status) => {
                *status == 429 || (500..=599).contains(status)
            }
            CollaboratorError::Model(_) => true,
            CollaboratorError::Parse(_) | CollaboratorError::NotConfigured(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_upstream_errors_are_retryable() {
        assert!(CollaboratorError::RateLimited.is_retryable());
        assert!(CollaboratorError::Status(503).is_retryable());
        assert!(CollaboratorError::Status(429).is_retryable());
        assert!(CollaboratorError::Model("timeout".into()).is_retryable());
    }

    #[test]
    fn parse_and_config_errors_are_fatal() {
        assert!(!CollaboratorError::Parse("bad json".into()).is_retryable());
        assert!(!CollaboratorError::NotConfigured("KEY").is_retryable());
        assert!(!CollaboratorError::Status(400).is_retryable());
        assert!(!CollaboratorError::Status(404).is_retryable());
    }
}
