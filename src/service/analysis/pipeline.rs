//! End-to-end analysis pipeline
//!
//! The orchestrator sequences validate → extract → normalize → chunk →
//! concurrent chunk analysis (joined with authorship classification) →
//! aggregate, and is the single boundary guaranteed never to propagate an
//! error: every failure becomes a `PipelineResult`.

use std::sync::Arc;

use crate::model::{AiDetectionResult, AnalysisConfig, ErrorKind, PipelineResult};
use crate::service::analysis::{aggregate, AnalysisError, ChunkAnalyzer};
use crate::service::cache_keys;
use crate::service::chunk::{chunk_text, ChunkError};
use crate::service::extract::ExtractError;
use crate::service::normalize::{normalize, NormalizeError};
use crate::service::retry::retry_with_backoff;
use crate::service::{
    AnalysisCache, AuthorshipClassifier, CollaboratorError, SimilarityScorer, SourceFinder,
    TextExtractor,
};

/// Input accepted by the pipeline: exactly one of `text` or `file_bytes`
#[derive(Debug, Default)]
pub struct AnalysisInput {
    pub text: Option<String>,
    pub file_bytes: Option<Vec<u8>>,
    pub file_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error("exactly one of `text` or `file_bytes` must be provided")]
    InvalidInput,

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error(transparent)]
    Validation(#[from] NormalizeError),

    #[error("invalid analysis configuration: {0}")]
    Configuration(#[from] ChunkError),

    #[error("missing credential: {0}")]
    NotConfigured(&'static str),

    #[error("upstream service failure: {0}")]
    Upstream(CollaboratorError),
}

impl PipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput
            | PipelineError::Validation(_)
            | PipelineError::NotConfigured(_) => ErrorKind::BadRequest,
            PipelineError::Extraction(_) => ErrorKind::ExtractionError,
            PipelineError::Upstream(_) => ErrorKind::UpstreamError,
            PipelineError::Configuration(_) => ErrorKind::AnalysisError,
        }
    }
}

impl From<AnalysisError> for PipelineError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Upstream(inner) => PipelineError::Upstream(inner),
            AnalysisError::NotConfigured(key) => PipelineError::NotConfigured(key),
        }
    }
}

/// Orchestrates one analysis run end to end
pub struct AnalysisPipeline {
    analyzer: ChunkAnalyzer,
    classifier: Arc<dyn AuthorshipClassifier>,
    extractor: Arc<dyn TextExtractor>,
    cache: AnalysisCache,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(
        finder: Arc<dyn SourceFinder>,
        scorer: Arc<dyn SimilarityScorer>,
        classifier: Arc<dyn AuthorshipClassifier>,
        extractor: Arc<dyn TextExtractor>,
        cache: AnalysisCache,
        config: AnalysisConfig,
    ) -> Self {
        let analyzer = ChunkAnalyzer::new(finder, scorer, cache.clone(), config.clone());
        Self {
            analyzer,
            classifier,
            extractor,
            cache,
            config,
        }
    }

    /// Run the full pipeline. Never fails: every error, including the overall
    /// deadline, is converted into a `PipelineResult`.
    ///
    /// The deadline stops the wait, not the work: collaborator calls already
    /// in flight may finish in the background, and their late cache writes
    /// are harmless.
    pub async fn run(&self, input: AnalysisInput) -> PipelineResult {
        match tokio::time::timeout(self.config.deadline(), self.run_inner(input)).await {
            Ok(Ok(report)) => PipelineResult::success(report),
            Ok(Err(e)) => {
                tracing::warn!(kind = ?e.kind(), error = %e, "Analysis pipeline failed");
                PipelineResult::failure(e.kind(), e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    deadline_secs = self.config.deadline_secs,
                    "Analysis deadline exceeded"
                );
                PipelineResult::failure(
                    ErrorKind::UpstreamError,
                    format!(
                        "analysis did not complete within {} seconds",
                        self.config.deadline_secs
                    ),
                )
            }
        }
    }

    async fn run_inner(
        &self,
        input: AnalysisInput,
    ) -> Result<crate::model::PlagiarismReport, PipelineError> {
        let raw = match (input.text, input.file_bytes) {
            (Some(text), None) => text,
            (None, Some(bytes)) => self
                .extractor
                .extract(&bytes, input.file_name.as_deref())?,
            _ => return Err(PipelineError::InvalidInput),
        };

        let normalized = normalize(&raw, &self.config)?;
        tracing::debug!(
            chars = normalized.char_len,
            truncated = normalized.truncated,
            "Text normalized"
        );

        let chunks = chunk_text(&normalized.text, self.config.chunk_size, self.config.overlap)?;
        tracing::debug!(chunks = chunks.len(), "Text chunked");

        // Chunk analysis and authorship classification have no data
        // dependency, so they run concurrently.
        let (analysis, authorship) = tokio::join!(
            self.analyzer.analyze(&chunks),
            self.classify_authorship(&normalized.text)
        );
        let outcome = analysis?;
        let ai = authorship?;

        Ok(aggregate::build_report(
            &normalized,
            outcome,
            ai,
            self.config.max_chunks,
            self.config.max_text_len,
        ))
    }

    /// Whole-document authorship judgment, through the cache
    async fn classify_authorship(
        &self,
        full_text: &str,
    ) -> Result<AiDetectionResult, PipelineError> {
        let key = cache_keys::authorship_key(full_text);
        if let Some(cached) = self.cache.get_authorship::<AiDetectionResult>(&key).await {
            tracing::debug!(key = %key, "Authorship cache hit");
            return Ok(cached.normalized());
        }

        let policy = self.config.retry_policy();
        let result = retry_with_backoff(&policy, || self.classifier.classify(full_text))
            .await
            .map_err(|e| match e {
                CollaboratorError::NotConfigured(key) => PipelineError::NotConfigured(key),
                other => PipelineError::Upstream(other),
            })?;

        let result = result.normalized();
        self.cache.set_authorship(&key, &result).await;
        Ok(result)
    }
}
