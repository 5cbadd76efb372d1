//! Concurrent per-chunk analysis against the judgment services

pub mod aggregate;
pub mod pipeline;

pub use pipeline::{AnalysisInput, AnalysisPipeline};

use std::sync::Arc;

use futures::future::join_all;

use crate::model::{AnalysisConfig, SourceMatch, SuspiciousSegment};
use crate::service::cache_keys;
use crate::service::chunk::TextChunk;
use crate::service::retry::retry_with_backoff;
use crate::service::{AnalysisCache, CollaboratorError, SimilarityScorer, SourceFinder};

/// Characters of chunk text kept as the segment preview
const PREVIEW_CHARS: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A judgment service failed after retries were exhausted
    #[error("upstream service failure: {0}")]
    Upstream(CollaboratorError),

    /// A judgment service credential is missing
    #[error("collaborator not configured: {0}")]
    NotConfigured(&'static str),
}

/// What the chunk fan-out produced, plus how degraded the pass was
#[derive(Debug, Default)]
pub struct ChunkAnalysisOutcome {
    pub segments: Vec<SuspiciousSegment>,
    /// Number of chunks actually analyzed (after the cap)
    pub chunks_processed: usize,
    /// The document had more chunks than the configured cap
    pub chunk_cap_reached: bool,
    /// Chunks whose search/scoring failed non-fatally and were absorbed
    pub unscored_chunks: usize,
}

/// Per-chunk failure classification: fatal failures abort the remaining
/// batches, absorbed ones are counted and skipped.
enum ChunkFailure {
    Absorbed(String),
    Fatal(CollaboratorError),
}

impl From<CollaboratorError> for ChunkFailure {
    fn from(e: CollaboratorError) -> Self {
        match e {
            CollaboratorError::Parse(msg) => ChunkFailure::Absorbed(msg),
            other => ChunkFailure::Fatal(other),
        }
    }
}

/// Processes chunks in bounded-size batches against the source finder and
/// similarity scorer, with inter-batch pacing
pub struct ChunkAnalyzer {
    finder: Arc<dyn SourceFinder>,
    scorer: Arc<dyn SimilarityScorer>,
    cache: AnalysisCache,
    config: AnalysisConfig,
}

impl ChunkAnalyzer {
    pub fn new(
        finder: Arc<dyn SourceFinder>,
        scorer: Arc<dyn SimilarityScorer>,
        cache: AnalysisCache,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            finder,
            scorer,
            cache,
            config,
        }
    }

    /// Analyze chunks in batches of at most `max_concurrent`, pausing between
    /// batches. The chunk list is capped to `max_chunks` to bound worst-case
    /// latency; the cap is reported for the explanation.
    ///
    /// A fatal-class error from any chunk aborts the remaining batches and
    /// propagates; absorbed failures are counted as unscored and processing
    /// continues.
    pub async fn analyze(&self, chunks: &[TextChunk]) -> Result<ChunkAnalysisOutcome, AnalysisError> {
        let chunk_cap_reached = chunks.len() > self.config.max_chunks;
        let work = &chunks[..chunks.len().min(self.config.max_chunks)];

        if chunk_cap_reached {
            tracing::info!(
                total_chunks = chunks.len(),
                max_chunks = self.config.max_chunks,
                "Chunk list capped for analysis"
            );
        }

        let mut outcome = ChunkAnalysisOutcome {
            chunks_processed: work.len(),
            chunk_cap_reached,
            ..Default::default()
        };

        let batches: Vec<&[TextChunk]> = work.chunks(self.config.max_concurrent.max(1)).collect();
        let batch_count = batches.len();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let results = join_all(batch.iter().map(|chunk| self.analyze_chunk(chunk))).await;

            for result in results {
                match result {
                    Ok(Some(segment)) => outcome.segments.push(segment),
                    Ok(None) => {}
                    Err(ChunkFailure::Absorbed(reason)) => {
                        tracing::debug!(reason = %reason, "Chunk left unscored");
                        outcome.unscored_chunks += 1;
                    }
                    Err(ChunkFailure::Fatal(CollaboratorError::NotConfigured(key))) => {
                        return Err(AnalysisError::NotConfigured(key));
                    }
                    Err(ChunkFailure::Fatal(e)) => {
                        tracing::warn!(
                            error = %e,
                            batch = batch_index + 1,
                            "Upstream failure, aborting remaining batches"
                        );
                        return Err(AnalysisError::Upstream(e));
                    }
                }
            }

            if batch_index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_pause()).await;
            }
        }

        tracing::info!(
            chunks = outcome.chunks_processed,
            segments = outcome.segments.len(),
            unscored = outcome.unscored_chunks,
            "Chunk analysis complete"
        );

        Ok(outcome)
    }

    /// Full judgment of one chunk: candidate search, top-N similarity
    /// scoring, threshold filtering.
    async fn analyze_chunk(
        &self,
        chunk: &TextChunk,
    ) -> Result<Option<SuspiciousSegment>, ChunkFailure> {
        let candidates = self.find_candidates(&chunk.text).await?;
        if candidates.is_empty() {
            // A clean chunk, not a degraded one
            return Ok(None);
        }

        let mut matches: Vec<SourceMatch> = Vec::new();
        for candidate in candidates.into_iter().take(self.config.max_candidates) {
            let reference = match (&candidate.snippet, &candidate.title) {
                (Some(snippet), _) => snippet.clone(),
                (None, Some(title)) => title.clone(),
                (None, None) => continue,
            };

            let score = self.score_candidate(&chunk.text, &reference).await?;
            if score > self.config.keep_threshold {
                matches.push(SourceMatch {
                    similarity_score: score,
                    ..candidate
                });
            }
        }

        let best = matches
            .iter()
            .map(|m| m.similarity_score)
            .fold(0.0_f64, f64::max);

        if best <= self.config.suspicious_threshold {
            return Ok(None);
        }

        matches.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut preview: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
        if chunk.text.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }

        Ok(Some(SuspiciousSegment {
            start_index: chunk.start_index,
            end_index: chunk.end_index,
            text_preview: preview,
            similarity_score: best,
            sources: matches,
        }))
    }

    /// Candidate sources for a chunk, through the cache
    async fn find_candidates(&self, chunk_text: &str) -> Result<Vec<SourceMatch>, ChunkFailure> {
        let key = cache_keys::sources_key(chunk_text);
        if let Some(cached) = self.cache.get_sources(&key).await {
            tracing::debug!(key = %key, candidates = cached.len(), "Source cache hit");
            return Ok(cached);
        }

        let policy = self.config.retry_policy();
        let sources =
            retry_with_backoff(&policy, || self.finder.find_sources(chunk_text)).await?;

        self.cache.set_sources(&key, &sources).await;
        Ok(sources)
    }

    /// Similarity score for one chunk/snippet pair, through the cache
    async fn score_candidate(&self, chunk_text: &str, snippet: &str) -> Result<f64, ChunkFailure> {
        let key = cache_keys::score_key(chunk_text, snippet);
        if let Some(cached) = self.cache.get_score(&key).await {
            return Ok(cached);
        }

        let policy = self.config.retry_policy();
        let score = retry_with_backoff(&policy, || {
            self.scorer.score_similarity(chunk_text, snippet)
        })
        .await?;

        self.cache.set_score(&key, score).await;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::service::chunk::chunk_text;

    struct StaticFinder {
        calls: AtomicUsize,
        result: fn(&str) -> Result<Vec<SourceMatch>, CollaboratorError>,
    }

    #[async_trait]
    impl SourceFinder for StaticFinder {
        async fn find_sources(
            &self,
            chunk_text: &str,
        ) -> Result<Vec<SourceMatch>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(chunk_text)
        }
    }

    struct StaticScorer(f64);

    #[async_trait]
    impl SimilarityScorer for StaticScorer {
        async fn score_similarity(&self, _: &str, _: &str) -> Result<f64, CollaboratorError> {
            Ok(self.0)
        }
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            chunk_size: 40,
            overlap: 10,
            max_concurrent: 2,
            batch_pause_ms: 1,
            max_chunks: 10,
            max_attempts: 1,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            ..AnalysisConfig::default()
        }
    }

    fn analyzer(
        finder: Arc<StaticFinder>,
        scorer: f64,
        config: AnalysisConfig,
    ) -> ChunkAnalyzer {
        ChunkAnalyzer::new(
            finder,
            Arc::new(StaticScorer(scorer)),
            AnalysisCache::local_only(),
            config,
        )
    }

    fn match_with_snippet(snippet: &str) -> Vec<SourceMatch> {
        vec![SourceMatch {
            url: "https://example.com/post".into(),
            title: None,
            snippet: Some(snippet.into()),
            similarity_score: 0.0,
        }]
    }

    #[tokio::test]
    async fn clean_chunks_produce_no_segments() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Ok(vec![]),
        });
        let a = analyzer(Arc::clone(&finder), 0.9, test_config());
        // Distinct chunk text, so no lookup is deduplicated by the cache
        let text: String = ('a'..='z').cycle().take(100).collect();
        let chunks = chunk_text(&text, 40, 10).unwrap();

        let outcome = a.analyze(&chunks).await.unwrap();
        assert!(outcome.segments.is_empty());
        assert_eq!(outcome.unscored_chunks, 0);
        assert!(!outcome.chunk_cap_reached);
        assert_eq!(finder.calls.load(Ordering::SeqCst), chunks.len());
    }

    #[tokio::test]
    async fn high_similarity_yields_segment_with_sources() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Ok(match_with_snippet("copied text")),
        });
        let a = analyzer(finder, 0.8, test_config());
        let chunks = chunk_text(&"z".repeat(40), 40, 10).unwrap();

        let outcome = a.analyze(&chunks).await.unwrap();
        assert_eq!(outcome.segments.len(), 1);
        let seg = &outcome.segments[0];
        assert_eq!((seg.start_index, seg.end_index), (0, 40));
        assert_eq!(seg.similarity_score, 0.8);
        assert_eq!(seg.sources.len(), 1);
    }

    #[tokio::test]
    async fn below_suspicious_threshold_yields_no_segment() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Ok(match_with_snippet("related text")),
        });
        let a = analyzer(finder, 0.45, test_config());
        let chunks = chunk_text(&"z".repeat(40), 40, 10).unwrap();

        let outcome = a.analyze(&chunks).await.unwrap();
        // 0.45 is kept as a match (> 0.3) but the chunk is not suspicious (<= 0.5)
        assert!(outcome.segments.is_empty());
    }

    #[tokio::test]
    async fn fatal_error_aborts_after_first_batch() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Err(CollaboratorError::Status(503)),
        });
        let a = analyzer(Arc::clone(&finder), 0.9, test_config());
        // 5 chunks, batches of 2
        let chunks = chunk_text(&"z".repeat(140), 40, 10).unwrap();
        assert_eq!(chunks.len(), 5);

        let err = a.analyze(&chunks).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Upstream(CollaboratorError::Status(503))
        ));
        // Only the first batch was dispatched
        assert_eq!(finder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parse_failures_are_absorbed_as_unscored() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Err(CollaboratorError::Parse("garbled".into())),
        });
        let a = analyzer(finder, 0.9, test_config());
        let chunks = chunk_text(&"z".repeat(100), 40, 10).unwrap();

        let outcome = a.analyze(&chunks).await.unwrap();
        assert_eq!(outcome.unscored_chunks, chunks.len());
        assert!(outcome.segments.is_empty());
    }

    #[tokio::test]
    async fn chunk_cap_limits_processing() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Ok(vec![]),
        });
        let config = AnalysisConfig {
            max_chunks: 2,
            ..test_config()
        };
        let a = analyzer(Arc::clone(&finder), 0.9, config);
        // Distinct chunk text, so no lookup is deduplicated by the cache
        let text: String = ('a'..='z').cycle().take(140).collect();
        let chunks = chunk_text(&text, 40, 10).unwrap();
        assert!(chunks.len() > 2);

        let outcome = a.analyze(&chunks).await.unwrap();
        assert!(outcome.chunk_cap_reached);
        assert_eq!(outcome.chunks_processed, 2);
        assert_eq!(finder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn candidate_search_is_cached_across_calls() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Ok(vec![]),
        });
        let a = analyzer(Arc::clone(&finder), 0.9, test_config());
        let chunks = chunk_text(&"z".repeat(40), 40, 10).unwrap();

        a.analyze(&chunks).await.unwrap();
        a.analyze(&chunks).await.unwrap();
        // Second pass served from cache
        assert_eq!(finder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credential_surfaces_as_configuration_error() {
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| Err(CollaboratorError::NotConfigured("ORIGINALITY_SEARCH_API_KEY")),
        });
        let a = analyzer(finder, 0.9, test_config());
        let chunks = chunk_text(&"z".repeat(40), 40, 10).unwrap();

        let err = a.analyze(&chunks).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn retry_recovers_transient_search_failures() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let finder = Arc::new(StaticFinder {
            calls: AtomicUsize::new(0),
            result: |_| {
                if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CollaboratorError::Status(502))
                } else {
                    Ok(vec![])
                }
            },
        });
        let config = AnalysisConfig {
            max_attempts: 3,
            ..test_config()
        };
        let a = analyzer(finder, 0.9, config);
        let chunks = chunk_text(&"z".repeat(40), 40, 10).unwrap();

        let outcome = a.analyze(&chunks).await.unwrap();
        assert!(outcome.segments.is_empty());
        assert!(CALLS.load(Ordering::SeqCst) >= 2);
    }
}
