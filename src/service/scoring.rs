//! Chunk-vs-source similarity scoring collaborator
//!
//! Judges how much of a chunk's text is reproduced in a candidate source
//! snippet. Backed by a hosted model via a rig extractor; the judgment is
//! deterministic enough to be cached by input hash.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::extractor::ExtractionError;
use rig::providers::openai;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::service::{CollaboratorError, LlmClient};

/// Default model for similarity judgments
const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

/// Longest chunk/snippet slice included in the prompt, in characters
const MAX_PROMPT_CHARS: usize = 2_000;

/// Collaborator interface: score similarity between chunk text and a source snippet
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Returns a score in [0, 1]. An unusable model response yields `0.0`
    /// rather than an error: a conservative score is preferable to aborting
    /// the whole analysis.
    async fn score_similarity(
        &self,
        chunk_text: &str,
        snippet: &str,
    ) -> Result<f64, CollaboratorError>;
}

/// Model-extractable similarity judgment
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SimilarityJudgment {
    /// Similarity between the two passages, from 0.0 (unrelated) to 1.0 (verbatim copy)
    pub similarity: f64,
}

/// Similarity scorer backed by the shared LLM client
pub struct SimilarityService {
    llm: LlmClient,
    model: String,
}

impl SimilarityService {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn build_prompt(chunk_text: &str, snippet: &str) -> String {
        let chunk: String = chunk_text.chars().take(MAX_PROMPT_CHARS).collect();
        let snippet: String = snippet.chars().take(MAX_PROMPT_CHARS).collect();
        format!(
            r#"Compare the following passage against the candidate source excerpt.

Passage:
---
{chunk}
---

Candidate source excerpt:
---
{snippet}
---

Judge how much of the passage is reproduced in the excerpt."#
        )
    }
}

#[async_trait]
impl SimilarityScorer for SimilarityService {
    async fn score_similarity(
        &self,
        chunk_text: &str,
        snippet: &str,
    ) -> Result<f64, CollaboratorError> {
        let prompt = Self::build_prompt(chunk_text, snippet);

        let extractor = self
            .llm
            .openai_client()
            .extractor::<SimilarityJudgment>(&self.model)
            .preamble(SCORING_SYSTEM_PROMPT)
            .build();

        match extractor.extract(&prompt).await {
            Ok(judgment) => {
                let score = if judgment.similarity.is_finite() {
                    judgment.similarity.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                Ok(score)
            }
            Err(ExtractionError::NoData) => {
                tracing::debug!("Similarity extractor returned no data, scoring 0.0");
                Ok(0.0)
            }
            Err(ExtractionError::DeserializationError(e)) => {
                tracing::debug!(error = %e, "Similarity judgment unparseable, scoring 0.0");
                Ok(0.0)
            }
            Err(e) => Err(CollaboratorError::Model(e.to_string())),
        }
    }
}

/// System prompt for similarity judgments
const SCORING_SYSTEM_PROMPT: &str = r#"You are a plagiarism analyst. You compare a passage from a submitted document against an excerpt from a published web source and judge textual similarity.

Scoring guidance:
- 1.0: the excerpt reproduces the passage verbatim or near-verbatim
- 0.7-0.9: heavy overlap with light paraphrasing
- 0.4-0.6: clear paraphrase of the same content
- 0.1-0.3: same topic, independently worded
- 0.0: unrelated content

Judge textual reproduction, not topical overlap. Shared terminology alone does not indicate copying. Return only the similarity score."#;
