//! Whole-document AI-authorship classification collaborator

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::extractor::ExtractionError;
use rig::providers::openai;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::AiDetectionResult;
use crate::service::cache_keys::AUTHORSHIP_SAMPLE_CHARS;
use crate::service::{CollaboratorError, LlmClient};

/// Default model for authorship judgments
const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

/// Collaborator interface: judge whether the document was machine-generated
#[async_trait]
pub trait AuthorshipClassifier: Send + Sync {
    async fn classify(&self, full_text: &str) -> Result<AiDetectionResult, CollaboratorError>;
}

/// Model-extractable authorship judgment
///
/// The model also reports a verdict string, but the pipeline re-derives the
/// verdict from the likelihood thresholds; only the likelihood is binding.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthorshipJudgment {
    /// Likelihood the text was machine-generated, from 0.0 to 1.0
    pub likelihood: f64,
    /// One of "likely_ai", "likely_human", "uncertain"
    pub verdict: String,
}

/// Authorship classifier backed by the shared LLM client
pub struct AuthorshipService {
    llm: LlmClient,
    model: String,
}

impl AuthorshipService {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn build_prompt(full_text: &str) -> String {
        let sample: String = full_text.chars().take(AUTHORSHIP_SAMPLE_CHARS).collect();
        format!(
            r#"Assess whether the following document was written by a human or generated by a language model.

Document:
---
{sample}
---

Report your likelihood that the document is machine-generated."#
        )
    }
}

#[async_trait]
impl AuthorshipClassifier for AuthorshipService {
    async fn classify(&self, full_text: &str) -> Result<AiDetectionResult, CollaboratorError> {
        let prompt = Self::build_prompt(full_text);

        let extractor = self
            .llm
            .openai_client()
            .extractor::<AuthorshipJudgment>(&self.model)
            .preamble(AUTHORSHIP_SYSTEM_PROMPT)
            .build();

        match extractor.extract(&prompt).await {
            Ok(judgment) => {
                let result = AiDetectionResult::from_likelihood(judgment.likelihood);
                tracing::debug!(
                    likelihood = result.likelihood,
                    verdict = ?result.verdict,
                    model_verdict = %judgment.verdict,
                    "Authorship classification complete"
                );
                Ok(result)
            }
            Err(ExtractionError::NoData) | Err(ExtractionError::DeserializationError(_)) => {
                // An unusable judgment degrades to "uncertain" rather than
                // failing the run
                tracing::debug!("Authorship judgment unparseable, reporting uncertain");
                Ok(AiDetectionResult::from_likelihood(0.5))
            }
            Err(e) => Err(CollaboratorError::Model(e.to_string())),
        }
    }
}

/// System prompt for authorship judgments
const AUTHORSHIP_SYSTEM_PROMPT: &str = r#"You are a forensic linguist specializing in detecting machine-generated text.

Assess the document for signals of language-model generation: uniform sentence rhythm, hedged and non-committal phrasing, absence of idiosyncratic errors, formulaic transitions, and surface-level coverage of many points without depth.

Calibrate the likelihood:
- above 0.9: strong, multiple independent signals of generation
- 0.7-0.9: generation more plausible than human authorship
- 0.3-0.7: genuinely uncertain
- 0.1-0.3: human authorship more plausible
- below 0.1: strong signals of human authorship

Base the judgment only on the text itself. Do not penalize competent, polished writing on its own."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_samples_document_prefix() {
        let text = "y".repeat(AUTHORSHIP_SAMPLE_CHARS * 2);
        let prompt = AuthorshipService::build_prompt(&text);
        assert!(prompt.chars().count() < AUTHORSHIP_SAMPLE_CHARS + 500);
    }
}
