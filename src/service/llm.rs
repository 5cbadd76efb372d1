//! Shared LLM client for the judgment services
//!
//! Similarity scoring and authorship classification both go through the same
//! OpenAI client; each service builds its own extractor on top of it.

use rig::providers::openai;

/// Environment variable for the OpenAI API key
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("missing required configuration: {0}")]
    MissingKey(&'static str),
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    pub fn new(api_key: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
        }
    }

    /// Create a client from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            std::env::var(ENV_OPENAI_API_KEY).map_err(|_| LlmError::MissingKey(ENV_OPENAI_API_KEY))?;
        Ok(Self::new(&api_key))
    }

    /// Get a reference to the underlying OpenAI client.
    /// Use this to create extractors with custom configuration.
    pub fn openai_client(&self) -> &openai::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_configuration_error() {
        std::env::remove_var(ENV_OPENAI_API_KEY);
        assert!(matches!(
            LlmClient::from_env(),
            Err(LlmError::MissingKey(ENV_OPENAI_API_KEY))
        ));
    }
}
