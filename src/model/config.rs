use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::service::retry::RetryPolicy;

const ENV_CONFIG_PATH: &str = "ORIGINALITY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Tunable parameters of the analysis pipeline
///
/// All fields can be overridden from the YAML config file; defaults match
/// the deployed service.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Window size of a chunk, in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters (must be < chunk_size)
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Maximum number of chunks analyzed concurrently per batch
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Pause between batches, in milliseconds
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Cap on the number of chunks analyzed per document
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    /// Top-N search candidates scored per chunk
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Minimum similarity for a source to be kept as a match
    #[serde(default = "default_keep_threshold")]
    pub keep_threshold: f64,
    /// Minimum best-match similarity for a chunk to become a suspicious segment
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f64,
    /// Minimum accepted length of normalized text, in characters
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
    /// Normalized text longer than this is truncated, in characters
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    /// Overall deadline for one pipeline run, in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Maximum attempts for retryable collaborator calls
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial retry backoff delay, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff delay ceiling, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}
fn default_max_concurrent() -> usize {
    3
}
fn default_batch_pause_ms() -> u64 {
    500
}
fn default_max_chunks() -> usize {
    40
}
fn default_max_candidates() -> usize {
    3
}
fn default_keep_threshold() -> f64 {
    0.3
}
fn default_suspicious_threshold() -> f64 {
    0.5
}
fn default_min_text_len() -> usize {
    50
}
fn default_max_text_len() -> usize {
    200_000
}
fn default_deadline_secs() -> u64 {
    45
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            max_concurrent: default_max_concurrent(),
            batch_pause_ms: default_batch_pause_ms(),
            max_chunks: default_max_chunks(),
            max_candidates: default_max_candidates(),
            keep_threshold: default_keep_threshold(),
            suspicious_threshold: default_suspicious_threshold(),
            min_text_len: default_min_text_len(),
            max_text_len: default_max_text_len(),
            deadline_secs: default_deadline_secs(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl AnalysisConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let analysis = Self::load_config_file(&config_path)
            .and_then(|cf| cf.analysis)
            .unwrap_or_default();

        Self {
            analysis,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.overlap < cfg.chunk_size);
        assert!(cfg.keep_threshold < cfg.suspicious_threshold);
        assert!(cfg.min_text_len < cfg.max_text_len);
    }

    #[test]
    fn partial_yaml_overrides_keep_defaults() {
        let cf: ConfigFile =
            serde_yaml::from_str("analysis:\n  chunk_size: 800\n  max_chunks: 10\n").unwrap();
        let analysis = cf.analysis.unwrap();
        assert_eq!(analysis.chunk_size, 800);
        assert_eq!(analysis.max_chunks, 10);
        assert_eq!(analysis.overlap, default_overlap());
        assert_eq!(analysis.max_concurrent, default_max_concurrent());
    }
}
