//! Report data model for plagiarism and AI-authorship analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Likelihood threshold at or above which a document is considered likely AI-generated
pub const LIKELY_AI_THRESHOLD: f64 = 0.7;

/// Likelihood threshold at or below which a document is considered likely human-written
pub const LIKELY_HUMAN_THRESHOLD: f64 = 0.3;

/// A candidate web source matched against a chunk of the document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceMatch {
    /// URL of the published source
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Similarity between the chunk and this source, in [0, 1]
    pub similarity_score: f64,
}

/// A range of the document whose content matched at least one web source
/// above the suspicious-similarity threshold
///
/// Indices are character offsets into the normalized text. Segments are
/// created per chunk during concurrent analysis and are immutable afterward;
/// the aggregator sorts and merges them before computing coverage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuspiciousSegment {
    pub start_index: usize,
    pub end_index: usize,
    /// Short preview of the implicated text
    pub text_preview: String,
    /// Highest similarity score among the matched sources
    pub similarity_score: f64,
    pub sources: Vec<SourceMatch>,
}

impl SuspiciousSegment {
    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verdict on whether the document was machine-generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiVerdict {
    LikelyAi,
    LikelyHuman,
    Uncertain,
}

/// Whole-document AI-authorship judgment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct AiDetectionResult {
    /// Likelihood the document was machine-generated, in (0, 1) exclusive
    pub likelihood: f64,
    pub verdict: AiVerdict,
}

impl AiDetectionResult {
    /// Build a result whose verdict is derived from the likelihood thresholds.
    /// The likelihood is clamped into the open interval (0, 1).
    pub fn from_likelihood(likelihood: f64) -> Self {
        let likelihood = if likelihood.is_finite() {
            likelihood.clamp(0.001, 0.999)
        } else {
            0.5
        };

        let verdict = if likelihood >= LIKELY_AI_THRESHOLD {
            AiVerdict::LikelyAi
        } else if likelihood <= LIKELY_HUMAN_THRESHOLD {
            AiVerdict::LikelyHuman
        } else {
            AiVerdict::Uncertain
        };

        Self {
            likelihood,
            verdict,
        }
    }

    /// Re-derive the verdict from the likelihood, discarding whatever verdict
    /// the upstream classifier reported. The two must never disagree in a report.
    pub fn normalized(&self) -> Self {
        Self::from_likelihood(self.likelihood)
    }
}

/// Three-tier risk summary combining plagiarism coverage and the authorship signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bump the risk one level (high stays high)
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium | RiskLevel::High => RiskLevel::High,
        }
    }
}

/// Whether the final report reflects full, degraded, or failed analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    PartialSuccess,
    Error,
}

/// Final analysis report, created once at the end of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlagiarismReport {
    /// Character length of the normalized text that was analyzed
    pub normalized_text_length: usize,
    /// Character length before truncation, when truncation occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text_length: Option<usize>,
    /// Share of the text implicated by merged suspicious segments, in [0, 100]
    pub plagiarism_percentage: f64,
    pub risk_level: RiskLevel,
    pub suspicious_segments: Vec<SuspiciousSegment>,
    pub ai_generated_likelihood: f64,
    pub ai_verdict: AiVerdict,
    /// Human-readable summary of findings and any degraded-analysis notices
    pub explanation: String,
    pub analysis_status: AnalysisStatus,
    pub generated_at: DateTime<Utc>,
}

/// Error taxonomy exposed to callers of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing/invalid input or missing credentials
    BadRequest,
    /// No usable text could be obtained from the document
    ExtractionError,
    /// An external judgment service failed after retries were exhausted
    UpstreamError,
    /// Anything else unexpected
    AnalysisError,
}

/// The orchestrator's only output type
///
/// The transport layer translates this into a response body; the pipeline
/// itself never produces HTTP status codes and never fails.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PlagiarismReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PipelineResult {
    pub fn success(report: PlagiarismReport) -> Self {
        Self {
            ok: true,
            report: Some(report),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            report: None,
            error_kind: Some(kind),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_follows_likelihood_thresholds() {
        assert_eq!(AiDetectionResult::from_likelihood(0.9).verdict, AiVerdict::LikelyAi);
        assert_eq!(AiDetectionResult::from_likelihood(0.7).verdict, AiVerdict::LikelyAi);
        assert_eq!(AiDetectionResult::from_likelihood(0.5).verdict, AiVerdict::Uncertain);
        assert_eq!(AiDetectionResult::from_likelihood(0.3).verdict, AiVerdict::LikelyHuman);
        assert_eq!(AiDetectionResult::from_likelihood(0.05).verdict, AiVerdict::LikelyHuman);
    }

    #[test]
    fn likelihood_clamped_to_open_interval() {
        let low = AiDetectionResult::from_likelihood(0.0);
        assert!(low.likelihood > 0.0);
        let high = AiDetectionResult::from_likelihood(1.0);
        assert!(high.likelihood < 1.0);
        let nan = AiDetectionResult::from_likelihood(f64::NAN);
        assert_eq!(nan.verdict, AiVerdict::Uncertain);
    }

    #[test]
    fn contradictory_upstream_verdict_is_overridden() {
        // A classifier claiming likely_human at 0.95 must be corrected
        let upstream = AiDetectionResult {
            likelihood: 0.95,
            verdict: AiVerdict::LikelyHuman,
        };
        assert_eq!(upstream.normalized().verdict, AiVerdict::LikelyAi);
    }

    #[test]
    fn risk_escalation_saturates() {
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::Medium);
        assert_eq!(RiskLevel::Medium.escalate(), RiskLevel::High);
        assert_eq!(RiskLevel::High.escalate(), RiskLevel::High);
    }
}
