//! Aggregation of per-chunk signals into one risk-scored report
//!
//! Coverage is computed over merged character ranges: overlapping windows
//! must not double-count the text they share, so segments are merged into
//! non-overlapping ranges before the percentage is taken.

use chrono::Utc;

use crate::model::{
    AiDetectionResult, AiVerdict, AnalysisStatus, PlagiarismReport, RiskLevel, SourceMatch,
    SuspiciousSegment,
};
use crate::service::analysis::ChunkAnalysisOutcome;
use crate::service::normalize::NormalizedText;

// Weights of the blended risk score
const COVERAGE_WEIGHT: f64 = 0.6;
const AUTHORSHIP_WEIGHT: f64 = 0.4;

// Blended-score thresholds
const HIGH_RISK_SCORE: f64 = 60.0;
const MEDIUM_RISK_SCORE: f64 = 30.0;

/// Likelihood above which a likely_ai verdict escalates the risk level
const ESCALATION_LIKELIHOOD: f64 = 0.7;

/// Sort segments by start index and merge adjacent/overlapping ranges.
///
/// Merging is idempotent: merging an already-merged set yields the same set.
/// Sources of merged segments are combined, deduplicated by URL keeping the
/// best score.
pub fn merge_segments(mut segments: Vec<SuspiciousSegment>) -> Vec<SuspiciousSegment> {
    if segments.is_empty() {
        return segments;
    }

    segments.sort_by_key(|s| (s.start_index, s.end_index));

    let mut merged: Vec<SuspiciousSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(current) if segment.start_index <= current.end_index => {
                current.end_index = current.end_index.max(segment.end_index);
                current.similarity_score = current.similarity_score.max(segment.similarity_score);
                merge_sources(&mut current.sources, segment.sources);
            }
            _ => merged.push(segment),
        }
    }

    merged
}

fn merge_sources(into: &mut Vec<SourceMatch>, from: Vec<SourceMatch>) {
    for source in from {
        match into.iter_mut().find(|s| s.url == source.url) {
            Some(existing) => {
                if source.similarity_score > existing.similarity_score {
                    *existing = source;
                }
            }
            None => into.push(source),
        }
    }
    into.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Share of the text covered by merged segments, in [0, 100]
pub fn plagiarism_percentage(merged: &[SuspiciousSegment], text_char_len: usize) -> f64 {
    if text_char_len == 0 {
        return 0.0;
    }
    let covered: usize = merged.iter().map(SuspiciousSegment::len).sum();
    (covered as f64 / text_char_len as f64 * 100.0).clamp(0.0, 100.0)
}

/// Combine coverage and the authorship signal into a three-tier risk level.
///
/// A confident likely_ai verdict escalates the blended outcome one level:
/// heavy machine generation is a risk even when little of the text matches
/// published sources.
pub fn risk_level(percentage: f64, ai: &AiDetectionResult) -> RiskLevel {
    let blended = percentage * COVERAGE_WEIGHT + ai.likelihood * 100.0 * AUTHORSHIP_WEIGHT;

    let base = if blended >= HIGH_RISK_SCORE {
        RiskLevel::High
    } else if blended >= MEDIUM_RISK_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if ai.verdict == AiVerdict::LikelyAi && ai.likelihood > ESCALATION_LIKELIHOOD {
        base.escalate()
    } else {
        base
    }
}

/// Degradations observed during the run, surfaced in the explanation
#[derive(Debug, Default)]
pub struct DegradationNotices {
    pub chunk_cap_reached: bool,
    pub max_chunks: usize,
    pub unscored_chunks: usize,
    pub chunks_processed: usize,
    pub text_truncated: bool,
    pub max_text_len: usize,
}

impl DegradationNotices {
    pub fn any(&self) -> bool {
        self.chunk_cap_reached || self.unscored_chunks > 0 || self.text_truncated
    }
}

/// Human-readable summary of the findings and any degraded-analysis notices
pub fn build_explanation(
    merged: &[SuspiciousSegment],
    percentage: f64,
    ai: &AiDetectionResult,
    risk: RiskLevel,
    notices: &DegradationNotices,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if merged.is_empty() {
        parts.push("No overlap with published web sources was found.".to_string());
    } else {
        parts.push(format!(
            "Found {} suspicious segment(s) covering {:.1}% of the analyzed text.",
            merged.len(),
            percentage
        ));
    }

    let verdict_text = match ai.verdict {
        AiVerdict::LikelyAi => "likely AI-generated",
        AiVerdict::LikelyHuman => "likely human-written",
        AiVerdict::Uncertain => "of uncertain authorship",
    };
    parts.push(format!(
        "The document is judged {} ({:.0}% AI likelihood).",
        verdict_text,
        ai.likelihood * 100.0
    ));

    let risk_text = match risk {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    };
    parts.push(format!("Overall risk: {}.", risk_text));

    if notices.text_truncated {
        parts.push(format!(
            "The input exceeded the {}-character limit and was truncated for analysis.",
            notices.max_text_len
        ));
    }
    if notices.chunk_cap_reached {
        parts.push(format!(
            "Only the first {} chunks were analyzed; coverage may be underestimated.",
            notices.max_chunks
        ));
    }
    if notices.unscored_chunks > 0 {
        if notices.unscored_chunks >= notices.chunks_processed {
            parts.push(
                "Web search results were unavailable for the analyzed chunks; \
                 plagiarism coverage may be underestimated."
                    .to_string(),
            );
        } else {
            parts.push(format!(
                "{} chunk(s) could not be checked against web sources.",
                notices.unscored_chunks
            ));
        }
    }

    parts.join(" ")
}

/// Assemble the final report from the chunk outcome and authorship judgment
pub fn build_report(
    normalized: &NormalizedText,
    outcome: ChunkAnalysisOutcome,
    ai: AiDetectionResult,
    max_chunks: usize,
    max_text_len: usize,
) -> PlagiarismReport {
    let ai = ai.normalized();
    let merged = merge_segments(outcome.segments);
    let percentage = plagiarism_percentage(&merged, normalized.char_len);
    let risk = risk_level(percentage, &ai);

    let notices = DegradationNotices {
        chunk_cap_reached: outcome.chunk_cap_reached,
        max_chunks,
        unscored_chunks: outcome.unscored_chunks,
        chunks_processed: outcome.chunks_processed,
        text_truncated: normalized.truncated,
        max_text_len,
    };

    let explanation = build_explanation(&merged, percentage, &ai, risk, &notices);

    let analysis_status = if notices.any() {
        AnalysisStatus::PartialSuccess
    } else {
        AnalysisStatus::Success
    };

    PlagiarismReport {
        normalized_text_length: normalized.char_len,
        original_text_length: normalized.truncated.then_some(normalized.original_len),
        plagiarism_percentage: percentage,
        risk_level: risk,
        suspicious_segments: merged,
        ai_generated_likelihood: ai.likelihood,
        ai_verdict: ai.verdict,
        explanation,
        analysis_status,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: usize, end: usize, score: f64) -> SuspiciousSegment {
        SuspiciousSegment {
            start_index: start,
            end_index: end,
            text_preview: String::new(),
            similarity_score: score,
            sources: vec![SourceMatch {
                url: format!("https://example.com/{}", start),
                title: None,
                snippet: None,
                similarity_score: score,
            }],
        }
    }

    #[test]
    fn merges_overlapping_and_adjacent_ranges() {
        let merged = merge_segments(vec![
            segment(0, 40, 0.6),
            segment(30, 70, 0.8),
            segment(70, 100, 0.7),
            segment(200, 240, 0.9),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].start_index, merged[0].end_index), (0, 100));
        assert_eq!(merged[0].similarity_score, 0.8);
        assert_eq!(merged[0].sources.len(), 3);
        assert_eq!((merged[1].start_index, merged[1].end_index), (200, 240));
    }

    #[test]
    fn merge_is_idempotent() {
        let once = merge_segments(vec![
            segment(10, 50, 0.6),
            segment(45, 90, 0.7),
            segment(300, 320, 0.9),
        ]);
        let twice = merge_segments(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!((a.start_index, a.end_index), (b.start_index, b.end_index));
            assert_eq!(a.similarity_score, b.similarity_score);
            assert_eq!(a.sources.len(), b.sources.len());
        }
    }

    #[test]
    fn unsorted_input_is_handled() {
        let merged = merge_segments(vec![segment(60, 90, 0.6), segment(0, 30, 0.7)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start_index, 0);
    }

    #[test]
    fn duplicate_source_urls_keep_best_score() {
        let mut a = segment(0, 40, 0.6);
        a.sources[0].url = "https://example.com/same".into();
        let mut b = segment(30, 70, 0.9);
        b.sources[0].url = "https://example.com/same".into();

        let merged = merge_segments(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sources.len(), 1);
        assert_eq!(merged[0].sources[0].similarity_score, 0.9);
    }

    #[test]
    fn percentage_is_bounded_and_zero_iff_empty() {
        assert_eq!(plagiarism_percentage(&[], 100), 0.0);
        assert_eq!(plagiarism_percentage(&[segment(0, 50, 0.9)], 100), 50.0);
        // Ranges covering everything cap at 100
        assert_eq!(plagiarism_percentage(&[segment(0, 100, 0.9)], 100), 100.0);
        assert!(plagiarism_percentage(&[segment(0, 10, 0.9)], 100) > 0.0);
    }

    #[test]
    fn risk_blends_coverage_and_likelihood() {
        let human = AiDetectionResult::from_likelihood(0.1);
        // 10*0.6 + 10*0.4 = 10 -> low
        assert_eq!(risk_level(10.0, &human), RiskLevel::Low);
        // 50*0.6 + 4 = 34 -> medium
        assert_eq!(risk_level(50.0, &human), RiskLevel::Medium);
        // 95*0.6 + 4 = 61 -> high
        assert_eq!(risk_level(95.0, &human), RiskLevel::High);
    }

    #[test]
    fn confident_ai_verdict_escalates_risk() {
        let ai = AiDetectionResult::from_likelihood(0.85);
        // 0*0.6 + 85*0.4 = 34 -> medium, escalated to high
        assert_eq!(risk_level(0.0, &ai), RiskLevel::High);

        let borderline = AiDetectionResult::from_likelihood(0.7);
        // 0 + 70*0.4 = 28 -> low, but likelihood is not strictly above 0.7
        assert_eq!(risk_level(0.0, &borderline), RiskLevel::Low);
    }

    #[test]
    fn explanation_mentions_degradations() {
        let ai = AiDetectionResult::from_likelihood(0.2);
        let notices = DegradationNotices {
            chunk_cap_reached: true,
            max_chunks: 40,
            unscored_chunks: 2,
            chunks_processed: 40,
            text_truncated: true,
            max_text_len: 200_000,
        };
        let text = build_explanation(&[], 0.0, &ai, RiskLevel::Low, &notices);
        assert!(text.contains("first 40 chunks"));
        assert!(text.contains("2 chunk(s)"));
        assert!(text.contains("truncated"));
        assert!(text.contains("likely human-written"));
    }
}
