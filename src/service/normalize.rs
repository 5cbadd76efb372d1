//! Text normalization applied before chunking and analysis

use crate::model::AnalysisConfig;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("text is too short to analyze: {actual} characters (minimum {min})")]
    TooShort { actual: usize, min: usize },
}

/// Sanitized text ready for chunking, immutable after construction
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    /// Character length of `text`
    pub char_len: usize,
    /// Character length of the normalized text before truncation
    pub original_len: usize,
    /// Whether the text was cut to the configured maximum length
    pub truncated: bool,
}

/// Sanitize raw text: strip control characters (keeping newlines and tabs),
/// collapse runs of spaces and tabs, collapse 3+ consecutive newlines to 2,
/// and trim the ends.
///
/// Fails if the result is shorter than `min_text_len`; silently truncates at
/// `max_text_len` characters and records that truncation occurred so the
/// orchestrator can surface it in the explanation.
pub fn normalize(raw: &str, config: &AnalysisConfig) -> Result<NormalizedText, NormalizeError> {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut newline_run: usize = 0;

    for c in raw.chars() {
        match c {
            ' ' | '\t' => pending_space = true,
            '\n' => {
                newline_run += 1;
                pending_space = false;
            }
            '\r' => {}
            c if c.is_control() => {}
            c => {
                if newline_run > 0 {
                    if !out.is_empty() {
                        for _ in 0..newline_run.min(2) {
                            out.push('\n');
                        }
                    }
                    newline_run = 0;
                } else if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    let original_len = out.chars().count();

    if original_len < config.min_text_len {
        return Err(NormalizeError::TooShort {
            actual: original_len,
            min: config.min_text_len,
        });
    }

    let truncated = original_len > config.max_text_len;
    if truncated {
        out = out.chars().take(config.max_text_len).collect();
    }

    let char_len = if truncated {
        config.max_text_len
    } else {
        original_len
    };

    Ok(NormalizedText {
        text: out,
        char_len,
        original_len,
        truncated,
    })
}
