//! Text extraction seam for uploaded documents
//!
//! Decoding of rich document formats happens outside this service; the
//! pipeline only requires a collaborator that turns bytes into UTF-8 text or
//! reports an extraction error. The production adapter handles plain text.

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("document contains no decodable UTF-8 text")]
    Undecodable,

    #[error("unsupported document type: {0}")]
    Unsupported(String),
}

/// Collaborator that produces raw text from uploaded bytes
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, ExtractError>;
}

/// Extractor for plain-text uploads (.txt, .md, or untyped)
pub struct PlainTextExtractor;

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, ExtractError> {
        if let Some(name) = file_name {
            if let Some(ext) = name.rsplit('.').next().filter(|ext| *ext != name) {
                let ext = ext.to_ascii_lowercase();
                if !PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) {
                    return Err(ExtractError::Unsupported(ext));
                }
            }
        }

        let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::Undecodable)?;

        // Strip a UTF-8 BOM if present
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        if text.trim().is_empty() {
            return Err(ExtractError::Undecodable);
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_text() {
        let text = PlainTextExtractor
            .extract(b"hello world", Some("notes.txt"))
            .unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn strips_bom() {
        let text = PlainTextExtractor
            .extract("\u{feff}content".as_bytes(), None)
            .unwrap();
        assert_eq!(text, "content");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = PlainTextExtractor.extract(&[0xff, 0xfe, 0x00], None).unwrap_err();
        assert!(matches!(err, ExtractError::Undecodable));
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = PlainTextExtractor
            .extract(b"%PDF-1.4", Some("paper.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(ext) if ext == "pdf"));
    }

    #[test]
    fn file_name_without_extension_is_treated_as_text() {
        let text = PlainTextExtractor.extract(b"raw", Some("README")).unwrap();
        assert_eq!(text, "raw");
    }
}
