//! Sliding-window chunking of normalized text
//!
//! Chunks are the unit of comparison against external sources. Windows are
//! fixed-size with a fixed overlap so that a passage straddling a window
//! boundary still lands wholly inside at least one chunk.

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk window: chunk_size={chunk_size}, overlap={overlap} (overlap must be smaller than chunk_size)")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// One window of the normalized text, with char-offset position tracking
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.end_index - self.start_index
    }
}

/// Split text into overlapping windows of `chunk_size` characters, advancing
/// by `chunk_size - overlap` each step. The last chunk is clipped to the text
/// end, so the windows always cover `[0, len)` with no gaps.
///
/// `overlap >= chunk_size` (or a zero chunk size) would never advance and is
/// rejected as a configuration error rather than looping forever.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, ChunkError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ChunkError::InvalidWindow {
            chunk_size,
            overlap,
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Ok(vec![]);
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(len / step + 1);
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(len);
        chunks.push(TextChunk {
            text: chars[start..end].iter().collect(),
            start_index: start,
            end_index: end,
        });
        if end == len {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the original text by dropping each chunk's overlap with its predecessor
    fn reconstruct(chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for chunk in chunks {
            let skip = covered - chunk.start_index;
            out.extend(chunk.text.chars().skip(skip));
            covered = chunk.end_index;
        }
        out
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(matches!(
            chunk_text("abc", 10, 10),
            Err(ChunkError::InvalidWindow { .. })
        ));
        assert!(matches!(
            chunk_text("abc", 10, 15),
            Err(ChunkError::InvalidWindow { .. })
        ));
        assert!(matches!(
            chunk_text("abc", 0, 0),
            Err(ChunkError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn short_text_yields_single_clipped_chunk() {
        let chunks = chunk_text("hello", 10, 2).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].end_index, 5);
    }

    #[test]
    fn chunks_cover_text_with_exact_overlap() {
        let text: String = ('a'..='z').cycle().take(137).collect();
        let (chunk_size, overlap) = (40, 10);
        let chunks = chunk_text(&text, chunk_size, overlap).unwrap();

        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks.last().unwrap().end_index, 137);

        for pair in chunks.windows(2) {
            // No gap, and consecutive chunks share exactly `overlap` chars
            // (the last chunk may be clipped shorter)
            assert_eq!(pair[1].start_index, pair[0].end_index - overlap);
        }
        for chunk in &chunks {
            assert!(chunk.char_len() <= chunk_size);
            assert_eq!(chunk.text.chars().count(), chunk.char_len());
        }
    }

    #[test]
    fn deoverlapped_concatenation_reconstructs_input() {
        for len in [1usize, 9, 30, 31, 59, 60, 61, 100, 233] {
            let text: String = ('a'..='z').cycle().take(len).collect();
            let chunks = chunk_text(&text, 30, 7).unwrap();
            assert_eq!(reconstruct(&chunks), text, "len={}", len);
        }
    }

    #[test]
    fn multibyte_text_indices_are_char_offsets() {
        let text = "风格迁移文本".repeat(12);
        let chunks = chunk_text(&text, 10, 3).unwrap();
        assert_eq!(chunks.last().unwrap().end_index, text.chars().count());
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn window_exactly_at_end_terminates() {
        // len == chunk_size must produce exactly one chunk
        let chunks = chunk_text(&"x".repeat(40), 40, 10).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
