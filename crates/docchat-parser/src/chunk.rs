//! Fixed-size sliding window chunker
//!
//! Offsets are counted in chars so a window never ends inside a multi-byte
//! code point.

use docchat_core::{ChunkingConfig, DocChatError, Result};

/// A chunk of text from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Trimmed window content
    pub content: String,

    /// Position among the emitted (non-empty) chunks
    pub index: usize,

    /// Char offset where the untrimmed window starts
    pub start_offset: usize,

    /// Char offset where the untrimmed window ends (exclusive)
    pub end_offset: usize,
}

impl TextChunk {
    /// Stable record identifier
    pub fn id(&self) -> String {
        format!("doc-{}", self.index)
    }
}

/// Identifiers for a chunk sequence, in order
pub fn chunk_ids(chunks: &[TextChunk]) -> Vec<String> {
    chunks.iter().map(TextChunk::id).collect()
}

/// Split `text` using the configured window size and overlap
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    split_text(text, config.chunk_size, config.overlap)
}

/// Split `text` into windows of `chunk_size` chars advancing by
/// `chunk_size - overlap`. Windows that are blank after trimming are dropped.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    if chunk_size == 0 {
        return Err(DocChatError::ValidationError(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(DocChatError::ValidationError(format!(
            "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    // Byte position of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        let window = text[boundaries[start]..boundaries[end]].trim();

        if !window.is_empty() {
            chunks.push(TextChunk {
                content: window.to_string(),
                index: chunks.len(),
                start_offset: start,
                end_offset: end,
            });
        }

        start += chunk_size - overlap;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 800, 200).unwrap().is_empty());
    }

    #[test]
    fn test_thousand_chars_two_chunks() {
        let text = "x".repeat(1000);
        let chunks = split_text(&text, 800, 200).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].content.len(), 800);
        assert_eq!(chunks[1].start_offset, 600);
        assert_eq!(chunks[1].content.len(), 400);
    }

    #[test]
    fn test_blank_windows_dropped_and_indices_dense() {
        let text = format!("{}{}{}", "a".repeat(10), " ".repeat(20), "b".repeat(10));
        let chunks = split_text(&text, 10, 0).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a".repeat(10));
        assert_eq!(chunks[1].content, "b".repeat(10));
        assert_eq!(chunks[1].start_offset, 30);
        assert_eq!(chunk_ids(&chunks), vec!["doc-0", "doc-1"]);
    }

    #[test]
    fn test_windows_are_trimmed() {
        let chunks = split_text("  hello  world  ", 8, 0).unwrap();
        assert_eq!(chunks[0].content, "hello");
        assert_eq!(chunks[1].content, "world");
    }

    #[test]
    fn test_multibyte_text() {
        let text = "가나다라마바사아자차";
        let chunks = split_text(text, 4, 1).unwrap();

        assert_eq!(chunks[0].content, "가나다라");
        assert_eq!(chunks[1].content, "라마바사");
        assert_eq!(chunks[2].content, "사아자차");
        assert_eq!(chunks[3].content, "차");
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            split_text("abc", 0, 0),
            Err(DocChatError::ValidationError(_))
        ));
        assert!(matches!(
            split_text("abc", 10, 10),
            Err(DocChatError::ValidationError(_))
        ));
    }

    #[test]
    fn test_chunk_with_default_config() {
        let config = ChunkingConfig::default();
        assert_eq!(config.step(), 600);

        let text = "y".repeat(1500);
        let chunks = chunk_text(&text, &config).unwrap();
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 600, 1200]);
    }

    proptest! {
        #[test]
        fn prop_windows_cover_text_without_gaps(
            text in "[a-z0-9]{0,400}",
            chunk_size in 1usize..64,
            overlap_seed in 0usize..64,
        ) {
            let overlap = overlap_seed % chunk_size;
            let chunks = split_text(&text, chunk_size, overlap).unwrap();
            let chars: Vec<char> = text.chars().collect();

            if chars.is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(chunks[0].start_offset, 0);
                prop_assert_eq!(chunks.last().unwrap().end_offset, chars.len());
            }

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.start_offset, i * (chunk_size - overlap));
                let span: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
                prop_assert_eq!(&chunk.content, &span);
            }

            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start_offset <= pair[0].end_offset);
            }
        }

        #[test]
        fn prop_deterministic(text in "\\PC{0,300}", chunk_size in 1usize..50) {
            let overlap = chunk_size / 3;
            let first = split_text(&text, chunk_size, overlap).unwrap();
            let second = split_text(&text, chunk_size, overlap).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
