//! Splitting lesson text into searchable chunks.
//!
//! Lesson bodies are cut at sentence boundaries into chunks of roughly
//! `chunk_size` characters, with trailing sentences of one chunk repeated at
//! the start of the next (up to `chunk_overlap` characters) so context that
//! straddles a boundary stays retrievable.

use regex::Regex;

/// Sentence-aware text chunker.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    sentence_end: Regex,
    whitespace: Regex,
}

impl TextChunker {
    /// Create a chunker with the given target size and overlap, in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        // Terminal punctuation, optional closing quote/bracket, then whitespace
        let sentence_end = Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("Invalid regex");
        let whitespace = Regex::new(r"\s+").expect("Invalid regex");

        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
            sentence_end,
            whitespace,
        }
    }

    /// Split text into sentences, normalizing internal whitespace.
    pub fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.sentence_end.find_iter(text) {
            let sentence = text[start..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = m.end();
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail);
        }

        sentences
    }

    /// Split text into overlapping chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let normalized = self.whitespace.replace_all(text.trim(), " ");
        let sentences = self.sentences(&normalized);

        let mut chunks = Vec::new();
        let mut i = 0;

        while i < sentences.len() {
            let mut current: Vec<&str> = Vec::new();
            let mut len = 0;
            let mut j = i;

            while j < sentences.len() {
                let sentence = sentences[j];
                let added = sentence.len() + usize::from(!current.is_empty());
                // An oversized sentence still becomes a chunk on its own
                if !current.is_empty() && len + added > self.chunk_size {
                    break;
                }
                current.push(sentence);
                len += added;
                j += 1;
            }

            chunks.push(current.join(" "));

            if j >= sentences.len() {
                break;
            }

            let mut overlap_len = 0;
            let mut overlap_count = 0;
            for sentence in current.iter().rev() {
                let added = sentence.len() + 1;
                if overlap_len + added > self.chunk_overlap {
                    break;
                }
                overlap_len += added;
                overlap_count += 1;
            }

            let next = j - overlap_count;
            i = if next > i { next } else { j };
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(800, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_split() {
        let chunker = TextChunker::default();
        let sentences = chunker.sentences("First one. Second? \"Third!\" fourth without end");
        assert_eq!(
            sentences,
            vec!["First one.", "Second?", "\"Third!\"", "fourth without end"]
        );
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(100, 20);
        let chunks = chunker.chunk("  A short   lesson.\nWith two lines. ");
        assert_eq!(chunks, vec!["A short lesson. With two lines.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = TextChunker::new(30, 13);
        let chunks = chunker.chunk("Alpha beta one. Gamma two. Delta three. Epsilon four.");

        assert_eq!(
            chunks,
            vec![
                "Alpha beta one. Gamma two.".to_string(),
                "Gamma two. Delta three.".to_string(),
                "Delta three. Epsilon four.".to_string(),
            ]
        );
    }

    #[test]
    fn test_oversized_sentence_stands_alone() {
        let chunker = TextChunker::new(10, 5);
        let chunks = chunker.chunk("This sentence is far longer than ten characters. Ok.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "Ok.");
    }

    #[test]
    fn test_empty_text() {
        assert!(TextChunker::default().chunk("   ").is_empty());
    }
}
