//! Filtered token views over the book and the transcript.
//!
//! A view is the normalized token stream the aligner actually sees, plus
//! parallel back-maps to the original positions. Back-references go through
//! index arrays, not graph edges: `filtered_to_original` is strictly
//! increasing and `original_to_filtered` answers the reverse lookup in O(1).

use crate::normalize::normalize;
use crate::types::{AsrResponse, BookIndex};

/// Filtered view of the manuscript words.
#[derive(Debug, Clone)]
pub struct BookView {
    /// Normalized token per kept word. A word that expands (digit spelling)
    /// stays a single multi-word token.
    pub tokens: Vec<String>,
    /// Filtered index → original word index. Strictly increasing.
    pub filtered_to_original: Vec<usize>,
    /// Original word index → filtered index, `None` for dropped words.
    pub original_to_filtered: Vec<Option<usize>>,
    /// Filtered index → sentence id.
    pub sentence_index: Vec<usize>,
}

impl BookView {
    /// Filtered position of the first kept word at or after `word`.
    pub fn filtered_at_or_after(&self, word: usize) -> Option<usize> {
        let idx = self.filtered_to_original.partition_point(|&o| o < word);
        (idx < self.filtered_to_original.len()).then_some(idx)
    }

    /// Filtered position of the last kept word at or before `word`.
    pub fn filtered_at_or_before(&self, word: usize) -> Option<usize> {
        let idx = self.filtered_to_original.partition_point(|&o| o <= word);
        idx.checked_sub(1)
    }
}

/// Filtered view of the ASR tokens.
#[derive(Debug, Clone)]
pub struct AsrView {
    pub tokens: Vec<String>,
    pub filtered_to_original: Vec<usize>,
    pub original_to_filtered: Vec<Option<usize>>,
}

/// Normalize every book word, dropping words that normalize to nothing
/// (pure punctuation).
pub fn book_view(book: &BookIndex) -> BookView {
    let mut tokens = Vec::with_capacity(book.words.len());
    let mut filtered_to_original = Vec::with_capacity(book.words.len());
    let mut original_to_filtered = vec![None; book.words.len()];
    let mut sentence_index = Vec::with_capacity(book.words.len());

    for word in &book.words {
        let normalized = normalize(&word.text, true, true);
        if normalized.is_empty() {
            continue;
        }
        original_to_filtered[word.word_index] = Some(tokens.len());
        filtered_to_original.push(word.word_index);
        sentence_index.push(word.sentence_index);
        tokens.push(normalized);
    }

    BookView {
        tokens,
        filtered_to_original,
        original_to_filtered,
        sentence_index,
    }
}

/// Normalize every ASR token word, dropping empties.
pub fn asr_view(asr: &AsrResponse) -> AsrView {
    let mut tokens = Vec::with_capacity(asr.tokens.len());
    let mut filtered_to_original = Vec::with_capacity(asr.tokens.len());
    let mut original_to_filtered = vec![None; asr.tokens.len()];

    for (i, tok) in asr.tokens.iter().enumerate() {
        let normalized = normalize(&tok.word, true, true);
        if normalized.is_empty() {
            continue;
        }
        original_to_filtered[i] = Some(tokens.len());
        filtered_to_original.push(i);
        tokens.push(normalized);
    }

    AsrView {
        tokens,
        filtered_to_original,
        original_to_filtered,
    }
}
