//! Locate which manuscript section a recording belongs to.
//!
//! Narrators read the section heading first, so the first few ASR words
//! usually spell out the title ("chapter seven ..."). Scoring is a longest
//! common prefix over normalized tokens with a bonus when both sides open
//! with the same heading keyword.

use crate::normalize::{normalize, tokenize_words};
use crate::types::{BookIndex, SectionRange};

/// Words that open a heading.
const HEADING_KEYWORDS: &[&str] = &[
    "chapter",
    "prologue",
    "epilogue",
    "preface",
    "introduction",
    "foreword",
    "prelude",
    "contents",
];

fn is_heading_keyword(token: &str) -> bool {
    HEADING_KEYWORDS.contains(&token)
}

/// Normalize and tokenize a title or spoken prefix for comparison.
///
/// Contractions expand; digits stay literal so "Chapter 7" and a spoken
/// "chapter 7" compare equal without double conversion.
fn title_tokens(text: &str) -> Vec<String> {
    tokenize_words(&normalize(text, true, false))
}

/// Detect the section the ASR prefix belongs to.
///
/// Forms the first `prefix_token_count` raw ASR words, scores each section
/// title by normalized-token common prefix (+1 when both start with the same
/// heading keyword), and accepts the best score if it reaches the threshold:
/// 1 when the prefix opens with a heading keyword, 2 otherwise. Ties resolve
/// to the smallest section id.
pub fn detect_section<'a>(
    book: &'a BookIndex,
    asr_raw_words: &[String],
    prefix_token_count: usize,
) -> Option<&'a SectionRange> {
    if book.sections.is_empty() || asr_raw_words.is_empty() {
        return None;
    }

    let prefix_text = asr_raw_words
        .iter()
        .take(prefix_token_count)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let prefix = title_tokens(&prefix_text);
    if prefix.is_empty() {
        return None;
    }

    let prefix_opens_with_keyword = is_heading_keyword(&prefix[0]);

    let mut best: Option<(&SectionRange, usize)> = None;
    for section in &book.sections {
        let title = title_tokens(&section.title);
        if title.is_empty() {
            continue;
        }
        let mut score = prefix
            .iter()
            .zip(title.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if is_heading_keyword(&title[0]) && prefix[0] == title[0] {
            score += 1;
        }
        // Strict > keeps the smallest id on ties
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((section, score));
        }
    }

    let (section, score) = best?;
    let threshold = if prefix_opens_with_keyword { 1 } else { 2 };
    (score >= threshold).then_some(section)
}

/// Find the section whose normalized title equals the normalized label.
///
/// Used when the caller already knows the section, e.g. from a chapter
/// directory name.
pub fn resolve_section_by_title<'a>(
    book: &'a BookIndex,
    label: &str,
) -> Option<&'a SectionRange> {
    let wanted = title_tokens(label);
    if wanted.is_empty() {
        return None;
    }
    book.sections
        .iter()
        .find(|s| title_tokens(&s.title) == wanted)
}
