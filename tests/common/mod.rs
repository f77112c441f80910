//! Fixture builders shared by the integration suites.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::Arc;

use recital::{
    AsrResponse, AsrToken, BookIndex, BookWord, CancelToken, ChapterContext, ChapterOptions,
    NullProvider, ParagraphRange, SectionRange, SentenceRange, TranscriptIndex,
};

/// Build a one-paragraph book from sentences of surface words.
pub fn book(sentences: &[&[&str]]) -> BookIndex {
    let mut words = Vec::new();
    let mut ranges = Vec::new();
    for (sid, sentence) in sentences.iter().enumerate() {
        let start = words.len();
        for text in *sentence {
            words.push(BookWord {
                text: (*text).to_owned(),
                word_index: words.len(),
                sentence_index: sid,
                paragraph_index: 0,
                phonemes: None,
            });
        }
        ranges.push(SentenceRange {
            id: sid,
            start_word: start,
            end_word: words.len() - 1,
        });
    }
    let end = words.len().saturating_sub(1);
    BookIndex {
        words,
        sentences: ranges,
        paragraphs: vec![ParagraphRange {
            id: 0,
            start_word: 0,
            end_word: end,
            kind: Default::default(),
        }],
        sections: vec![],
        indexed_at: None,
    }
}

/// Attach sections to a book: `(title, start_word, end_word)`.
pub fn with_sections(mut book: BookIndex, sections: &[(&str, usize, usize)]) -> BookIndex {
    book.sections = sections
        .iter()
        .enumerate()
        .map(|(id, (title, start, end))| SectionRange {
            id,
            start_word: *start,
            end_word: *end,
            title: (*title).to_owned(),
            level: 1,
            kind: "chapter".to_owned(),
        })
        .collect();
    book
}

/// ASR response from `(start, duration, word)` triples.
pub fn asr(tokens: &[(f64, f64, &str)]) -> AsrResponse {
    AsrResponse {
        model_version: "test-asr-1".to_owned(),
        tokens: tokens
            .iter()
            .map(|(t, d, w)| AsrToken {
                start: *t,
                duration: *d,
                word: (*w).to_owned(),
                confidence: None,
            })
            .collect(),
        segments: vec![],
    }
}

/// ASR response with evenly spaced words, 0.5 s apart, 0.4 s long.
pub fn asr_words(words: &[&str]) -> AsrResponse {
    let tokens: Vec<(f64, f64, &str)> = words
        .iter()
        .enumerate()
        .map(|(i, w)| (i as f64 * 0.5, 0.4, *w))
        .collect();
    asr(&tokens)
}

pub fn chapter(book: BookIndex, asr: AsrResponse) -> ChapterContext {
    ChapterContext {
        chapter_id: None,
        book: Some(Arc::new(book)),
        asr: Some(asr),
        alignment: None,
        silences: None,
        book_path: None,
        asr_path: None,
    }
}

/// Deterministic options: pinned timestamp, defaults otherwise.
pub fn options() -> ChapterOptions {
    ChapterOptions {
        created_at: Some("2026-03-01T00:00:00Z".parse().unwrap()),
        ..Default::default()
    }
}

pub fn transcript(ctx: &ChapterContext) -> TranscriptIndex {
    ctx.build_transcript_index(&options(), &NullProvider, &CancelToken::new())
        .expect("alignment should succeed")
}
