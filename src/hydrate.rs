// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Hydration: attach surface text, diffs, and final statuses to a
//! transcript index.
//!
//! Hydration is a pure function of `(TranscriptIndex, BookIndex,
//! AsrResponse)`. The hydrated metrics are re-derived from the word diff,
//! so the record downstream tooling consumes is self-consistent with the
//! diff it displays.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};

use crate::diff::{self, TextDiff};
use crate::error::AlignError;
use crate::normalize::normalize_typography;
use crate::rollup::{paragraph_status, sentence_status};
use crate::types::{
    AsrResponse, BookIndex, ParagraphMetrics, SentenceMetrics, Timing, TokenRange,
    TranscriptIndex, WordAlign,
};

/// Word op with resolved surface text and the serialized op name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HydratedWord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_idx: Option<usize>,
    pub op: String,
    pub reason: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
}

/// Sentence with joined surfaces, a structured diff, and the final status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HydratedSentence {
    pub id: usize,
    pub book_start: usize,
    pub book_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_range: Option<TokenRange>,
    pub book_text: String,
    pub script_text: String,
    pub diff: TextDiff,
    pub metrics: SentenceMetrics,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

/// Paragraph with diff-derived coverage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HydratedParagraph {
    pub id: usize,
    pub book_start: usize,
    pub book_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_range: Option<TokenRange>,
    pub metrics: ParagraphMetrics,
    pub status: String,
}

/// The hydrated superset of [`TranscriptIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratedTranscript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub normalization_version: String,
    pub words: Vec<HydratedWord>,
    pub sentences: Vec<HydratedSentence>,
    pub paragraphs: Vec<HydratedParagraph>,
}

fn join_book(book: &BookIndex, start: usize, end: usize) -> String {
    let joined = book.words[start..=end]
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse(&normalize_typography(&joined))
}

fn join_script(asr: &AsrResponse, range: TokenRange) -> String {
    let joined = asr.tokens[range.start..=range.end]
        .iter()
        .map(|t| t.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse(&normalize_typography(&joined))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hydrate_word(word: &WordAlign, book: &BookIndex, asr: &AsrResponse) -> HydratedWord {
    HydratedWord {
        book_idx: word.book_idx,
        asr_idx: word.asr_idx,
        op: word.op.as_str().to_owned(),
        reason: word.reason.clone(),
        score: word.score,
        book_text: word.book_idx.map(|i| book.words[i].text.clone()),
        script_text: word.asr_idx.map(|i| asr.tokens[i].word.clone()),
    }
}

/// Hydrate a transcript index against its source artifacts.
pub fn hydrate(
    index: &TranscriptIndex,
    book: &BookIndex,
    asr: &AsrResponse,
) -> Result<HydratedTranscript, AlignError> {
    for word in &index.words {
        if word.book_idx.is_some_and(|i| i >= book.words.len())
            || word.asr_idx.is_some_and(|i| i >= asr.tokens.len())
        {
            return Err(AlignError::InvalidArtifact {
                artifact: "TranscriptIndex",
                detail: "word op index outside book or asr bounds".to_owned(),
            });
        }
    }

    let words = index
        .words
        .iter()
        .map(|w| hydrate_word(w, book, asr))
        .collect();

    let mut sentences = Vec::with_capacity(index.sentences.len());
    for sentence in &index.sentences {
        let book_text = join_book(book, sentence.book_start, sentence.book_end);
        let script_text = sentence
            .script_range
            .map(|r| join_script(asr, r))
            .unwrap_or_default();
        let text_diff = diff::analyze(&book_text, &script_text);
        let derived = diff::metrics(
            &text_diff,
            &book_text.to_lowercase(),
            &script_text.to_lowercase(),
        );
        let metrics = SentenceMetrics {
            wer: derived.wer,
            cer: derived.cer,
            span_wer: sentence.metrics.span_wer,
            missing_runs: sentence.metrics.missing_runs,
            extra_runs: sentence.metrics.extra_runs,
        };
        let status = sentence_status(metrics.wer, metrics.missing_runs);
        sentences.push(HydratedSentence {
            id: sentence.id,
            book_start: sentence.book_start,
            book_end: sentence.book_end,
            script_range: sentence.script_range,
            book_text,
            script_text,
            diff: text_diff,
            metrics,
            status: status.as_str().to_owned(),
            timing: sentence.timing,
        });
    }

    let mut paragraphs = Vec::with_capacity(index.paragraphs.len());
    for paragraph in &index.paragraphs {
        let book_text = join_book(book, paragraph.book_start, paragraph.book_end);
        let script_text = paragraph
            .script_range
            .map(|r| join_script(asr, r))
            .unwrap_or_default();
        let text_diff = diff::analyze(&book_text, &script_text);
        let derived = diff::metrics(
            &text_diff,
            &book_text.to_lowercase(),
            &script_text.to_lowercase(),
        );
        let metrics = ParagraphMetrics {
            wer: derived.wer,
            cer: derived.cer,
            coverage: diff::coverage(&text_diff, &book_text),
        };
        paragraphs.push(HydratedParagraph {
            id: paragraph.id,
            book_start: paragraph.book_start,
            book_end: paragraph.book_end,
            script_range: paragraph.script_range,
            metrics,
            status: paragraph_status(metrics.wer).as_str().to_owned(),
        });
    }

    Ok(HydratedTranscript {
        book_path: index.book_path.clone(),
        asr_path: index.asr_path.clone(),
        created_at: index.created_at,
        normalization_version: index.normalization_version.clone(),
        words,
        sentences,
        paragraphs,
    })
}
