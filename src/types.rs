// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The artifact contracts of the alignment engine.
//!
//! Every record here is an immutable value: produced by one pipeline stage,
//! consumed by the next, never mutated after construction. Identities are
//! positional (indices), not string keys. The original `BookIndex` and
//! `AsrResponse` are ground truth and are never rewritten.
//!
//! # Invariants (the stuff that breaks if you ignore it)
//!
//! - **BookIndex**: word indices are dense and monotonic; sentence ranges
//!   partition their paragraph without overlap; section ranges do not
//!   overlap; every word's sentence/paragraph id agrees with the containing
//!   range.
//! - **AsrResponse**: tokens are non-overlapping in time and ordered by
//!   start time (ties broken by original index); durations are non-negative.
//! - **WordAlign**: at most one side is absent, determined by the op.
//! - **SilenceTimeline**: events are ordered and non-overlapping.
//!
//! [`BookIndex::validate`], [`AsrResponse::validate`] and
//! [`SilenceTimeline::validate`] enforce these on load and raise
//! [`AlignError::InvalidArtifact`] with positional context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// Tolerance when comparing artifact timestamps in seconds.
const TIME_EPS: f64 = 1e-6;

// ============================================================================
// BOOK SIDE
// ============================================================================

/// One word of the canonical manuscript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookWord {
    /// Exact surface text, typography preserved.
    pub text: String,
    /// 0-based position in `BookIndex::words`.
    pub word_index: usize,
    pub sentence_index: usize,
    pub paragraph_index: usize,
    /// Pronunciation variants, each an ordered sequence of phoneme symbols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonemes: Option<Vec<Vec<String>>>,
}

/// Inclusive word range of a sentence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentenceRange {
    pub id: usize,
    pub start_word: usize,
    pub end_word: usize,
}

impl SentenceRange {
    #[inline]
    pub fn word_count(&self) -> usize {
        self.end_word - self.start_word + 1
    }

    #[inline]
    pub fn contains(&self, word: usize) -> bool {
        self.start_word <= word && word <= self.end_word
    }
}

/// Structural role of a paragraph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ParagraphKind {
    Heading,
    #[default]
    Body,
    #[serde(other)]
    Other,
}

/// Inclusive word range of a paragraph, with its structural kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphRange {
    pub id: usize,
    pub start_word: usize,
    pub end_word: usize,
    #[serde(default)]
    pub kind: ParagraphKind,
}

impl ParagraphRange {
    #[inline]
    pub fn contains(&self, word: usize) -> bool {
        self.start_word <= word && word <= self.end_word
    }
}

/// A top-level manuscript division (prologue, chapter, epilogue, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionRange {
    pub id: usize,
    pub start_word: usize,
    pub end_word: usize,
    pub title: String,
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub kind: String,
}

impl SectionRange {
    #[inline]
    pub fn contains(&self, word: usize) -> bool {
        self.start_word <= word && word <= self.end_word
    }
}

/// Canonical view of the manuscript.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookIndex {
    pub words: Vec<BookWord>,
    pub sentences: Vec<SentenceRange>,
    pub paragraphs: Vec<ParagraphRange>,
    #[serde(default)]
    pub sections: Vec<SectionRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl BookIndex {
    /// Check every structural invariant; positional detail on failure.
    pub fn validate(&self) -> Result<(), AlignError> {
        let invalid = |detail: String| AlignError::InvalidArtifact {
            artifact: "BookIndex",
            detail,
        };

        for (i, word) in self.words.iter().enumerate() {
            if word.word_index != i {
                return Err(invalid(format!(
                    "words[{i}] has wordIndex {} (indices must be dense)",
                    word.word_index
                )));
            }
        }

        for (i, s) in self.sentences.iter().enumerate() {
            if s.id != i {
                return Err(invalid(format!("sentences[{i}] has id {}", s.id)));
            }
            if s.start_word > s.end_word || s.end_word >= self.words.len() {
                return Err(invalid(format!(
                    "sentences[{i}] range [{}, {}] outside word bounds (0..{})",
                    s.start_word,
                    s.end_word,
                    self.words.len()
                )));
            }
            if i > 0 && s.start_word != self.sentences[i - 1].end_word + 1 {
                return Err(invalid(format!(
                    "sentences[{i}] starts at {} but sentences[{}] ends at {}",
                    s.start_word,
                    i - 1,
                    self.sentences[i - 1].end_word
                )));
            }
            for w in s.start_word..=s.end_word {
                if self.words[w].sentence_index != i {
                    return Err(invalid(format!(
                        "words[{w}].sentenceIndex {} disagrees with sentence {i}",
                        self.words[w].sentence_index
                    )));
                }
            }
        }

        for (i, p) in self.paragraphs.iter().enumerate() {
            if p.start_word > p.end_word || p.end_word >= self.words.len() {
                return Err(invalid(format!(
                    "paragraphs[{i}] range [{}, {}] outside word bounds",
                    p.start_word, p.end_word
                )));
            }
            for w in p.start_word..=p.end_word {
                if self.words[w].paragraph_index != i {
                    return Err(invalid(format!(
                        "words[{w}].paragraphIndex {} disagrees with paragraph {i}",
                        self.words[w].paragraph_index
                    )));
                }
            }
        }

        for pair in self.sections.windows(2) {
            if pair[1].start_word <= pair[0].end_word {
                return Err(invalid(format!(
                    "sections {} and {} overlap",
                    pair[0].id, pair[1].id
                )));
            }
        }
        for s in &self.sections {
            if s.start_word > s.end_word || s.end_word >= self.words.len() {
                return Err(invalid(format!(
                    "section {} range [{}, {}] outside word bounds",
                    s.id, s.start_word, s.end_word
                )));
            }
        }

        Ok(())
    }

    /// Sentences of one paragraph, in id order.
    pub fn paragraph_sentences(&self, paragraph: &ParagraphRange) -> Vec<&SentenceRange> {
        self.sentences
            .iter()
            .filter(|s| s.start_word >= paragraph.start_word && s.end_word <= paragraph.end_word)
            .collect()
    }
}

// ============================================================================
// ASR SIDE
// ============================================================================

/// One transcribed token with its timing.
///
/// The wire shape is the compact `{t, d, w, c}` of the transcription service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AsrToken {
    /// Start time in seconds.
    #[serde(rename = "t")]
    pub start: f64,
    /// Duration in seconds.
    #[serde(rename = "d")]
    pub duration: f64,
    #[serde(rename = "w")]
    pub word: String,
    /// Model confidence, when the service reports one.
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl AsrToken {
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Coarser grouping of tokens, when the service emits one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AsrSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The transcription artifact.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AsrResponse {
    #[serde(default)]
    pub model_version: String,
    pub tokens: Vec<AsrToken>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<AsrSegment>,
}

impl AsrResponse {
    /// Tokens must be ordered by start time and non-overlapping.
    pub fn validate(&self) -> Result<(), AlignError> {
        let invalid = |detail: String| AlignError::InvalidArtifact {
            artifact: "AsrResponse",
            detail,
        };
        for (i, tok) in self.tokens.iter().enumerate() {
            if tok.duration < 0.0 {
                return Err(invalid(format!(
                    "tokens[{i}] has negative duration {}",
                    tok.duration
                )));
            }
            if i > 0 {
                let prev = &self.tokens[i - 1];
                if tok.start < prev.start {
                    return Err(invalid(format!(
                        "tokens[{i}] starts at {} before tokens[{}] at {}",
                        tok.start,
                        i - 1,
                        prev.start
                    )));
                }
                if tok.start + TIME_EPS < prev.end() {
                    return Err(invalid(format!(
                        "tokens[{i}] at {} overlaps tokens[{}] ending at {}",
                        tok.start,
                        i - 1,
                        prev.end()
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// WORD ALIGNMENT
// ============================================================================

/// Alignment operation tag. Payload-only, never control flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlignOp {
    Match,
    Sub,
    Ins,
    Del,
}

impl AlignOp {
    /// Serialized name, also used by the hydrator.
    pub fn as_str(self) -> &'static str {
        match self {
            AlignOp::Match => "Match",
            AlignOp::Sub => "Sub",
            AlignOp::Ins => "Ins",
            AlignOp::Del => "Del",
        }
    }
}

/// One aligned word pair. Indices refer to original (un-filtered) positions.
///
/// `Ins` has no book side; `Del` has no asr side; `Match`/`Sub` have both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordAlign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_idx: Option<usize>,
    pub op: AlignOp,
    /// Why the op got its cost: "exact", "equiv", "lexical", "phoneme",
    /// "filler", "gap".
    pub reason: String,
    /// Similarity for Match/Sub, 0 for gaps.
    pub score: f64,
}

// ============================================================================
// ROLLUPS
// ============================================================================

/// Inclusive ASR token range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

/// Refined or raw sentence time window in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Per-sentence alignment quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SentenceMetrics {
    pub wer: f64,
    pub cer: f64,
    pub span_wer: f64,
    pub missing_runs: usize,
    pub extra_runs: usize,
}

/// Per-paragraph alignment quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphMetrics {
    pub wer: f64,
    pub cer: f64,
    /// Fraction of paragraph words with a non-`Del` op.
    pub coverage: f64,
}

/// Downstream-facing status label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlignStatus {
    Ok,
    Attention,
    Unreliable,
}

impl AlignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlignStatus::Ok => "ok",
            AlignStatus::Attention => "attention",
            AlignStatus::Unreliable => "unreliable",
        }
    }
}

/// Sentence rollup: book range, matched ASR range, metrics, status, timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentenceAlign {
    pub id: usize,
    pub book_start: usize,
    pub book_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_range: Option<TokenRange>,
    pub metrics: SentenceMetrics,
    pub status: AlignStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

/// Paragraph rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphAlign {
    pub id: usize,
    pub book_start: usize,
    pub book_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_range: Option<TokenRange>,
    pub metrics: ParagraphMetrics,
    pub status: AlignStatus,
}

/// The serializable output binding of a chapter alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_path: Option<String>,
    /// UTC creation timestamp; caller-supplied in tests for byte-identical
    /// reruns.
    pub created_at: DateTime<Utc>,
    /// Tag of the normalization rules this transcript was built under.
    pub normalization_version: String,
    pub words: Vec<WordAlign>,
    pub sentences: Vec<SentenceAlign>,
    pub paragraphs: Vec<ParagraphAlign>,
}

impl TranscriptIndex {
    /// Refuse a transcript produced under different normalization rules.
    pub fn require_normalization(&self, required: &str) -> Result<(), AlignError> {
        if self.normalization_version == required {
            Ok(())
        } else {
            Err(AlignError::IncompatibleNormalization {
                found: self.normalization_version.clone(),
                required: required.to_owned(),
            })
        }
    }
}

// ============================================================================
// REFINEMENT INPUTS & OUTPUT
// ============================================================================

/// Forced-alignment fragment span, relative to its chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSpan {
    pub begin: f64,
    pub end: f64,
}

/// One audio chunk's forced alignment: where the chunk starts in the chapter
/// and the speech fragments inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAlignment {
    pub chunk_id: String,
    pub offset_sec: f64,
    pub fragments: Vec<FragmentSpan>,
}

/// All chunk alignments of a chapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAlignmentIndex {
    pub chunks: Vec<ChunkAlignment>,
}

/// A fragment projected to absolute chapter time.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceFragment {
    pub chunk_id: String,
    pub fragment_index: usize,
    pub start: f64,
    pub end: f64,
}

/// silencedetect parameters recorded alongside the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SilenceParams {
    pub db_floor: f64,
    pub min_silence_dur: f64,
}

/// One detected silence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SilenceEvent {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub mid: f64,
}

/// Ordered, non-overlapping silence events over the chapter audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceTimeline {
    pub audio_sha256: String,
    pub ffmpeg_version: String,
    pub params: SilenceParams,
    pub events: Vec<SilenceEvent>,
}

impl SilenceTimeline {
    pub fn validate(&self) -> Result<(), AlignError> {
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[1].start + TIME_EPS < pair[0].end {
                return Err(AlignError::InvalidArtifact {
                    artifact: "SilenceTimeline",
                    detail: format!(
                        "events[{}] ending at {} overlaps events[{}] starting at {}",
                        i,
                        pair[0].end,
                        i + 1,
                        pair[1].start
                    ),
                });
            }
        }
        Ok(())
    }

    /// First silence event whose start is at or after `t`.
    ///
    /// Events are sorted by start, so this is a binary search.
    pub fn first_event_at_or_after(&self, t: f64) -> Option<&SilenceEvent> {
        let idx = self.events.partition_point(|e| e.start < t);
        self.events.get(idx)
    }
}

/// Refined sentence time window, the contract for downstream audio editing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentenceRefined {
    pub sentence_id: usize,
    pub start: f64,
    pub end: f64,
    pub token_start_idx: usize,
    pub token_end_idx: usize,
}
