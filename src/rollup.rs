// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Aggregate word ops into sentence and paragraph rollups.
//!
//! Sentence WER counts substitutions, deletions, and attached insertions
//! over the sentence's filtered length. Insertions attach to the sentence of
//! the nearest neighboring aligned book word (previous first, then next).
//!
//! Two region strategies: when a section was detected, sentences overlapping
//! the section range roll up; otherwise sentences overlapping the aligned
//! word span do. Both are intentional, see DESIGN.md.
//!
//! Status thresholds: `ok` at WER ≤ 0.10 with fewer than 3 missing runs,
//! `attention` at WER ≤ 0.25, `unreliable` beyond.

use crate::error::{AlignError, CancelToken};
use crate::levenshtein::levenshtein_chars;
use crate::normalize::normalize_typography;
use crate::types::{
    AlignOp, AlignStatus, AsrResponse, BookIndex, ParagraphAlign, ParagraphMetrics,
    SectionRange, SentenceAlign, SentenceMetrics, SentenceRange, Timing, TokenRange, WordAlign,
};

const WER_OK: f64 = 0.10;
const WER_ATTENTION: f64 = 0.25;
const MISSING_RUNS_OK: usize = 3;

pub fn sentence_status(wer: f64, missing_runs: usize) -> AlignStatus {
    if wer <= WER_OK && missing_runs < MISSING_RUNS_OK {
        AlignStatus::Ok
    } else if wer <= WER_ATTENTION {
        AlignStatus::Attention
    } else {
        AlignStatus::Unreliable
    }
}

pub fn paragraph_status(wer: f64) -> AlignStatus {
    if wer <= WER_OK {
        AlignStatus::Ok
    } else if wer <= WER_ATTENTION {
        AlignStatus::Attention
    } else {
        AlignStatus::Unreliable
    }
}

/// Ops of one sentence, bucketed during the single pass over the stream.
#[derive(Default, Clone)]
struct SentenceBucket {
    /// Indices into the op stream, in stream order.
    ops: Vec<usize>,
    extra_runs: usize,
}

/// Attach every op to a sentence.
///
/// Book-side ops belong to their word's sentence. Each maximal run of `Ins`
/// ops belongs to the sentence of the nearest aligned book word: the one
/// before the run, or the one after when the run opens the stream.
fn bucket_ops(book: &BookIndex, ops: &[WordAlign]) -> Vec<SentenceBucket> {
    let mut buckets = vec![SentenceBucket::default(); book.sentences.len()];

    // Sentence of the nearest following book-side op, for runs with no
    // preceding aligned word.
    let mut next_sentence = vec![None; ops.len()];
    let mut upcoming = None;
    for (i, op) in ops.iter().enumerate().rev() {
        if let Some(b) = op.book_idx {
            upcoming = Some(book.words[b].sentence_index);
        }
        next_sentence[i] = upcoming;
    }

    let mut prev_sentence: Option<usize> = None;
    let mut i = 0;
    while i < ops.len() {
        let op = &ops[i];
        if let Some(b) = op.book_idx {
            let sentence = book.words[b].sentence_index;
            buckets[sentence].ops.push(i);
            prev_sentence = Some(sentence);
            i += 1;
            continue;
        }
        // Maximal Ins run
        let run_start = i;
        while i < ops.len() && ops[i].book_idx.is_none() {
            i += 1;
        }
        let Some(sentence) = prev_sentence.or(next_sentence[run_start]) else {
            continue; // no aligned book word anywhere; nothing to attach to
        };
        for j in run_start..i {
            buckets[sentence].ops.push(j);
        }
        buckets[sentence].extra_runs += 1;
    }

    buckets
}

/// Sentences to roll up: section range when detected, aligned-word span
/// otherwise.
fn active_sentences<'a>(
    book: &'a BookIndex,
    ops: &[WordAlign],
    section: Option<&SectionRange>,
) -> Vec<&'a SentenceRange> {
    match section {
        Some(section) => book
            .sentences
            .iter()
            .filter(|s| s.start_word <= section.end_word && s.end_word >= section.start_word)
            .collect(),
        None => {
            let aligned: Vec<usize> = ops.iter().filter_map(|op| op.book_idx).collect();
            let (Some(&lo), Some(&hi)) = (aligned.iter().min(), aligned.iter().max()) else {
                return Vec::new();
            };
            book.sentences
                .iter()
                .filter(|s| s.start_word <= hi && s.end_word >= lo)
                .collect()
        }
    }
}

fn joined_book_surface(book: &BookIndex, start: usize, end: usize) -> String {
    let text = book.words[start..=end]
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse(&normalize_typography(&text)).to_lowercase()
}

fn joined_script_surface(asr: &AsrResponse, range: TokenRange) -> String {
    let text = asr.tokens[range.start..=range.end]
        .iter()
        .map(|t| t.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse(&normalize_typography(&text)).to_lowercase()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let ref_len = reference.chars().count();
    if ref_len == 0 {
        return if hypothesis.is_empty() { 0.0 } else { 1.0 };
    }
    levenshtein_chars(reference, hypothesis) as f64 / ref_len as f64
}

fn rollup_sentence(
    book: &BookIndex,
    asr: &AsrResponse,
    ops: &[WordAlign],
    bucket: &SentenceBucket,
    sentence: &SentenceRange,
) -> SentenceAlign {
    let mut subs = 0usize;
    let mut dels = 0usize;
    let mut inss = 0usize;
    let mut book_len = 0usize;
    let mut script_lo: Option<usize> = None;
    let mut script_hi: Option<usize> = None;
    let mut aligned_lo: Option<usize> = None;
    let mut aligned_hi: Option<usize> = None;

    for &i in &bucket.ops {
        let op = &ops[i];
        match op.op {
            AlignOp::Match | AlignOp::Sub => {
                book_len += 1;
                if op.op == AlignOp::Sub {
                    subs += 1;
                }
                let b = op.book_idx.unwrap_or_default();
                aligned_lo = Some(aligned_lo.map_or(b, |lo: usize| lo.min(b)));
                aligned_hi = Some(aligned_hi.map_or(b, |hi: usize| hi.max(b)));
            }
            AlignOp::Del => {
                book_len += 1;
                dels += 1;
            }
            AlignOp::Ins => inss += 1,
        }
        if op.op != AlignOp::Del {
            if let Some(a) = op.asr_idx {
                script_lo = Some(script_lo.map_or(a, |lo: usize| lo.min(a)));
                script_hi = Some(script_hi.map_or(a, |hi: usize| hi.max(a)));
            }
        }
    }

    // Maximal Del runs over the book-side ops, which arrive in stream order.
    let mut missing_runs = 0usize;
    let mut in_run = false;
    for &i in &bucket.ops {
        match ops[i].op {
            AlignOp::Del => {
                if !in_run {
                    missing_runs += 1;
                    in_run = true;
                }
            }
            AlignOp::Ins => {}
            _ => in_run = false,
        }
    }

    let denom = book_len.max(1) as f64;
    let wer = (subs + dels + inss) as f64 / denom;

    // Errors strictly inside the aligned span, over the span's length:
    // leading and trailing Del runs fall away.
    let span_wer = match (aligned_lo, aligned_hi) {
        (Some(lo), Some(hi)) => {
            let mut span_errors = inss;
            for &i in &bucket.ops {
                let op = &ops[i];
                match op.op {
                    AlignOp::Sub => span_errors += 1,
                    AlignOp::Del => {
                        let b = op.book_idx.unwrap_or_default();
                        if b > lo && b < hi {
                            span_errors += 1;
                        }
                    }
                    _ => {}
                }
            }
            let mut span_len = 0usize;
            for &i in &bucket.ops {
                if let Some(b) = ops[i].book_idx {
                    if b >= lo && b <= hi {
                        span_len += 1;
                    }
                }
            }
            span_errors as f64 / span_len.max(1) as f64
        }
        _ => wer,
    };

    let script_range = match (script_lo, script_hi) {
        (Some(start), Some(end)) => Some(TokenRange { start, end }),
        _ => None,
    };

    let book_surface = joined_book_surface(book, sentence.start_word, sentence.end_word);
    let cer = match script_range {
        Some(range) => char_error_rate(&book_surface, &joined_script_surface(asr, range)),
        None => {
            if book_surface.is_empty() {
                0.0
            } else {
                1.0
            }
        }
    };

    let timing = script_range.map(|range| Timing {
        start_sec: asr.tokens[range.start].start,
        end_sec: asr.tokens[range.end].end(),
    });

    let status = sentence_status(wer, missing_runs);
    SentenceAlign {
        id: sentence.id,
        book_start: sentence.start_word,
        book_end: sentence.end_word,
        script_range,
        metrics: SentenceMetrics {
            wer,
            cer,
            span_wer,
            missing_runs,
            extra_runs: bucket.extra_runs,
        },
        status,
        timing,
    }
}

/// Roll word ops up into sentence and paragraph records.
pub fn rollup(
    book: &BookIndex,
    asr: &AsrResponse,
    ops: &[WordAlign],
    section: Option<&SectionRange>,
    cancel: &CancelToken,
) -> Result<(Vec<SentenceAlign>, Vec<ParagraphAlign>), AlignError> {
    let buckets = bucket_ops(book, ops);
    let active = active_sentences(book, ops, section);

    let mut sentences = Vec::with_capacity(active.len());
    for sentence in active {
        cancel.check()?;
        sentences.push(rollup_sentence(
            book,
            asr,
            ops,
            &buckets[sentence.id],
            sentence,
        ));
    }

    let mut paragraphs = Vec::new();
    for paragraph in &book.paragraphs {
        cancel.check()?;
        let members: Vec<&SentenceAlign> = sentences
            .iter()
            .filter(|s| s.book_start >= paragraph.start_word && s.book_end <= paragraph.end_word)
            .collect();
        if members.is_empty() {
            continue;
        }

        let total_len: usize = members.iter().map(|s| s.book_end - s.book_start + 1).sum();
        let weight = |s: &SentenceAlign| (s.book_end - s.book_start + 1) as f64;
        let wer = members.iter().map(|s| s.metrics.wer * weight(s)).sum::<f64>()
            / total_len.max(1) as f64;
        let cer = members.iter().map(|s| s.metrics.cer * weight(s)).sum::<f64>()
            / total_len.max(1) as f64;

        // Coverage: words with a non-Del op over words carrying any op.
        let mut covered = 0usize;
        let mut with_ops = 0usize;
        for &i in members.iter().flat_map(|s| &buckets[s.id].ops) {
            let op = &ops[i];
            if op.book_idx.is_some() {
                with_ops += 1;
                if op.op != AlignOp::Del {
                    covered += 1;
                }
            }
        }
        let coverage = covered as f64 / with_ops.max(1) as f64;

        let script_lo = members
            .iter()
            .filter_map(|s| s.script_range.map(|r| r.start))
            .min();
        let script_hi = members
            .iter()
            .filter_map(|s| s.script_range.map(|r| r.end))
            .max();
        let script_range = match (script_lo, script_hi) {
            (Some(start), Some(end)) => Some(TokenRange { start, end }),
            _ => None,
        };

        paragraphs.push(ParagraphAlign {
            id: paragraph.id,
            book_start: paragraph.start_word,
            book_end: paragraph.end_word,
            script_range,
            metrics: ParagraphMetrics { wer, cer, coverage },
            status: paragraph_status(wer),
        });
    }

    Ok((sentences, paragraphs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AsrToken, BookWord, ParagraphRange, SentenceRange};

    fn book_one_sentence(words: &[&str]) -> BookIndex {
        BookIndex {
            words: words
                .iter()
                .enumerate()
                .map(|(i, text)| BookWord {
                    text: (*text).to_owned(),
                    word_index: i,
                    sentence_index: 0,
                    paragraph_index: 0,
                    phonemes: None,
                })
                .collect(),
            sentences: vec![SentenceRange { id: 0, start_word: 0, end_word: words.len() - 1 }],
            paragraphs: vec![ParagraphRange {
                id: 0,
                start_word: 0,
                end_word: words.len() - 1,
                kind: Default::default(),
            }],
            sections: vec![],
            indexed_at: None,
        }
    }

    fn asr_of(words: &[&str]) -> AsrResponse {
        AsrResponse {
            model_version: String::new(),
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, w)| AsrToken {
                    start: i as f64 * 0.5,
                    duration: 0.4,
                    word: (*w).to_owned(),
                    confidence: None,
                })
                .collect(),
            segments: vec![],
        }
    }

    fn m(book: usize, asr: usize) -> WordAlign {
        WordAlign {
            book_idx: Some(book),
            asr_idx: Some(asr),
            op: AlignOp::Match,
            reason: "exact".into(),
            score: 1.0,
        }
    }

    fn del(book: usize) -> WordAlign {
        WordAlign {
            book_idx: Some(book),
            asr_idx: None,
            op: AlignOp::Del,
            reason: "gap".into(),
            score: 0.0,
        }
    }

    fn ins(asr: usize, reason: &str) -> WordAlign {
        WordAlign {
            book_idx: None,
            asr_idx: Some(asr),
            op: AlignOp::Ins,
            reason: reason.into(),
            score: 0.0,
        }
    }

    #[test]
    fn clean_match_is_ok_with_zero_wer() {
        let book = book_one_sentence(&["Call", "me", "Ishmael"]);
        let asr = asr_of(&["call", "me", "ishmael"]);
        let ops = vec![m(0, 0), m(1, 1), m(2, 2)];
        let (sentences, paragraphs) =
            rollup(&book, &asr, &ops, None, &CancelToken::new()).unwrap();
        assert_eq!(sentences.len(), 1);
        let s = &sentences[0];
        assert_eq!(s.metrics.wer, 0.0);
        assert_eq!(s.metrics.cer, 0.0);
        assert_eq!(s.status, AlignStatus::Ok);
        assert_eq!(s.script_range, Some(TokenRange { start: 0, end: 2 }));
        assert_eq!(s.timing.unwrap().start_sec, 0.0);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].metrics.coverage, 1.0);
    }

    #[test]
    fn insertion_counts_toward_wer_and_extra_runs() {
        let book = book_one_sentence(&["call", "me", "ishmael", "today", "friend"]);
        let asr = asr_of(&["call", "um", "me", "ishmael", "today", "friend"]);
        let ops = vec![m(0, 0), ins(1, "filler"), m(1, 2), m(2, 3), m(3, 4), m(4, 5)];
        let (sentences, _) = rollup(&book, &asr, &ops, None, &CancelToken::new()).unwrap();
        let s = &sentences[0];
        assert!((s.metrics.wer - 0.2).abs() < 1e-9);
        assert_eq!(s.metrics.extra_runs, 1);
        assert_eq!(s.status, AlignStatus::Attention);
    }

    #[test]
    fn deletion_counts_as_missing_run() {
        let book = book_one_sentence(&["call", "me", "ishmael", "today", "friend"]);
        let asr = asr_of(&["call", "me", "today", "friend"]);
        let ops = vec![m(0, 0), m(1, 1), del(2), m(3, 2), m(4, 3)];
        let (sentences, paragraphs) =
            rollup(&book, &asr, &ops, None, &CancelToken::new()).unwrap();
        let s = &sentences[0];
        assert!((s.metrics.wer - 0.2).abs() < 1e-9);
        assert_eq!(s.metrics.missing_runs, 1);
        assert_eq!(s.status, AlignStatus::Attention);
        assert!((paragraphs[0].metrics.coverage - 0.8).abs() < 1e-9);
    }

    #[test]
    fn leading_insertions_attach_forward() {
        let book = book_one_sentence(&["hello", "world"]);
        let asr = asr_of(&["um", "hello", "world"]);
        let ops = vec![ins(0, "filler"), m(0, 1), m(1, 2)];
        let (sentences, _) = rollup(&book, &asr, &ops, None, &CancelToken::new()).unwrap();
        assert_eq!(sentences[0].metrics.extra_runs, 1);
        assert_eq!(sentences[0].script_range, Some(TokenRange { start: 0, end: 2 }));
    }

    #[test]
    fn span_wer_ignores_edge_deletions() {
        // Deletions at the sentence edges (never found at all) don't count
        // toward span WER; the interior sub does.
        let book = book_one_sentence(&["a", "b", "c", "d", "e"]);
        let asr = asr_of(&["b", "x", "d"]);
        let ops = vec![
            del(0),
            m(1, 0),
            WordAlign {
                book_idx: Some(2),
                asr_idx: Some(1),
                op: AlignOp::Sub,
                reason: "lexical".into(),
                score: 0.0,
            },
            m(3, 2),
            del(4),
        ];
        let (sentences, _) = rollup(&book, &asr, &ops, None, &CancelToken::new()).unwrap();
        let metrics = sentences[0].metrics;
        assert!((metrics.wer - 0.6).abs() < 1e-9); // (1 sub + 2 del) / 5
        assert!((metrics.span_wer - (1.0 / 3.0)).abs() < 1e-9); // sub only, span b..d
        assert_eq!(metrics.missing_runs, 2);
    }

    #[test]
    fn section_bounds_restrict_the_rollup() {
        let mut book = book_one_sentence(&["one", "two", "three", "four"]);
        // Two sentences: [0,1] and [2,3]
        book.sentences = vec![
            SentenceRange { id: 0, start_word: 0, end_word: 1 },
            SentenceRange { id: 1, start_word: 2, end_word: 3 },
        ];
        for w in 2..4 {
            book.words[w].sentence_index = 1;
        }
        let section = SectionRange {
            id: 0,
            start_word: 0,
            end_word: 1,
            title: "One".into(),
            level: 1,
            kind: String::new(),
        };
        let asr = asr_of(&["one", "two"]);
        let ops = vec![m(0, 0), m(1, 1)];
        let (sentences, _) =
            rollup(&book, &asr, &ops, Some(&section), &CancelToken::new()).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].id, 0);
    }

    #[test]
    fn no_ops_and_no_section_rolls_up_nothing() {
        let book = book_one_sentence(&["one", "two"]);
        let asr = asr_of(&[]);
        let (sentences, paragraphs) =
            rollup(&book, &asr, &[], None, &CancelToken::new()).unwrap();
        assert!(sentences.is_empty());
        assert!(paragraphs.is_empty());
    }
}
