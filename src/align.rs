// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Windowed word alignment: a Needleman–Wunsch DP per search window.
//!
//! Cost model:
//!
//! | Op    | Cost            | Condition                                   |
//! |-------|-----------------|---------------------------------------------|
//! | Match | 0               | normalized equality, or equivalence pair    |
//! | Sub   | `α · (1 − sim)` | similarity blends lexical and phoneme       |
//! | Del   | `β`             | book word not read                          |
//! | Ins   | `γ` (or `γ/2`)  | spoken word not in book; discount fillers   |
//!
//! Tie-breaking prefers `Match > Sub > Del > Ins`, so equal-cost paths keep
//! book indices monotonic (a `Del` wins over an `Ins` at a right-edge gap).
//!
//! # INVARIANTS (DO NOT VIOLATE)
//!
//! 1. A `Match` is only emitted for tokens whose normalized text is equal
//!    (or listed in the equivalence set).
//! 2. No op has both sides absent.
//! 3. Ops are emitted in filtered order; consecutive windows overlap only on
//!    anchor n-grams and the overlap is emitted exactly once.

use std::collections::{HashMap, HashSet};

use crate::error::{AlignError, CancelToken};
use crate::levenshtein::char_similarity;
use crate::pronounce::phoneme_similarity;
use crate::stopwords;
use crate::types::{AlignOp, WordAlign};
use crate::window::Window;

/// Cost weights and token sets for the DP.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// α: substitution weight.
    pub sub_weight: f64,
    /// β: deletion cost.
    pub del_cost: f64,
    /// γ: insertion cost.
    pub ins_cost: f64,
    /// Spoken tokens whose insertion costs `γ/2`.
    pub fillers: HashSet<String>,
    /// Token pairs treated as equal (e.g. "ok" ↔ "okay"). Checked both ways.
    pub equiv: HashMap<String, String>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            sub_weight: 1.0,
            del_cost: 1.0,
            ins_cost: 1.0,
            fillers: stopwords::default_fillers(),
            equiv: HashMap::new(),
        }
    }
}

impl AlignConfig {
    fn is_equiv(&self, a: &str, b: &str) -> bool {
        self.equiv.get(a).is_some_and(|v| v == b) || self.equiv.get(b).is_some_and(|v| v == a)
    }
}

/// One side of the alignment: filtered tokens, their back-map, and optional
/// parallel phoneme variant sets (an empty inner vec means "no phonemes for
/// this token").
#[derive(Debug, Clone, Copy)]
pub struct AlignSide<'a> {
    pub tokens: &'a [String],
    pub to_original: &'a [usize],
    pub phonemes: Option<&'a [Vec<Vec<String>>]>,
}

impl<'a> AlignSide<'a> {
    fn variants(&self, filtered: usize) -> &'a [Vec<String>] {
        match self.phonemes {
            Some(sets) => sets.get(filtered).map_or(&[], Vec::as_slice),
            None => &[],
        }
    }
}

/// How the pair scored, for the op's `reason` payload.
struct Scored {
    sim: f64,
    reason: &'static str,
}

/// Blend lexical and phoneme similarity for a token pair.
fn pair_similarity(
    a: &str,
    b: &str,
    a_variants: &[Vec<String>],
    b_variants: &[Vec<String>],
    config: &AlignConfig,
) -> Scored {
    if a == b {
        return Scored { sim: 1.0, reason: "exact" };
    }
    if config.is_equiv(a, b) {
        return Scored { sim: 1.0, reason: "equiv" };
    }
    let lexical = char_similarity(a, b);
    if let Some(phoneme) = phoneme_similarity(a_variants, b_variants) {
        if phoneme > lexical {
            return Scored { sim: phoneme, reason: "phoneme" };
        }
    }
    Scored { sim: lexical, reason: "lexical" }
}

/// Backpointer tags for the DP matrix.
const BP_NONE: u8 = 0;
const BP_DIAG: u8 = 1;
const BP_UP: u8 = 2; // Del: consume book token
const BP_LEFT: u8 = 3; // Ins: consume asr token

/// Align one window; ops come out in filtered order.
fn align_window(
    book: &AlignSide<'_>,
    asr: &AlignSide<'_>,
    window: &Window,
    config: &AlignConfig,
) -> Vec<WordAlign> {
    let m = window.book_len();
    let k = window.asr_len();

    // Backpointers for the whole matrix, costs as two rolling rows.
    let mut back = vec![BP_NONE; (m + 1) * (k + 1)];
    let at = |i: usize, j: usize| i * (k + 1) + j;

    let mut prev_row: Vec<f64> = Vec::with_capacity(k + 1);
    prev_row.push(0.0);
    for j in 1..=k {
        let token = &asr.tokens[window.a_lo + j - 1];
        let cost = insertion_cost(token, config);
        prev_row.push(prev_row[j - 1] + cost);
        back[at(0, j)] = BP_LEFT;
    }

    let mut row = vec![0.0f64; k + 1];
    for i in 1..=m {
        let b_idx = window.b_lo + i - 1;
        let b_token = &book.tokens[b_idx];
        row[0] = prev_row[0] + config.del_cost;
        back[at(i, 0)] = BP_UP;

        for j in 1..=k {
            let a_idx = window.a_lo + j - 1;
            let a_token = &asr.tokens[a_idx];

            let scored = pair_similarity(
                b_token,
                a_token,
                book.variants(b_idx),
                asr.variants(a_idx),
                config,
            );
            let diag = prev_row[j - 1] + config.sub_weight * (1.0 - scored.sim);
            let up = prev_row[j] + config.del_cost;
            let left = row[j - 1] + insertion_cost(a_token, config);

            // Preference on ties: Match/Sub (diag), then Del, then Ins.
            let (cost, pointer) = if diag <= up && diag <= left {
                (diag, BP_DIAG)
            } else if up <= left {
                (up, BP_UP)
            } else {
                (left, BP_LEFT)
            };
            row[j] = cost;
            back[at(i, j)] = pointer;
        }
        std::mem::swap(&mut prev_row, &mut row);
    }

    // Trace back, then reverse into forward order.
    let mut ops: Vec<WordAlign> = Vec::with_capacity(m.max(k));
    let (mut i, mut j) = (m, k);
    while i > 0 || j > 0 {
        match back[at(i, j)] {
            BP_DIAG => {
                i -= 1;
                j -= 1;
                let b_idx = window.b_lo + i;
                let a_idx = window.a_lo + j;
                let scored = pair_similarity(
                    &book.tokens[b_idx],
                    &asr.tokens[a_idx],
                    book.variants(b_idx),
                    asr.variants(a_idx),
                    config,
                );
                // Match is reserved for normalized equality (or the
                // equivalence set); a perfect phoneme score is still a Sub.
                let op = match scored.reason {
                    "exact" | "equiv" => AlignOp::Match,
                    _ => AlignOp::Sub,
                };
                debug_assert!(
                    op != AlignOp::Match
                        || book.tokens[b_idx] == asr.tokens[a_idx]
                        || config.is_equiv(&book.tokens[b_idx], &asr.tokens[a_idx])
                );
                ops.push(WordAlign {
                    book_idx: Some(book.to_original[b_idx]),
                    asr_idx: Some(asr.to_original[a_idx]),
                    op,
                    reason: scored.reason.to_owned(),
                    score: scored.sim,
                });
            }
            BP_UP => {
                i -= 1;
                let b_idx = window.b_lo + i;
                ops.push(WordAlign {
                    book_idx: Some(book.to_original[b_idx]),
                    asr_idx: None,
                    op: AlignOp::Del,
                    reason: "gap".to_owned(),
                    score: 0.0,
                });
            }
            BP_LEFT => {
                j -= 1;
                let a_idx = window.a_lo + j;
                let token = &asr.tokens[a_idx];
                let reason = if config.fillers.contains(token.as_str()) { "filler" } else { "gap" };
                ops.push(WordAlign {
                    book_idx: None,
                    asr_idx: Some(asr.to_original[a_idx]),
                    op: AlignOp::Ins,
                    reason: reason.to_owned(),
                    score: 0.0,
                });
            }
            _ => break, // reached (0, 0)
        }
    }
    ops.reverse();
    ops
}

fn insertion_cost(token: &str, config: &AlignConfig) -> f64 {
    if config.fillers.contains(token) {
        config.ins_cost * 0.5
    } else {
        config.ins_cost
    }
}

/// Run the DP over every window and concatenate the op streams.
///
/// Consecutive windows overlap on anchor n-grams; each non-first window
/// drops the ops falling on its leading `ngram` book/asr positions, which
/// the previous window already emitted.
pub fn align_windows(
    book: &AlignSide<'_>,
    asr: &AlignSide<'_>,
    windows: &[Window],
    ngram: usize,
    config: &AlignConfig,
    cancel: &CancelToken,
) -> Result<Vec<WordAlign>, AlignError> {
    let mut out: Vec<WordAlign> = Vec::new();
    for (w, window) in windows.iter().enumerate() {
        cancel.check()?;
        if window.b_hi > book.tokens.len() || window.a_hi > asr.tokens.len() {
            return Err(AlignError::Internal(format!(
                "window {w} [{},{})x[{},{}) exceeds filtered streams ({}, {})",
                window.b_lo,
                window.b_hi,
                window.a_lo,
                window.a_hi,
                book.tokens.len(),
                asr.tokens.len()
            )));
        }
        let ops = align_window(book, asr, window, config);
        if w == 0 {
            out.extend(ops);
            continue;
        }
        // Skip the leading-anchor overlap already covered by window w-1.
        let b_skip = window.b_lo + ngram;
        let a_skip = window.a_lo + ngram;
        out.extend(ops.into_iter().filter(|op| {
            let book_leading = op
                .book_idx
                .is_some_and(|orig| book.to_original[window.b_lo..b_skip.min(book.to_original.len())].contains(&orig));
            let asr_leading = op
                .asr_idx
                .is_some_and(|orig| asr.to_original[window.a_lo..a_skip.min(asr.to_original.len())].contains(&orig));
            !(book_leading || asr_leading)
        }));
    }
    Ok(out)
}
