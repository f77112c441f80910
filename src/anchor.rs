// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Anchor discovery: sparse, order-preserving n-gram matches that pin the
//! alignment region.
//!
//! Two passes over the ASR stream. The strict pass only accepts n-grams that
//! hit the book index exactly once. If that yields fewer anchors than
//! `ceil(span / target_per_tokens)`, a relaxation pass re-streams allowing
//! duplicate book hits, resolving each to the hit closest to the linear
//! interpolation between the surrounding strict-pass anchors.
//!
//! # INVARIANTS (DO NOT VIOLATE)
//!
//! 1. **MONOTONIC**: anchors are strictly increasing in both `bp` and `ap`.
//! 2. **SEPARATED**: consecutive anchors are at least `min_separation`
//!    filtered book tokens apart, and their n-grams never overlap.
//! 3. **DETERMINISTIC**: for a fixed input the anchor list is identical
//!    across runs; every tie-break is on an integer key.
//!
//! Zero anchors is a valid outcome; the caller falls back to one padded
//! whole-region window.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AlignError, CancelToken};
use crate::stopwords;

/// Separator for n-gram keys. Tokens may contain spaces (digit expansion),
/// so a space join would collide.
const KEY_SEP: char = '\u{1F}';

/// Knobs for anchor selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPolicy {
    /// N-gram size.
    pub ngram: usize,
    /// Aim for roughly one anchor per this many filtered book tokens.
    pub target_per_tokens: usize,
    /// Enable the duplicate relaxation pass.
    pub allow_duplicates: bool,
    /// Minimum filtered-book-token separation between anchors.
    pub min_separation: usize,
    /// Reject anchors whose n-gram spans more than one book sentence.
    pub disallow_boundary_cross: bool,
    /// Use the English+domain stopword set instead of plain English.
    pub use_domain_stopwords: bool,
    /// Override stopword set; wins over `use_domain_stopwords` when set.
    #[serde(skip)]
    pub stopwords: Option<HashSet<String>>,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            ngram: 3,
            target_per_tokens: 50,
            allow_duplicates: true,
            min_separation: 100,
            disallow_boundary_cross: true,
            use_domain_stopwords: true,
            stopwords: None,
        }
    }
}

impl AnchorPolicy {
    pub fn stopword_set(&self) -> HashSet<String> {
        if let Some(set) = &self.stopwords {
            return set.clone();
        }
        if self.use_domain_stopwords {
            stopwords::english_plus_domain()
        } else {
            stopwords::english()
        }
    }
}

/// Starting filtered positions of an n-gram match in book and ASR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub bp: usize,
    pub ap: usize,
}

struct NgramIndex {
    hits: HashMap<String, Vec<usize>>,
    ngram: usize,
}

impl NgramIndex {
    /// Index every eligible n-gram of the book window `[b_start, b_end]`.
    fn build(
        tokens: &[String],
        sentence_index: &[usize],
        b_start: usize,
        b_end: usize,
        policy: &AnchorPolicy,
        stops: &HashSet<String>,
    ) -> Self {
        let n = policy.ngram;
        let mut hits: HashMap<String, Vec<usize>> = HashMap::new();
        if n == 0 || b_end + 1 < b_start + n {
            return Self { hits, ngram: n };
        }
        'outer: for p in b_start..=(b_end + 1 - n) {
            let gram = &tokens[p..p + n];
            for token in gram {
                if stops.contains(token.as_str()) {
                    continue 'outer;
                }
            }
            if policy.disallow_boundary_cross && sentence_index[p] != sentence_index[p + n - 1] {
                continue;
            }
            hits.entry(key_of(gram)).or_default().push(p);
        }
        Self { hits, ngram: n }
    }

    fn lookup(&self, gram: &[String]) -> Option<&[usize]> {
        self.hits.get(&key_of(gram)).map(Vec::as_slice)
    }
}

fn key_of(gram: &[String]) -> String {
    let mut key = String::with_capacity(gram.iter().map(String::len).sum::<usize>() + gram.len());
    for (i, token) in gram.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEP);
        }
        key.push_str(token);
    }
    key
}

/// Can `candidate` follow `last` (or open the sequence)?
fn admissible(last: Option<Anchor>, candidate: Anchor, n: usize, min_separation: usize) -> bool {
    match last {
        None => true,
        Some(prev) => {
            candidate.bp >= prev.bp + n.max(min_separation)
                && candidate.ap >= prev.ap + n
        }
    }
}

/// Select anchors over `book_tokens[b_start..=b_end]` against the full ASR
/// stream.
///
/// `book_sentence_index` maps filtered book positions to sentence ids and
/// must be parallel to `book_tokens`.
pub fn discover_anchors(
    book_tokens: &[String],
    book_sentence_index: &[usize],
    asr_tokens: &[String],
    policy: &AnchorPolicy,
    b_start: usize,
    b_end: usize,
    cancel: &CancelToken,
) -> Result<Vec<Anchor>, AlignError> {
    if book_tokens.len() != book_sentence_index.len() {
        return Err(AlignError::Internal(format!(
            "book tokens ({}) and sentence index ({}) lengths differ",
            book_tokens.len(),
            book_sentence_index.len()
        )));
    }
    let n = policy.ngram;
    if n == 0
        || book_tokens.is_empty()
        || asr_tokens.len() < n
        || b_start > b_end
        || b_end >= book_tokens.len()
    {
        return Ok(Vec::new());
    }

    let stops = policy.stopword_set();
    let index = NgramIndex::build(
        book_tokens,
        book_sentence_index,
        b_start,
        b_end,
        policy,
        &stops,
    );

    // Strict pass: unambiguous hits only.
    let mut strict: Vec<Anchor> = Vec::new();
    for a in 0..=(asr_tokens.len() - n) {
        if a % 1024 == 0 {
            cancel.check()?;
        }
        let gram = &asr_tokens[a..a + n];
        let Some(hits) = index.lookup(gram) else {
            continue;
        };
        if hits.len() != 1 {
            continue;
        }
        let candidate = Anchor { bp: hits[0], ap: a };
        if admissible(strict.last().copied(), candidate, n, policy.min_separation) {
            strict.push(candidate);
        }
    }

    let span = b_end - b_start + 1;
    let wanted = span.div_ceil(policy.target_per_tokens.max(1));
    if strict.len() >= wanted || !policy.allow_duplicates {
        return Ok(strict);
    }

    relax(
        &index, asr_tokens, &strict, policy, b_start, b_end, cancel,
    )
}

/// Relaxation pass: re-stream the ASR allowing duplicate book hits.
///
/// The strict-pass anchors form a skeleton. A duplicate resolves to the hit
/// closest to the linear interpolation of the book position inside the
/// enclosing skeleton gap; ties go to the smallest book position.
fn relax(
    index: &NgramIndex,
    asr_tokens: &[String],
    skeleton: &[Anchor],
    policy: &AnchorPolicy,
    b_start: usize,
    b_end: usize,
    cancel: &CancelToken,
) -> Result<Vec<Anchor>, AlignError> {
    let n = index.ngram;
    let mut result: Vec<Anchor> = Vec::new();
    let mut skeleton_iter = skeleton.iter().copied().peekable();

    for a in 0..=(asr_tokens.len() - n) {
        if a % 1024 == 0 {
            cancel.check()?;
        }

        // Skeleton anchors are already consistent; keep them as we pass.
        if let Some(&next) = skeleton_iter.peek() {
            if next.ap == a {
                skeleton_iter.next();
                result.push(next);
                continue;
            }
        }

        let Some(hits) = index.lookup(&asr_tokens[a..a + n]) else {
            continue;
        };

        let last = result.last().copied();
        let upcoming = skeleton_iter.peek().copied();
        let expected = interpolate(last, upcoming, a, b_start, b_end, asr_tokens.len());

        let mut chosen: Option<usize> = None;
        let mut chosen_dist = usize::MAX;
        for &bp in hits {
            let candidate = Anchor { bp, ap: a };
            if !admissible(last, candidate, n, policy.min_separation) {
                continue;
            }
            // Leave room for the next skeleton anchor.
            if let Some(up) = upcoming {
                if bp + n.max(policy.min_separation) > up.bp || a + n > up.ap {
                    continue;
                }
            }
            let dist = bp.abs_diff(expected);
            // Strict < keeps the smallest bp on ties (hits are ascending)
            if dist < chosen_dist {
                chosen_dist = dist;
                chosen = Some(bp);
            }
        }
        if let Some(bp) = chosen {
            result.push(Anchor { bp, ap: a });
        }
    }

    // Any skeleton anchors past the end of the stream walk
    result.extend(skeleton_iter);
    Ok(result)
}

/// Expected book position for ASR position `a`, linearly interpolated
/// between the surrounding accepted anchors (or the region edges).
fn interpolate(
    last: Option<Anchor>,
    upcoming: Option<Anchor>,
    a: usize,
    b_start: usize,
    b_end: usize,
    asr_len: usize,
) -> usize {
    match (last, upcoming) {
        (Some(lo), Some(hi)) if hi.ap > lo.ap => {
            let frac = (a - lo.ap) as f64 / (hi.ap - lo.ap) as f64;
            lo.bp + ((hi.bp - lo.bp) as f64 * frac).round() as usize
        }
        (Some(lo), _) => lo.bp + (a - lo.ap),
        (None, Some(hi)) => hi.bp.saturating_sub(hi.ap - a),
        (None, None) => {
            let span = b_end - b_start + 1;
            b_start + ((a as f64 / asr_len.max(1) as f64) * span as f64).round() as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_owned).collect()
    }

    fn policy(ngram: usize, min_separation: usize) -> AnchorPolicy {
        AnchorPolicy {
            ngram,
            min_separation,
            target_per_tokens: 4,
            disallow_boundary_cross: false,
            use_domain_stopwords: false,
            stopwords: Some(HashSet::new()),
            ..AnchorPolicy::default()
        }
    }

    fn discover(book: &str, asr: &str, policy: &AnchorPolicy) -> Vec<Anchor> {
        let book = tokens(book);
        let sentence_index = vec![0; book.len()];
        let asr = tokens(asr);
        discover_anchors(
            &book,
            &sentence_index,
            &asr,
            policy,
            0,
            book.len() - 1,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn identical_streams_anchor_at_the_start() {
        let anchors = discover(
            "quick brown fox jumps over lazy dog tonight",
            "quick brown fox jumps over lazy dog tonight",
            &policy(3, 3),
        );
        assert!(!anchors.is_empty());
        assert_eq!(anchors[0], Anchor { bp: 0, ap: 0 });
        for pair in anchors.windows(2) {
            assert!(pair[1].bp >= pair[0].bp + 3);
            assert!(pair[1].ap >= pair[0].ap + 3);
        }
    }

    #[test]
    fn ambiguous_ngrams_are_skipped_in_the_strict_pass() {
        // "alpha beta gamma" appears twice in the book
        let mut p = policy(3, 3);
        p.allow_duplicates = false;
        let anchors = discover(
            "alpha beta gamma delta alpha beta gamma omega",
            "alpha beta gamma delta",
            &p,
        );
        // Only "beta gamma delta" and "gamma delta ..." style grams are
        // unique; the duplicated leading gram must not anchor.
        assert!(anchors.iter().all(|a| a.bp != 0 || a.ap != 0));
    }

    #[test]
    fn stopword_ngrams_never_anchor() {
        let mut p = policy(2, 2);
        p.stopwords = Some(["the".to_owned()].into_iter().collect());
        let anchors = discover("the raven perched upon", "the raven perched upon", &p);
        for anchor in &anchors {
            assert_ne!(anchor.bp, 0, "n-gram containing 'the' anchored");
        }
    }

    #[test]
    fn boundary_crossing_ngrams_rejected() {
        let book = tokens("hello world again friend");
        let sentence_index = vec![0, 0, 1, 1];
        let mut p = policy(2, 2);
        p.disallow_boundary_cross = true;
        let anchors = discover_anchors(
            &book,
            &sentence_index,
            &tokens("hello world again friend"),
            &p,
            0,
            3,
            &CancelToken::new(),
        )
        .unwrap();
        // "world again" crosses sentences 0 and 1
        assert!(anchors.iter().all(|a| a.bp != 1));
    }

    #[test]
    fn min_separation_is_respected() {
        let anchors = discover(
            "one two three four five six seven eight nine ten",
            "one two three four five six seven eight nine ten",
            &policy(2, 5),
        );
        for pair in anchors.windows(2) {
            assert!(pair[1].bp >= pair[0].bp + 5);
        }
    }

    #[test]
    fn relaxation_adds_duplicate_hits_near_the_interpolation() {
        // "cee dee" appears twice in the book (bp 4 and bp 10). The ASR
        // middle region matches nothing else, so the strict pass leaves a
        // gap there; relaxation must resolve the duplicate to the hit
        // nearer the interpolated position (bp 4).
        let book = "aye bee see dee cee dee eff gee aitch eye cee dee jay kay ell";
        let asr = "aye bee see dee ex ex cee dee wye wye wye jay kay ell";
        let p = policy(2, 2); // target_per_tokens 4 forces relaxation
        let anchors = discover(book, asr, &p);
        for pair in anchors.windows(2) {
            assert!(pair[1].bp > pair[0].bp && pair[1].ap > pair[0].ap);
        }
        assert!(anchors.contains(&Anchor { bp: 4, ap: 6 }));
    }

    #[test]
    fn empty_inputs_yield_zero_anchors() {
        let p = policy(3, 3);
        let empty: Vec<String> = vec![];
        assert!(discover_anchors(
            &empty,
            &[],
            &tokens("anything here now"),
            &p,
            0,
            0,
            &CancelToken::new()
        )
        .unwrap()
        .is_empty());
        let book = tokens("only two");
        assert!(discover_anchors(
            &book,
            &[0, 0],
            &[],
            &p,
            0,
            1,
            &CancelToken::new()
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn cancellation_is_observed() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let book = tokens("a b c d e f");
        let err = discover_anchors(
            &book,
            &[0; 6],
            &tokens("a b c d e f"),
            &policy(2, 2),
            0,
            5,
            &cancel,
        );
        assert!(matches!(err, Err(AlignError::Cancelled)));
    }
}
