// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Pronunciation lookup and phoneme-level similarity.
//!
//! Lexicons give several pronunciations per word, so similarity is the best
//! pairing across the two variant sets. The double loop is bounded by
//! [`MAX_VARIANTS`] per word.

use std::collections::HashMap;

use crate::error::{AlignError, CancelToken};

/// Cap on pronunciation variants considered per word.
pub const MAX_VARIANTS: usize = 32;

/// Supplies pronunciation variants for spoken words.
///
/// Each variant is a space-separated phoneme string (`"IH SH M IY L"`).
/// Providers are external collaborators; errors surface unchanged and are
/// never retried inside the core.
pub trait PronunciationProvider {
    fn pronunciations(
        &self,
        words: &[String],
        cancel: &CancelToken,
    ) -> Result<HashMap<String, Vec<String>>, AlignError>;
}

/// Provider that knows nothing. Lexical similarity alone is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProvider;

impl PronunciationProvider for NullProvider {
    fn pronunciations(
        &self,
        _words: &[String],
        _cancel: &CancelToken,
    ) -> Result<HashMap<String, Vec<String>>, AlignError> {
        Ok(HashMap::new())
    }
}

/// Map-backed provider, for tests and for lexicon files loaded by the CLI.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    entries: HashMap<String, Vec<String>>,
}

impl StaticProvider {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, lexeme: &str, variants: &[&str]) {
        self.entries.insert(
            lexeme.to_owned(),
            variants.iter().map(|v| (*v).to_owned()).collect(),
        );
    }
}

impl PronunciationProvider for StaticProvider {
    fn pronunciations(
        &self,
        words: &[String],
        cancel: &CancelToken,
    ) -> Result<HashMap<String, Vec<String>>, AlignError> {
        cancel.check()?;
        let mut out = HashMap::new();
        for word in words {
            if let Some(variants) = self.entries.get(word) {
                out.insert(word.clone(), variants.clone());
            }
        }
        Ok(out)
    }
}

/// Split provider output into phoneme symbol sequences.
pub fn parse_variants(variants: &[String]) -> Vec<Vec<String>> {
    variants
        .iter()
        .take(MAX_VARIANTS)
        .map(|v| v.split_whitespace().map(str::to_owned).collect())
        .filter(|v: &Vec<String>| !v.is_empty())
        .collect()
}

/// Edit distance between two phoneme sequences.
///
/// Single-row DP, same discipline as the character-level distance in
/// `align.rs` but over symbols.
fn phoneme_edit_distance(a: &[String], b: &[String]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut dp: Vec<usize> = (0..=b.len()).collect();
    for (i, pa) in a.iter().enumerate() {
        let mut prev = dp[0];
        dp[0] = i + 1;
        for (j, pb) in b.iter().enumerate() {
            let temp = dp[j + 1];
            let cost = usize::from(pa != pb);
            dp[j + 1] = (dp[j + 1] + 1).min(dp[j] + 1).min(prev + cost);
            prev = temp;
        }
    }
    dp[b.len()]
}

/// Best similarity across two variant sets, in `[0, 1]`.
///
/// Minimum normalized edit distance over the Cartesian product, converted to
/// similarity. Returns `None` when either side has no variants.
pub fn phoneme_similarity(a: &[Vec<String>], b: &[Vec<String>]) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut best = 0.0f64;
    for va in a.iter().take(MAX_VARIANTS) {
        for vb in b.iter().take(MAX_VARIANTS) {
            let longest = va.len().max(vb.len());
            if longest == 0 {
                continue;
            }
            let dist = phoneme_edit_distance(va, vb);
            let sim = 1.0 - (dist as f64 / longest as f64);
            if sim > best {
                best = sim;
            }
        }
    }
    Some(best)
}
