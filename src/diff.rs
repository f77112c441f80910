// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Word-level text diffing for hydrated transcripts.
//!
//! A Myers O(ND) diff over whitespace-split tokens, grouped into
//! `equal`/`delete`/`insert` runs. The diff is carried verbatim on the
//! hydrated record; WER/CER derive from it by pairing adjacent delete and
//! insert runs into substitutions.

use serde::{Deserialize, Serialize};

use crate::levenshtein::levenshtein_chars;

/// Diff operation kind, serialized lowercase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Equal,
    Delete,
    Insert,
}

/// A run of consecutive tokens sharing one kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiffOp {
    pub op: DiffKind,
    pub tokens: Vec<String>,
}

/// Word-level diff between a book sentence and its spoken rendition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextDiff {
    pub ops: Vec<DiffOp>,
}

/// Word and character error rates for one text pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiffMetrics {
    pub wer: f64,
    pub cer: f64,
}

enum Edit {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

/// Myers O(ND) shortest edit script over token slices.
fn myers(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }
    let offset = max;
    let width = (2 * max + 1) as usize;
    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'outer: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'outer;
            }
            k += 2;
        }
    }

    // Walk the trace backwards to recover the edit script.
    let mut edits: Vec<Edit> = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d
            || (k != d && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Equal((x - 1) as usize));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert((prev_y) as usize));
            } else {
                edits.push(Edit::Delete((prev_x) as usize));
            }
            x = prev_x;
            y = prev_y;
        }
    }
    edits.reverse();
    edits
}

/// Case/punctuation fold for token equality. The emitted diff keeps the
/// original tokens; only the comparison folds.
fn fold(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Diff two texts at word level.
///
/// Tokenization is a plain whitespace split; the caller normalizes
/// typography beforehand. Tokens compare equal under [`fold`], so "Call,"
/// and "call" line up while the diff still carries the surface forms.
pub fn analyze(book: &str, script: &str) -> TextDiff {
    let a: Vec<&str> = book.split_whitespace().collect();
    let b: Vec<&str> = script.split_whitespace().collect();
    let a_folded: Vec<String> = a.iter().map(|t| fold(t)).collect();
    let b_folded: Vec<String> = b.iter().map(|t| fold(t)).collect();
    let a_keys: Vec<&str> = a_folded.iter().map(String::as_str).collect();
    let b_keys: Vec<&str> = b_folded.iter().map(String::as_str).collect();
    let edits = myers(&a_keys, &b_keys);

    let mut ops: Vec<DiffOp> = Vec::new();
    for edit in edits {
        let (kind, token) = match edit {
            Edit::Equal(i) => (DiffKind::Equal, a[i]),
            Edit::Delete(i) => (DiffKind::Delete, a[i]),
            Edit::Insert(j) => (DiffKind::Insert, b[j]),
        };
        match ops.last_mut() {
            Some(last) if last.op == kind => last.tokens.push(token.to_owned()),
            _ => ops.push(DiffOp { op: kind, tokens: vec![token.to_owned()] }),
        }
    }
    TextDiff { ops }
}

/// Tokens that fold to something; punctuation-only tokens don't count
/// toward word rates.
fn counted(tokens: &[String]) -> usize {
    tokens.iter().filter(|t| !fold(t).is_empty()).count()
}

/// Derive WER and CER from a diff and the original strings.
///
/// Adjacent delete/insert runs pair into substitutions; the remainder counts
/// as plain deletions or insertions. The reference length is the book's
/// count of foldable tokens, so stray punctuation does not inflate the rate.
pub fn metrics(diff: &TextDiff, book: &str, script: &str) -> DiffMetrics {
    let mut subs = 0usize;
    let mut dels = 0usize;
    let mut inss = 0usize;

    let mut i = 0;
    while i < diff.ops.len() {
        let run = &diff.ops[i];
        if run.op == DiffKind::Equal {
            i += 1;
            continue;
        }
        // A delete run adjacent to an insert run (either order) is a
        // substitution for the overlapping count.
        let next = diff.ops.get(i + 1);
        let complementary = match run.op {
            DiffKind::Delete => DiffKind::Insert,
            _ => DiffKind::Delete,
        };
        if next.is_some_and(|n| n.op == complementary) {
            let (d, ins_run) = if run.op == DiffKind::Delete {
                (counted(&run.tokens), counted(&diff.ops[i + 1].tokens))
            } else {
                (counted(&diff.ops[i + 1].tokens), counted(&run.tokens))
            };
            let s = d.min(ins_run);
            subs += s;
            dels += d - s;
            inss += ins_run - s;
            i += 2;
        } else {
            match run.op {
                DiffKind::Delete => dels += counted(&run.tokens),
                _ => inss += counted(&run.tokens),
            }
            i += 1;
        }
    }

    let book_tokens = book
        .split_whitespace()
        .filter(|t| !fold(t).is_empty())
        .count();
    let wer = (subs + dels + inss) as f64 / book_tokens.max(1) as f64;

    let book_chars = book.chars().count();
    let cer = if book_chars == 0 {
        if script.is_empty() { 0.0 } else { 1.0 }
    } else {
        levenshtein_chars(book, script) as f64 / book_chars as f64
    };

    DiffMetrics { wer, cer }
}

/// Paragraph coverage: `1 − deleted_tokens / book_tokens`, counting
/// foldable tokens only.
pub fn coverage(diff: &TextDiff, book: &str) -> f64 {
    let deleted: usize = diff
        .ops
        .iter()
        .filter(|op| op.op == DiffKind::Delete)
        .map(|op| counted(&op.tokens))
        .sum();
    let book_tokens = book
        .split_whitespace()
        .filter(|t| !fold(t).is_empty())
        .count();
    if book_tokens == 0 {
        return 1.0;
    }
    1.0 - deleted as f64 / book_tokens as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(diff: &TextDiff) -> Vec<(DiffKind, usize)> {
        diff.ops.iter().map(|op| (op.op, op.tokens.len())).collect()
    }

    #[test]
    fn identical_texts_are_one_equal_run() {
        let diff = analyze("call me ishmael", "call me ishmael");
        assert_eq!(kinds(&diff), vec![(DiffKind::Equal, 3)]);
        let m = metrics(&diff, "call me ishmael", "call me ishmael");
        assert_eq!(m.wer, 0.0);
        assert_eq!(m.cer, 0.0);
    }

    #[test]
    fn dropped_word_is_a_delete_run() {
        let diff = analyze("call me ishmael", "call me");
        assert_eq!(
            kinds(&diff),
            vec![(DiffKind::Equal, 2), (DiffKind::Delete, 1)]
        );
        assert_eq!(diff.ops[1].tokens, vec!["ishmael"]);
        let m = metrics(&diff, "call me ishmael", "call me");
        assert!((m.wer - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn replaced_word_pairs_into_a_substitution() {
        let diff = analyze("how are you", "howl are you");
        let m = metrics(&diff, "how are you", "howl are you");
        // delete "how" + insert "howl" pairs into one substitution
        assert!((m.wer - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unbalanced_replace_counts_remainder() {
        let diff = analyze("a b c", "x");
        let m = metrics(&diff, "a b c", "x");
        // one sub (a→x or positional equivalent) plus two deletes
        assert!((m.wer - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pure_insertions() {
        let diff = analyze("hello world", "hello brave new world");
        let m = metrics(&diff, "hello world", "hello brave new world");
        assert!((m.wer - 1.0).abs() < 1e-9);
        assert_eq!(coverage(&diff, "hello world"), 1.0);
    }

    #[test]
    fn coverage_reflects_deletions_only() {
        let diff = analyze("a b c d e", "a b");
        assert!((coverage(&diff, "a b c d e") - 0.4).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs() {
        let diff = analyze("", "");
        assert!(diff.ops.is_empty());
        let m = metrics(&diff, "", "");
        assert_eq!(m.wer, 0.0);
        assert_eq!(m.cer, 0.0);
        assert_eq!(coverage(&diff, ""), 1.0);
    }

    #[test]
    fn case_and_punctuation_fold_in_comparison() {
        let diff = analyze("Call me, Ishmael.", "call me ishmael");
        assert_eq!(kinds(&diff), vec![(DiffKind::Equal, 3)]);
        // Surface forms survive; only the comparison folded
        assert_eq!(diff.ops[0].tokens, vec!["Call", "me,", "Ishmael."]);
    }

    #[test]
    fn diff_round_trips_the_inputs() {
        let book = "the quick brown fox jumps";
        let script = "the quick red fox leaps high";
        let diff = analyze(book, script);
        let rebuilt_book: Vec<String> = diff
            .ops
            .iter()
            .filter(|op| op.op != DiffKind::Insert)
            .flat_map(|op| op.tokens.clone())
            .collect();
        let rebuilt_script: Vec<String> = diff
            .ops
            .iter()
            .filter(|op| op.op != DiffKind::Delete)
            .flat_map(|op| op.tokens.clone())
            .collect();
        assert_eq!(rebuilt_book.join(" "), book);
        assert_eq!(rebuilt_script.join(" "), script);
    }
}
