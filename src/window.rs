//! Partition the alignment region into per-anchor DP search windows.
//!
//! Windows are half-open `[b_lo, b_hi) × [a_lo, a_hi)` and cover the region
//! contiguously. Inter-anchor windows include the n-gram tokens of the
//! anchors on both sides, so consecutive windows overlap exactly on those
//! tokens and the matched n-grams stay inside every DP that touches them.

use serde::{Deserialize, Serialize};

use crate::anchor::Anchor;

/// Half-open search window over filtered positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub b_lo: usize,
    pub b_hi: usize,
    pub a_lo: usize,
    pub a_hi: usize,
}

impl Window {
    #[inline]
    pub fn book_len(&self) -> usize {
        self.b_hi - self.b_lo
    }

    #[inline]
    pub fn asr_len(&self) -> usize {
        self.a_hi - self.a_lo
    }
}

/// Padding for the anchor-less fallback window: generous enough to absorb
/// section-boundary slop, clamped so a pathological region cannot explode
/// the DP.
fn fallback_pad(ngram: usize, span: usize) -> usize {
    (ngram * 2).max(span / 5).clamp(32, 8192)
}

/// Emit windows covering `[b_start, b_end] × [a_start, a_end]` (inclusive).
///
/// `b_len` / `a_len` are the full filtered stream lengths, used to clamp the
/// padded fallback window.
#[allow(clippy::too_many_arguments)]
pub fn build_windows(
    anchors: &[Anchor],
    ngram: usize,
    b_start: usize,
    b_end: usize,
    a_start: usize,
    a_end: usize,
    b_len: usize,
    a_len: usize,
) -> Vec<Window> {
    if b_len == 0 || a_len == 0 || b_start > b_end || a_start > a_end {
        return Vec::new();
    }

    if anchors.is_empty() {
        let b_pad = fallback_pad(ngram, b_end - b_start + 1);
        let a_pad = fallback_pad(ngram, a_end - a_start + 1);
        return vec![Window {
            b_lo: b_start.saturating_sub(b_pad),
            b_hi: (b_end + 1 + b_pad).min(b_len),
            a_lo: a_start.saturating_sub(a_pad),
            a_hi: (a_end + 1 + a_pad).min(a_len),
        }];
    }

    let mut windows = Vec::with_capacity(anchors.len() + 1);
    let first = anchors[0];

    // Gap before the first anchor, closed over its n-gram.
    windows.push(Window {
        b_lo: b_start,
        b_hi: (first.bp + ngram).min(b_len),
        a_lo: a_start,
        a_hi: (first.ap + ngram).min(a_len),
    });

    // Each inter-anchor gap, bounded inclusively by both anchors' n-grams.
    for pair in anchors.windows(2) {
        windows.push(Window {
            b_lo: pair[0].bp,
            b_hi: (pair[1].bp + ngram).min(b_len),
            a_lo: pair[0].ap,
            a_hi: (pair[1].ap + ngram).min(a_len),
        });
    }

    // Tail after the last anchor.
    let last = anchors[anchors.len() - 1];
    windows.push(Window {
        b_lo: last.bp,
        b_hi: (b_end + 1).min(b_len),
        a_lo: last.ap,
        a_hi: (a_end + 1).min(a_len),
    });

    windows
}
