// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Sentence-timing refinement: the `[start, end]` window per sentence that
//! downstream audio editing consumes.
//!
//! Start times come from forced-alignment fragments when one is assigned,
//! otherwise from the first ASR token. End times are raised to the fragment
//! or last-token end and then snapped forward to the next silence when it
//! starts within the look-ahead. Windows never regress: each start is at
//! least the previous end, each end at least `min_tail_sec` past its start.
//!
//! All times round half-up to microseconds so a rerun is byte-identical.

use std::collections::HashMap;

use crate::error::{AlignError, CancelToken};
use crate::types::{
    AsrResponse, ChapterAlignmentIndex, SentenceFragment, SentenceRefined, SilenceTimeline,
    TranscriptIndex,
};

/// Maximum drift between a sentence's expected ASR start and its fragment.
const FRAGMENT_DRIFT_CAP_SEC: f64 = 1.5;

/// Inputs to one refinement run.
#[derive(Debug, Clone, Default)]
pub struct RefinementContext<'a> {
    /// Sentence id → assigned fragment, from [`assign_fragments`].
    pub fragments: HashMap<usize, SentenceFragment>,
    pub silences: Option<&'a SilenceTimeline>,
    pub min_tail_sec: f64,
    pub max_snap_ahead_sec: f64,
}

fn round_micros(t: f64) -> f64 {
    (t * 1e6).round() / 1e6
}

/// Flatten chunk alignments into an ordered absolute-time fragment pool.
pub fn fragment_pool(index: &ChapterAlignmentIndex) -> Vec<SentenceFragment> {
    let mut chunks: Vec<_> = index.chunks.iter().collect();
    chunks.sort_by(|a, b| {
        a.offset_sec
            .partial_cmp(&b.offset_sec)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    let mut pool = Vec::new();
    for chunk in chunks {
        for (i, span) in chunk.fragments.iter().enumerate() {
            pool.push(SentenceFragment {
                chunk_id: chunk.chunk_id.clone(),
                fragment_index: i,
                start: chunk.offset_sec + span.begin,
                end: chunk.offset_sec + span.end,
            });
        }
    }
    pool
}

/// Greedily assign fragments to sentences in id order.
///
/// Each sentence takes the unused fragment whose start is closest to the
/// sentence's expected ASR start, searching forward first, then backward,
/// both capped at ±1.5 s of drift. Sentences without a script range get no
/// fragment.
pub fn assign_fragments(
    alignment: &ChapterAlignmentIndex,
    index: &TranscriptIndex,
    asr: &AsrResponse,
) -> HashMap<usize, SentenceFragment> {
    let pool = fragment_pool(alignment);
    let mut used = vec![false; pool.len()];
    let mut assigned = HashMap::new();

    for sentence in &index.sentences {
        let Some(range) = sentence.script_range else {
            continue;
        };
        let Some(token) = asr.tokens.get(range.start) else {
            continue;
        };
        let expected = token.start;

        // First unused fragment starting at or after the expected time
        let forward = pool
            .iter()
            .enumerate()
            .find(|(i, f)| !used[*i] && f.start >= expected)
            .map(|(i, f)| (i, (f.start - expected).abs()));
        // Last unused fragment before it
        let backward = pool
            .iter()
            .enumerate()
            .rev()
            .find(|(i, f)| !used[*i] && f.start < expected)
            .map(|(i, f)| (i, (f.start - expected).abs()));

        let choice = match forward {
            Some((i, drift)) if drift <= FRAGMENT_DRIFT_CAP_SEC => Some(i),
            _ => match backward {
                Some((i, drift)) if drift <= FRAGMENT_DRIFT_CAP_SEC => Some(i),
                _ => None,
            },
        };
        if let Some(i) = choice {
            used[i] = true;
            assigned.insert(sentence.id, pool[i].clone());
        }
    }
    assigned
}

/// Produce refined time windows for every sentence, in id order.
pub fn refine_sentences(
    index: &TranscriptIndex,
    asr: &AsrResponse,
    ctx: &RefinementContext<'_>,
    cancel: &CancelToken,
) -> Result<Vec<SentenceRefined>, AlignError> {
    let token_count = asr.tokens.len();
    let mut refined = Vec::with_capacity(index.sentences.len());
    let mut previous_end = 0.0f64;
    let mut previous_token_end: Option<usize> = None;

    for sentence in &index.sentences {
        cancel.check()?;

        // 1. Token range: clamp the script range, or sit just past the
        //    previous sentence's tokens.
        let (start_idx, end_idx) = match sentence.script_range {
            Some(range) if token_count > 0 => (
                range.start.min(token_count - 1),
                range.end.min(token_count - 1),
            ),
            _ => {
                let next = previous_token_end.map_or(0, |e| e + 1);
                let clamped = if token_count > 0 { next.min(token_count - 1) } else { 0 };
                (clamped, clamped)
            }
        };

        let fragment = ctx.fragments.get(&sentence.id);

        // 2. Start time
        let mut start = match fragment {
            Some(f) => previous_end.max(f.start),
            None => {
                if token_count > 0 {
                    asr.tokens[start_idx].start
                } else {
                    previous_end
                }
            }
        };
        start = start.max(previous_end);

        // 3. End time: floor, then raise to fragment or token end, then snap
        //    to the next silence.
        let mut end = start + ctx.min_tail_sec;
        match fragment {
            Some(f) => end = end.max(f.end),
            None => {
                if token_count > 0 {
                    end = end.max(asr.tokens[end_idx].end());
                }
            }
        }
        if let Some(silences) = ctx.silences {
            if token_count > 0 {
                let last_token_end = asr.tokens[end_idx].end();
                if let Some(event) = silences.first_event_at_or_after(last_token_end) {
                    if event.start - last_token_end <= ctx.max_snap_ahead_sec {
                        end = end.max(event.start);
                    }
                }
            }
        }

        // 4. Monotonicity and rounding
        end = end.max(start + ctx.min_tail_sec);
        let start = round_micros(start);
        let end = round_micros(end);

        refined.push(SentenceRefined {
            sentence_id: sentence.id,
            start,
            end,
            token_start_idx: start_idx,
            token_end_idx: end_idx,
        });
        previous_end = end;
        previous_token_end = Some(end_idx);
    }

    Ok(refined)
}
