// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Chapter orchestration: run the pipeline stages against one chapter's
//! documents and compose the output artifacts.
//!
//! The facade owns no shared mutable state of its own; parsed books live in
//! an explicit [`BookRegistry`] passed into each call. Every method is
//! idempotent for identical inputs: rerunning produces byte-identical
//! artifacts modulo the creation timestamp, which tests pin via
//! [`ChapterOptions::created_at`].
//!
//! Logging happens here and only here; the pure stages below never log.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::align::{align_windows, AlignConfig, AlignSide};
use crate::anchor::{discover_anchors, Anchor, AnchorPolicy};
use crate::error::{AlignError, CancelToken};
use crate::hydrate::{hydrate, HydratedTranscript};
use crate::normalize::NORMALIZATION_VERSION;
use crate::pronounce::{parse_variants, PronunciationProvider};
use crate::refine::{assign_fragments, refine_sentences, RefinementContext};
use crate::rollup::rollup;
use crate::section::{detect_section, resolve_section_by_title};
use crate::types::{
    AsrResponse, BookIndex, ChapterAlignmentIndex, SectionRange, SentenceRefined,
    SilenceTimeline, TranscriptIndex,
};
use crate::view::{asr_view, book_view, AsrView, BookView};
use crate::window::{build_windows, Window};

/// Options recognized by the alignment core. All have defaults.
#[derive(Debug, Clone)]
pub struct ChapterOptions {
    /// Anchor n-gram size.
    pub ngram: usize,
    /// ≈1 anchor per this many filtered book tokens.
    pub target_per_tokens: usize,
    /// Minimum token separation between anchors.
    pub min_separation: usize,
    /// Allow anchors to cross sentence boundaries.
    pub allow_boundary_cross: bool,
    /// Use the English+domain stopword set.
    pub use_domain_stopwords: bool,
    /// ASR tokens fed into section detection.
    pub asr_prefix_tokens: usize,
    /// Enable section detection.
    pub detect_section: bool,
    /// Include windows in the anchor document.
    pub emit_windows: bool,
    /// Minimum sentence duration after refinement.
    pub min_tail_sec: f64,
    /// Silence snap look-ahead window.
    pub max_snap_ahead_sec: f64,
    /// Known section label (chapter id or directory name); overrides
    /// detection when it resolves.
    pub section_label: Option<String>,
    /// Cost weights and token sets for the aligner.
    pub align: AlignConfig,
    /// Pinned creation timestamp; `None` stamps the current time.
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for ChapterOptions {
    fn default() -> Self {
        Self {
            ngram: 3,
            target_per_tokens: 50,
            min_separation: 100,
            allow_boundary_cross: false,
            use_domain_stopwords: true,
            asr_prefix_tokens: 8,
            detect_section: true,
            emit_windows: false,
            min_tail_sec: 0.1,
            max_snap_ahead_sec: 0.8,
            section_label: None,
            align: AlignConfig::default(),
            created_at: None,
        }
    }
}

impl ChapterOptions {
    pub fn anchor_policy(&self) -> AnchorPolicy {
        AnchorPolicy {
            ngram: self.ngram,
            target_per_tokens: self.target_per_tokens,
            allow_duplicates: true,
            min_separation: self.min_separation,
            disallow_boundary_cross: !self.allow_boundary_cross,
            use_domain_stopwords: self.use_domain_stopwords,
            stopwords: None,
        }
    }
}

/// One chapter's document slots. Absent slots fail the operations that need
/// them with [`AlignError::MissingInput`].
#[derive(Debug, Clone, Default)]
pub struct ChapterContext {
    pub chapter_id: Option<String>,
    pub book: Option<Arc<BookIndex>>,
    pub asr: Option<AsrResponse>,
    pub alignment: Option<ChapterAlignmentIndex>,
    pub silences: Option<SilenceTimeline>,
    pub book_path: Option<String>,
    pub asr_path: Option<String>,
}

/// Filtered token counts recorded on the anchor document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    pub book_total: usize,
    pub book_filtered: usize,
    pub asr_total: usize,
    pub asr_filtered: usize,
}

/// Active filtered book window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWindow {
    pub b_start: usize,
    pub b_end: usize,
}

/// One anchor with its original book word index resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEntry {
    pub book_position: usize,
    pub book_word_index: usize,
    pub asr_position: usize,
}

/// Serialized output of anchor discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorDocument {
    pub section_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<SectionRange>,
    pub policy: AnchorPolicy,
    pub tokens: TokenCounts,
    pub window: ActiveWindow,
    pub anchors: Vec<AnchorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<Window>>,
}

/// Resolved prework shared by anchors and the full alignment.
struct Prepared<'a> {
    book: &'a BookIndex,
    asr: &'a AsrResponse,
    book_view: BookView,
    asr_view: AsrView,
    section: Option<SectionRange>,
    section_detected: bool,
    /// Active filtered book window, inclusive.
    b_start: usize,
    b_end: usize,
    anchors: Vec<Anchor>,
}

impl ChapterContext {
    fn require_book(&self) -> Result<&Arc<BookIndex>, AlignError> {
        self.book.as_ref().ok_or(AlignError::MissingInput("book index"))
    }

    fn require_asr(&self) -> Result<&AsrResponse, AlignError> {
        self.asr.as_ref().ok_or(AlignError::MissingInput("asr response"))
    }

    /// Resolve the section override, run detection, and discover anchors.
    fn prepare(
        &self,
        options: &ChapterOptions,
        cancel: &CancelToken,
    ) -> Result<Prepared<'_>, AlignError> {
        let book = self.require_book()?.as_ref();
        let asr = self.require_asr()?;
        book.validate()?;
        asr.validate()?;

        let bv = book_view(book);
        let av = asr_view(asr);

        // Known label first (chapter id or directory name), detection second.
        let label = options
            .section_label
            .as_deref()
            .or(self.chapter_id.as_deref());
        let mut section = label.and_then(|l| resolve_section_by_title(book, l)).cloned();
        let mut detected = section.is_some();
        if section.is_none() && options.detect_section {
            let raw_words: Vec<String> =
                asr.tokens.iter().map(|t| t.word.clone()).collect();
            section = detect_section(book, &raw_words, options.asr_prefix_tokens).cloned();
            detected = section.is_some();
        }

        // Project the active word range into filtered coordinates.
        let (b_start, b_end) = match &section {
            Some(s) if !bv.tokens.is_empty() => {
                let lo = bv.filtered_at_or_after(s.start_word).unwrap_or(0);
                let hi = bv
                    .filtered_at_or_before(s.end_word)
                    .unwrap_or(bv.tokens.len() - 1);
                (lo, hi.max(lo))
            }
            _ if bv.tokens.is_empty() => (0, 0),
            _ => (0, bv.tokens.len() - 1),
        };

        let anchors = if bv.tokens.is_empty() || av.tokens.is_empty() {
            Vec::new()
        } else {
            discover_anchors(
                &bv.tokens,
                &bv.sentence_index,
                &av.tokens,
                &options.anchor_policy(),
                b_start,
                b_end,
                cancel,
            )?
        };
        debug!(
            chapter = self.chapter_id.as_deref().unwrap_or("<unnamed>"),
            anchors = anchors.len(),
            section = section.as_ref().map(|s| s.id),
            "anchor discovery complete"
        );

        Ok(Prepared {
            book,
            asr,
            book_view: bv,
            asr_view: av,
            section,
            section_detected: detected,
            b_start,
            b_end,
            anchors,
        })
    }

    fn windows_for(&self, prepared: &Prepared<'_>, options: &ChapterOptions) -> Vec<Window> {
        build_windows(
            &prepared.anchors,
            options.ngram,
            prepared.b_start,
            prepared.b_end,
            0,
            prepared.asr_view.tokens.len().saturating_sub(1),
            prepared.book_view.tokens.len(),
            prepared.asr_view.tokens.len(),
        )
    }

    /// Build the anchor document for this chapter.
    pub fn compute_anchors(
        &self,
        options: &ChapterOptions,
        cancel: &CancelToken,
    ) -> Result<AnchorDocument, AlignError> {
        let prepared = self.prepare(options, cancel)?;
        let windows = options
            .emit_windows
            .then(|| self.windows_for(&prepared, options));

        let anchors = prepared
            .anchors
            .iter()
            .map(|a| AnchorEntry {
                book_position: a.bp,
                book_word_index: prepared.book_view.filtered_to_original[a.bp],
                asr_position: a.ap,
            })
            .collect();

        Ok(AnchorDocument {
            section_detected: prepared.section_detected,
            section: prepared.section,
            policy: options.anchor_policy(),
            tokens: TokenCounts {
                book_total: prepared.book.words.len(),
                book_filtered: prepared.book_view.tokens.len(),
                asr_total: prepared.asr.tokens.len(),
                asr_filtered: prepared.asr_view.tokens.len(),
            },
            window: ActiveWindow { b_start: prepared.b_start, b_end: prepared.b_end },
            anchors,
            windows,
        })
    }

    /// Run the full word alignment and roll it up into a transcript index.
    pub fn build_transcript_index(
        &self,
        options: &ChapterOptions,
        provider: &dyn PronunciationProvider,
        cancel: &CancelToken,
    ) -> Result<TranscriptIndex, AlignError> {
        let prepared = self.prepare(options, cancel)?;
        let windows = self.windows_for(&prepared, options);

        // Pronunciations load once per chapter, before the DP begins.
        let asr_phonemes = load_asr_phonemes(&prepared.asr_view, provider, cancel)?;
        let book_phonemes: Vec<Vec<Vec<String>>> = prepared
            .book_view
            .filtered_to_original
            .iter()
            .map(|&orig| prepared.book.words[orig].phonemes.clone().unwrap_or_default())
            .collect();

        let ops = align_windows(
            &AlignSide {
                tokens: &prepared.book_view.tokens,
                to_original: &prepared.book_view.filtered_to_original,
                phonemes: Some(&book_phonemes),
            },
            &AlignSide {
                tokens: &prepared.asr_view.tokens,
                to_original: &prepared.asr_view.filtered_to_original,
                phonemes: Some(&asr_phonemes),
            },
            &windows,
            options.ngram,
            &options.align,
            cancel,
        )?;

        let (sentences, paragraphs) = rollup(
            prepared.book,
            prepared.asr,
            &ops,
            prepared.section.as_ref(),
            cancel,
        )?;

        debug!(
            ops = ops.len(),
            sentences = sentences.len(),
            paragraphs = paragraphs.len(),
            "transcript index built"
        );

        Ok(TranscriptIndex {
            book_path: self.book_path.clone(),
            asr_path: self.asr_path.clone(),
            created_at: options.created_at.unwrap_or_else(Utc::now),
            normalization_version: NORMALIZATION_VERSION.to_owned(),
            words: ops,
            sentences,
            paragraphs,
        })
    }

    /// Hydrate an already-built transcript index.
    pub fn hydrate_transcript(
        &self,
        index: &TranscriptIndex,
    ) -> Result<HydratedTranscript, AlignError> {
        let book = self.require_book()?.as_ref();
        let asr = self.require_asr()?;
        index.require_normalization(NORMALIZATION_VERSION)?;
        hydrate(index, book, asr)
    }

    /// Produce refined sentence timings from the transcript index plus the
    /// chapter's forced-alignment fragments and silence timeline.
    pub fn refine_sentences(
        &self,
        index: &TranscriptIndex,
        options: &ChapterOptions,
        cancel: &CancelToken,
    ) -> Result<Vec<SentenceRefined>, AlignError> {
        let asr = self.require_asr()?;
        index.require_normalization(NORMALIZATION_VERSION)?;
        if let Some(timeline) = &self.silences {
            timeline.validate()?;
        }
        let fragments = match &self.alignment {
            Some(alignment) => assign_fragments(alignment, index, asr),
            None => HashMap::new(),
        };
        let ctx = RefinementContext {
            fragments,
            silences: self.silences.as_ref(),
            min_tail_sec: options.min_tail_sec,
            max_snap_ahead_sec: options.max_snap_ahead_sec,
        };
        refine_sentences(index, asr, &ctx, cancel)
    }
}

fn load_asr_phonemes(
    view: &AsrView,
    provider: &dyn PronunciationProvider,
    cancel: &CancelToken,
) -> Result<Vec<Vec<Vec<String>>>, AlignError> {
    let mut unique: Vec<String> = view.tokens.to_vec();
    unique.sort();
    unique.dedup();
    let found = provider.pronunciations(&unique, cancel)?;
    Ok(view
        .tokens
        .iter()
        .map(|token| found.get(token).map(|v| parse_variants(v)).unwrap_or_default())
        .collect())
}

// ============================================================================
// COLLABORATOR SEAMS
// ============================================================================

/// Reads and writes artifact bytes. The facade persists through this seam;
/// the engine itself has no side effects.
pub trait ArtifactResolver {
    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), std::io::Error>;
}

/// Plain filesystem resolver used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl ArtifactResolver for FsResolver {
    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }
}

/// Produces a [`BookIndex`] from raw manuscript bytes. Parsing itself is an
/// external collaboration; the core only consumes the finished artifact.
pub trait BookParser {
    fn parse(&self, bytes: &[u8]) -> Result<BookIndex, AlignError>;
}

/// Content-hash keyed cache of parsed books, owned by a collaborator.
pub trait BookCache {
    fn load(&self, content_sha256: &str) -> Option<Arc<BookIndex>>;
    fn store(&self, content_sha256: &str, book: Arc<BookIndex>);
}

#[cfg(feature = "parallel")]
type RegistryLock<T> = parking_lot::RwLock<T>;
#[cfg(not(feature = "parallel"))]
type RegistryLock<T> = std::sync::RwLock<T>;

/// Explicit registry of opened books, keyed by book root path.
///
/// Replaces a process-wide lock: the registry is owned by whoever drives the
/// facade and passed into each call. Chapters of one book share the parsed
/// index; chapters of different books never contend.
#[derive(Default)]
pub struct BookRegistry {
    books: RegistryLock<HashMap<PathBuf, Arc<BookIndex>>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root: &Path) -> Option<Arc<BookIndex>> {
        #[cfg(feature = "parallel")]
        let guard = self.books.read();
        #[cfg(not(feature = "parallel"))]
        let guard = self.books.read().unwrap_or_else(|e| e.into_inner());
        guard.get(root).cloned()
    }

    /// Insert a parsed book, returning the registered handle (first write
    /// wins when two callers race).
    pub fn insert(&self, root: PathBuf, book: BookIndex) -> Arc<BookIndex> {
        #[cfg(feature = "parallel")]
        let mut guard = self.books.write();
        #[cfg(not(feature = "parallel"))]
        let mut guard = self.books.write().unwrap_or_else(|e| e.into_inner());
        guard.entry(root).or_insert_with(|| Arc::new(book)).clone()
    }

    pub fn len(&self) -> usize {
        #[cfg(feature = "parallel")]
        let guard = self.books.read();
        #[cfg(not(feature = "parallel"))]
        let guard = self.books.read().unwrap_or_else(|e| e.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
