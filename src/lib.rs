//! Audiobook manuscript-to-recording alignment.
//!
//! Given a canonical book token stream (sentences, paragraphs, sections), an
//! ASR token stream with word timings, and optionally forced-phoneme
//! fragments and a silence timeline, this crate produces a per-word
//! correspondence between book and spoken tokens, sentence- and
//! paragraph-level metrics and statuses, and refined per-sentence time
//! windows for downstream audio editing.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │ normalize │──▶│  view    │──▶│  anchor   │──▶│  window  │
//! │ (tokens)  │   │ (filter+ │   │ (n-gram   │   │ (DP      │
//! │           │   │  backmap)│   │  matches) │   │  bounds) │
//! └───────────┘   └──────────┘   └───────────┘   └──────────┘
//!                                                      │
//! ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌─────▼────┐
//! │  refine   │◀──│ hydrate  │◀──│  rollup   │◀──│  align   │
//! │ (timings) │   │ (text +  │   │ (metrics, │   │ (NW DP,  │
//! │           │   │  diffs)  │   │  status)  │   │ phonemes)│
//! └───────────┘   └──────────┘   └───────────┘   └──────────┘
//! ```
//!
//! The [`ChapterContext`] facade drives the stages against one chapter's
//! documents; chapters are independent and may run in parallel. Every stage
//! is deterministic: a fixed input tuple yields byte-identical artifacts
//! (modulo the caller-supplied timestamp).
//!
//! # Usage
//!
//! ```ignore
//! use recital::{ChapterContext, ChapterOptions, CancelToken, NullProvider};
//!
//! let ctx = ChapterContext { book: Some(book), asr: Some(asr), ..Default::default() };
//! let index = ctx.build_transcript_index(
//!     &ChapterOptions::default(),
//!     &NullProvider,
//!     &CancelToken::new(),
//! )?;
//! let hydrated = ctx.hydrate_transcript(&index)?;
//! ```

// Module declarations
mod align;
mod anchor;
mod chapter;
mod diff;
mod error;
mod hydrate;
mod levenshtein;
mod normalize;
mod pronounce;
mod refine;
mod rollup;
mod section;
mod stopwords;
mod textgrid;
mod types;
mod view;
mod window;
mod report;

// Re-exports for public API
pub use align::{align_windows, AlignConfig, AlignSide};
pub use anchor::{discover_anchors, Anchor, AnchorPolicy};
pub use chapter::{
    ActiveWindow, AnchorDocument, AnchorEntry, ArtifactResolver, BookCache, BookParser,
    BookRegistry, ChapterContext, ChapterOptions, FsResolver, TokenCounts,
};
pub use diff::{analyze, coverage, metrics, DiffKind, DiffMetrics, DiffOp, TextDiff};
pub use error::{AlignError, CancelToken};
pub use hydrate::{
    hydrate, HydratedParagraph, HydratedSentence, HydratedTranscript, HydratedWord,
};
pub use levenshtein::{char_similarity, levenshtein_chars, levenshtein_words};
pub use normalize::{
    normalize, normalize_typography, spell_number, tokenize_words, NORMALIZATION_VERSION,
};
pub use pronounce::{
    parse_variants, phoneme_similarity, NullProvider, PronunciationProvider, StaticProvider,
    MAX_VARIANTS,
};
pub use refine::{assign_fragments, fragment_pool, refine_sentences, RefinementContext};
pub use report::{build_report, render_text, SentenceIssue, StatusCounts, ValidationReport};
pub use rollup::rollup;
pub use section::{detect_section, resolve_section_by_title};
pub use stopwords::{default_fillers, english, english_plus_domain};
pub use textgrid::{
    fragments_from_intervals, is_silence_label, parse_textgrid, TextGridInterval,
};
pub use types::{
    AlignOp, AlignStatus, AsrResponse, AsrSegment, AsrToken, BookIndex, BookWord,
    ChapterAlignmentIndex, ChunkAlignment, FragmentSpan, ParagraphAlign, ParagraphKind,
    ParagraphMetrics, ParagraphRange, SectionRange, SentenceAlign, SentenceFragment,
    SentenceMetrics, SentenceRange, SentenceRefined, SilenceEvent, SilenceParams,
    SilenceTimeline, Timing, TokenRange, TranscriptIndex, WordAlign,
};
pub use view::{asr_view, book_view, AsrView, BookView};
pub use window::{build_windows, Window};
