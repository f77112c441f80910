//! End-to-end scenarios over the chapter facade.

mod common;

use common::{asr, asr_words, book, chapter, options, transcript, with_sections};
use recital::{
    AlignOp, AlignStatus, CancelToken, ChapterOptions, NullProvider, SilenceEvent,
    SilenceParams, SilenceTimeline, StaticProvider,
};

fn ishmael_book() -> recital::BookIndex {
    book(&[&["Chapter", "one", "Call", "me", "Ishmael", "."]])
}

#[test]
fn clean_read_matches_every_word() {
    let ctx = chapter(
        ishmael_book(),
        asr(&[
            (0.0, 0.4, "chapter"),
            (0.4, 0.3, "one"),
            (0.7, 0.4, "call"),
            (1.1, 0.3, "me"),
            (1.4, 0.5, "ishmael"),
        ]),
    );
    let index = transcript(&ctx);

    assert_eq!(index.sentences.len(), 1);
    let sentence = &index.sentences[0];
    assert_eq!(sentence.metrics.wer, 0.0);
    assert_eq!(sentence.status, AlignStatus::Ok);
    assert!(index
        .words
        .iter()
        .all(|op| op.op == AlignOp::Match));
    let timing = sentence.timing.unwrap();
    assert!((timing.start_sec - 0.0).abs() < 1e-9);
    assert!((timing.end_sec - 1.9).abs() < 1e-9);
}

#[test]
fn spoken_filler_is_an_insertion() {
    let ctx = chapter(
        ishmael_book(),
        asr(&[
            (0.0, 0.4, "chapter"),
            (0.4, 0.3, "one"),
            (0.7, 0.1, "um"),
            (0.8, 0.4, "call"),
            (1.2, 0.3, "me"),
            (1.5, 0.5, "ishmael"),
        ]),
    );
    let index = transcript(&ctx);

    let sentence = &index.sentences[0];
    assert!((sentence.metrics.wer - 0.2).abs() < 1e-9);
    assert_eq!(sentence.status, AlignStatus::Attention);

    let inserts: Vec<_> = index.words.iter().filter(|op| op.op == AlignOp::Ins).collect();
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].reason, "filler");
}

#[test]
fn dropped_word_is_a_deletion_with_coverage_loss() {
    let ctx = chapter(
        ishmael_book(),
        asr(&[
            (0.0, 0.4, "chapter"),
            (0.4, 0.3, "one"),
            (0.7, 0.4, "call"),
            (1.1, 0.3, "me"),
        ]),
    );
    let index = transcript(&ctx);

    let sentence = &index.sentences[0];
    assert!((sentence.metrics.wer - 0.2).abs() < 1e-9);
    assert_eq!(sentence.metrics.missing_runs, 1);
    assert_eq!(sentence.status, AlignStatus::Attention);

    let dels: Vec<_> = index.words.iter().filter(|op| op.op == AlignOp::Del).collect();
    assert_eq!(dels.len(), 1);
    assert_eq!(dels[0].book_idx, Some(4));

    assert_eq!(index.paragraphs.len(), 1);
    assert!((index.paragraphs[0].metrics.coverage - 0.8).abs() < 1e-9);
}

#[test]
fn near_homophone_becomes_a_substitution() {
    let ctx = chapter(
        book(&[
            &["Hello", "world", "."],
            &["How", "are", "you", "?"],
        ]),
        asr_words(&["hello", "world", "howl", "are", "you"]),
    );
    let index = transcript(&ctx);

    assert_eq!(index.sentences.len(), 2);
    let second = &index.sentences[1];
    let subs: Vec<_> = index.words.iter().filter(|op| op.op == AlignOp::Sub).collect();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].book_idx, Some(3));
    // One sub over the sentence's three alignable words
    assert!((second.metrics.wer - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(index.sentences[0].metrics.wer, 0.0);
}

#[test]
fn refinement_snaps_to_silence_and_stays_monotonic() {
    let ctx = {
        let mut ctx = chapter(
            book(&[&["Hello", "world"], &["Goodbye", "now"]]),
            asr(&[
                (0.0, 0.5, "hello"),
                (0.6, 0.82, "world"),
                (1.8, 0.5, "goodbye"),
                (2.4, 0.4, "now"),
            ]),
        );
        ctx.silences = Some(SilenceTimeline {
            audio_sha256: String::new(),
            ffmpeg_version: "7.1".to_owned(),
            params: SilenceParams { db_floor: -35.0, min_silence_dur: 0.3 },
            events: vec![SilenceEvent { start: 1.5, end: 1.7, duration: 0.2, mid: 1.6 }],
        });
        ctx
    };
    let index = transcript(&ctx);
    let mut opts = options();
    opts.min_tail_sec = 0.1;
    let refined = ctx
        .refine_sentences(&index, &opts, &CancelToken::new())
        .unwrap();

    assert_eq!(refined.len(), 2);
    assert!((refined[0].end - 1.5).abs() < 1e-9);
    assert!(refined[1].start >= 1.5);
    for r in &refined {
        assert!(r.end - r.start >= opts.min_tail_sec - 1e-9);
    }
}

#[test]
fn section_detection_narrows_the_active_region() {
    let words: Vec<&str> = vec![
        // Prologue: words 0..=5
        "Prologue", "It", "rained", "all", "night", "long",
        // Chapter One: words 6..=12
        "Chapter", "One", "It", "was", "a", "bright", "day",
    ];
    let base = book(&[&words]);
    let book = with_sections(base, &[("Prologue", 0, 5), ("Chapter One", 6, 12)]);

    let ctx = chapter(book, asr_words(&["chapter", "one", "it", "was", "a", "bright", "day"]));
    let doc = ctx.compute_anchors(&options(), &CancelToken::new()).unwrap();

    assert!(doc.section_detected);
    let section = doc.section.unwrap();
    assert_eq!(section.title, "Chapter One");
    assert_eq!((section.start_word, section.end_word), (6, 12));
}

#[test]
fn no_matching_section_leaves_the_whole_book_active() {
    let base = book(&[&["Hello", "world", "again", "friend"]]);
    let book = with_sections(base, &[("Epilogue", 0, 3)]);
    let ctx = chapter(book, asr_words(&["hello", "world", "again", "friend"]));
    let doc = ctx.compute_anchors(&options(), &CancelToken::new()).unwrap();

    assert!(!doc.section_detected);
    assert_eq!(doc.window.b_start, 0);
    assert_eq!(doc.window.b_end, 3);
}

#[test]
fn empty_book_aligns_to_an_empty_transcript() {
    let ctx = chapter(recital::BookIndex::default(), asr_words(&["hello"]));
    let index = transcript(&ctx);
    assert!(index.words.is_empty());
    assert!(index.sentences.is_empty());
    assert!(index.paragraphs.is_empty());
}

#[test]
fn transcript_json_is_byte_stable_across_runs() {
    let ctx = chapter(
        ishmael_book(),
        asr_words(&["chapter", "one", "call", "me", "ishmael"]),
    );
    let a = serde_json::to_vec(&transcript(&ctx)).unwrap();
    let b = serde_json::to_vec(&transcript(&ctx)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn hydration_exposes_diff_and_surfaces() {
    let ctx = chapter(
        ishmael_book(),
        asr_words(&["chapter", "one", "call", "me", "ishmael"]),
    );
    let index = transcript(&ctx);
    let hydrated = ctx.hydrate_transcript(&index).unwrap();

    let sentence = &hydrated.sentences[0];
    assert_eq!(sentence.book_text, "Chapter one Call me Ishmael .");
    assert_eq!(sentence.script_text, "chapter one call me ishmael");
    assert_eq!(sentence.status, "ok");
    assert_eq!(sentence.metrics.wer, 0.0);
    assert!(!sentence.diff.ops.is_empty());

    let report = recital::build_report(&hydrated);
    assert_eq!(report.sentences.ok, 1);
    assert_eq!(report.sentences.total(), 1);
}

#[test]
fn pronunciations_rescue_odd_spellings() {
    let ctx = chapter(
        {
            let mut b = book(&[&["The", "colonel", "waved"]]);
            b.words[1].phonemes =
                Some(vec![vec!["K", "ER", "N", "AH", "L"].into_iter().map(String::from).collect()]);
            b
        },
        asr_words(&["the", "kernel", "waved"]),
    );
    let mut provider = StaticProvider::default();
    provider.insert("kernel", &["K ER N AH L"]);
    let index = ctx
        .build_transcript_index(&options(), &provider, &CancelToken::new())
        .unwrap();

    let op = index
        .words
        .iter()
        .find(|op| op.book_idx == Some(1))
        .unwrap();
    assert_eq!(op.op, AlignOp::Sub);
    assert_eq!(op.reason, "phoneme");
    assert!((op.score - 1.0).abs() < 1e-9);
}

#[test]
fn provider_without_entries_falls_back_to_lexical() {
    let ctx = chapter(
        book(&[&["The", "colonel", "waved"]]),
        asr_words(&["the", "kernel", "waved"]),
    );
    let index = ctx
        .build_transcript_index(&options(), &NullProvider, &CancelToken::new())
        .unwrap();
    let op = index
        .words
        .iter()
        .find(|op| op.book_idx == Some(1))
        .unwrap();
    assert_eq!(op.op, AlignOp::Sub);
    assert_eq!(op.reason, "lexical");
}

#[test]
fn cancellation_aborts_the_build() {
    let ctx = chapter(
        ishmael_book(),
        asr_words(&["chapter", "one", "call", "me", "ishmael"]),
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = ctx.build_transcript_index(&ChapterOptions::default(), &NullProvider, &cancel);
    assert!(matches!(err, Err(recital::AlignError::Cancelled)));
}

#[test]
fn refinement_without_extras_uses_token_times() {
    let ctx = chapter(
        book(&[&["Hello", "world"]]),
        asr(&[(0.25, 0.5, "hello"), (0.8, 0.6, "world")]),
    );
    let index = transcript(&ctx);
    let refined = ctx
        .refine_sentences(&index, &options(), &CancelToken::new())
        .unwrap();
    assert_eq!(refined.len(), 1);
    assert!((refined[0].start - 0.25).abs() < 1e-9);
    assert!((refined[0].end - 1.4).abs() < 1e-9);
    assert_eq!(refined[0].token_start_idx, 0);
    assert_eq!(refined[0].token_end_idx, 1);
}

#[test]
fn fragments_override_refined_starts() {
    use recital::{ChapterAlignmentIndex, ChunkAlignment, FragmentSpan};

    let mut ctx = chapter(
        book(&[&["Hello", "world"]]),
        asr(&[(1.0, 0.5, "hello"), (1.6, 0.5, "world")]),
    );
    ctx.alignment = Some(ChapterAlignmentIndex {
        chunks: vec![ChunkAlignment {
            chunk_id: "chunk-000".to_owned(),
            offset_sec: 0.0,
            fragments: vec![FragmentSpan { begin: 0.7, end: 2.3 }],
        }],
    });
    let index = transcript(&ctx);
    let refined = ctx
        .refine_sentences(&index, &options(), &CancelToken::new())
        .unwrap();
    assert!((refined[0].start - 0.7).abs() < 1e-9);
    assert!((refined[0].end - 2.3).abs() < 1e-9);
}

#[test]
fn refinement_is_idempotent_over_its_output() {
    let ctx = chapter(
        book(&[&["Hello", "world"], &["Goodbye", "now"]]),
        asr_words(&["hello", "world", "goodbye", "now"]),
    );
    let index = transcript(&ctx);
    let first = ctx
        .refine_sentences(&index, &options(), &CancelToken::new())
        .unwrap();
    let second = ctx
        .refine_sentences(&index, &options(), &CancelToken::new())
        .unwrap();
    assert_eq!(first, second);
}
