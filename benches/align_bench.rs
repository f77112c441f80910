//! Criterion micro-benchmarks for the hot paths: anchor discovery and the
//! per-window DP.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use recital::{
    align_windows, discover_anchors, AlignConfig, AlignSide, AnchorPolicy, CancelToken, Window,
};

/// Deterministic pseudo-text: cycles a vocabulary so n-grams repeat the way
/// prose does.
fn synthetic_tokens(len: usize) -> Vec<String> {
    const VOCAB: &[&str] = &[
        "harbor", "morning", "captain", "vessel", "lantern", "weather", "stories", "whale",
        "ocean", "voyage", "sailor", "canvas", "compass", "horizon", "village", "evening",
    ];
    (0..len)
        .map(|i| VOCAB[(i * 7 + i / 5) % VOCAB.len()].to_owned())
        .collect()
}

fn bench_anchor_discovery(c: &mut Criterion) {
    let book = synthetic_tokens(4000);
    let sentence_index: Vec<usize> = (0..book.len()).map(|i| i / 12).collect();
    let asr = book.clone();
    let policy = AnchorPolicy {
        use_domain_stopwords: false,
        stopwords: Some(Default::default()),
        ..AnchorPolicy::default()
    };

    c.bench_function("discover_anchors_4k", |b| {
        b.iter(|| {
            discover_anchors(
                black_box(&book),
                &sentence_index,
                black_box(&asr),
                &policy,
                0,
                book.len() - 1,
                &CancelToken::new(),
            )
            .unwrap()
        })
    });
}

fn bench_window_dp(c: &mut Criterion) {
    let book = synthetic_tokens(256);
    let asr = synthetic_tokens(256);
    let map: Vec<usize> = (0..256).collect();
    let window = Window { b_lo: 0, b_hi: 256, a_lo: 0, a_hi: 256 };
    let config = AlignConfig::default();

    c.bench_function("window_dp_256x256", |b| {
        b.iter(|| {
            align_windows(
                &AlignSide { tokens: black_box(&book), to_original: &map, phonemes: None },
                &AlignSide { tokens: black_box(&asr), to_original: &map, phonemes: None },
                &[window],
                3,
                &config,
                &CancelToken::new(),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_anchor_discovery, bench_window_dp);
criterion_main!(benches);
