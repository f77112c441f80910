// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Recital CLI: align, hydrate, refine, and report on audiobook chapters.
//!
//! ```bash
//! # Discover anchors between a manuscript and its transcription
//! recital anchors --book book.json --asr asr.json --emit-windows
//!
//! # Full alignment to a transcript index
//! recital transcript --book book.json --asr asr.json --output transcript.json
//!
//! # Attach surface text and diffs, then summarize
//! recital hydrate --book book.json --asr asr.json --index transcript.json \
//!     --output hydrated.json
//! recital report --hydrated hydrated.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use recital::{
    build_report, fragments_from_intervals, parse_textgrid, render_text, ArtifactResolver,
    AsrResponse, BookIndex, BookRegistry, CancelToken, ChapterAlignmentIndex, ChapterContext,
    ChapterOptions, ChunkAlignment, FsResolver, NullProvider, PronunciationProvider,
    SilenceTimeline, StaticProvider, TranscriptIndex,
};

mod cli;
use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Anchors { book, asr, output, ngram, emit_windows, section } => {
            let ctx = chapter_context(&book, &asr, None)?;
            let options = ChapterOptions {
                ngram,
                emit_windows,
                section_label: section,
                ..Default::default()
            };
            let doc = ctx.compute_anchors(&options, &CancelToken::new())?;
            emit_json(&doc, output.as_deref().map(Path::new))
        }
        Commands::Transcript { book, asr, output, lexicon, section, timestamp } => {
            let ctx = chapter_context(&book, &asr, None)?;
            let options = ChapterOptions {
                section_label: section,
                created_at: parse_timestamp(timestamp.as_deref())?,
                ..Default::default()
            };
            let provider = load_lexicon(lexicon.as_deref())?;
            let index =
                ctx.build_transcript_index(&options, provider.as_ref(), &CancelToken::new())?;
            emit_json(&index, Some(Path::new(&output)))
        }
        Commands::Hydrate { book, asr, index, output } => {
            let ctx = chapter_context(&book, &asr, None)?;
            let index: TranscriptIndex = load_json(Path::new(&index))?;
            let hydrated = ctx.hydrate_transcript(&index)?;
            emit_json(&hydrated, Some(Path::new(&output)))
        }
        Commands::Refine {
            asr,
            index,
            output,
            alignment,
            textgrids,
            silences,
            min_tail,
            snap_ahead,
        } => {
            let asr: AsrResponse = load_json(Path::new(&asr))?;
            let index: TranscriptIndex = load_json(Path::new(&index))?;
            let mut chunk_alignment = alignment
                .as_deref()
                .map(|p| load_json::<ChapterAlignmentIndex>(Path::new(p)))
                .transpose()?;
            if !textgrids.is_empty() {
                let mut combined = chunk_alignment.unwrap_or_default();
                combined
                    .chunks
                    .extend(load_textgrid_chunks(&textgrids)?);
                chunk_alignment = Some(combined);
            }
            let ctx = ChapterContext {
                asr: Some(asr),
                alignment: chunk_alignment,
                silences: silences
                    .as_deref()
                    .map(|p| load_json::<SilenceTimeline>(Path::new(p)))
                    .transpose()?,
                ..Default::default()
            };
            let options = ChapterOptions {
                min_tail_sec: min_tail,
                max_snap_ahead_sec: snap_ahead,
                ..Default::default()
            };
            let refined = ctx.refine_sentences(&index, &options, &CancelToken::new())?;
            emit_json(&refined, Some(Path::new(&output)))
        }
        Commands::Report { hydrated, output } => {
            let transcript = load_json(Path::new(&hydrated))?;
            let report = build_report(&transcript);
            print!("{}", render_text(&report));
            if let Some(path) = output {
                emit_json(&report, Some(Path::new(&path)))?;
            }
            Ok(())
        }
        Commands::Batch { root, timestamp } => batch(Path::new(&root), timestamp.as_deref()),
    }
}

fn chapter_context(book: &str, asr: &str, chapter_id: Option<String>) -> Result<ChapterContext> {
    let book_index: BookIndex = load_json(Path::new(book))?;
    let asr_response: AsrResponse = load_json(Path::new(asr))?;
    Ok(ChapterContext {
        chapter_id,
        book: Some(Arc::new(book_index)),
        asr: Some(asr_response),
        alignment: None,
        silences: None,
        book_path: Some(book.to_owned()),
        asr_path: Some(asr.to_owned()),
    })
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = FsResolver
        .read(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn emit_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    match output {
        Some(path) => {
            FsResolver
                .write(path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

fn parse_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            v.parse::<DateTime<Utc>>()
                .with_context(|| format!("invalid timestamp '{v}'"))
        })
        .transpose()
}

/// Parse `<offset_sec>:<path>` TextGrid arguments into chunk alignments.
/// The chunk id is the file stem.
fn load_textgrid_chunks(specs: &[String]) -> Result<Vec<ChunkAlignment>> {
    let mut chunks = Vec::with_capacity(specs.len());
    for spec in specs {
        let (offset, path) = spec
            .split_once(':')
            .with_context(|| format!("expected <offset_sec>:<path>, got '{spec}'"))?;
        let offset_sec: f64 = offset
            .parse()
            .with_context(|| format!("invalid offset '{offset}' in '{spec}'"))?;
        let path = Path::new(path);
        let content = String::from_utf8_lossy(
            &FsResolver
                .read(path)
                .with_context(|| format!("reading {}", path.display()))?,
        )
        .into_owned();
        let intervals = parse_textgrid(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        chunks.push(ChunkAlignment {
            chunk_id: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "chunk".to_owned()),
            offset_sec,
            fragments: fragments_from_intervals(&intervals),
        });
    }
    Ok(chunks)
}

fn load_lexicon(path: Option<&str>) -> Result<Box<dyn PronunciationProvider + Sync>> {
    match path {
        None => Ok(Box::new(NullProvider)),
        Some(path) => {
            let entries: std::collections::HashMap<String, Vec<String>> =
                load_json(Path::new(path))?;
            Ok(Box::new(StaticProvider::new(entries)))
        }
    }
}

/// Align every chapter under `root`. Chapters are independent and run in
/// parallel; the parsed book is shared through the registry.
fn batch(root: &Path, timestamp: Option<&str>) -> Result<()> {
    let registry = BookRegistry::new();
    let book_path = root.join("book.json");
    let book = registry.insert(book_path.clone(), load_json(&book_path)?);

    let chapters_dir = root.join("chapters");
    let mut chapters: Vec<PathBuf> = std::fs::read_dir(&chapters_dir)
        .with_context(|| format!("listing {}", chapters_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.join("asr.json").is_file())
        .collect();
    chapters.sort();

    let created_at = parse_timestamp(timestamp)?;

    #[cfg(feature = "parallel")]
    {
        use indicatif::{ProgressBar, ProgressStyle};
        use rayon::prelude::*;

        let bar = ProgressBar::new(chapters.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30.cyan} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let results: Vec<Result<()>> = chapters
            .par_iter()
            .map(|dir| {
                let out = align_chapter(&book, dir, created_at);
                bar.inc(1);
                out
            })
            .collect();
        bar.finish_with_message("done");
        for result in results {
            result?;
        }
    }
    #[cfg(not(feature = "parallel"))]
    {
        for dir in &chapters {
            align_chapter(&book, dir, created_at)?;
        }
    }

    println!("aligned {} chapters", chapters.len());
    Ok(())
}

fn align_chapter(
    book: &Arc<BookIndex>,
    dir: &Path,
    created_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let chapter_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let asr: AsrResponse = load_json(&dir.join("asr.json"))?;
    let ctx = ChapterContext {
        chapter_id,
        book: Some(Arc::clone(book)),
        asr: Some(asr),
        alignment: None,
        silences: None,
        book_path: None,
        asr_path: Some(dir.join("asr.json").display().to_string()),
    };
    let options = ChapterOptions { created_at, ..Default::default() };
    let index = ctx.build_transcript_index(&options, &NullProvider, &CancelToken::new())?;
    emit_json(&index, Some(dir.join("transcript.json").as_path()))?;
    let hydrated = ctx.hydrate_transcript(&index)?;
    emit_json(&hydrated, Some(dir.join("hydrated.json").as_path()))?;
    Ok(())
}
