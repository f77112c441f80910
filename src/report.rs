//! Human-readable validation report over a hydrated transcript.
//!
//! Downstream reviewers triage chapters by status: how much of the read is
//! `ok`, which sentences need attention, where the narrator strayed. The
//! report aggregates the hydrated records; it never recomputes alignment.

use serde::{Deserialize, Serialize};

use crate::hydrate::HydratedTranscript;

/// How many worst sentences the report lists.
const WORST_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub ok: usize,
    pub attention: usize,
    pub unreliable: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: &str) {
        match status {
            "ok" => self.ok += 1,
            "attention" => self.attention += 1,
            _ => self.unreliable += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.attention + self.unreliable
    }
}

/// One sentence flagged for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentenceIssue {
    pub id: usize,
    pub status: String,
    pub wer: f64,
    pub missing_runs: usize,
    pub book_text: String,
    pub script_text: String,
}

/// Aggregates consumed by the validation viewer and the CLI report command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub normalization_version: String,
    pub sentences: StatusCounts,
    pub paragraphs: StatusCounts,
    /// Token-length-weighted WER across all sentences.
    pub aggregate_wer: f64,
    pub aggregate_cer: f64,
    /// Mean paragraph coverage.
    pub mean_coverage: f64,
    /// Worst sentences by WER, capped at ten, ties by id.
    pub worst: Vec<SentenceIssue>,
}

/// Aggregate a hydrated transcript into a report.
pub fn build_report(transcript: &HydratedTranscript) -> ValidationReport {
    let mut sentences = StatusCounts::default();
    let mut total_tokens = 0usize;
    let mut weighted_wer = 0.0f64;
    let mut weighted_cer = 0.0f64;

    for s in &transcript.sentences {
        sentences.bump(&s.status);
        let weight = s.book_text.split_whitespace().count();
        total_tokens += weight;
        weighted_wer += s.metrics.wer * weight as f64;
        weighted_cer += s.metrics.cer * weight as f64;
    }

    let mut paragraphs = StatusCounts::default();
    let mut coverage_sum = 0.0f64;
    for p in &transcript.paragraphs {
        paragraphs.bump(&p.status);
        coverage_sum += p.metrics.coverage;
    }

    let mut worst: Vec<&crate::hydrate::HydratedSentence> = transcript
        .sentences
        .iter()
        .filter(|s| s.status != "ok")
        .collect();
    worst.sort_by(|a, b| {
        b.metrics
            .wer
            .partial_cmp(&a.metrics.wer)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    let worst = worst
        .into_iter()
        .take(WORST_LIMIT)
        .map(|s| SentenceIssue {
            id: s.id,
            status: s.status.clone(),
            wer: s.metrics.wer,
            missing_runs: s.metrics.missing_runs,
            book_text: s.book_text.clone(),
            script_text: s.script_text.clone(),
        })
        .collect();

    let denom = total_tokens.max(1) as f64;
    ValidationReport {
        normalization_version: transcript.normalization_version.clone(),
        sentences,
        paragraphs,
        aggregate_wer: weighted_wer / denom,
        aggregate_cer: weighted_cer / denom,
        mean_coverage: coverage_sum / transcript.paragraphs.len().max(1) as f64,
        worst,
    }
}

/// Render the report as plain text for terminal review.
pub fn render_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str("Alignment validation report\n");
    out.push_str(&format!(
        "  normalization: {}\n",
        report.normalization_version
    ));
    out.push_str(&format!(
        "  sentences: {} total ({} ok, {} attention, {} unreliable)\n",
        report.sentences.total(),
        report.sentences.ok,
        report.sentences.attention,
        report.sentences.unreliable
    ));
    out.push_str(&format!(
        "  paragraphs: {} total ({} ok, {} attention, {} unreliable)\n",
        report.paragraphs.total(),
        report.paragraphs.ok,
        report.paragraphs.attention,
        report.paragraphs.unreliable
    ));
    out.push_str(&format!(
        "  aggregate WER {:.4}  CER {:.4}  coverage {:.4}\n",
        report.aggregate_wer, report.aggregate_cer, report.mean_coverage
    ));
    if !report.worst.is_empty() {
        out.push_str("\n  worst sentences:\n");
        for issue in &report.worst {
            out.push_str(&format!(
                "    #{:<5} {:<10} wer {:.3}  runs {}\n",
                issue.id, issue.status, issue.wer, issue.missing_runs
            ));
            out.push_str(&format!("      book:   {}\n", issue.book_text));
            out.push_str(&format!("      script: {}\n", issue.script_text));
        }
    }
    out
}
