//! Praat TextGrid reader, long-format subset.
//!
//! Only what the refinement stage needs: the "words" IntervalTier with its
//! `xmin`/`xmax`/`text` triples. Consecutive speech intervals group into
//! fragments; the labels `sp`, `sil`, `<sil>`, `<s>`, `</s>`, `silence`
//! (and empty text) mark non-speech.

use crate::error::AlignError;
use crate::types::FragmentSpan;

/// Labels a forced aligner uses for non-speech intervals.
const SILENCE_LABELS: &[&str] = &["sp", "sil", "<sil>", "<s>", "</s>", "silence"];

/// One interval of the words tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGridInterval {
    pub xmin: f64,
    pub xmax: f64,
    pub text: String,
}

pub fn is_silence_label(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || SILENCE_LABELS.contains(&trimmed.to_ascii_lowercase().as_str())
}

fn invalid(detail: impl Into<String>) -> AlignError {
    AlignError::InvalidArtifact {
        artifact: "TextGrid",
        detail: detail.into(),
    }
}

/// `key = value` split, tolerant of the indentation Praat emits.
fn key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .replace("\"\"", "\"")
}

fn parse_seconds(value: &str, line_no: usize) -> Result<f64, AlignError> {
    value
        .parse::<f64>()
        .map_err(|_| invalid(format!("line {line_no}: expected a number, got '{value}'")))
}

/// Extract the "words" IntervalTier from long-format TextGrid content.
pub fn parse_textgrid(content: &str) -> Result<Vec<TextGridInterval>, AlignError> {
    let mut in_words_tier = false;
    let mut tier_class_interval = false;
    let mut intervals: Vec<TextGridInterval> = Vec::new();
    let mut current: Option<(Option<f64>, Option<f64>, Option<String>)> = None;

    let mut pending_class: Option<bool> = None;

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let line_no = i + 1;

        if line.starts_with("item [") {
            // Close out any interval still open in the previous tier
            flush(&mut current, &mut intervals, in_words_tier, line_no)?;
            in_words_tier = false;
            tier_class_interval = false;
            pending_class = None;
            continue;
        }

        if line.starts_with("intervals [") {
            flush(&mut current, &mut intervals, in_words_tier, line_no)?;
            if in_words_tier {
                current = Some((None, None, None));
            }
            continue;
        }

        let Some((key, value)) = key_value(line) else {
            continue;
        };

        match key {
            "class" => {
                tier_class_interval = unquote(value) == "IntervalTier";
                pending_class = Some(tier_class_interval);
            }
            "name" => {
                if pending_class == Some(true) && unquote(value) == "words" {
                    in_words_tier = true;
                }
            }
            "xmin" => {
                if let Some((xmin, _, _)) = current.as_mut() {
                    *xmin = Some(parse_seconds(value, line_no)?);
                }
            }
            "xmax" => {
                if let Some((_, xmax, _)) = current.as_mut() {
                    *xmax = Some(parse_seconds(value, line_no)?);
                }
            }
            "text" => {
                if let Some((_, _, text)) = current.as_mut() {
                    *text = Some(unquote(value));
                }
            }
            _ => {}
        }
    }
    let final_line = content.lines().count();
    flush(&mut current, &mut intervals, in_words_tier, final_line)?;

    if intervals.is_empty() {
        return Err(invalid("no IntervalTier named 'words' with intervals"));
    }
    Ok(intervals)
}

fn flush(
    current: &mut Option<(Option<f64>, Option<f64>, Option<String>)>,
    intervals: &mut Vec<TextGridInterval>,
    in_words_tier: bool,
    line_no: usize,
) -> Result<(), AlignError> {
    let Some((xmin, xmax, text)) = current.take() else {
        return Ok(());
    };
    if !in_words_tier {
        return Ok(());
    }
    let (Some(xmin), Some(xmax)) = (xmin, xmax) else {
        return Err(invalid(format!(
            "interval ending before line {line_no} is missing xmin/xmax"
        )));
    };
    if xmax < xmin {
        return Err(invalid(format!(
            "interval ending before line {line_no} has xmax {xmax} < xmin {xmin}"
        )));
    }
    intervals.push(TextGridInterval {
        xmin,
        xmax,
        text: text.unwrap_or_default(),
    });
    Ok(())
}

/// Group consecutive speech intervals into fragments, relative to the chunk.
pub fn fragments_from_intervals(intervals: &[TextGridInterval]) -> Vec<FragmentSpan> {
    let mut fragments = Vec::new();
    let mut open: Option<FragmentSpan> = None;
    for interval in intervals {
        if is_silence_label(&interval.text) {
            if let Some(span) = open.take() {
                fragments.push(span);
            }
            continue;
        }
        open = Some(match open {
            Some(span) => FragmentSpan { begin: span.begin, end: interval.xmax },
            None => FragmentSpan { begin: interval.xmin, end: interval.xmax },
        });
    }
    if let Some(span) = open {
        fragments.push(span);
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 3.2
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "phones"
        xmin = 0
        xmax = 3.2
        intervals: size = 1
        intervals [1]:
            xmin = 0.0
            xmax = 3.2
            text = "ignored"
    item [2]:
        class = "IntervalTier"
        name = "words"
        xmin = 0
        xmax = 3.2
        intervals: size = 5
        intervals [1]:
            xmin = 0.0
            xmax = 0.25
            text = "sil"
        intervals [2]:
            xmin = 0.25
            xmax = 0.71
            text = "call"
        intervals [3]:
            xmin = 0.71
            xmax = 0.95
            text = "me"
        intervals [4]:
            xmin = 0.95
            xmax = 1.40
            text = "sp"
        intervals [5]:
            xmin = 1.40
            xmax = 2.10
            text = "ishmael"
"#;

    #[test]
    fn parses_the_words_tier_only() {
        let intervals = parse_textgrid(SAMPLE).unwrap();
        assert_eq!(intervals.len(), 5);
        assert_eq!(intervals[1].text, "call");
        assert!((intervals[1].xmin - 0.25).abs() < 1e-9);
        assert!(intervals.iter().all(|i| i.text != "ignored"));
    }

    #[test]
    fn fragments_group_speech_between_silences() {
        let intervals = parse_textgrid(SAMPLE).unwrap();
        let fragments = fragments_from_intervals(&intervals);
        assert_eq!(fragments.len(), 2);
        assert!((fragments[0].begin - 0.25).abs() < 1e-9);
        assert!((fragments[0].end - 0.95).abs() < 1e-9);
        assert!((fragments[1].begin - 1.40).abs() < 1e-9);
        assert!((fragments[1].end - 2.10).abs() < 1e-9);
    }

    #[test]
    fn silence_labels_cover_the_aligner_vocabulary() {
        for label in ["sp", "sil", "<sil>", "<s>", "</s>", "silence", "", "  "] {
            assert!(is_silence_label(label), "{label:?} should be silence");
        }
        assert!(!is_silence_label("call"));
    }

    #[test]
    fn missing_words_tier_is_invalid() {
        let content = "item [1]:\n  class = \"IntervalTier\"\n  name = \"phones\"\n";
        assert!(matches!(
            parse_textgrid(content),
            Err(AlignError::InvalidArtifact { artifact: "TextGrid", .. })
        ));
    }

    #[test]
    fn quoted_quotes_unescape() {
        assert_eq!(unquote("\"say \"\"hi\"\"\""), "say \"hi\"");
    }
}
