// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Text normalization: the exact token stream the aligner sees.
//!
//! Everything here is a pure function over strings, deterministic and
//! locale-fixed (invariant Unicode case-folding). Two layers:
//!
//! - [`normalize_typography`]: folds curly quotes and dashes to ASCII and
//!   applies NFC. Used wherever surface text is joined for display or
//!   character-level comparison.
//! - [`normalize`]: the lossy pipeline (lowercase, punctuation strip,
//!   optional contraction expansion, optional digit spelling) that produces
//!   matchable tokens.
//!
//! # INVARIANTS (DO NOT VIOLATE)
//!
//! 1. **DETERMINISTIC**: same input, same flags, same output. The transcript
//!    index records [`NORMALIZATION_VERSION`]; readers refuse a mismatch, so
//!    any semantic change here must bump the tag.
//! 2. **APOSTROPHE**: `'` survives only between two alphanumerics
//!    ("o'clock"), everything else non-alphanumeric becomes a space.
//! 3. Control characters and unpaired-surrogate replacements are dropped
//!    silently.

#[cfg(feature = "unicode-normalization")]
use unicode_normalization::UnicodeNormalization;

/// Semantic version of the normalization rules.
///
/// Recorded in every `TranscriptIndex`; readers that require a specific tag
/// fail with `IncompatibleNormalization` on mismatch.
pub const NORMALIZATION_VERSION: &str = "norm-1";

/// Fixed contraction table, applied token-by-token after lowercasing.
///
/// Irregular forms first; the suffix rules below catch the regular ones.
const CONTRACTIONS: &[(&str, &str)] = &[
    ("can't", "cannot"),
    ("won't", "will not"),
    ("shan't", "shall not"),
    ("ain't", "is not"),
    ("let's", "let us"),
    ("i'm", "i am"),
    ("it's", "it is"),
    ("that's", "that is"),
    ("what's", "what is"),
    ("who's", "who is"),
    ("there's", "there is"),
    ("here's", "here is"),
    ("y'all", "you all"),
    ("o'clock", "o'clock"),
];

/// Regular contraction suffixes, tried longest-first when the table misses.
const SUFFIXES: &[(&str, &str)] = &[
    ("n't", " not"),
    ("'ll", " will"),
    ("'re", " are"),
    ("'ve", " have"),
    ("'d", " would"),
    ("'m", " am"),
];

/// Collapse typographic characters to their ASCII equivalents and apply NFC.
///
/// - Curly single/double quotes → `'` / `"`
/// - En/em/horizontal-bar dashes and the minus sign → `-`
/// - Ellipsis → `...`
/// - Non-breaking and figure spaces → ` `
pub fn normalize_typography(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in nfc(value) {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            '\u{FFFD}' => {}
            c if c.is_control() && !c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(feature = "unicode-normalization")]
fn nfc(value: &str) -> impl Iterator<Item = char> + '_ {
    value.nfc()
}

/// Without the unicode-normalization feature the input is passed through
/// unchanged. Assumes pre-composed or ASCII input.
#[cfg(not(feature = "unicode-normalization"))]
fn nfc(value: &str) -> impl Iterator<Item = char> + '_ {
    value.chars()
}

/// Normalize a string into matchable token text.
///
/// Pipeline: typography fold → lowercase → optional contraction expansion →
/// optional digit spelling → punctuation strip (keeping in-word `'`) →
/// whitespace collapse.
///
/// The output is a single space-joined string; an input that normalizes to
/// nothing (pure punctuation) yields `""`.
pub fn normalize(value: &str, expand_contractions: bool, spell_digits: bool) -> String {
    let lowered = normalize_typography(value).to_lowercase();

    let mut tokens: Vec<String> = Vec::new();
    for raw in lowered.split_whitespace() {
        let stripped = strip_punctuation(raw);
        for token in stripped.split_whitespace() {
            let token = token.trim_matches('\'');
            if token.is_empty() {
                continue;
            }
            if expand_contractions {
                if let Some(expanded) = expand_contraction(token) {
                    tokens.extend(expanded.split(' ').map(str::to_owned));
                    continue;
                }
            }
            if spell_digits && token.bytes().all(|b| b.is_ascii_digit()) {
                let spelled = spell_number(token);
                tokens.extend(
                    spelled
                        .split([' ', '-'])
                        .filter(|t| !t.is_empty())
                        .map(str::to_owned),
                );
                continue;
            }
            tokens.push(token.to_owned());
        }
    }
    tokens.join(" ")
}

/// Replace non-alphanumeric characters with spaces, keeping `'` when it sits
/// between two alphanumerics.
fn strip_punctuation(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let mut out = String::with_capacity(token.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if c == '\''
            && i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_alphanumeric()
            && chars[i + 1].is_alphanumeric()
        {
            out.push('\'');
        } else {
            out.push(' ');
        }
    }
    out
}

fn expand_contraction(token: &str) -> Option<String> {
    if let Some((_, expansion)) = CONTRACTIONS.iter().find(|(from, _)| *from == token) {
        return Some((*expansion).to_owned());
    }
    for (suffix, expansion) in SUFFIXES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if !stem.is_empty() && !stem.ends_with('\'') {
                return Some(format!("{stem}{expansion}"));
            }
        }
    }
    None
}

/// Split into the exact word sequence the alignment sees: maximal runs of
/// alphanumeric characters.
pub fn tokenize_words(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

// ============================================================================
// NUMBERS
// ============================================================================

const UNITS: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Spell a digit string in English, deterministically.
///
/// - Values below one trillion get the cardinal form (`14` → "fourteen").
/// - Four-digit values whose hundreds count isn't a multiple of ten use the
///   spoken year form (`1984` → "nineteen eighty-four", `1904` → "nineteen
///   oh four", `1900` → "nineteen hundred").
/// - Leading zeros or absurdly long digit runs fall back to digit-by-digit
///   ("007" → "zero zero seven").
pub fn spell_number(digits: &str) -> String {
    debug_assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    if digits.len() > 1 && digits.starts_with('0') {
        return spell_digit_by_digit(digits);
    }
    let Ok(n) = digits.parse::<u64>() else {
        return spell_digit_by_digit(digits);
    };
    if digits.len() == 4 {
        let hi = n / 100;
        let lo = n % 100;
        if hi % 10 != 0 {
            let head = below_hundred(hi);
            return match lo {
                0 => format!("{head} hundred"),
                1..=9 => format!("{head} oh {}", UNITS[lo as usize]),
                _ => format!("{head} {}", below_hundred(lo)),
            };
        }
    }
    if n >= 1_000_000_000_000 {
        return spell_digit_by_digit(digits);
    }
    cardinal(n)
}

fn spell_digit_by_digit(digits: &str) -> String {
    digits
        .bytes()
        .map(|b| UNITS[(b - b'0') as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

fn below_hundred(n: u64) -> String {
    debug_assert!(n < 100);
    if n < 20 {
        UNITS[n as usize].to_owned()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_owned()
    } else {
        format!("{}-{}", TENS[(n / 10) as usize], UNITS[(n % 10) as usize])
    }
}

fn cardinal(n: u64) -> String {
    if n < 100 {
        return below_hundred(n);
    }
    let mut parts: Vec<String> = Vec::new();
    let mut rest = n;
    for (scale, name) in [
        (1_000_000_000, "billion"),
        (1_000_000, "million"),
        (1_000, "thousand"),
    ] {
        if rest >= scale {
            parts.push(format!("{} {name}", cardinal(rest / scale)));
            rest %= scale;
        }
    }
    if rest >= 100 {
        parts.push(format!("{} hundred", UNITS[(rest / 100) as usize]));
        rest %= 100;
    }
    if rest > 0 {
        parts.push(below_hundred(rest));
    }
    parts.join(" ")
}
