//! Stopword and filler token sets.
//!
//! Anchor discovery skips n-grams containing stopwords: high-frequency words
//! make ambiguous anchors. The domain additions cover audiobook furniture
//! (chapter markers, dialogue attribution) that repeats across any manuscript.

use std::collections::HashSet;

/// Core English stopwords.
const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had", "has",
    "have", "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "me", "my", "no",
    "not", "of", "on", "or", "our", "she", "so", "that", "the", "their", "them", "then", "there",
    "they", "this", "to", "up", "was", "we", "were", "what", "when", "which", "who", "will",
    "with", "would", "you", "your",
];

/// Audiobook-domain additions layered on top of [`ENGLISH`].
const DOMAIN: &[&str] = &[
    "chapter", "prologue", "epilogue", "said", "says", "asked", "replied", "mr", "mrs", "ms",
    "dr", "one", "two", "three", "part", "book",
];

/// Spoken fillers the aligner discounts on insertion.
const FILLERS: &[&str] = &[
    "uh", "um", "erm", "uhh", "umm", "hmm", "mm", "hm", "huh", "ah", "er", "like", "yeah",
];

/// The plain English stopword set.
pub fn english() -> HashSet<String> {
    ENGLISH.iter().map(|w| (*w).to_owned()).collect()
}

/// English plus audiobook-domain stopwords. The default for anchor policy.
pub fn english_plus_domain() -> HashSet<String> {
    let mut set = english();
    set.extend(DOMAIN.iter().map(|w| (*w).to_owned()));
    set
}

/// Default filler set for the aligner's insertion discount.
pub fn default_fillers() -> HashSet<String> {
    FILLERS.iter().map(|w| (*w).to_owned()).collect()
}
