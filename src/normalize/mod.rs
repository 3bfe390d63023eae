// src/normalize/mod.rs
//! Deterministic review-text normalization.
//!
//! `normalize(text)` runs, in order:
//! 1. lowercase (after folding typographic apostrophes to `'`)
//! 2. contraction expansion (`don't` → `do not`), longest match on word boundaries
//! 3. tokenization into maximal alphabetic runs (punctuation and digits dropped)
//! 4. rule-based lemmatization (see [`lemma`])
//! 5. removal of stop-words and tokens shorter than 3 characters
//!
//! Output order follows input order. The function is total: blank input → `[]`.

pub mod lemma;
pub mod stopwords;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub use lemma::lemmatize;
pub use stopwords::is_stopword;

/// Tokens shorter than this (in chars, after lemmatization) are dropped.
pub const MIN_TOKEN_CHARS: usize = 3;

const CONTRACTIONS: &[(&str, &str)] = &[
    ("ain't", "is not"),
    ("aren't", "are not"),
    ("can't", "can not"),
    ("cannot", "can not"),
    ("couldn't", "could not"),
    ("didn't", "did not"),
    ("doesn't", "does not"),
    ("don't", "do not"),
    ("hadn't", "had not"),
    ("hasn't", "has not"),
    ("haven't", "have not"),
    ("isn't", "is not"),
    ("mightn't", "might not"),
    ("mustn't", "must not"),
    ("needn't", "need not"),
    ("shan't", "shall not"),
    ("shouldn't", "should not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("won't", "will not"),
    ("wouldn't", "would not"),
    ("i'm", "i am"),
    ("i've", "i have"),
    ("i'll", "i will"),
    ("i'd", "i would"),
    ("you're", "you are"),
    ("you've", "you have"),
    ("you'll", "you will"),
    ("you'd", "you would"),
    ("he's", "he is"),
    ("he'll", "he will"),
    ("he'd", "he would"),
    ("she's", "she is"),
    ("she'll", "she will"),
    ("she'd", "she would"),
    ("it's", "it is"),
    ("it'll", "it will"),
    ("we're", "we are"),
    ("we've", "we have"),
    ("we'll", "we will"),
    ("we'd", "we would"),
    ("they're", "they are"),
    ("they've", "they have"),
    ("they'll", "they will"),
    ("they'd", "they would"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("here's", "here is"),
    ("what's", "what is"),
    ("who's", "who is"),
    ("where's", "where is"),
    ("how's", "how is"),
    ("let's", "let us"),
    ("y'all", "you all"),
];

static CONTRACTION_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| CONTRACTIONS.iter().copied().collect());

// Alternation ordered longest-first so the leftmost match is also the longest one.
static CONTRACTION_RE: Lazy<Regex> = Lazy::new(|| {
    let mut keys: Vec<&str> = CONTRACTIONS.iter().map(|(k, _)| *k).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alt = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alt})\b")).expect("contraction regex")
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Alphabetic}+").expect("word regex"));

/// Lowercase + apostrophe folding + contraction expansion.
/// Shared by the normalizer and the sentiment scorer.
pub fn expand_contractions(text: &str) -> String {
    let lowered = text
        .replace(['\u{2018}', '\u{2019}', '\u{02BC}'], "'")
        .to_lowercase();
    CONTRACTION_RE
        .replace_all(&lowered, |caps: &regex::Captures<'_>| {
            let m = &caps[0];
            CONTRACTION_MAP.get(m).copied().unwrap_or(m).to_string()
        })
        .into_owned()
}

/// Maximal alphabetic runs of an already lowercased text.
pub fn words(text: &str) -> impl Iterator<Item = &str> + '_ {
    WORD_RE.find_iter(text).map(|m| m.as_str())
}

/// Full normalization pipeline. Never fails.
pub fn normalize(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let expanded = expand_contractions(text);
    words(&expanded)
        .filter_map(|raw| {
            if is_stopword(raw) {
                return None;
            }
            let lemma = lemmatize(raw);
            if lemma.chars().count() < MIN_TOKEN_CHARS || is_stopword(&lemma) {
                None
            } else {
                Some(lemma)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_inputs_yield_nothing() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \n\t").is_empty());
        assert!(normalize("!!! 123 ...").is_empty());
    }

    #[test]
    fn contractions_expand_on_word_boundaries() {
        assert_eq!(expand_contractions("I don't know"), "i do not know");
        assert_eq!(expand_contractions("It\u{2019}s fine"), "it is fine");
        assert_eq!(expand_contractions("WON'T stop"), "will not stop");
        // not a contraction on its own: the boundary keeps "can't" intact inside it
        assert_eq!(expand_contractions("scan'tx"), "scan'tx");
    }

    #[test]
    fn product_review_keeps_content_lemmas_in_order() {
        let toks = normalize("I really love this product. It works perfectly.");
        assert_eq!(toks, vec!["real", "love", "product", "work", "perfect"]);
        assert!(!toks.iter().any(|t| t == "is" || t == "the" || t == "it"));
    }

    #[test]
    fn digits_and_punctuation_are_dropped() {
        let toks = normalize("Battery died after 3 days!!! #fail");
        assert_eq!(toks, vec!["battery", "die", "day", "fail"]);
    }

    #[test]
    fn output_is_deterministic() {
        let t = "The chargers stopped working; it's the worst purchase I've made.";
        assert_eq!(normalize(t), normalize(t));
    }
}
