// src/profanity.rs
//! Profanity detection by lemma-set membership.
//!
//! The curated blocklist ships as `profanity_blocklist.json` and is lemmatized on load,
//! so `sucks`, `sucked` and `sucking` all hit the `suck` entry.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::normalize::{expand_contractions, lemmatize, words};

static BUILTIN_BLOCKLIST: Lazy<HashSet<String>> = Lazy::new(|| {
    let raw = include_str!("../profanity_blocklist.json");
    let terms: Vec<String> = serde_json::from_str(raw).expect("valid profanity blocklist");
    terms.iter().map(|t| to_lemma(t)).collect()
});

static DEFAULT_DETECTOR: Lazy<ProfanityDetector> = Lazy::new(ProfanityDetector::new);

fn to_lemma(term: &str) -> String {
    lemmatize(term.trim().to_lowercase().as_str())
}

/// Blocklist in lemma form. Cheap to clone behind an `Arc` if shared.
#[derive(Debug, Clone)]
pub struct ProfanityDetector {
    blocklist: HashSet<String>,
}

impl Default for ProfanityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfanityDetector {
    /// Detector over the built-in blocklist.
    pub fn new() -> Self {
        Self {
            blocklist: BUILTIN_BLOCKLIST.clone(),
        }
    }

    /// Built-in blocklist extended with extra terms (lemmatized the same way).
    pub fn with_extra_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut d = Self::new();
        for t in terms {
            let lemma = to_lemma(t.as_ref());
            if !lemma.is_empty() {
                d.blocklist.insert(lemma);
            }
        }
        d
    }

    pub fn is_blocked(&self, lemma: &str) -> bool {
        self.blocklist.contains(lemma)
    }

    /// True iff any normalized token is on the blocklist.
    pub fn is_profane<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().any(|t| self.is_blocked(t.as_ref()))
    }

    /// Fallback when no normalized tokens are available: lemmatize the raw words.
    /// No stop-word or length filter, so short terms like `ass` still match.
    pub fn is_profane_raw(&self, text: &str) -> bool {
        let expanded = expand_contractions(text);
        let mut raw_words = words(&expanded);
        raw_words.any(|w| self.is_blocked(w) || self.is_blocked(&lemmatize(w)))
    }

    pub fn len(&self) -> usize {
        self.blocklist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocklist.is_empty()
    }
}

/// Membership test against the built-in blocklist.
pub fn is_profane<S: AsRef<str>>(tokens: &[S]) -> bool {
    DEFAULT_DETECTOR.is_profane(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn empty_tokens_are_clean() {
        let none: [&str; 0] = [];
        assert!(!is_profane(&none));
    }

    #[test]
    fn inflected_forms_match_lemma_entries() {
        for text in ["this sucks", "it suck", "sucked from day one", "what a load of shit"] {
            assert!(is_profane(&normalize(text)), "{text}");
        }
    }

    #[test]
    fn plain_negative_review_is_not_profane() {
        assert!(!is_profane(&normalize("Terrible battery, very bad purchase.")));
    }

    #[test]
    fn raw_fallback_sees_short_terms() {
        let d = ProfanityDetector::new();
        assert!(d.is_profane_raw("What an ASS."));
        assert!(!d.is_profane_raw("Assembly was easy"));
    }

    #[test]
    fn extra_terms_are_lemmatized() {
        let d = ProfanityDetector::with_extra_terms(["Frickin", " scammers "]);
        assert!(d.len() > ProfanityDetector::new().len());
        assert!(d.is_profane(&normalize("these scammers")));
    }
}
