use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::normalize::{expand_contractions, lemmatize};

/// Opinion lexicon keyed by lemma; +1 positive, -1 negative.
/// Entries are lemmatized on load so inflected review words meet them.
static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    let entries: BTreeMap<String, i32> =
        serde_json::from_str(raw).expect("valid sentiment lexicon");
    lemmatize_lexicon(entries).expect("consistent sentiment lexicon")
});

/// Key entries by lemma. Words sharing a lemma must agree on polarity.
fn lemmatize_lexicon(entries: BTreeMap<String, i32>) -> Result<HashMap<String, i32>, String> {
    let mut out: HashMap<String, (String, i32)> = HashMap::with_capacity(entries.len());
    for (word, polarity) in entries {
        let polarity = polarity.signum();
        let lemma = lemmatize(&word);
        if let Some((first, seen)) = out.get(&lemma) {
            if *seen != polarity {
                return Err(format!(
                    "'{first}' ({seen}) and '{word}' ({polarity}) share lemma '{lemma}'"
                ));
            }
            continue;
        }
        out.insert(lemma, (word, polarity));
    }
    Ok(out.into_iter().map(|(lemma, (_, p))| (lemma, p)).collect())
}

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Alphabetic}+|[.!?;:]").expect("sentiment tokenizer regex"));

/// How many tokens before an opinion word are scanned for negators / intensifiers.
pub const MODIFIER_WINDOW: usize = 3;

/// Neutral prior added to the weight total so a single opinion word does not saturate
/// the score and intensifiers still move it.
pub const NEUTRAL_PRIOR: f64 = 1.0;

/// Scores above this are positive, below its negation negative.
pub const LABEL_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

/// Bucket a score into positive / neutral / negative.
pub fn classify(score: f64) -> SentimentLabel {
    if score > LABEL_MARGIN {
        SentimentLabel::Positive
    } else if score < -LABEL_MARGIN {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    /// Sentence-terminal punctuation; stops the backward scan.
    Boundary,
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Lexicon polarity of a lemma (0 when absent).
    #[inline]
    fn polarity(&self, lemma: &str) -> i32 {
        *LEXICON.get(lemma).unwrap_or(&0)
    }

    /// Windowed lexicon score in [-1, 1]; 0.0 when no opinion word is found.
    ///
    /// Each opinion word contributes ±1, sign-flipped when a negator appears in the
    /// preceding window and scaled by the product of intensifier weights found there.
    /// Negators and intensifiers are matched on raw tokens, opinion words on lemmas.
    pub fn score_text(&self, text: &str) -> f64 {
        let expanded = expand_contractions(text);
        let tokens: Vec<Token<'_>> = tokenize(&expanded).collect();

        let mut score_total = 0.0f64;
        let mut weight_total = 0.0f64;

        for (i, tok) in tokens.iter().enumerate() {
            let Token::Word(w) = *tok else { continue };
            let base = self.polarity(&lemmatize(w));
            if base == 0 {
                continue;
            }

            let mut modifier = 1.0f64;
            let mut negated = false;
            for prev in tokens[..i].iter().rev().take(MODIFIER_WINDOW) {
                match *prev {
                    Token::Boundary => break,
                    Token::Word(p) => {
                        if let Some(weight) = intensifier_weight(p) {
                            modifier *= weight;
                        } else if is_negator(p) {
                            negated = true;
                        }
                    }
                }
            }

            let signed = if negated { -base } else { base };
            score_total += f64::from(signed) * modifier;
            weight_total += modifier.abs();
        }

        if weight_total == 0.0 {
            return 0.0;
        }
        (score_total / (weight_total + NEUTRAL_PRIOR)).clamp(-1.0, 1.0)
    }
}

/// Score with the default lexicon.
pub fn score(text: &str) -> f64 {
    SentimentAnalyzer.score_text(text)
}

fn tokenize(s: &str) -> impl Iterator<Item = Token<'_>> + '_ {
    TOKEN_RE.find_iter(s).map(|m| {
        let t = m.as_str();
        if t.len() == 1 && matches!(t.as_bytes()[0], b'.' | b'!' | b'?' | b';' | b':') {
            Token::Boundary
        } else {
            Token::Word(t)
        }
    })
}

/// Multiplier for closed-class degree adverbs; > 1 amplifies, < 1 dampens.
fn intensifier_weight(tok: &str) -> Option<f64> {
    let w = match tok {
        "extremely" | "incredibly" => 1.8,
        "absolutely" | "utterly" => 1.7,
        "totally" | "completely" => 1.6,
        "very" | "highly" | "super" => 1.5,
        "really" | "truly" => 1.4,
        "so" | "too" => 1.3,
        "quite" => 1.2,
        "fairly" | "rather" => 0.8,
        "somewhat" | "kinda" => 0.6,
        "slightly" | "marginally" => 0.5,
        "barely" | "hardly" => 0.4,
        _ => return None,
    };
    Some(w)
}

/// Negators after contraction expansion (`don't` has already become `do not`).
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "none"
            | "nobody"
            | "nothing"
            | "neither"
            | "nor"
            | "nowhere"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_lexicon_has_no_conflicting_lemmas() {
        assert_eq!(LEXICON.get("love"), Some(&1));
    }

    #[test]
    fn conflicting_polarity_on_one_lemma_is_rejected() {
        let agree = BTreeMap::from([("love".to_string(), 1), ("lovely".to_string(), 2)]);
        assert_eq!(lemmatize_lexicon(agree).unwrap().get("love"), Some(&1));

        let clash = BTreeMap::from([("love".to_string(), 1), ("lovely".to_string(), -1)]);
        let err = lemmatize_lexicon(clash).unwrap_err();
        assert!(err.contains("love"), "{err}");
    }

    #[test]
    fn empty_text_scores_exactly_zero() {
        assert_eq!(score(""), 0.0);
        assert_eq!(score("The box arrived on Tuesday."), 0.0);
    }

    #[test]
    fn negation_flips_polarity() {
        assert!(score("I love this") > 0.0);
        assert!(score("I do not love this") < 0.0);
        assert!(score("I don't love this") < 0.0);
    }

    #[test]
    fn intensifier_amplifies_magnitude() {
        let plain = score("This is bad");
        let strong = score("This is extremely bad");
        assert!(plain < 0.0);
        assert!(strong < plain, "{strong} should be below {plain}");
    }

    #[test]
    fn dampener_reduces_magnitude() {
        assert!(score("slightly good") < score("good"));
        assert!(score("slightly good") > 0.0);
    }

    #[test]
    fn sentence_boundary_stops_negation_scan() {
        // "not" belongs to the previous sentence
        assert!(score("Not now. Great product") > 0.0);
        assert!(score("Not a great product") < 0.0);
    }

    #[test]
    fn inflected_opinion_words_are_recognized() {
        assert!(score("Very disappointing purchase") < 0.0);
        assert!(score("We loved it") > 0.0);
    }

    #[test]
    fn score_stays_in_range() {
        let s = score("absolutely extremely totally awesome amazing perfect!!!");
        assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn classify_uses_symmetric_margin() {
        assert_eq!(classify(0.5), SentimentLabel::Positive);
        assert_eq!(classify(0.1), SentimentLabel::Neutral);
        assert_eq!(classify(-0.1), SentimentLabel::Neutral);
        assert_eq!(classify(-0.11), SentimentLabel::Negative);
    }
}
