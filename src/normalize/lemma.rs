// src/normalize/lemma.rs
//! Rule-based English lemmatizer.
//!
//! Lookup order:
//! 1. irregular-form table (verbs, plurals, comparatives, and words the rules would mangle)
//! 2. inflectional suffixes, first match wins: `-ing`, `-ed`, `-ies`, `-ves`, `-ses`, `-s`
//! 3. irregular table again on the intermediate form
//! 4. one derivational suffix: `-ly`, `-est`, `-er`
//!
//! Stems left by `-ing`/`-ed`/`-er`/`-est` are undoubled (`stopp` → `stop`) or get
//! their silent `e` back (`lov` → `love`) so inflected and base forms meet.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const IRREGULAR_FORMS: &[(&str, &str)] = &[
    // be / have / do / go
    ("am", "be"),
    ("is", "be"),
    ("are", "be"),
    ("was", "be"),
    ("were", "be"),
    ("been", "be"),
    ("being", "be"),
    ("has", "have"),
    ("had", "have"),
    ("having", "have"),
    ("does", "do"),
    ("did", "do"),
    ("done", "do"),
    ("doing", "do"),
    ("goes", "go"),
    ("went", "go"),
    ("gone", "go"),
    ("going", "go"),
    // irregular verbs
    ("bought", "buy"),
    ("brought", "bring"),
    ("came", "come"),
    ("died", "die"),
    ("dies", "die"),
    ("dying", "die"),
    ("lied", "lie"),
    ("lying", "lie"),
    ("tied", "tie"),
    ("ate", "eat"),
    ("eaten", "eat"),
    ("fell", "fall"),
    ("fallen", "fall"),
    ("felt", "feel"),
    ("found", "find"),
    ("gave", "give"),
    ("given", "give"),
    ("got", "get"),
    ("gotten", "get"),
    ("kept", "keep"),
    ("knew", "know"),
    ("known", "know"),
    ("left", "leave"),
    ("lost", "lose"),
    ("made", "make"),
    ("meant", "mean"),
    ("paid", "pay"),
    ("ran", "run"),
    ("said", "say"),
    ("saw", "see"),
    ("seen", "see"),
    ("sent", "send"),
    ("sold", "sell"),
    ("spent", "spend"),
    ("stood", "stand"),
    ("taught", "teach"),
    ("thought", "think"),
    ("told", "tell"),
    ("took", "take"),
    ("taken", "take"),
    ("threw", "throw"),
    ("thrown", "throw"),
    ("tore", "tear"),
    ("torn", "tear"),
    ("understood", "understand"),
    ("used", "use"),
    ("using", "use"),
    ("wore", "wear"),
    ("worn", "wear"),
    ("won", "win"),
    ("wrote", "write"),
    ("written", "write"),
    ("broke", "break"),
    // pronouns and irregular plurals
    ("these", "this"),
    ("those", "that"),
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("people", "person"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("knives", "knife"),
    ("lives", "life"),
    ("wives", "wife"),
    ("indices", "index"),
    // comparatives / superlatives
    ("better", "good"),
    ("best", "good"),
    ("worse", "bad"),
    ("worst", "bad"),
    ("less", "little"),
    ("least", "little"),
    ("more", "many"),
    ("most", "many"),
    ("further", "far"),
    ("furthest", "far"),
    ("farther", "far"),
    ("farthest", "far"),
    // words the suffix rules would mangle
    ("always", "always"),
    ("anything", "anything"),
    ("apply", "apply"),
    ("answer", "answer"),
    ("bleed", "bleed"),
    ("breed", "breed"),
    ("ceiling", "ceiling"),
    ("chapter", "chapter"),
    ("clothing", "clothing"),
    ("consider", "consider"),
    ("corner", "corner"),
    ("during", "during"),
    ("early", "early"),
    ("either", "either"),
    ("evening", "evening"),
    ("everything", "everything"),
    ("family", "family"),
    ("feed", "feed"),
    ("forest", "forest"),
    ("honest", "honest"),
    ("however", "however"),
    ("indeed", "indeed"),
    ("interest", "interest"),
    ("lens", "lens"),
    ("letter", "letter"),
    ("manner", "manner"),
    ("matter", "matter"),
    ("member", "member"),
    ("modest", "modest"),
    ("morning", "morning"),
    ("need", "need"),
    ("neither", "neither"),
    ("news", "news"),
    ("nothing", "nothing"),
    ("number", "number"),
    ("only", "only"),
    ("perhaps", "perhaps"),
    ("rather", "rather"),
    ("remember", "remember"),
    ("reply", "reply"),
    ("request", "request"),
    ("seed", "seed"),
    ("series", "series"),
    ("something", "something"),
    ("species", "species"),
    ("speed", "speed"),
    ("suggest", "suggest"),
    ("summer", "summer"),
    ("supply", "supply"),
    ("together", "together"),
    ("whether", "whether"),
    ("winter", "winter"),
];

static IRREGULAR: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| IRREGULAR_FORMS.iter().copied().collect());

/// Lemma of a single lowercased token.
pub fn lemmatize(token: &str) -> String {
    // The suffix rules are English-only and index bytes.
    if !token.is_ascii() {
        return token.to_string();
    }
    if let Some(l) = IRREGULAR.get(token) {
        return (*l).to_string();
    }
    let base = strip_inflection(token);
    if let Some(l) = IRREGULAR.get(base.as_str()) {
        return (*l).to_string();
    }
    strip_derivation(&base)
}

fn strip_inflection(w: &str) -> String {
    let n = w.chars().count();

    if n > 5 {
        if let Some(stem) = w.strip_suffix("ing") {
            if has_vowel(stem) {
                return restore_stem(stem);
            }
            return w.to_string();
        }
    }

    if n > 4 {
        if n > 5 && w.ends_with("eed") {
            // agreed → agree
            return w[..w.len() - 1].to_string();
        }
        if let Some(stem) = w.strip_suffix("ed") {
            if let Some(s) = stem.strip_suffix('i') {
                // studied → study
                return format!("{s}y");
            }
            if has_vowel(stem) {
                return restore_stem(stem);
            }
            return w.to_string();
        }
        if let Some(stem) = w.strip_suffix("ies") {
            return format!("{stem}y");
        }
        if let Some(stem) = w.strip_suffix("ieves") {
            return format!("{stem}ief");
        }
        if let Some(stem) = w.strip_suffix("eaves") {
            return format!("{stem}eaf");
        }
        if let Some(stem) = w.strip_suffix("lves") {
            return format!("{stem}lf");
        }
        if w.ends_with("ses") {
            // classes → class, cases → case
            if w.ends_with("sses") {
                return w[..w.len() - 2].to_string();
            }
            return w[..w.len() - 1].to_string();
        }
        if w.ends_with("aches") {
            return w[..w.len() - 1].to_string();
        }
        for sibilant in ["ches", "shes", "xes", "zzes"] {
            if w.ends_with(sibilant) {
                return w[..w.len() - 2].to_string();
            }
        }
    }

    if n > 3 && w.ends_with('s') && !(w.ends_with("ss") || w.ends_with("us") || w.ends_with("is"))
    {
        return w[..w.len() - 1].to_string();
    }

    w.to_string()
}

fn strip_derivation(w: &str) -> String {
    let n = w.chars().count();

    if n >= 5 {
        if let Some(stem) = w.strip_suffix("ly") {
            if has_vowel(stem) {
                // happily → happy
                return match stem.strip_suffix('i') {
                    Some(s) => format!("{s}y"),
                    None => stem.to_string(),
                };
            }
        }
    }

    if n >= 6 {
        for suffix in ["est", "er"] {
            if let Some(stem) = w.strip_suffix(suffix) {
                if !has_vowel(stem) {
                    break;
                }
                return match stem.strip_suffix('i') {
                    Some(s) => format!("{s}y"),
                    None => restore_stem(stem),
                };
            }
        }
    }

    w.to_string()
}

/// Undo consonant doubling, or restore a silent `e` on short CVC stems.
fn restore_stem(stem: &str) -> String {
    let b = stem.as_bytes();
    let n = b.len();
    if n >= 2 && b[n - 1] == b[n - 2] && is_consonant(b, n - 1) && !matches!(b[n - 1], b'l' | b's' | b'z')
    {
        return stem[..n - 1].to_string();
    }
    if needs_silent_e(stem) {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn needs_silent_e(stem: &str) -> bool {
    if stem.ends_with("at") || stem.ends_with("bl") || stem.ends_with("iz") {
        return true;
    }
    let b = stem.as_bytes();
    let n = b.len();
    n >= 3
        && measure(b) == 1
        && is_consonant(b, n - 3)
        && !is_consonant(b, n - 2)
        && is_consonant(b, n - 1)
        && !matches!(b[n - 1], b'w' | b'x' | b'y')
}

fn is_consonant(b: &[u8], i: usize) -> bool {
    match b[i] {
        b'a' | b'e' | b'i' | b'o' | b'u' => false,
        b'y' => i == 0 || !is_consonant(b, i - 1),
        _ => true,
    }
}

/// Number of vowel→consonant transitions (Porter's `m`).
fn measure(b: &[u8]) -> usize {
    let mut m = 0;
    let mut prev_vowel = false;
    for i in 0..b.len() {
        let vowel = !is_consonant(b, i);
        if prev_vowel && !vowel {
            m += 1;
        }
        prev_vowel = vowel;
    }
    m
}

fn has_vowel(stem: &str) -> bool {
    let b = stem.as_bytes();
    (0..b.len()).any(|i| !is_consonant(b, i))
}

#[cfg(test)]
mod tests {
    use super::lemmatize;

    fn check(pairs: &[(&str, &str)]) {
        for (word, lemma) in pairs {
            assert_eq!(lemmatize(word), *lemma, "lemma of {word}");
        }
    }

    #[test]
    fn irregular_table_wins() {
        check(&[("was", "be"), ("bought", "buy"), ("children", "child"), ("worst", "bad"), ("best", "good")]);
    }

    #[test]
    fn ing_and_ed_forms_meet_their_base() {
        check(&[
            ("working", "work"),
            ("running", "run"),
            ("falling", "fall"),
            ("loving", "love"),
            ("loved", "love"),
            ("hated", "hate"),
            ("stopped", "stop"),
            ("studied", "study"),
            ("disappointing", "disappoint"),
            ("disappointed", "disappoint"),
            ("agreed", "agree"),
        ]);
        // too short for the -ing rule, or no vowel left in the stem
        check(&[("thing", "thing"), ("string", "string")]);
    }

    #[test]
    fn plural_rules() {
        check(&[
            ("batteries", "battery"),
            ("shelves", "shelf"),
            ("leaves", "leaf"),
            ("classes", "class"),
            ("cases", "case"),
            ("boxes", "box"),
            ("bitches", "bitch"),
            ("headaches", "headache"),
            ("sucks", "suck"),
            ("loves", "love"),
            ("works", "work"),
        ]);
        // -ss / -us / -is are not plurals
        check(&[("glass", "glass"), ("bonus", "bonus"), ("this", "this"), ("useless", "useless")]);
    }

    #[test]
    fn derivational_suffixes() {
        check(&[
            ("perfectly", "perfect"),
            ("happily", "happy"),
            ("cheaper", "cheap"),
            ("biggest", "big"),
            ("stupidest", "stupid"),
            ("finest", "fine"),
        ]);
        check(&[("ugly", "ugly"), ("only", "only"), ("honest", "honest")]);
    }
}
