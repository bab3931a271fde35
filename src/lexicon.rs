//! # Lexicon scorer
//! Rule-based valence scorer producing a compound polarity in `[-1, 1]`.
//!
//! Each token is looked up in an embedded valence lexicon (`-4..=4`) and then
//! adjusted by its neighbourhood: boosters/dampeners and negations in the three
//! preceding tokens, ALL-CAPS emphasis, a contrastive "but", and trailing
//! `!`/`?` emphasis. The sum is squashed with `s / sqrt(s² + ALPHA)`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../data/valence_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid valence lexicon")
});

/// Booster increment / dampener decrement.
const B_INCR: f64 = 0.293;
const B_DECR: f64 = -0.293;
/// ALL-CAPS emphasis when the text mixes case.
const C_INCR: f64 = 0.733;
/// Valence multiplier applied by a nearby negation.
const N_SCALAR: f64 = -0.74;
/// Normalization constant approximating the max expected sum.
const ALPHA: f64 = 15.0;
const EXCLAIM_INCR: f64 = 0.292;
const QUESTION_INCR: f64 = 0.18;

static BOOSTERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let incr = [
        "absolutely", "amazingly", "awfully", "completely", "considerably", "decidedly",
        "deeply", "enormously", "entirely", "especially", "exceptionally", "extremely",
        "fabulously", "greatly", "highly", "hugely", "incredibly", "intensely", "majorly",
        "more", "most", "particularly", "purely", "quite", "really", "remarkably", "so",
        "substantially", "thoroughly", "totally", "tremendously", "uber", "unbelievably",
        "unusually", "utterly", "very",
    ];
    let decr = [
        "almost", "barely", "hardly", "less", "little", "marginally", "occasionally",
        "partly", "scarcely", "slightly", "somewhat",
    ];
    incr.iter()
        .map(|w| (*w, B_INCR))
        .chain(decr.iter().map(|w| (*w, B_DECR)))
        .collect()
});

/// Anything that can turn text into a compound polarity in `[-1, 1]`.
pub trait PolarityScorer: Send + Sync {
    fn compound(&self, text: &str) -> f64;

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    /// Raw lexicon valence for a lowercased word, if known.
    #[cfg(test)]
    pub(crate) fn valence(&self, word: &str) -> Option<f64> {
        LEXICON.get(word).copied()
    }

    #[cfg(test)]
    pub(crate) fn lexicon_len(&self) -> usize {
        LEXICON.len()
    }
}

impl PolarityScorer for LexiconScorer {
    fn compound(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }
        let cap_diff = has_cap_differential(&tokens);

        let mut sentiments = Vec::with_capacity(tokens.len());
        for i in 0..tokens.len() {
            sentiments.push(token_valence(&tokens, i, cap_diff));
        }
        apply_but_rule(&tokens, &mut sentiments);

        let sum: f64 = sentiments.iter().sum();
        if sum == 0.0 {
            return 0.0;
        }
        let emphasis = punctuation_emphasis(text);
        let total = if sum > 0.0 { sum + emphasis } else { sum - emphasis };
        normalize(total)
    }
}

#[derive(Debug)]
struct Token<'a> {
    raw: &'a str,
    lower: String,
}

/// Whitespace tokens with surrounding punctuation stripped. Emoticons that would
/// vanish when stripped are kept verbatim; single-character tokens are dropped.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .filter_map(|w| {
            let stripped = w.trim_matches(|c: char| c.is_ascii_punctuation());
            let tok = if stripped.chars().count() <= 1 { w } else { stripped };
            (tok.chars().count() > 1).then(|| Token {
                raw: tok,
                lower: tok.to_lowercase(),
            })
        })
        .collect()
}

fn is_all_caps(word: &str) -> bool {
    word.chars().any(char::is_alphabetic)
        && word
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase)
}

/// True when some, but not all, tokens are shouted.
fn has_cap_differential(tokens: &[Token<'_>]) -> bool {
    let caps = tokens.iter().filter(|t| is_all_caps(t.raw)).count();
    caps > 0 && caps < tokens.len()
}

fn is_negation(word: &str) -> bool {
    matches!(
        word,
        "not"
            | "no"
            | "never"
            | "none"
            | "nobody"
            | "nothing"
            | "nowhere"
            | "neither"
            | "nor"
            | "cannot"
            | "without"
            | "rarely"
            | "seldom"
            | "despite"
    ) || word.contains("n't")
}

fn token_valence(tokens: &[Token<'_>], i: usize, cap_diff: bool) -> f64 {
    let tok = &tokens[i];
    if BOOSTERS.contains_key(tok.lower.as_str()) {
        return 0.0;
    }
    // "kind of" hedges rather than praises
    if tok.lower == "kind" && tokens.get(i + 1).is_some_and(|n| n.lower == "of") {
        return 0.0;
    }
    let Some(&base) = LEXICON.get(&tok.lower) else {
        return 0.0;
    };

    let mut valence = base;
    if cap_diff && is_all_caps(tok.raw) {
        valence += C_INCR.copysign(valence);
    }

    for start_i in 0..3 {
        if i <= start_i {
            break;
        }
        let prev = &tokens[i - (start_i + 1)];
        if LEXICON.contains_key(&prev.lower) {
            continue;
        }
        let decay = match start_i {
            0 => 1.0,
            1 => 0.95,
            _ => 0.9,
        };
        valence += scalar_inc_dec(prev, valence, cap_diff) * decay;
        if is_negation(&prev.lower) {
            valence *= N_SCALAR;
        }
    }
    valence
}

/// Booster/dampener contribution of `word` towards a token of `valence`.
fn scalar_inc_dec(word: &Token<'_>, valence: f64, cap_diff: bool) -> f64 {
    let Some(&b) = BOOSTERS.get(word.lower.as_str()) else {
        return 0.0;
    };
    let mut scalar = if valence < 0.0 { -b } else { b };
    if cap_diff && is_all_caps(word.raw) {
        scalar += C_INCR.copysign(valence);
    }
    scalar
}

/// Halve sentiment before the first "but", amplify sentiment after it.
fn apply_but_rule(tokens: &[Token<'_>], sentiments: &mut [f64]) {
    let Some(pivot) = tokens.iter().position(|t| t.lower == "but") else {
        return;
    };
    for (idx, s) in sentiments.iter_mut().enumerate() {
        if idx < pivot {
            *s *= 0.5;
        } else if idx > pivot {
            *s *= 1.5;
        }
    }
}

fn punctuation_emphasis(text: &str) -> f64 {
    let exclaims = text.matches('!').count().min(4) as f64;
    let questions = text.matches('?').count();
    let qm = match questions {
        0 | 1 => 0.0,
        2 | 3 => questions as f64 * QUESTION_INCR,
        _ => 0.96,
    };
    exclaims * EXCLAIM_INCR + qm
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + ALPHA).sqrt()).clamp(-1.0, 1.0)
}
