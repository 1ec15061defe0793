//! Word normalization and spelling-variant generation
//!
//! Transcripts spell the same word many ways ("F*CK", "fuuuck", "sh1t").
//! Normalization folds those into one form; variants cover the inflections
//! and repeated-letter spellings that normalization alone cannot.

/// Leetspeak substitutions applied before punctuation is stripped
const LEET_MAP: &[(char, char)] = &[
    ('@', 'a'),
    ('4', 'a'),
    ('8', 'b'),
    ('3', 'e'),
    ('6', 'g'),
    ('1', 'i'),
    ('!', 'i'),
    ('0', 'o'),
    ('$', 's'),
    ('5', 's'),
    ('7', 't'),
];

/// Suffixes stripped when generating inflection variants, longest first
const SUFFIXES: &[&str] = &["ing", "ers", "ed", "er", "es", "s", "y"];

/// Shortest stem left after stripping a suffix
const MIN_STEM_LEN: usize = 3;

/// Canonical form of a transcript word.
///
/// Lowercases, trims surrounding punctuation, maps leetspeak (only when the
/// word has a letter or a symbol substitute, so plain numbers are left
/// alone), strips everything that is not a letter and collapses runs of
/// three or more identical letters down to two.
pub fn normalize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    let trimmed = lower.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '$');
    let apply_leet = trimmed
        .chars()
        .any(|c| c.is_alphabetic() || c == '@' || c == '$');

    let mapped: String = trimmed
        .chars()
        .map(|c| {
            if apply_leet {
                LEET_MAP
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| *to)
                    .unwrap_or(c)
            } else {
                c
            }
        })
        .filter(|c| c.is_alphabetic())
        .collect();

    collapse_runs(&mapped, 2)
}

/// Lowercase and strip punctuation only; used for context and marker lookups
pub fn plain_word(word: &str) -> String {
    word.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Collapse runs of identical characters to at most `max_run`
pub fn collapse_runs(word: &str, max_run: usize) -> String {
    let mut out = String::with_capacity(word.len());
    let mut last: Option<char> = None;
    let mut run = 0;

    for c in word.chars() {
        if Some(c) == last {
            run += 1;
        } else {
            last = Some(c);
            run = 1;
        }
        if run <= max_run {
            out.push(c);
        }
    }

    out
}

/// Spelling variants of an already-normalized word, excluding the word itself.
///
/// Covers single-letter collapse ("fuuck" → "fuck"), inflection stripping
/// ("fucking" → "fuck") and the "1 → l" leetspeak ambiguity. Order is stable
/// and duplicates are removed.
pub fn variants(raw: &str, normalized: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let push = |candidate: String, out: &mut Vec<String>| {
        if !candidate.is_empty() && candidate != normalized && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    let single = collapse_runs(normalized, 1);
    push(single.clone(), &mut out);

    for base in [normalized.to_string(), single] {
        for suffix in SUFFIXES {
            if let Some(stem) = base.strip_suffix(suffix) {
                if stem.chars().count() >= MIN_STEM_LEN {
                    push(stem.to_string(), &mut out);
                    push(collapse_runs(stem, 1), &mut out);
                }
            }
        }
    }

    let lower = raw.to_lowercase();
    if lower.contains('1') && lower.chars().any(char::is_alphabetic) {
        let alt: String = lower.replace('1', "l");
        push(normalize_word(&alt), &mut out);
    }

    out
}
