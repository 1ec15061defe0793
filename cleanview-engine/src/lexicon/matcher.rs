//! Ordered term-matching strategies
//!
//! Each strategy returns a hit or nothing; [`match_word`] runs them in
//! [`MatchStrategy::ORDERED`] order and stops at the first hit, so every
//! match can be traced to exactly one rule.

use super::normalize::{normalize_word, variants};
use super::Lexicon;
use crate::types::{ContentCategory, MatchType};

/// Containment only applies to terms at least this long
pub const MIN_CONTAINS_TERM_LEN: usize = 4;

/// Containment only applies when the word is at most this many times the term length
pub const MAX_CONTAINS_LEN_RATIO: usize = 3;

/// A transcript word prepared for matching
#[derive(Debug, Clone, PartialEq)]
pub struct WordCandidate {
    pub raw: String,
    pub normalized: String,
    /// Spelling variants, excluding `normalized`
    pub variants: Vec<String>,
}

impl WordCandidate {
    pub fn new(raw: &str) -> Self {
        let normalized = normalize_word(raw);
        let variants = variants(raw, &normalized);
        Self {
            raw: raw.to_string(),
            normalized,
            variants,
        }
    }

    /// Normalized form followed by every variant
    pub fn forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.normalized.as_str()).chain(self.variants.iter().map(String::as_str))
    }
}

/// Lexicon entry hit by a word
#[derive(Debug, Clone, PartialEq)]
pub struct TermHit {
    pub term: String,
    pub category: ContentCategory,
    pub match_type: MatchType,
}

/// Matching rule, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Normalized word is a term
    Exact,
    /// A spelling variant is a term
    VariantExact,
    /// A term of at least [`MIN_CONTAINS_TERM_LEN`] chars is embedded in a
    /// form no longer than [`MAX_CONTAINS_LEN_RATIO`] × the term
    BoundedContainment,
}

impl MatchStrategy {
    pub const ORDERED: [MatchStrategy; 3] =
        [Self::Exact, Self::VariantExact, Self::BoundedContainment];

    pub fn try_match(self, candidate: &WordCandidate, lexicon: &Lexicon) -> Option<TermHit> {
        match self {
            Self::Exact => lexicon
                .term_category(&candidate.normalized)
                .map(|category| TermHit {
                    term: candidate.normalized.clone(),
                    category,
                    match_type: MatchType::Exact,
                }),
            Self::VariantExact => candidate.variants.iter().find_map(|variant| {
                lexicon.term_category(variant).map(|category| TermHit {
                    term: variant.clone(),
                    category,
                    match_type: MatchType::Variant,
                })
            }),
            Self::BoundedContainment => {
                let mut best: Option<TermHit> = None;
                for form in candidate.forms() {
                    let form_len = form.chars().count();
                    for (term, category) in lexicon.terms() {
                        let term_len = term.chars().count();
                        if term_len < MIN_CONTAINS_TERM_LEN
                            || form_len > MAX_CONTAINS_LEN_RATIO * term_len
                            || !form.contains(term)
                        {
                            continue;
                        }
                        let longer = best
                            .as_ref()
                            .map_or(true, |b| term_len > b.term.chars().count());
                        if longer {
                            best = Some(TermHit {
                                term: term.to_string(),
                                category,
                                match_type: MatchType::Contains,
                            });
                        }
                    }
                }
                best
            }
        }
    }
}

/// Run every strategy in order; whitelisted words never match
pub fn match_word(candidate: &WordCandidate, lexicon: &Lexicon) -> Option<TermHit> {
    if candidate.normalized.is_empty() || lexicon.is_whitelisted(&candidate.normalized) {
        return None;
    }

    MatchStrategy::ORDERED
        .iter()
        .find_map(|strategy| strategy.try_match(candidate, lexicon))
}
