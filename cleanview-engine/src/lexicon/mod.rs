//! Term and phrase lexicons
//!
//! A [`Lexicon`] is immutable configuration: built once (from the built-in
//! defaults, plaintext files, or both) and shared as `Arc<Lexicon>` with every
//! detector. Tests build their own per case.
//!
//! File format, one entry per line:
//! - `term` or `term|category` (category defaults to profanity)
//! - `several words|category` is a phrase (ordered, contiguous)
//! - blank lines and lines starting with `#` are ignored

pub mod matcher;
pub mod normalize;

pub use matcher::{MatchStrategy, TermHit, WordCandidate};

use crate::types::{ContentCategory, SafeContextKind};
use cleanview_common::Result;
use normalize::{normalize_word, plain_word};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Ordered multi-word phrase
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    /// Normalized tokens, matched in order against consecutive words
    pub tokens: Vec<String>,
    /// Phrase as written in the lexicon
    pub text: String,
    pub category: ContentCategory,
}

/// Co-occurrence rule for an ambiguous term
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextRule {
    /// Nearby words that make the term harmless ("donkey" near "ass")
    pub neutral: HashSet<String>,
    /// Nearby words that make the term clearly offensive
    pub explicit: HashSet<String>,
}

/// Safe-context markers and the dampening they apply
#[derive(Debug, Clone, PartialEq)]
pub struct SafeContext {
    pub kind: SafeContextKind,
    pub markers: HashSet<String>,
    /// Multiplier in `(0, 1)`
    pub modifier: f64,
}

/// Immutable lexicon shared by the lexical detector
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    terms: BTreeMap<String, ContentCategory>,
    phrases: Vec<Phrase>,
    whitelist: HashSet<String>,
    context_rules: HashMap<String, ContextRule>,
    safe_contexts: Vec<SafeContext>,
}

impl Lexicon {
    /// Built-in default lexicon
    pub fn builtin() -> Self {
        LexiconBuilder::with_builtin().build()
    }

    /// Start an empty builder
    pub fn builder() -> LexiconBuilder {
        LexiconBuilder::default()
    }

    /// Category of an exact (normalized) term
    pub fn term_category(&self, term: &str) -> Option<ContentCategory> {
        self.terms.get(term).copied()
    }

    /// All terms in sorted order
    pub fn terms(&self) -> impl Iterator<Item = (&str, ContentCategory)> {
        self.terms.iter().map(|(t, c)| (t.as_str(), *c))
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn is_whitelisted(&self, word: &str) -> bool {
        self.whitelist.contains(word)
    }

    pub fn context_rule(&self, term: &str) -> Option<&ContextRule> {
        self.context_rules.get(term)
    }

    pub fn safe_contexts(&self) -> &[SafeContext] {
        &self.safe_contexts
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.phrases.is_empty()
    }
}

/// Builder for [`Lexicon`]
#[derive(Debug, Clone, Default)]
pub struct LexiconBuilder {
    lexicon: Lexicon,
}

impl LexiconBuilder {
    /// Builder pre-populated with the built-in defaults
    pub fn with_builtin() -> Self {
        let mut builder = Self::default();

        for term in [
            "fuck", "fucker", "motherfucker", "shit", "bullshit", "damn", "goddamn", "bitch",
            "bastard", "ass", "asshole", "crap", "dick", "piss",
        ] {
            builder = builder.term(term, ContentCategory::Profanity);
        }
        for term in ["retard", "retarded"] {
            builder = builder.term(term, ContentCategory::Slur);
        }
        for term in ["sex", "porn", "porno", "orgasm", "horny", "cock", "blowjob", "naked"] {
            builder = builder.term(term, ContentCategory::Sexual);
        }
        for term in ["underage", "jailbait", "preteen"] {
            builder = builder.term(term, ContentCategory::Minors);
        }

        builder = builder
            .phrase("son of a bitch", ContentCategory::Profanity)
            .phrase("go to hell", ContentCategory::Profanity)
            .phrase("piece of shit", ContentCategory::Profanity)
            .phrase("have sex", ContentCategory::Sexual)
            .phrase("take your clothes off", ContentCategory::Sexual);

        for word in [
            "class", "classic", "classes", "assassin", "assistant", "assume", "assess", "bass",
            "pass", "passage", "grass", "glass", "mass", "embassy", "cocktail", "cockpit",
            "peacock", "hancock", "hitchcock", "woodcock", "cockroach", "cockatoo", "cockney",
            "shuttlecock", "dickens", "scrap", "scrape", "scrappy", "shitake", "shiitake",
            "thorny", "essex", "sussex", "middlesex",
        ] {
            builder = builder.whitelist_word(word);
        }

        builder = builder
            .context_rule(
                "ass",
                &["donkey", "donkeys", "mule", "farm", "burro", "jackass"],
                &["kiss", "fat", "kick", "lazy", "stupid", "whole"],
            )
            .context_rule(
                "dick",
                &["moby", "tracy", "van", "philip", "detective", "private"],
                &["suck", "hard", "your", "big"],
            )
            .context_rule(
                "cock",
                &["rooster", "hen", "hens", "chicken", "farm", "crow", "crowed"],
                &["suck", "hard", "big"],
            )
            .context_rule(
                "bitch",
                &["dog", "breed", "puppies", "kennel", "litter", "breeder"],
                &["stupid", "crazy", "little", "fucking"],
            )
            .context_rule(
                "sex",
                &["education", "chromosome", "gender", "offender", "biological", "ratio"],
                &["hot", "oral", "want", "wild"],
            )
            .safe_context(
                SafeContextKind::Medical,
                &[
                    "doctor", "medical", "patient", "diagnosis", "anatomy", "clinic",
                    "symptoms", "exam", "physician", "nurse",
                ],
                0.5,
            )
            .safe_context(
                SafeContextKind::News,
                &[
                    "reported", "according", "officials", "news", "police", "investigation",
                    "authorities", "charged",
                ],
                0.6,
            )
            .safe_context(
                SafeContextKind::Educational,
                &[
                    "lesson", "students", "biology", "history", "lecture", "textbook",
                    "curriculum", "teacher",
                ],
                0.5,
            );

        builder
    }

    /// Add a single term (normalized on insert)
    pub fn term(mut self, term: &str, category: ContentCategory) -> Self {
        let normalized = normalize_word(term);
        if !normalized.is_empty() {
            self.lexicon.terms.insert(normalized, category);
        }
        self
    }

    /// Add an ordered phrase (tokens normalized on insert)
    pub fn phrase(mut self, text: &str, category: ContentCategory) -> Self {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(normalize_word)
            .filter(|t| !t.is_empty())
            .collect();
        match tokens.len() {
            0 => {}
            1 => return self.term(text, category),
            _ => self.lexicon.phrases.push(Phrase {
                tokens,
                text: text.trim().to_string(),
                category,
            }),
        }
        self
    }

    /// Add a word that must never match
    pub fn whitelist_word(mut self, word: &str) -> Self {
        let normalized = normalize_word(word);
        if !normalized.is_empty() {
            self.lexicon.whitelist.insert(normalized);
        }
        self
    }

    /// Register neutral/explicit co-occurrence words for an ambiguous term
    pub fn context_rule(mut self, term: &str, neutral: &[&str], explicit: &[&str]) -> Self {
        let rule = ContextRule {
            neutral: neutral.iter().map(|w| plain_word(w)).collect(),
            explicit: explicit.iter().map(|w| plain_word(w)).collect(),
        };
        self.lexicon.context_rules.insert(normalize_word(term), rule);
        self
    }

    /// Register safe-context markers; the modifier is clamped to `[0.05, 1.0]`
    /// so dampening reduces a score but never zeroes it.
    pub fn safe_context(mut self, kind: SafeContextKind, markers: &[&str], modifier: f64) -> Self {
        let modifier = modifier.clamp(0.05, 1.0);
        let markers: HashSet<String> = markers.iter().map(|w| plain_word(w)).collect();
        if let Some(existing) = self.lexicon.safe_contexts.iter_mut().find(|c| c.kind == kind) {
            existing.markers.extend(markers);
            existing.modifier = modifier;
        } else {
            self.lexicon.safe_contexts.push(SafeContext {
                kind,
                markers,
                modifier,
            });
        }
        self
    }

    /// Parse `term[|category]` / `phrase words[|category]` lines
    pub fn parse_entries(mut self, content: &str) -> Self {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (text, category) = match line.split_once('|') {
                Some((text, label)) => (text.trim(), ContentCategory::parse_lenient(label)),
                None => (line, ContentCategory::Profanity),
            };

            self = if text.split_whitespace().count() > 1 {
                self.phrase(text, category)
            } else {
                self.term(text, category)
            };
        }
        self
    }

    /// Load a term/phrase file
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read. A missing lexicon is
    /// a configuration mistake, not a "no detections" case.
    pub fn load_entries_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let before = (self.lexicon.terms.len(), self.lexicon.phrases.len());
        let builder = self.parse_entries(&content);
        debug!(
            path = %path.display(),
            terms = builder.lexicon.terms.len() - before.0,
            phrases = builder.lexicon.phrases.len() - before.1,
            "Loaded lexicon file"
        );
        Ok(builder)
    }

    /// Load a whitelist file (one word per line, `#` comments)
    pub fn load_whitelist_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines().map(str::trim) {
            if !line.is_empty() && !line.starts_with('#') {
                self = self.whitelist_word(line);
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Lexicon {
        self.lexicon
    }
}
