//! Shared detection types
//!
//! Data contracts between the lexical detector, the hybrid verifier, the
//! fusion stage and the planner. None of these are persisted; they are
//! rebuilt on every detection pass.
//!
//! ```
//! use cleanview_engine::types::{ContentCategory, Word};
//!
//! assert_eq!(ContentCategory::parse_lenient(" Gore "), ContentCategory::Violence);
//! assert!(Word::new("hello", 1.0, 1.4).is_well_formed());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Content categories
// ============================================================================

/// Classification of objectionable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Profanity,
    Slur,
    Sexual,
    /// Sexual content involving minors; scored against the lower unsafe threshold
    Minors,
    Nudity,
    Violence,
    Custom,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 7] = [
        Self::Profanity,
        Self::Slur,
        Self::Sexual,
        Self::Minors,
        Self::Nudity,
        Self::Violence,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profanity => "profanity",
            Self::Slur => "slur",
            Self::Sexual => "sexual",
            Self::Minors => "minors",
            Self::Nudity => "nudity",
            Self::Violence => "violence",
            Self::Custom => "custom",
        }
    }

    /// Parse a lexicon category label; unknown labels map to `Custom`
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "profanity" | "swear" | "curse" => Self::Profanity,
            "slur" | "slurs" | "hate" => Self::Slur,
            "sexual" | "sex" => Self::Sexual,
            "minors" | "minor" | "unsafe" | "csam" => Self::Minors,
            "nudity" | "nude" => Self::Nudity,
            "violence" | "violent" | "gore" => Self::Violence,
            _ => Self::Custom,
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transcript input
// ============================================================================

/// One word from the speech-to-text engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

impl Word {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            probability: 1.0,
        }
    }

    /// Finite, ordered timestamps
    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }
}

// ============================================================================
// Lexical matches and segment scores
// ============================================================================

/// How a lexicon entry matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Normalized word equals the term
    Exact,
    /// A spelling variant of the word equals the term
    Variant,
    /// The term is embedded in a variant of bounded length
    Contains,
    /// Ordered multi-word phrase
    Phrase,
}

/// A single lexicon hit inside a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMatch {
    /// Transcript text that matched
    pub text: String,
    /// Lexicon entry that matched
    pub term: String,
    pub category: ContentCategory,
    pub match_type: MatchType,
    pub start: f64,
    pub end: f64,
    /// Policy weight (phrase bonus included)
    pub weight: f64,
    /// Neutralised by context; kept for debugging, contributes nothing
    pub suppressed: bool,
    /// 0.0 when suppressed, amplify factor near explicit words, else 1.0
    pub context_modifier: f64,
}

impl DetectionMatch {
    pub fn is_active(&self) -> bool {
        !self.suppressed
    }

    /// Contribution to the segment's raw score
    pub fn effective_weight(&self) -> f64 {
        if self.suppressed {
            0.0
        } else {
            self.weight * self.context_modifier
        }
    }
}

/// Kind of safe context that dampens a segment's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeContextKind {
    Medical,
    News,
    Educational,
}

/// Score of one transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentScore {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub matches: Vec<DetectionMatch>,
    /// Sum of effective weights of active matches
    pub raw_score: f64,
    /// Multiplier in `(0, 1]` from safe-context markers
    pub safe_context_modifier: f64,
    pub safe_contexts: Vec<SafeContextKind>,
    /// `raw_score × safe_context_modifier`
    pub total_score: f64,
    pub has_unsafe_content: bool,
    pub flagged: bool,
    /// Saturating confidence in `[0, 1)`; 0.0 with no active matches
    pub confidence: f64,
    /// Highest-precedence active category
    pub category: Option<ContentCategory>,
}

impl SegmentScore {
    pub fn active_match_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_active()).count()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Distinct active terms, in match order
    pub fn active_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = Vec::new();
        for m in self.matches.iter().filter(|m| m.is_active()) {
            if !terms.contains(&m.term.as_str()) {
                terms.push(&m.term);
            }
        }
        terms
    }
}
