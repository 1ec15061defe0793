//! Hybrid Verifier
//!
//! Second opinion on uncertain lexical results. Segments with active matches
//! whose total score is below `uncertain_cutoff` are sent to a
//! [`SemanticOracle`]; confident lexical results are left alone.
//!
//! # Verdicts
//! - Offensive → `Verified`, confidence + `verify_boost` (capped at 1.0)
//! - Benign → `Rejected`, confidence × `reject_factor` (reduced, never zeroed)
//! - Neutral → `Pending`, lexicon result stands
//! - No oracle, or oracle unavailable → `Skipped`, lexicon result unchanged
//!
//! Oracle absence is a capability degradation, logged once per pass.

use crate::config::VerifierConfig;
use crate::types::{ContentCategory, SegmentScore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Oracle classification of a segment's text
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OracleVerdict {
    /// Similar to offensive usage (similarity in `[0, 1]`)
    Offensive(f64),
    /// Similar to harmless usage (similarity in `[0, 1]`)
    Benign(f64),
    /// No opinion
    Neutral,
}

/// Semantic-similarity classifier
pub trait SemanticOracle: Send + Sync {
    fn name(&self) -> &str;

    /// Unavailable oracles are treated the same as no oracle
    fn is_available(&self) -> bool {
        true
    }

    fn classify(&self, text: &str, category: Option<ContentCategory>) -> OracleVerdict;
}

/// Built-in oracle comparing text against exemplar sentences
///
/// Uses normalized Levenshtein similarity; commits to a verdict only when the
/// best exemplar reaches `similarity_threshold`.
#[derive(Debug, Clone)]
pub struct ExemplarOracle {
    offensive: Vec<String>,
    benign: Vec<String>,
    similarity_threshold: f64,
}

impl ExemplarOracle {
    pub fn new(offensive: Vec<String>, benign: Vec<String>, similarity_threshold: f64) -> Self {
        let prepare = |list: Vec<String>| -> Vec<String> {
            list.iter()
                .map(|s| prepare_text(s))
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            offensive: prepare(offensive),
            benign: prepare(benign),
            similarity_threshold: similarity_threshold.clamp(0.0, 1.0),
        }
    }

    /// Small default exemplar set
    pub fn builtin(similarity_threshold: f64) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(
            owned(&[
                "kiss my ass",
                "shut up you stupid bitch",
                "get the fuck out of here",
                "you piece of shit",
                "take your clothes off",
                "i want to have sex with you",
            ]),
            owned(&[
                "the donkey is a stubborn ass",
                "the dog gave birth to a litter of puppies",
                "the rooster crowed at dawn",
                "sex education class starts monday",
                "the doctor examined the patient",
                "we read moby dick in school",
            ]),
            similarity_threshold,
        )
    }

    fn best(list: &[String], text: &str) -> f64 {
        list.iter()
            .map(|exemplar| strsim::normalized_levenshtein(exemplar, text))
            .fold(0.0, f64::max)
    }
}

impl SemanticOracle for ExemplarOracle {
    fn name(&self) -> &str {
        "exemplar"
    }

    fn is_available(&self) -> bool {
        !self.offensive.is_empty() || !self.benign.is_empty()
    }

    fn classify(&self, text: &str, _category: Option<ContentCategory>) -> OracleVerdict {
        let text = prepare_text(text);
        if text.is_empty() {
            return OracleVerdict::Neutral;
        }

        let offensive = Self::best(&self.offensive, &text);
        let benign = Self::best(&self.benign, &text);

        if offensive.max(benign) < self.similarity_threshold {
            OracleVerdict::Neutral
        } else if offensive > benign {
            OracleVerdict::Offensive(offensive)
        } else if benign > offensive {
            OracleVerdict::Benign(benign)
        } else {
            OracleVerdict::Neutral
        }
    }
}

/// Lowercase, keep letters/digits/spaces, collapse whitespace
fn prepare_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of verifying one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Rejected,
    /// Oracle had no opinion
    Pending,
    /// No oracle available
    Skipped,
    /// Segment was certain or had no active matches
    NotNeeded,
}

/// A lexical segment score with its verification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedSegment {
    pub score: SegmentScore,
    pub status: VerificationStatus,
    /// Adjusted confidence
    pub confidence: f64,
    /// Exemplar similarity behind the verdict, if any
    pub similarity: Option<f64>,
    pub oracle: Option<String>,
}

impl VerifiedSegment {
    /// True for verified/skipped, false for rejected, otherwise the lexicon
    /// decides by active match count
    pub fn should_flag(&self) -> bool {
        match self.status {
            VerificationStatus::Verified | VerificationStatus::Skipped => true,
            VerificationStatus::Rejected => false,
            VerificationStatus::Pending | VerificationStatus::NotNeeded => {
                self.score.active_match_count() > 0
            }
        }
    }
}

/// Lexical scores + optional semantic oracle
#[derive(Clone)]
pub struct HybridVerifier {
    oracle: Option<Arc<dyn SemanticOracle>>,
    config: VerifierConfig,
}

impl std::fmt::Debug for HybridVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridVerifier")
            .field("oracle", &self.oracle.as_ref().map(|o| o.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl HybridVerifier {
    /// Verifier without an oracle; every uncertain segment is skipped
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            oracle: None,
            config,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SemanticOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Is an oracle present and available?
    pub fn has_oracle(&self) -> bool {
        self.oracle.as_ref().is_some_and(|o| o.is_available())
    }

    /// Segment goes to the oracle
    pub fn is_uncertain(&self, score: &SegmentScore) -> bool {
        score.active_match_count() > 0 && score.total_score < self.config.uncertain_cutoff
    }

    pub fn verify(&self, scores: &[SegmentScore]) -> Vec<VerifiedSegment> {
        let oracle = self.oracle.as_ref().filter(|o| o.is_available());
        let uncertain = scores.iter().filter(|s| self.is_uncertain(s)).count();

        if oracle.is_none() && uncertain > 0 {
            warn!(
                uncertain,
                "Semantic oracle unavailable, uncertain segments keep their lexical result"
            );
        }

        let verified: Vec<VerifiedSegment> = scores
            .iter()
            .map(|score| self.verify_one(score, oracle.map(|o| o.as_ref())))
            .collect();

        info!(
            segments = scores.len(),
            uncertain,
            rejected = verified
                .iter()
                .filter(|v| v.status == VerificationStatus::Rejected)
                .count(),
            "Hybrid verification complete"
        );
        verified
    }

    fn verify_one(&self, score: &SegmentScore, oracle: Option<&dyn SemanticOracle>) -> VerifiedSegment {
        let unchanged = |status: VerificationStatus, oracle: Option<&dyn SemanticOracle>| VerifiedSegment {
            score: score.clone(),
            status,
            confidence: score.confidence,
            similarity: None,
            oracle: oracle.map(|o| o.name().to_string()),
        };

        if !self.is_uncertain(score) {
            return unchanged(VerificationStatus::NotNeeded, None);
        }
        let Some(oracle) = oracle else {
            return unchanged(VerificationStatus::Skipped, None);
        };

        let verdict = oracle.classify(&score.text, score.category);
        debug!(
            start = score.start,
            end = score.end,
            total_score = score.total_score,
            ?verdict,
            "Oracle verdict"
        );

        match verdict {
            OracleVerdict::Offensive(similarity) => VerifiedSegment {
                score: score.clone(),
                status: VerificationStatus::Verified,
                confidence: (score.confidence + self.config.verify_boost).min(1.0),
                similarity: Some(similarity),
                oracle: Some(oracle.name().to_string()),
            },
            OracleVerdict::Benign(similarity) => VerifiedSegment {
                score: score.clone(),
                status: VerificationStatus::Rejected,
                confidence: score.confidence * self.config.reject_factor.clamp(0.01, 1.0),
                similarity: Some(similarity),
                oracle: Some(oracle.name().to_string()),
            },
            OracleVerdict::Neutral => unchanged(VerificationStatus::Pending, Some(oracle)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectionMatch, MatchType};

    struct FixedOracle {
        verdict: OracleVerdict,
        available: bool,
    }

    impl SemanticOracle for FixedOracle {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn classify(&self, _text: &str, _category: Option<ContentCategory>) -> OracleVerdict {
            self.verdict
        }
    }

    fn score(text: &str, total: f64, active: bool) -> SegmentScore {
        let matches = vec![DetectionMatch {
            text: "ass".into(),
            term: "ass".into(),
            category: ContentCategory::Profanity,
            match_type: MatchType::Exact,
            start: 0.0,
            end: 1.0,
            weight: 1.0,
            suppressed: !active,
            context_modifier: if active { 1.0 } else { 0.0 },
        }];
        SegmentScore {
            start: 0.0,
            end: 1.0,
            text: text.into(),
            matches,
            raw_score: total,
            safe_context_modifier: 1.0,
            safe_contexts: vec![],
            total_score: total,
            has_unsafe_content: false,
            flagged: total >= 1.0,
            confidence: if active { total / (total + 1.0) } else { 0.0 },
            category: active.then_some(ContentCategory::Profanity),
        }
    }

    fn verifier(verdict: OracleVerdict, available: bool) -> HybridVerifier {
        HybridVerifier::new(VerifierConfig::default())
            .with_oracle(Arc::new(FixedOracle { verdict, available }))
    }

    #[test]
    fn test_verified_boosts_confidence() {
        let result = verifier(OracleVerdict::Offensive(0.9), true).verify(&[score("x", 1.0, true)]);
        assert_eq!(result[0].status, VerificationStatus::Verified);
        assert!((result[0].confidence - 0.7).abs() < 1e-9);
        assert!(result[0].should_flag());
    }

    #[test]
    fn test_rejected_reduces_but_never_zeroes() {
        let result = verifier(OracleVerdict::Benign(0.9), true).verify(&[score("x", 1.0, true)]);
        assert_eq!(result[0].status, VerificationStatus::Rejected);
        assert!((result[0].confidence - 0.15).abs() < 1e-9);
        assert!(result[0].confidence > 0.0);
        assert!(!result[0].should_flag());
    }

    #[test]
    fn test_neutral_is_pending() {
        let result = verifier(OracleVerdict::Neutral, true).verify(&[score("x", 1.0, true)]);
        assert_eq!(result[0].status, VerificationStatus::Pending);
        assert_eq!(result[0].confidence, 0.5);
        assert!(result[0].should_flag());
    }

    #[test]
    fn test_unavailable_oracle_skips() {
        let input = score("x", 1.0, true);
        let result = verifier(OracleVerdict::Benign(1.0), false).verify(&[input.clone()]);
        assert_eq!(result[0].status, VerificationStatus::Skipped);
        assert_eq!(result[0].confidence, input.confidence);
        assert!(result[0].should_flag());

        let result = HybridVerifier::new(VerifierConfig::default()).verify(&[input]);
        assert_eq!(result[0].status, VerificationStatus::Skipped);
    }

    #[test]
    fn test_certain_segments_not_sent() {
        let result = verifier(OracleVerdict::Benign(1.0), true).verify(&[score("x", 3.0, true)]);
        assert_eq!(result[0].status, VerificationStatus::NotNeeded);
        assert!(result[0].should_flag());
    }

    #[test]
    fn test_suppressed_only_segment_not_flagged() {
        let result = verifier(OracleVerdict::Offensive(1.0), true).verify(&[score("x", 0.0, false)]);
        assert_eq!(result[0].status, VerificationStatus::NotNeeded);
        assert!(!result[0].should_flag());
    }

    #[test]
    fn test_exemplar_oracle() {
        let oracle = ExemplarOracle::builtin(0.6);
        assert!(oracle.is_available());
        assert!(matches!(
            oracle.classify("Kiss my ass!", None),
            OracleVerdict::Offensive(_)
        ));
        assert!(matches!(
            oracle.classify("The donkey is a stubborn ass.", None),
            OracleVerdict::Benign(_)
        ));
        assert_eq!(
            oracle.classify("completely unrelated words about weather", None),
            OracleVerdict::Neutral
        );
    }

    #[test]
    fn test_empty_exemplar_oracle_unavailable() {
        let oracle = ExemplarOracle::new(vec![], vec![" ".into()], 0.5);
        assert!(!oracle.is_available());
    }
}
