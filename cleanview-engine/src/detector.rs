//! Lexical Scoring Detector
//!
//! Scores transcript segments against the term and phrase lexicon.
//!
//! # Pipeline
//! 1. Partition words into segments at silences longer than `segment_gap`
//! 2. Match phrases with an ordered sliding window (weight × `phrase_bonus`)
//! 3. Match remaining words through the ordered [`MatchStrategy`] list
//! 4. Apply context modifiers to ambiguous terms (suppress near neutral
//!    words, amplify near explicit ones)
//! 5. Dampen the segment total when safe-context markers are present
//! 6. Flag via the policy table
//!
//! Output is one [`TimeInterval`] per flagged segment, spanning the whole
//! segment, unmerged and unbuffered. Merging happens in the planner.
//!
//! [`MatchStrategy`]: crate::lexicon::MatchStrategy

use crate::config::DetectorConfig;
use crate::lexicon::normalize::plain_word;
use crate::lexicon::{matcher::match_word, Lexicon, WordCandidate};
use crate::policy::PolicyTable;
use crate::types::{ContentCategory, DetectionMatch, MatchType, SafeContextKind, SegmentScore, Word};
use cleanview_common::{MatchSource, TimeInterval};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Lexical detector over word-timestamp transcripts
#[derive(Debug, Clone)]
pub struct LexicalDetector {
    lexicon: Arc<Lexicon>,
    policy: Arc<PolicyTable>,
    config: DetectorConfig,
}

impl LexicalDetector {
    pub fn new(lexicon: Arc<Lexicon>, policy: Arc<PolicyTable>, config: DetectorConfig) -> Self {
        Self {
            lexicon,
            policy,
            config,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Split a word stream into segments at gaps greater than `segment_gap`.
    ///
    /// Words with non-finite or reversed timestamps are dropped; the rest are
    /// ordered by start time first.
    pub fn segment_words(&self, words: &[Word]) -> Vec<Vec<Word>> {
        let mut ordered: Vec<Word> = words.iter().filter(|w| w.is_well_formed()).cloned().collect();
        if ordered.len() < words.len() {
            debug!(
                dropped = words.len() - ordered.len(),
                "Skipped words with invalid timestamps"
            );
        }
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut segments: Vec<Vec<Word>> = Vec::new();
        let mut current: Vec<Word> = Vec::new();
        let mut current_end = f64::NEG_INFINITY;

        for word in ordered {
            if !current.is_empty() && word.start - current_end > self.config.segment_gap {
                segments.push(std::mem::take(&mut current));
                current_end = f64::NEG_INFINITY;
            }
            current_end = current_end.max(word.end);
            current.push(word);
        }
        if !current.is_empty() {
            segments.push(current);
        }

        segments
    }

    /// Score one segment
    ///
    /// An empty segment scores zero over `[0, 0]` and is never flagged.
    pub fn score_segment(&self, words: &[Word]) -> SegmentScore {
        let start = words.first().map(|w| w.start).unwrap_or(0.0);
        let end = words.iter().map(|w| w.end).fold(start, f64::max);
        let text = words.iter().map(|w| w.word.as_str()).collect::<Vec<_>>().join(" ");

        let candidates: Vec<WordCandidate> = words.iter().map(|w| WordCandidate::new(&w.word)).collect();
        let plain: Vec<String> = words.iter().map(|w| plain_word(&w.word)).collect();

        let mut covered = vec![false; words.len()];
        let mut matches = self.phrase_matches(words, &candidates, &mut covered);

        for (index, candidate) in candidates.iter().enumerate() {
            if covered[index] {
                continue;
            }
            let Some(hit) = match_word(candidate, &self.lexicon) else {
                continue;
            };

            let (suppressed, context_modifier) = self.context_modifier(&hit.term, index, &plain);
            matches.push(DetectionMatch {
                text: words[index].word.clone(),
                term: hit.term,
                category: hit.category,
                match_type: hit.match_type,
                start: words[index].start,
                end: words[index].end,
                weight: self.policy.weight(hit.category),
                suppressed,
                context_modifier,
            });
        }
        matches.sort_by(|a, b| a.start.total_cmp(&b.start));

        let (safe_context_modifier, safe_contexts) = self.safe_context(&plain);

        let raw_score: f64 = matches.iter().map(DetectionMatch::effective_weight).sum();
        let total_score = raw_score * safe_context_modifier;
        let active: Vec<&DetectionMatch> = matches.iter().filter(|m| m.is_active()).collect();
        let has_unsafe_content = active.iter().any(|m| self.policy.is_unsafe(m.category));
        let category = self
            .policy
            .dominant_category(active.iter().map(|m| m.category));
        let threshold = self.policy.threshold_for(category, has_unsafe_content);
        let flagged = self.policy.should_flag(total_score, category, has_unsafe_content);

        let confidence = if active.is_empty() || total_score <= 0.0 {
            0.0
        } else {
            total_score / (total_score + threshold.max(0.0))
        };

        SegmentScore {
            start,
            end,
            text,
            matches,
            raw_score,
            safe_context_modifier,
            safe_contexts,
            total_score,
            has_unsafe_content,
            flagged,
            confidence,
            category,
        }
    }

    /// Segment and score a whole transcript
    pub fn score_words(&self, words: &[Word]) -> Vec<SegmentScore> {
        let scores: Vec<SegmentScore> = self
            .segment_words(words)
            .iter()
            .map(|segment| self.score_segment(segment))
            .collect();

        info!(
            words = words.len(),
            segments = scores.len(),
            flagged = scores.iter().filter(|s| s.flagged).count(),
            "Lexical scoring complete"
        );
        scores
    }

    /// One interval per flagged segment (unmerged, unbuffered)
    pub fn detect(&self, words: &[Word]) -> Vec<TimeInterval> {
        self.intervals_for(&self.score_words(words))
    }

    /// Intervals for the flagged entries of already-computed scores
    pub fn intervals_for(&self, scores: &[SegmentScore]) -> Vec<TimeInterval> {
        scores
            .iter()
            .filter(|s| s.flagged)
            .filter_map(|s| self.segment_interval(s))
            .collect()
    }

    /// Flagged intervals grouped by each segment's dominant category
    pub fn detect_by_category(&self, words: &[Word]) -> BTreeMap<ContentCategory, Vec<TimeInterval>> {
        let mut by_category: BTreeMap<ContentCategory, Vec<TimeInterval>> = BTreeMap::new();
        for score in self.score_words(words).iter().filter(|s| s.flagged) {
            if let (Some(category), Some(interval)) = (score.category, self.segment_interval(score)) {
                by_category.entry(category).or_default().push(interval);
            }
        }
        by_category
    }

    /// Interval covering a scored segment, classified by its dominant category
    pub fn segment_interval(&self, score: &SegmentScore) -> Option<TimeInterval> {
        let category = score.category?;
        let reason = format!("{}: {}", category, score.active_terms().join(", "));

        let interval = TimeInterval::new(score.start, score.end, reason)
            .ok()?
            .with_action(self.policy.action(category))
            .with_source(MatchSource::Audio)
            .with_metadata("category", serde_json::json!(category.as_str()))
            .with_metadata("score", serde_json::json!(score.total_score))
            .with_confidence(score.confidence);
        Some(interval)
    }

    /// Ordered phrase matches; marks the words each phrase covers
    fn phrase_matches(
        &self,
        words: &[Word],
        candidates: &[WordCandidate],
        covered: &mut [bool],
    ) -> Vec<DetectionMatch> {
        let mut matches = Vec::new();

        for phrase in self.lexicon.phrases() {
            let len = phrase.tokens.len();
            if len == 0 || len > candidates.len() {
                continue;
            }

            let mut index = 0;
            while index + len <= candidates.len() {
                let window = &candidates[index..index + len];
                let hit = window
                    .iter()
                    .zip(&phrase.tokens)
                    .all(|(candidate, token)| candidate.forms().any(|form| form == token));

                if !hit || covered[index..index + len].iter().any(|c| *c) {
                    index += 1;
                    continue;
                }

                let span = &words[index..index + len];
                matches.push(DetectionMatch {
                    text: span.iter().map(|w| w.word.as_str()).collect::<Vec<_>>().join(" "),
                    term: phrase.text.clone(),
                    category: phrase.category,
                    match_type: MatchType::Phrase,
                    start: span[0].start,
                    end: span.iter().map(|w| w.end).fold(span[0].start, f64::max),
                    weight: self.policy.weight(phrase.category) * self.config.phrase_bonus,
                    suppressed: false,
                    context_modifier: 1.0,
                });
                covered[index..index + len].iter_mut().for_each(|c| *c = true);
                index += len;
            }
        }

        matches
    }

    /// `(suppressed, modifier)` for a matched term at `index`
    fn context_modifier(&self, term: &str, index: usize, plain: &[String]) -> (bool, f64) {
        let Some(rule) = self.lexicon.context_rule(term) else {
            return (false, 1.0);
        };

        let window = self.config.context_window;
        let from = index.saturating_sub(window);
        let to = (index + window + 1).min(plain.len());
        let nearby = || {
            (from..to)
                .filter(move |i| *i != index)
                .map(move |i| plain[i].as_str())
        };

        if nearby().any(|w| rule.neutral.contains(w)) {
            debug!(term, "Match suppressed by neutral context");
            (true, 0.0)
        } else if nearby().any(|w| rule.explicit.contains(w)) {
            (false, self.config.amplify_factor)
        } else {
            (false, 1.0)
        }
    }

    /// Smallest modifier among the safe contexts whose markers appear
    fn safe_context(&self, plain: &[String]) -> (f64, Vec<SafeContextKind>) {
        let mut modifier = 1.0_f64;
        let mut kinds: Vec<SafeContextKind> = Vec::new();

        for context in self.lexicon.safe_contexts() {
            if plain.iter().any(|w| context.markers.contains(w)) {
                modifier = modifier.min(context.modifier);
                kinds.push(context.kind);
            }
        }

        (modifier, kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanview_common::Action;

    fn words(text: &str, start: f64, step: f64) -> Vec<Word> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| {
                let t = start + i as f64 * step;
                Word::new(w, t, t + step * 0.8)
            })
            .collect()
    }

    fn detector() -> LexicalDetector {
        LexicalDetector::new(
            Arc::new(Lexicon::builtin()),
            Arc::new(PolicyTable::default()),
            DetectorConfig::default(),
        )
    }

    #[test]
    fn test_segments_split_on_gap() {
        let mut input = words("one two three", 0.0, 0.3);
        input.extend(words("four five", 5.0, 0.3));
        let segments = detector().segment_words(&input);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 3);
        assert_eq!(segments[1].len(), 2);
    }

    #[test]
    fn test_malformed_words_dropped() {
        let input = vec![
            Word::new("hello", 0.0, 0.5),
            Word::new("bad", f64::NAN, 1.0),
            Word::new("reversed", 2.0, 1.0),
        ];
        let segments = detector().segment_words(&input);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 1);
    }

    #[test]
    fn test_whitelisted_containment_never_flags() {
        let score = detector().score_segment(&words("we had class in the classroom", 0.0, 0.4));
        assert_eq!(score.active_match_count(), 0);
        assert!(!score.flagged);
    }

    #[test]
    fn test_profanity_flags() {
        let score = detector().score_segment(&words("oh shit that hurt", 0.0, 0.4));
        assert!(score.flagged);
        assert_eq!(score.category, Some(ContentCategory::Profanity));
        assert!((score.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_context_suppression() {
        let score = detector().score_segment(&words("the donkey is an ass really", 0.0, 0.4));
        assert_eq!(score.matches.len(), 1);
        assert!(score.matches[0].suppressed);
        assert_eq!(score.matches[0].context_modifier, 0.0);
        assert_eq!(score.active_match_count(), 0);
        assert_eq!(score.confidence, 0.0);
        assert!(!score.flagged);
    }

    #[test]
    fn test_context_amplification() {
        let score = detector().score_segment(&words("kiss my ass", 0.0, 0.4));
        assert_eq!(score.matches.len(), 1);
        assert_eq!(score.matches[0].context_modifier, 1.5);
        assert!((score.raw_score - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_phrase_supersedes_words() {
        let score = detector().score_segment(&words("you son of a bitch", 0.0, 0.4));
        assert_eq!(score.matches.len(), 1);
        assert_eq!(score.matches[0].match_type, MatchType::Phrase);
        assert!((score.matches[0].weight - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_safe_context_dampens_but_never_zeroes() {
        let score = detector().score_segment(&words("the doctor said shit happens", 0.0, 0.4));
        assert_eq!(score.safe_contexts, vec![SafeContextKind::Medical]);
        assert!(score.total_score > 0.0);
        assert!(score.total_score < score.raw_score);
        assert!(!score.flagged);
    }

    #[test]
    fn test_unsafe_flags_at_lower_threshold() {
        let lexicon = Lexicon::builder()
            .term("zorp", ContentCategory::Minors)
            .term("blip", ContentCategory::Profanity)
            .build();
        let policy = PolicyTable::default()
            .with_policy(
                ContentCategory::Minors,
                crate::policy::CategoryPolicy {
                    weight: 0.75,
                    threshold: 0.5,
                    action: Action::Cut,
                    precedence: 6,
                    merge_gap: 1.0,
                    unsafe_category: true,
                },
            )
            .with_policy(
                ContentCategory::Profanity,
                crate::policy::CategoryPolicy {
                    weight: 0.75,
                    threshold: 1.0,
                    action: Action::Mute,
                    precedence: 1,
                    merge_gap: 0.5,
                    unsafe_category: false,
                },
            );
        let detector = LexicalDetector::new(Arc::new(lexicon), Arc::new(policy), DetectorConfig::default());

        let unsafe_score = detector.score_segment(&words("zorp", 0.0, 0.5));
        let ordinary_score = detector.score_segment(&words("blip", 0.0, 0.5));
        assert_eq!(unsafe_score.total_score, ordinary_score.total_score);
        assert!(unsafe_score.has_unsafe_content);
        assert!(unsafe_score.flagged);
        assert!(!ordinary_score.flagged);
    }

    #[test]
    fn test_category_threshold_gates_flagging() {
        let lexicon = Lexicon::builder()
            .term("blip", ContentCategory::Profanity)
            .build();
        let policy = PolicyTable::default().with_policy(
            ContentCategory::Profanity,
            crate::policy::CategoryPolicy {
                weight: 1.0,
                threshold: 5.0,
                action: Action::Mute,
                precedence: 1,
                merge_gap: 0.5,
                unsafe_category: false,
            },
        );
        let detector = LexicalDetector::new(Arc::new(lexicon), Arc::new(policy), DetectorConfig::default());

        let score = detector.score_segment(&words("blip", 0.0, 0.5));
        assert_eq!(score.total_score, 1.0);
        assert!(!score.flagged);
        assert!((score.confidence - 1.0 / 6.0).abs() < 1e-9);
        assert!(detector.detect(&words("blip", 0.0, 0.5)).is_empty());
    }

    #[test]
    fn test_detect_spans_whole_segment() {
        let input = words("well that was some bullshit right there", 10.0, 0.5);
        let intervals = detector().detect(&input);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 10.0);
        assert!((intervals[0].end - input.last().unwrap().end).abs() < 1e-9);
        assert_eq!(intervals[0].action, Action::Mute);
        assert_eq!(intervals[0].source, MatchSource::Audio);
        assert!(intervals[0].confidence().is_some());
    }

    #[test]
    fn test_empty_input_means_no_detections() {
        assert!(detector().detect(&[]).is_empty());
        assert!(detector().detect_by_category(&[]).is_empty());
    }

    #[test]
    fn test_detect_by_category() {
        let mut input = words("shit", 0.0, 0.5);
        input.extend(words("they want to have sex", 10.0, 0.5));
        let by_category = detector().detect_by_category(&input);
        assert_eq!(by_category[&ContentCategory::Profanity].len(), 1);
        assert_eq!(by_category[&ContentCategory::Sexual].len(), 1);
        assert_eq!(
            by_category[&ContentCategory::Sexual][0].action,
            Action::Cut
        );
    }
}
