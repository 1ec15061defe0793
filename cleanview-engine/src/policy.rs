//! Category policy table
//!
//! One explicit table drives every category-dependent decision: scoring
//! weight, flag threshold, edit action, merge gap and precedence. The two
//! cross-cutting rules live here and are tested here:
//! - CUT overrides every other action ([`PolicyTable::dominant_action`])
//! - unsafe categories flag at a strictly lower threshold
//!
//! Segments are held to their dominant category's threshold.

use crate::types::ContentCategory;
use cleanview_common::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Policy for one content category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Score contribution of one active match
    pub weight: f64,
    /// Minimum segment total score to flag
    pub threshold: f64,
    pub action: Action,
    /// Higher wins when picking a segment's dominant category
    pub precedence: u8,
    /// Gap (seconds) within which intervals of this category merge
    pub merge_gap: f64,
    /// Unsafe categories use the lower unsafe threshold
    #[serde(default)]
    pub unsafe_category: bool,
}

/// Category → policy table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    entries: BTreeMap<ContentCategory, CategoryPolicy>,
    threshold: f64,
    unsafe_threshold: f64,
}

const FALLBACK_POLICY: CategoryPolicy = CategoryPolicy {
    weight: 1.0,
    threshold: DEFAULT_THRESHOLD,
    action: Action::Mute,
    precedence: 0,
    merge_gap: 0.5,
    unsafe_category: false,
};

/// Default ordinary flag threshold
pub const DEFAULT_THRESHOLD: f64 = 1.0;
/// Default unsafe flag threshold (deliberately lower)
pub const DEFAULT_UNSAFE_THRESHOLD: f64 = 0.5;

impl Default for PolicyTable {
    fn default() -> Self {
        Self::with_thresholds(DEFAULT_THRESHOLD, DEFAULT_UNSAFE_THRESHOLD)
    }
}

impl PolicyTable {
    /// Build the default table with the given thresholds.
    ///
    /// `unsafe_threshold` is clamped to at most `threshold` so unsafe content
    /// can never need more evidence than ordinary content.
    pub fn with_thresholds(threshold: f64, unsafe_threshold: f64) -> Self {
        let unsafe_threshold = unsafe_threshold.min(threshold);
        let entry = |weight: f64, action: Action, precedence: u8, merge_gap: f64, unsafe_category: bool| {
            CategoryPolicy {
                weight,
                threshold: if unsafe_category { unsafe_threshold } else { threshold },
                action,
                precedence,
                merge_gap,
                unsafe_category,
            }
        };

        let mut entries = BTreeMap::new();
        entries.insert(ContentCategory::Profanity, entry(1.0, Action::Mute, 1, 0.5, false));
        entries.insert(ContentCategory::Slur, entry(1.5, Action::Beep, 3, 0.5, false));
        entries.insert(ContentCategory::Sexual, entry(1.0, Action::Cut, 4, 1.0, false));
        entries.insert(ContentCategory::Minors, entry(2.0, Action::Cut, 6, 1.0, true));
        entries.insert(ContentCategory::Nudity, entry(1.0, Action::Cut, 5, 2.0, false));
        entries.insert(ContentCategory::Violence, entry(1.0, Action::Blur, 2, 1.0, false));
        entries.insert(ContentCategory::Custom, entry(1.0, Action::Mute, 0, 0.5, false));

        Self {
            entries,
            threshold,
            unsafe_threshold,
        }
    }

    /// Replace one category's policy
    pub fn with_policy(mut self, category: ContentCategory, policy: CategoryPolicy) -> Self {
        self.entries.insert(category, policy);
        self
    }

    /// Override just the action for a category
    pub fn with_action(mut self, category: ContentCategory, action: Action) -> Self {
        if let Some(policy) = self.entries.get_mut(&category) {
            policy.action = action;
        }
        self
    }

    /// Policy for a category; tables loaded from disk may omit entries, which
    /// then fall back to a muted, ordinary-threshold policy.
    pub fn get(&self, category: ContentCategory) -> &CategoryPolicy {
        self.entries.get(&category).unwrap_or(&FALLBACK_POLICY)
    }

    pub fn weight(&self, category: ContentCategory) -> f64 {
        self.get(category).weight
    }

    pub fn action(&self, category: ContentCategory) -> Action {
        self.get(category).action
    }

    pub fn merge_gap(&self, category: ContentCategory) -> f64 {
        self.get(category).merge_gap
    }

    pub fn is_unsafe(&self, category: ContentCategory) -> bool {
        self.get(category).unsafe_category
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn unsafe_threshold(&self) -> f64 {
        self.unsafe_threshold
    }

    /// Threshold a segment is held to
    ///
    /// The dominant category's own threshold (the table-wide threshold when
    /// the table has no entry or no category matched), lowered to
    /// `unsafe_threshold` when unsafe content is present.
    pub fn threshold_for(&self, dominant: Option<ContentCategory>, has_unsafe_content: bool) -> f64 {
        let base = dominant
            .and_then(|category| self.entries.get(&category))
            .map_or(self.threshold, |policy| policy.threshold);
        if has_unsafe_content {
            base.min(self.unsafe_threshold)
        } else {
            base
        }
    }

    /// Should a segment with this total score be flagged?
    ///
    /// Flag when `total >= threshold_for(dominant, has_unsafe_content)`. A
    /// zero score never flags.
    pub fn should_flag(
        &self,
        total_score: f64,
        dominant: Option<ContentCategory>,
        has_unsafe_content: bool,
    ) -> bool {
        total_score > 0.0 && total_score >= self.threshold_for(dominant, has_unsafe_content)
    }

    /// Highest-precedence category of the given set
    pub fn dominant_category<I>(&self, categories: I) -> Option<ContentCategory>
    where
        I: IntoIterator<Item = ContentCategory>,
    {
        categories
            .into_iter()
            .max_by_key(|c| (self.get(*c).precedence, *c))
    }

    /// Action that wins when two categories cover the same span
    pub fn dominant_action(&self, a: ContentCategory, b: ContentCategory) -> Action {
        self.action(a).dominant(self.action(b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentCategory, &CategoryPolicy)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_a_policy() {
        let table = PolicyTable::default();
        for category in ContentCategory::ALL {
            let _ = table.get(category);
        }
    }

    #[test]
    fn test_cut_overrides_mute() {
        let table = PolicyTable::default();
        assert_eq!(table.action(ContentCategory::Profanity), Action::Mute);
        assert_eq!(table.action(ContentCategory::Nudity), Action::Cut);
        assert_eq!(
            table.dominant_action(ContentCategory::Profanity, ContentCategory::Nudity),
            Action::Cut
        );
        assert_eq!(
            table.dominant_action(ContentCategory::Nudity, ContentCategory::Profanity),
            Action::Cut
        );
    }

    #[test]
    fn test_unsafe_threshold_is_strictly_lower() {
        let table = PolicyTable::default();
        assert!(table.unsafe_threshold() < table.threshold());
        assert!(
            table.get(ContentCategory::Minors).threshold
                < table.get(ContentCategory::Profanity).threshold
        );

        // Equal total score: flags only when unsafe content is present
        let score = 0.75;
        let profanity = Some(ContentCategory::Profanity);
        assert!(table.threshold_for(profanity, true) < table.threshold_for(profanity, false));
        assert!(table.should_flag(score, profanity, true));
        assert!(!table.should_flag(score, profanity, false));
        assert!(table.should_flag(score, Some(ContentCategory::Minors), true));
    }

    #[test]
    fn test_category_threshold_is_honoured() {
        let strict = CategoryPolicy {
            threshold: 5.0,
            ..table_entry(ContentCategory::Profanity)
        };
        let table = PolicyTable::default().with_policy(ContentCategory::Profanity, strict);

        assert_eq!(table.threshold_for(Some(ContentCategory::Profanity), false), 5.0);
        assert!(!table.should_flag(1.0, Some(ContentCategory::Profanity), false));
        assert!(table.should_flag(1.0, Some(ContentCategory::Sexual), false));
        // Unsafe content still caps the threshold
        assert_eq!(table.threshold_for(Some(ContentCategory::Profanity), true), 0.5);
    }

    #[test]
    fn test_missing_entry_uses_table_threshold() {
        let table: PolicyTable = serde_json::from_str(
            r#"{"entries": {}, "threshold": 2.0, "unsafe_threshold": 0.5}"#,
        )
        .unwrap();
        assert_eq!(table.threshold_for(Some(ContentCategory::Slur), false), 2.0);
        assert_eq!(table.threshold_for(None, false), 2.0);
    }

    fn table_entry(category: ContentCategory) -> CategoryPolicy {
        PolicyTable::default().get(category).clone()
    }

    #[test]
    fn test_unsafe_threshold_clamped() {
        let table = PolicyTable::with_thresholds(1.0, 3.0);
        assert_eq!(table.unsafe_threshold(), 1.0);
    }

    #[test]
    fn test_zero_score_never_flags() {
        let table = PolicyTable::with_thresholds(0.0, 0.0);
        assert!(!table.should_flag(0.0, Some(ContentCategory::Minors), true));
        assert!(!table.should_flag(0.0, None, false));
    }

    #[test]
    fn test_profanity_gap_smaller_than_nudity_gap() {
        let table = PolicyTable::default();
        assert!(table.merge_gap(ContentCategory::Profanity) < table.merge_gap(ContentCategory::Nudity));
    }

    #[test]
    fn test_dominant_category() {
        let table = PolicyTable::default();
        let dominant = table.dominant_category([
            ContentCategory::Profanity,
            ContentCategory::Minors,
            ContentCategory::Sexual,
        ]);
        assert_eq!(dominant, Some(ContentCategory::Minors));
        assert_eq!(table.dominant_category([]), None);
    }
}
