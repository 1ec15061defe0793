//! Edit Planner
//!
//! Merges every category's detections into one minimal, non-overlapping
//! render plan.
//!
//! # Steps
//! 1. Buffer and merge each category with its own merge gap
//! 2. Assign each category's action from the policy table
//! 3. Union all CUT intervals into one master cut list and re-merge
//! 4. Merge mute/beep/blur within their action, never against cuts; any
//!    such interval fully inside a cut is dropped
//! 5. Invert the cuts into keep segments; keep segments shorter than
//!    `min_cut_duration` are dropped and folded into the neighbouring cut
//! 6. Remap surviving mute/beep/blur intervals to output coordinates
//!
//! Cuts removing more than `warn_cut_ratio` of the duration are reported as
//! a warning in the plan, never as an error.

use crate::config::PlannerConfig;
use crate::policy::PolicyTable;
use crate::types::ContentCategory;
use cleanview_common::human_time::format_duration;
use cleanview_common::interval::{
    add_buffer_to_intervals, compute_keep_segments, merge_intervals, total_duration,
};
use cleanview_common::{Action, TimeInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Render plan handed to the external renderer
///
/// Cut and keep intervals are in source coordinates; audio edits and blur
/// intervals are in output coordinates (after cuts) and carry their source
/// span in `metadata.source_start` / `metadata.source_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    pub original_duration: f64,
    pub output_duration: f64,
    pub cut_intervals: Vec<TimeInterval>,
    /// Mute and beep edits
    pub audio_edits: Vec<TimeInterval>,
    pub blur_intervals: Vec<TimeInterval>,
    pub keep_segments: Vec<TimeInterval>,
    /// Detections per category before merging
    pub category_counts: BTreeMap<ContentCategory, usize>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl EditPlan {
    pub fn total_cut_duration(&self) -> f64 {
        total_duration(&self.cut_intervals)
    }

    /// Fraction of the source removed by cuts
    pub fn cut_ratio(&self) -> f64 {
        if self.original_duration > 0.0 {
            self.total_cut_duration() / self.original_duration
        } else {
            0.0
        }
    }

    pub fn edit_count(&self) -> usize {
        self.cut_intervals.len() + self.audio_edits.len() + self.blur_intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edit_count() == 0
    }
}

/// Map a source time to the output timeline by removing every preceding cut
///
/// Times inside a cut map to the cut's output position.
pub fn source_to_output(time: f64, cuts: &[TimeInterval]) -> f64 {
    let removed: f64 = cuts
        .iter()
        .filter(|cut| cut.start < time)
        .map(|cut| cut.end.min(time) - cut.start)
        .sum();
    (time - removed).max(0.0)
}

/// Interval shifted into output coordinates; `cuts` must be merged
///
/// Returns `None` when nothing of the interval survives the cuts.
pub fn remap_to_output(interval: &TimeInterval, cuts: &[TimeInterval]) -> Option<TimeInterval> {
    let start = source_to_output(interval.start, cuts);
    let end = source_to_output(interval.end, cuts);
    if end <= start && interval.duration() > 0.0 {
        return None;
    }
    Some(
        interval
            .with_bounds(start, end)
            .with_metadata("source_start", serde_json::json!(interval.start))
            .with_metadata("source_end", serde_json::json!(interval.end)),
    )
}

/// Widen cuts over the gaps `keeps` leaves uncovered
///
/// `compute_keep_segments` drops keep segments shorter than the minimum, so
/// the cut list is rebuilt as the exact complement of `keeps` in
/// `[0, duration]`. Each gap folds the cuts it holds into one interval.
fn absorb_dropped_keeps(
    duration: f64,
    cuts: &[TimeInterval],
    keeps: &[TimeInterval],
) -> Vec<TimeInterval> {
    let mut gaps = Vec::with_capacity(keeps.len() + 1);
    let mut cursor = 0.0_f64;
    for keep in keeps {
        if keep.start > cursor {
            gaps.push((cursor, keep.start));
        }
        cursor = cursor.max(keep.end);
    }
    if cursor < duration {
        gaps.push((cursor, duration));
    }

    gaps.into_iter()
        .filter_map(|(start, end)| {
            let folded = cuts
                .iter()
                .filter(|cut| cut.start < end && cut.end > start)
                .cloned()
                .reduce(|a, b| a.merge(&b))?;
            if folded.start > start || folded.end < end {
                debug!(
                    start,
                    end,
                    absorbed = (folded.start - start) + (end - folded.end),
                    "Cut widened over a short keep segment"
                );
            }
            Some(folded.with_bounds(start, end))
        })
        .collect()
}

/// Category detections → render plan
#[derive(Debug, Clone)]
pub struct EditPlanner {
    policy: Arc<PolicyTable>,
    config: PlannerConfig,
}

impl EditPlanner {
    pub fn new(policy: Arc<PolicyTable>, config: PlannerConfig) -> Self {
        Self { policy, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan from per-category detection lists
    pub fn plan(
        &self,
        duration: f64,
        detections: &BTreeMap<ContentCategory, Vec<TimeInterval>>,
    ) -> EditPlan {
        self.plan_with(duration, detections, &[])
    }

    /// Plan from per-category lists plus uncategorized intervals that keep
    /// their own action (merged with zero gap)
    pub fn plan_with(
        &self,
        duration: f64,
        detections: &BTreeMap<ContentCategory, Vec<TimeInterval>>,
        uncategorized: &[TimeInterval],
    ) -> EditPlan {
        let duration = duration.max(0.0);
        let mut category_counts = BTreeMap::new();
        let mut actioned: Vec<TimeInterval> = Vec::new();

        for (category, intervals) in detections {
            if intervals.is_empty() {
                continue;
            }
            category_counts.insert(*category, intervals.len());

            let buffered = add_buffer_to_intervals(
                intervals,
                self.config.buffer_before,
                self.config.buffer_after,
                Some(duration),
            );
            let action = self.policy.action(*category);
            actioned.extend(
                merge_intervals(&buffered, self.policy.merge_gap(*category))
                    .into_iter()
                    .map(|interval| interval.with_action(action)),
            );
        }

        actioned.extend(
            add_buffer_to_intervals(
                uncategorized,
                self.config.buffer_before,
                self.config.buffer_after,
                Some(duration),
            )
            .into_iter()
            .filter(|i| i.action != Action::None),
        );

        self.assemble(duration, actioned, category_counts)
    }

    /// Plan from intervals that already carry their action (manual edits)
    ///
    /// Intervals with action `None` are ignored.
    pub fn plan_actions(&self, duration: f64, intervals: &[TimeInterval]) -> EditPlan {
        let duration = duration.max(0.0);
        let mut by_action: BTreeMap<&'static str, Vec<TimeInterval>> = BTreeMap::new();
        for interval in intervals.iter().filter(|i| i.action != Action::None) {
            by_action
                .entry(interval.action.as_str())
                .or_default()
                .push(interval.clone());
        }

        let actioned = by_action
            .values()
            .flat_map(|list| merge_intervals(list, 0.0))
            .collect();
        self.assemble(duration, actioned, BTreeMap::new())
    }

    fn assemble(
        &self,
        duration: f64,
        actioned: Vec<TimeInterval>,
        category_counts: BTreeMap<ContentCategory, usize>,
    ) -> EditPlan {
        let (cuts, others): (Vec<TimeInterval>, Vec<TimeInterval>) =
            actioned.into_iter().partition(|i| i.action == Action::Cut);

        let merged_cuts: Vec<TimeInterval> = merge_intervals(&cuts, 0.0)
            .into_iter()
            .map(|cut| cut.with_bounds(cut.start.clamp(0.0, duration), cut.end.clamp(0.0, duration)))
            .filter(|cut| cut.duration() > 0.0)
            .collect();

        let keep_segments =
            compute_keep_segments(duration, &merged_cuts, self.config.min_cut_duration);
        let cut_intervals = absorb_dropped_keeps(duration, &merged_cuts, &keep_segments);

        let mut audio_edits = Vec::new();
        let mut blur_intervals = Vec::new();
        let mut redundant = 0usize;

        for action in [Action::Mute, Action::Beep, Action::Blur] {
            let merged = merge_intervals(
                &others
                    .iter()
                    .filter(|i| i.action == action)
                    .cloned()
                    .collect::<Vec<_>>(),
                0.0,
            );
            for interval in merged {
                if cut_intervals.iter().any(|cut| cut.contains(&interval)) {
                    redundant += 1;
                    continue;
                }
                let Some(remapped) = remap_to_output(&interval, &cut_intervals) else {
                    continue;
                };
                if action == Action::Blur {
                    blur_intervals.push(remapped);
                } else {
                    audio_edits.push(remapped);
                }
            }
        }
        audio_edits.sort_by(|a, b| a.start.total_cmp(&b.start));
        blur_intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let cut_total = total_duration(&cut_intervals);
        let output_duration = (duration - cut_total).max(0.0);

        let mut warnings = Vec::new();
        if duration > 0.0 && cut_total / duration > self.config.warn_cut_ratio {
            let message = format!(
                "Cuts remove {} of {} ({:.1}%)",
                format_duration(cut_total),
                format_duration(duration),
                cut_total / duration * 100.0
            );
            warn!("{}", message);
            warnings.push(message);
        }

        info!(
            cuts = cut_intervals.len(),
            audio_edits = audio_edits.len(),
            blurs = blur_intervals.len(),
            redundant,
            output_duration,
            "Edit plan assembled"
        );

        EditPlan {
            original_duration: duration,
            output_duration,
            cut_intervals,
            audio_edits,
            blur_intervals,
            keep_segments,
            category_counts,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: f64, end: f64) -> TimeInterval {
        TimeInterval::new(start, end, "test").unwrap()
    }

    fn planner() -> EditPlanner {
        EditPlanner::new(Arc::new(PolicyTable::default()), PlannerConfig::default())
    }

    fn detections(entries: Vec<(ContentCategory, Vec<TimeInterval>)>) -> BTreeMap<ContentCategory, Vec<TimeInterval>> {
        entries.into_iter().collect()
    }

    #[test]
    fn test_empty_input_keeps_everything() {
        let plan = planner().plan(120.0, &BTreeMap::new());
        assert!(plan.is_empty());
        assert_eq!(plan.keep_segments.len(), 1);
        assert_eq!(plan.keep_segments[0].start, 0.0);
        assert_eq!(plan.keep_segments[0].end, 120.0);
        assert_eq!(plan.output_duration, 120.0);
    }

    #[test]
    fn test_category_merge_gaps_differ() {
        // 1.5s apart: nudity (gap 2.0) merges, profanity (gap 0.5) does not
        let plan = planner().plan(
            100.0,
            &detections(vec![
                (ContentCategory::Nudity, vec![iv(10.0, 11.0), iv(12.5, 13.0)]),
                (ContentCategory::Profanity, vec![iv(50.0, 51.0), iv(52.5, 53.0)]),
            ]),
        );
        assert_eq!(plan.cut_intervals.len(), 1);
        assert_eq!(plan.audio_edits.len(), 2);
        assert_eq!(plan.category_counts[&ContentCategory::Nudity], 2);
    }

    #[test]
    fn test_audio_edit_inside_cut_dropped() {
        let plan = planner().plan(
            60.0,
            &detections(vec![
                (ContentCategory::Nudity, vec![iv(10.0, 20.0)]),
                (ContentCategory::Profanity, vec![iv(12.0, 13.0), iv(30.0, 31.0)]),
            ]),
        );
        assert_eq!(plan.cut_intervals.len(), 1);
        assert_eq!(plan.audio_edits.len(), 1);
        // Shifted earlier by the 10s cut
        assert_eq!(plan.audio_edits[0].start, 20.0);
        assert_eq!(plan.audio_edits[0].end, 21.0);
        assert_eq!(plan.audio_edits[0].metadata["source_start"], serde_json::json!(30.0));
        assert_eq!(plan.output_duration, 50.0);
    }

    #[test]
    fn test_keep_segments_invert_cuts() {
        let plan = planner().plan(
            60.0,
            &detections(vec![(ContentCategory::Sexual, vec![iv(10.0, 20.0)])]),
        );
        let keeps: Vec<(f64, f64)> = plan.keep_segments.iter().map(|k| (k.start, k.end)).collect();
        assert_eq!(keeps, vec![(0.0, 10.0), (20.0, 60.0)]);
    }

    #[test]
    fn test_cut_and_mute_same_span_cut_wins() {
        let plan = planner().plan(
            30.0,
            &detections(vec![
                (ContentCategory::Profanity, vec![iv(5.0, 6.0)]),
                (ContentCategory::Sexual, vec![iv(5.0, 6.0)]),
            ]),
        );
        assert_eq!(plan.cut_intervals.len(), 1);
        assert!(plan.audio_edits.is_empty());
    }

    #[test]
    fn test_blur_remapped() {
        let plan = planner().plan(
            60.0,
            &detections(vec![
                (ContentCategory::Sexual, vec![iv(0.0, 5.0)]),
                (ContentCategory::Violence, vec![iv(10.0, 12.0)]),
            ]),
        );
        assert_eq!(plan.blur_intervals.len(), 1);
        assert_eq!(plan.blur_intervals[0].start, 5.0);
        assert_eq!(plan.blur_intervals[0].action, Action::Blur);
    }

    #[test]
    fn test_excessive_cut_is_warning() {
        let plan = planner().plan(
            10.0,
            &detections(vec![(ContentCategory::Nudity, vec![iv(0.0, 9.8)])]),
        );
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.cut_ratio() > 0.95);
    }

    #[test]
    fn test_buffers_clamped_to_duration() {
        let planner = EditPlanner::new(
            Arc::new(PolicyTable::default()),
            PlannerConfig {
                buffer_before: 1.0,
                buffer_after: 2.0,
                ..Default::default()
            },
        );
        let plan = planner.plan(
            11.0,
            &detections(vec![(ContentCategory::Sexual, vec![iv(0.5, 10.0)])]),
        );
        assert_eq!(plan.cut_intervals[0].start, 0.0);
        assert_eq!(plan.cut_intervals[0].end, 11.0);
        assert_eq!(plan.output_duration, 0.0);
    }

    #[test]
    fn test_short_keep_between_cuts_is_folded_into_cut() {
        let plan = planner().plan(
            60.0,
            &detections(vec![
                (ContentCategory::Sexual, vec![iv(10.0, 20.0)]),
                (ContentCategory::Nudity, vec![iv(20.05, 30.0)]),
                (ContentCategory::Profanity, vec![iv(40.0, 41.0)]),
            ]),
        );

        let keeps: Vec<(f64, f64)> = plan.keep_segments.iter().map(|k| (k.start, k.end)).collect();
        assert_eq!(keeps, vec![(0.0, 10.0), (30.0, 60.0)]);
        assert_eq!(plan.cut_intervals.len(), 1);
        assert_eq!((plan.cut_intervals[0].start, plan.cut_intervals[0].end), (10.0, 30.0));

        let kept: f64 = plan.keep_segments.iter().map(|k| k.duration()).sum();
        assert_eq!(kept, plan.output_duration);
        assert_eq!(plan.output_duration, 40.0);

        assert_eq!(plan.audio_edits.len(), 1);
        assert_eq!(plan.audio_edits[0].start, 20.0);
        assert_eq!(plan.audio_edits[0].end, 21.0);
    }

    #[test]
    fn test_short_keep_at_edges_is_folded_into_cut() {
        let plan = planner().plan(
            30.0,
            &detections(vec![(ContentCategory::Sexual, vec![iv(0.05, 10.0), iv(20.0, 29.95)])]),
        );

        let bounds: Vec<(f64, f64)> = plan.cut_intervals.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(bounds, vec![(0.0, 10.0), (20.0, 30.0)]);
        assert_eq!(plan.keep_segments.len(), 1);
        assert_eq!(plan.output_duration, 10.0);
        assert!(plan.cut_intervals[0].reason.contains("test"));
    }

    #[test]
    fn test_source_to_output() {
        let cuts = vec![iv(10.0, 15.0), iv(30.0, 40.0)];
        assert_eq!(source_to_output(5.0, &cuts), 5.0);
        assert_eq!(source_to_output(12.0, &cuts), 10.0);
        assert_eq!(source_to_output(20.0, &cuts), 15.0);
        assert_eq!(source_to_output(50.0, &cuts), 35.0);
    }

    #[test]
    fn test_plan_actions_from_manual_edits() {
        let edits = vec![
            iv(10.0, 15.0).with_action(Action::Cut),
            iv(20.0, 21.0).with_action(Action::Mute),
            iv(25.0, 26.0).with_action(Action::None),
        ];
        let plan = planner().plan_actions(60.0, &edits);
        assert_eq!(plan.cut_intervals.len(), 1);
        assert_eq!(plan.audio_edits.len(), 1);
        assert_eq!(plan.audio_edits[0].start, 15.0);
        assert!(plan.category_counts.is_empty());
    }
}
