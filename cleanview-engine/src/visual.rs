//! Visual score aggregation
//!
//! Turns per-frame nudity/violence scores from an external visual model into
//! category intervals. Frames at or above the category threshold are joined
//! into one interval while consecutive hits are at most `frame_gap` apart.
//! Each interval records its peak score as `metadata.confidence`.

use crate::config::VisualConfig;
use crate::policy::PolicyTable;
use crate::types::ContentCategory;
use cleanview_common::{MatchSource, TimeInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Visual model output for one sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    /// Seconds from the start of the video
    pub timestamp: f64,
    #[serde(default)]
    pub nudity: f64,
    #[serde(default)]
    pub violence: f64,
}

impl FrameScore {
    pub fn new(timestamp: f64, nudity: f64, violence: f64) -> Self {
        Self {
            timestamp,
            nudity,
            violence,
        }
    }
}

/// Pre-aggregated visual detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDetection {
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_visual_category")]
    pub category: ContentCategory,
    #[serde(default = "default_visual_confidence")]
    pub confidence: f64,
}

fn default_visual_category() -> ContentCategory {
    ContentCategory::Nudity
}

fn default_visual_confidence() -> f64 {
    1.0
}

/// Frame-score → interval aggregator
#[derive(Debug, Clone)]
pub struct VisualAggregator {
    policy: Arc<PolicyTable>,
    config: VisualConfig,
}

/// Run of consecutive frames above threshold
struct Run {
    start: f64,
    last: f64,
    peak: f64,
    frames: usize,
}

impl VisualAggregator {
    pub fn new(policy: Arc<PolicyTable>, config: VisualConfig) -> Self {
        Self { policy, config }
    }

    /// Nudity and violence intervals from a frame sequence
    ///
    /// Frames with a non-finite timestamp are ignored. Categories with no
    /// intervals are omitted from the map.
    pub fn aggregate(&self, frames: &[FrameScore]) -> BTreeMap<ContentCategory, Vec<TimeInterval>> {
        let mut ordered: Vec<FrameScore> = frames
            .iter()
            .copied()
            .filter(|f| f.timestamp.is_finite() && f.timestamp >= 0.0)
            .collect();
        ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let channels: [(ContentCategory, f64, fn(&FrameScore) -> f64); 2] = [
            (ContentCategory::Nudity, self.config.nudity_threshold, |f| f.nudity),
            (ContentCategory::Violence, self.config.violence_threshold, |f| f.violence),
        ];

        let mut result = BTreeMap::new();
        for (category, threshold, pick) in channels {
            let intervals = self.sweep(&ordered, category, threshold, pick);
            if !intervals.is_empty() {
                result.insert(category, intervals);
            }
        }

        debug!(
            frames = ordered.len(),
            nudity = result.get(&ContentCategory::Nudity).map_or(0, Vec::len),
            violence = result.get(&ContentCategory::Violence).map_or(0, Vec::len),
            "Visual aggregation complete"
        );
        result
    }

    /// Classify pre-aggregated detections; invalid spans are skipped
    pub fn from_detections(
        &self,
        detections: &[VisualDetection],
    ) -> BTreeMap<ContentCategory, Vec<TimeInterval>> {
        let mut result: BTreeMap<ContentCategory, Vec<TimeInterval>> = BTreeMap::new();
        for detection in detections {
            let Ok(interval) = TimeInterval::new(
                detection.start,
                detection.end,
                detection.category.as_str().to_string(),
            ) else {
                debug!(start = detection.start, end = detection.end, "Skipped invalid visual detection");
                continue;
            };
            result
                .entry(detection.category)
                .or_default()
                .push(self.classify(interval, detection.category, detection.confidence, None));
        }
        result
    }

    fn sweep(
        &self,
        frames: &[FrameScore],
        category: ContentCategory,
        threshold: f64,
        pick: fn(&FrameScore) -> f64,
    ) -> Vec<TimeInterval> {
        let sample_interval = frames
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .filter(|d| *d > 0.0)
            .fold(f64::INFINITY, f64::min);
        let frame_span = if sample_interval.is_finite() {
            sample_interval.min(self.config.frame_gap.max(0.0))
        } else {
            0.0
        };

        let mut runs: Vec<Run> = Vec::new();
        for frame in frames {
            let score = pick(frame);
            if !score.is_finite() || score < threshold {
                continue;
            }
            match runs.last_mut() {
                Some(run) if frame.timestamp - run.last <= self.config.frame_gap => {
                    run.last = frame.timestamp;
                    run.peak = run.peak.max(score);
                    run.frames += 1;
                }
                _ => runs.push(Run {
                    start: frame.timestamp,
                    last: frame.timestamp,
                    peak: score,
                    frames: 1,
                }),
            }
        }

        runs.into_iter()
            .filter_map(|run| {
                let interval = TimeInterval::new(
                    run.start,
                    run.last + frame_span,
                    format!("{} (peak {:.2})", category, run.peak),
                )
                .ok()?;
                if interval.duration() < self.config.min_duration {
                    return None;
                }
                Some(self.classify(interval, category, run.peak, Some(run.frames)))
            })
            .collect()
    }

    fn classify(
        &self,
        interval: TimeInterval,
        category: ContentCategory,
        confidence: f64,
        frames: Option<usize>,
    ) -> TimeInterval {
        let interval = interval
            .with_action(self.policy.action(category))
            .with_source(MatchSource::Visual)
            .with_metadata("category", serde_json::json!(category.as_str()))
            .with_confidence(confidence);
        match frames {
            Some(count) => interval.with_metadata("frame_count", serde_json::json!(count)),
            None => interval,
        }
    }
}
