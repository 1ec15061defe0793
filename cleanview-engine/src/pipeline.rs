//! Detection pipeline
//!
//! Wires the pure stages together for one video:
//!
//! ```text
//! words ──► LexicalDetector ──► HybridVerifier ──┐
//!                                                ├─► MultimodalFusion ──► EditPlanner ──► EditPlan
//! frames ─► VisualAggregator ────────────────────┘
//! ```
//!
//! Audio `sexual`/`minors` intervals are fused with visual `nudity`
//! intervals; every other category goes to the planner unchanged.

use crate::config::EngineConfig;
use crate::detector::LexicalDetector;
use crate::fusion::{AgreementLevel, FusedSegment, MultimodalFusion};
use crate::planner::{EditPlan, EditPlanner};
use crate::policy::PolicyTable;
use crate::types::{ContentCategory, SegmentScore, Word};
use crate::verifier::{ExemplarOracle, HybridVerifier, VerificationStatus, VerifiedSegment};
use crate::visual::{FrameScore, VisualAggregator, VisualDetection};
use cleanview_common::TimeInterval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Categories whose audio detections are cross-checked against nudity
const FUSED_AUDIO_CATEGORIES: [ContentCategory; 2] = [ContentCategory::Sexual, ContentCategory::Minors];

/// Signal inputs for one video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    /// Media duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub frames: Vec<FrameScore>,
    /// Pre-aggregated visual intervals, used alongside `frames`
    #[serde(default)]
    pub visual_detections: Vec<VisualDetection>,
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub segment_scores: Vec<SegmentScore>,
    pub verifications: Vec<VerifiedSegment>,
    pub fused: Vec<FusedSegment>,
    /// Per-category intervals handed to the planner
    pub detections: BTreeMap<ContentCategory, Vec<TimeInterval>>,
    pub plan: EditPlan,
}

impl PipelineOutput {
    /// Planner input flattened for a detection file
    pub fn all_detections(&self) -> Vec<TimeInterval> {
        let mut all: Vec<TimeInterval> = self.detections.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.start.total_cmp(&b.start));
        all
    }
}

/// Detector → verifier → fusion → planner
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    detector: LexicalDetector,
    verifier: Option<HybridVerifier>,
    visual: VisualAggregator,
    fusion: MultimodalFusion,
    planner: EditPlanner,
}

impl DetectionPipeline {
    pub fn new(
        detector: LexicalDetector,
        verifier: Option<HybridVerifier>,
        visual: VisualAggregator,
        fusion: MultimodalFusion,
        planner: EditPlanner,
    ) -> Self {
        Self {
            detector,
            verifier,
            visual,
            fusion,
            planner,
        }
    }

    /// Build every stage from configuration
    ///
    /// # Errors
    /// Fails only when a configured lexicon file cannot be read.
    pub fn from_config(config: &EngineConfig) -> cleanview_common::Result<Self> {
        let lexicon = Arc::new(config.build_lexicon()?);
        let policy = Arc::new(config.policy());
        Ok(Self::with_parts(config, lexicon, policy))
    }

    /// Build with an injected lexicon and policy table
    pub fn with_parts(
        config: &EngineConfig,
        lexicon: Arc<crate::lexicon::Lexicon>,
        policy: Arc<PolicyTable>,
    ) -> Self {
        let verifier = config.verifier.enabled.then(|| {
            HybridVerifier::new(config.verifier.clone()).with_oracle(Arc::new(ExemplarOracle::builtin(
                config.verifier.similarity_threshold,
            )))
        });

        Self::new(
            LexicalDetector::new(lexicon, policy.clone(), config.detector.clone()),
            verifier,
            VisualAggregator::new(policy.clone(), config.visual.clone()),
            MultimodalFusion::new(config.fusion.clone()),
            EditPlanner::new(policy, config.planner.clone()),
        )
    }

    pub fn detector(&self) -> &LexicalDetector {
        &self.detector
    }

    pub fn planner(&self) -> &EditPlanner {
        &self.planner
    }

    /// Run every stage; empty inputs produce an edit-free plan
    pub fn run(&self, input: &PipelineInput) -> PipelineOutput {
        let segment_scores = self.detector.score_words(&input.words);

        let verifications = match &self.verifier {
            Some(verifier) => verifier.verify(&segment_scores),
            None => Vec::new(),
        };
        let audio = self.audio_intervals(&segment_scores, &verifications);

        let mut visual = self.visual.aggregate(&input.frames);
        for (category, intervals) in self.visual.from_detections(&input.visual_detections) {
            visual.entry(category).or_default().extend(intervals);
        }

        let (detections, fused) = self.fuse(audio, visual);
        let plan = self.planner.plan(input.duration, &detections);

        info!(
            segments = segment_scores.len(),
            fused = fused.len(),
            cuts = plan.cut_intervals.len(),
            audio_edits = plan.audio_edits.len(),
            output_duration = plan.output_duration,
            "Detection pipeline complete"
        );

        PipelineOutput {
            segment_scores,
            verifications,
            fused,
            detections,
            plan,
        }
    }

    /// Plan from stored detections: intervals tagged with a `category`
    /// metadata entry follow that category's policy, the rest keep their
    /// own action
    pub fn plan_detections(&self, duration: f64, intervals: &[TimeInterval]) -> EditPlan {
        let mut by_category: BTreeMap<ContentCategory, Vec<TimeInterval>> = BTreeMap::new();
        let mut uncategorized = Vec::new();
        for interval in intervals {
            match interval_category(interval) {
                Some(category) => by_category.entry(category).or_default().push(interval.clone()),
                None => uncategorized.push(interval.clone()),
            }
        }
        self.planner.plan_with(duration, &by_category, &uncategorized)
    }

    /// Audio intervals for segments that survive verification
    fn audio_intervals(
        &self,
        scores: &[SegmentScore],
        verifications: &[VerifiedSegment],
    ) -> BTreeMap<ContentCategory, Vec<TimeInterval>> {
        let mut audio: BTreeMap<ContentCategory, Vec<TimeInterval>> = BTreeMap::new();

        let decided: Vec<(&SegmentScore, f64)> = if verifications.is_empty() {
            scores
                .iter()
                .filter(|s| s.flagged)
                .map(|s| (s, s.confidence))
                .collect()
        } else {
            // A verified segment flags even below the lexical threshold;
            // otherwise the lexical decision stands unless rejected
            verifications
                .iter()
                .filter(|v| {
                    v.should_flag()
                        && (v.score.flagged || v.status == VerificationStatus::Verified)
                })
                .map(|v| (&v.score, v.confidence))
                .collect()
        };

        for (score, confidence) in decided {
            let (Some(category), Some(interval)) = (score.category, self.detector.segment_interval(score)) else {
                continue;
            };
            audio
                .entry(category)
                .or_default()
                .push(interval.with_confidence(confidence));
        }
        audio
    }

    /// Fuse audio sexual/minors with visual nudity; pass everything else through
    fn fuse(
        &self,
        mut audio: BTreeMap<ContentCategory, Vec<TimeInterval>>,
        mut visual: BTreeMap<ContentCategory, Vec<TimeInterval>>,
    ) -> (BTreeMap<ContentCategory, Vec<TimeInterval>>, Vec<FusedSegment>) {
        let audio_side: Vec<TimeInterval> = FUSED_AUDIO_CATEGORIES
            .iter()
            .filter_map(|c| audio.remove(c))
            .flatten()
            .collect();
        let visual_side = visual.remove(&ContentCategory::Nudity).unwrap_or_default();

        let fused = self.fusion.fuse(&audio_side, &visual_side);

        let mut detections = audio;
        for (category, intervals) in visual {
            detections.entry(category).or_default().extend(intervals);
        }
        for segment in &fused {
            let category = match segment.agreement {
                AgreementLevel::VisualOnly => ContentCategory::Nudity,
                AgreementLevel::Both | AgreementLevel::AudioOnly => segment
                    .audio
                    .as_ref()
                    .and_then(|a| interval_category(&a.interval))
                    .unwrap_or(ContentCategory::Sexual),
            };
            detections
                .entry(category)
                .or_default()
                .push(segment.interval.clone());
        }

        (detections, fused)
    }
}

/// Category recorded in interval metadata
pub fn interval_category(interval: &TimeInterval) -> Option<ContentCategory> {
    interval
        .metadata
        .get("category")
        .and_then(|v| v.as_str())
        .map(ContentCategory::parse_lenient)
}
