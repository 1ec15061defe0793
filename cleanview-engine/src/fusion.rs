//! Multimodal Fusion
//!
//! Aligns independently produced audio- and visual-derived intervals by
//! temporal overlap and boosts confidence where both agree.
//!
//! # Algorithm
//! 1. Audio intervals are visited in start order
//! 2. Each picks the unclaimed visual interval with the highest overlap
//!    ratio (`overlap / shorter duration`) among those within
//!    `temporal_tolerance`
//! 3. Ratio ≥ `min_overlap` → one fused segment over the union span,
//!    agreement `both`, confidence
//!    `audio × audio_weight + visual × visual_weight + agreement_boost`
//!    capped at 1.0; the visual interval is claimed
//! 4. Otherwise the audio interval stands alone (`audio_only`, no boost)
//! 5. Unclaimed visual intervals become `visual_only` (no boost)

use crate::config::FusionConfig;
use cleanview_common::interval::algebra::overlaps;
use cleanview_common::TimeInterval;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Signal source of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Visual,
}

/// One modality's detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityScore {
    pub modality: Modality,
    pub interval: TimeInterval,
    /// Raw detector score (lexical total or visual peak)
    pub score: f64,
    pub confidence: f64,
}

impl ModalityScore {
    /// Read score and confidence from interval metadata.
    ///
    /// Missing confidence means the detector was certain (1.0); missing
    /// score falls back to the confidence.
    pub fn from_interval(modality: Modality, interval: TimeInterval) -> Self {
        let confidence = interval.confidence().unwrap_or(1.0).clamp(0.0, 1.0);
        let score = interval
            .metadata
            .get("score")
            .and_then(|v| v.as_f64())
            .unwrap_or(confidence);
        Self {
            modality,
            interval,
            score,
            confidence,
        }
    }
}

/// Which modalities support a fused detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLevel {
    Both,
    AudioOnly,
    VisualOnly,
}

impl AgreementLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::AudioOnly => "audio_only",
            Self::VisualOnly => "visual_only",
        }
    }
}

/// Result of one fusion pass entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSegment {
    /// Union span; `metadata.confidence` holds the fused confidence
    pub interval: TimeInterval,
    pub agreement: AgreementLevel,
    pub confidence: f64,
    pub overlap_ratio: f64,
    pub audio: Option<ModalityScore>,
    pub visual: Option<ModalityScore>,
}

/// `overlap / min(duration)`; a zero-length interval scores 1.0 inside the
/// other and 0.0 outside it
pub fn overlap_ratio(a: &TimeInterval, b: &TimeInterval) -> f64 {
    let shorter = a.duration().min(b.duration());
    if shorter <= 0.0 {
        let (point, other) = if a.duration() <= b.duration() { (a, b) } else { (b, a) };
        return if other.contains_time(point.start) { 1.0 } else { 0.0 };
    }
    (a.overlap_duration(b) / shorter).clamp(0.0, 1.0)
}

/// Audio/visual fusion pass
#[derive(Debug, Clone, Default)]
pub struct MultimodalFusion {
    config: FusionConfig,
}

impl MultimodalFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse interval streams; confidence is read from interval metadata
    pub fn fuse(&self, audio: &[TimeInterval], visual: &[TimeInterval]) -> Vec<FusedSegment> {
        self.fuse_scores(
            audio
                .iter()
                .cloned()
                .map(|i| ModalityScore::from_interval(Modality::Audio, i))
                .collect(),
            visual
                .iter()
                .cloned()
                .map(|i| ModalityScore::from_interval(Modality::Visual, i))
                .collect(),
        )
    }

    pub fn fuse_scores(
        &self,
        mut audio: Vec<ModalityScore>,
        mut visual: Vec<ModalityScore>,
    ) -> Vec<FusedSegment> {
        audio.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));
        visual.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));

        let mut claimed = vec![false; visual.len()];
        let mut fused: Vec<FusedSegment> = Vec::with_capacity(audio.len() + visual.len());

        for audio_score in audio {
            let best = visual
                .iter()
                .enumerate()
                .filter(|(i, v)| {
                    !claimed[*i]
                        && overlaps(&audio_score.interval, &v.interval, self.config.temporal_tolerance)
                })
                .map(|(i, v)| (i, overlap_ratio(&audio_score.interval, &v.interval)))
                .fold(None::<(usize, f64)>, |best, (i, ratio)| match best {
                    Some((_, best_ratio)) if best_ratio >= ratio => best,
                    _ => Some((i, ratio)),
                });

            match best {
                Some((index, ratio)) if ratio >= self.config.min_overlap => {
                    claimed[index] = true;
                    fused.push(self.agree(audio_score, visual[index].clone(), ratio));
                }
                _ => fused.push(single(audio_score, AgreementLevel::AudioOnly)),
            }
        }

        for (index, visual_score) in visual.into_iter().enumerate() {
            if !claimed[index] {
                fused.push(single(visual_score, AgreementLevel::VisualOnly));
            }
        }

        let before = fused.len();
        fused.retain(|f| f.confidence >= self.config.min_confidence);
        if fused.len() < before {
            debug!(
                dropped = before - fused.len(),
                min_confidence = self.config.min_confidence,
                "Dropped low-confidence fused segments"
            );
        }
        fused.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));

        info!(
            both = fused.iter().filter(|f| f.agreement == AgreementLevel::Both).count(),
            audio_only = fused.iter().filter(|f| f.agreement == AgreementLevel::AudioOnly).count(),
            visual_only = fused.iter().filter(|f| f.agreement == AgreementLevel::VisualOnly).count(),
            "Multimodal fusion complete"
        );
        fused
    }

    fn agree(&self, audio: ModalityScore, visual: ModalityScore, ratio: f64) -> FusedSegment {
        let confidence = (audio.confidence * self.config.audio_weight
            + visual.confidence * self.config.visual_weight
            + self.config.agreement_boost)
            .clamp(0.0, 1.0);

        let interval = audio
            .interval
            .merge(&visual.interval)
            .with_metadata("agreement", serde_json::json!(AgreementLevel::Both.as_str()))
            .with_confidence(confidence);

        FusedSegment {
            interval,
            agreement: AgreementLevel::Both,
            confidence,
            overlap_ratio: ratio,
            audio: Some(audio),
            visual: Some(visual),
        }
    }
}

fn single(score: ModalityScore, agreement: AgreementLevel) -> FusedSegment {
    let interval = score
        .interval
        .clone()
        .with_metadata("agreement", serde_json::json!(agreement.as_str()))
        .with_confidence(score.confidence);
    let (audio, visual) = match score.modality {
        Modality::Audio => (Some(score), None),
        Modality::Visual => (None, Some(score)),
    };

    FusedSegment {
        confidence: interval.confidence().unwrap_or(0.0),
        interval,
        agreement,
        overlap_ratio: 0.0,
        audio,
        visual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanview_common::{Action, MatchSource};

    fn interval(start: f64, end: f64, confidence: f64, source: MatchSource) -> TimeInterval {
        TimeInterval::new(start, end, format!("{}", source))
            .unwrap()
            .with_source(source)
            .with_confidence(confidence)
    }

    #[test]
    fn test_overlap_ratio() {
        let a = interval(0.0, 10.0, 1.0, MatchSource::Audio);
        let b = interval(8.0, 12.0, 1.0, MatchSource::Visual);
        assert!((overlap_ratio(&a, &b) - 0.5).abs() < 1e-9);

        let point = interval(5.0, 5.0, 1.0, MatchSource::Visual);
        assert_eq!(overlap_ratio(&a, &point), 1.0);
        let outside = interval(20.0, 20.0, 1.0, MatchSource::Visual);
        assert_eq!(overlap_ratio(&a, &outside), 0.0);
    }

    #[test]
    fn test_agreement_boosts_above_both_inputs() {
        let audio = vec![interval(10.0, 14.0, 0.6, MatchSource::Audio)];
        let visual = vec![interval(12.0, 18.0, 0.7, MatchSource::Visual)];

        let fused = MultimodalFusion::default().fuse(&audio, &visual);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].agreement, AgreementLevel::Both);
        assert!(fused[0].confidence > 0.6);
        assert!(fused[0].confidence > 0.7);
        assert!((fused[0].confidence - 0.85).abs() < 1e-9);
        assert_eq!(fused[0].interval.start, 10.0);
        assert_eq!(fused[0].interval.end, 18.0);
        assert_eq!(fused[0].interval.confidence(), Some(fused[0].confidence));
    }

    #[test]
    fn test_non_overlapping_never_fuse() {
        let audio = vec![interval(0.0, 2.0, 0.9, MatchSource::Audio)];
        let visual = vec![interval(3.0, 5.0, 0.9, MatchSource::Visual)];

        let fused = MultimodalFusion::default().fuse(&audio, &visual);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].agreement, AgreementLevel::AudioOnly);
        assert_eq!(fused[1].agreement, AgreementLevel::VisualOnly);
        assert_eq!(fused[0].confidence, 0.9);
        assert_eq!(fused[1].confidence, 0.9);
    }

    #[test]
    fn test_small_overlap_below_minimum() {
        // overlap 0.5s of a 4s shorter interval = 12.5%
        let audio = vec![interval(0.0, 4.0, 0.5, MatchSource::Audio)];
        let visual = vec![interval(3.5, 10.0, 0.5, MatchSource::Visual)];
        let fused = MultimodalFusion::default().fuse(&audio, &visual);
        assert!(fused.iter().all(|f| f.agreement != AgreementLevel::Both));
    }

    #[test]
    fn test_visual_claimed_once() {
        let audio = vec![
            interval(0.0, 4.0, 0.5, MatchSource::Audio),
            interval(2.0, 5.0, 0.5, MatchSource::Audio),
        ];
        let visual = vec![interval(1.0, 5.0, 0.5, MatchSource::Visual)];
        let fused = MultimodalFusion::default().fuse(&audio, &visual);

        assert_eq!(fused.len(), 2);
        assert_eq!(
            fused.iter().filter(|f| f.agreement == AgreementLevel::Both).count(),
            1
        );
        assert_eq!(fused[0].agreement, AgreementLevel::Both);
    }

    #[test]
    fn test_best_ratio_wins() {
        let audio = vec![interval(10.0, 12.0, 0.5, MatchSource::Audio)];
        let visual = vec![
            interval(9.0, 10.5, 0.5, MatchSource::Visual),
            interval(10.0, 13.0, 0.5, MatchSource::Visual),
        ];
        let fused = MultimodalFusion::default().fuse(&audio, &visual);
        let both = fused.iter().find(|f| f.agreement == AgreementLevel::Both).unwrap();
        assert_eq!(both.visual.as_ref().unwrap().interval.start, 10.0);
    }

    #[test]
    fn test_fused_cut_dominates() {
        let audio = vec![interval(0.0, 2.0, 0.5, MatchSource::Audio).with_action(Action::Mute)];
        let visual = vec![interval(0.5, 2.5, 0.5, MatchSource::Visual).with_action(Action::Cut)];
        let fused = MultimodalFusion::default().fuse(&audio, &visual);
        assert_eq!(fused[0].interval.action, Action::Cut);
    }

    #[test]
    fn test_min_confidence_filter() {
        let fusion = MultimodalFusion::new(FusionConfig {
            min_confidence: 0.5,
            ..Default::default()
        });
        let fused = fusion.fuse(&[interval(0.0, 1.0, 0.2, MatchSource::Audio)], &[]);
        assert!(fused.is_empty());
    }

    #[test]
    fn test_agreement_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AgreementLevel::AudioOnly).unwrap(),
            "\"audio_only\""
        );
    }
}
