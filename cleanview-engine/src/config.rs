//! Engine configuration
//!
//! Every section is `#[serde(default)]`, so a TOML file only needs the
//! values it changes. File resolution (CLI → `CLEANVIEW_CONFIG` → platform
//! config dir → defaults) is handled by `cleanview_common::config`.

use crate::lexicon::{Lexicon, LexiconBuilder};
use crate::policy::PolicyTable;
use crate::types::ContentCategory;
use cleanview_common::Action;
use cleanview_common::config::{load_toml_config, ConfigResolver, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete engine configuration (`cleanview.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub detector: DetectorConfig,
    pub verifier: VerifierConfig,
    pub visual: VisualConfig,
    pub fusion: FusionConfig,
    pub planner: PlannerConfig,
    pub workers: WorkerConfig,
    pub project: ProjectConfig,
    pub lexicon: LexiconConfig,
    /// Per-category overrides, e.g. `[policy.violence] action = "cut"`
    pub policy: BTreeMap<ContentCategory, PolicyOverride>,
}

impl EngineConfig {
    /// Resolve and load the configuration file
    ///
    /// # Errors
    /// Fails only when a file exists but cannot be read or parsed.
    pub fn load(cli_path: Option<&Path>) -> cleanview_common::Result<Self> {
        let resolved = ConfigResolver::default().resolve(cli_path);
        if let Some((path, source)) = &resolved {
            info!("Configuration file {} (source: {:?})", path.display(), source);
        }
        load_toml_config(resolved.as_ref().map(|(path, _)| path.as_path()))
    }

    /// Policy table built from the detector thresholds and `[policy]` overrides
    pub fn policy(&self) -> PolicyTable {
        let mut table =
            PolicyTable::with_thresholds(self.detector.threshold, self.detector.unsafe_threshold);
        for (category, change) in &self.policy {
            let mut entry = table.get(*category).clone();
            if let Some(weight) = change.weight {
                entry.weight = weight;
            }
            if let Some(threshold) = change.threshold {
                entry.threshold = threshold;
            }
            if let Some(action) = change.action {
                entry.action = action;
            }
            if let Some(merge_gap) = change.merge_gap {
                entry.merge_gap = merge_gap;
            }
            table = table.with_policy(*category, entry);
        }
        table
    }

    /// Built-in lexicon extended with the configured files
    pub fn build_lexicon(&self) -> cleanview_common::Result<Lexicon> {
        let mut builder = if self.lexicon.use_builtin {
            LexiconBuilder::with_builtin()
        } else {
            Lexicon::builder()
        };
        for path in &self.lexicon.term_files {
            builder = builder.load_entries_file(path)?;
        }
        for path in &self.lexicon.whitelist_files {
            builder = builder.load_whitelist_file(path)?;
        }
        Ok(builder.build())
    }
}

/// Partial override of one category's policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub weight: Option<f64>,
    /// Minimum segment score for segments this category dominates
    pub threshold: Option<f64>,
    pub action: Option<Action>,
    pub merge_gap: Option<f64>,
}

/// Lexical detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Silence longer than this (seconds) starts a new segment
    pub segment_gap: f64,
    pub threshold: f64,
    /// Lower threshold for unsafe categories
    pub unsafe_threshold: f64,
    /// Weight multiplier for phrase matches
    pub phrase_bonus: f64,
    /// Context modifier near explicit co-occurring words
    pub amplify_factor: f64,
    /// Words on each side inspected for context rules
    pub context_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            segment_gap: 1.0,
            threshold: crate::policy::DEFAULT_THRESHOLD,
            unsafe_threshold: crate::policy::DEFAULT_UNSAFE_THRESHOLD,
            phrase_bonus: 1.2,
            amplify_factor: 1.5,
            context_window: 3,
        }
    }
}

/// Hybrid verifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub enabled: bool,
    /// Segments scoring below this are uncertain and go to the oracle
    pub uncertain_cutoff: f64,
    /// Added to confidence on a verified verdict
    pub verify_boost: f64,
    /// Confidence multiplier on a rejected verdict
    pub reject_factor: f64,
    /// Minimum exemplar similarity for the built-in oracle to commit
    pub similarity_threshold: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uncertain_cutoff: 2.0,
            verify_boost: 0.2,
            reject_factor: 0.3,
            similarity_threshold: 0.6,
        }
    }
}

/// Per-frame visual score aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub nudity_threshold: f64,
    pub violence_threshold: f64,
    /// Frames further apart than this (seconds) start a new interval
    pub frame_gap: f64,
    /// Intervals shorter than this are dropped
    pub min_duration: f64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            nudity_threshold: 0.6,
            violence_threshold: 0.7,
            frame_gap: 1.0,
            min_duration: 0.0,
        }
    }
}

/// Multimodal fusion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Visual intervals further than this from an audio interval are ignored
    pub temporal_tolerance: f64,
    /// Minimum overlap ratio (overlap / shorter duration) to fuse
    pub min_overlap: f64,
    pub audio_weight: f64,
    pub visual_weight: f64,
    /// Added to the weighted confidence when both modalities agree
    pub agreement_boost: f64,
    /// Fused segments below this confidence are not planned
    pub min_confidence: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            temporal_tolerance: 2.0,
            min_overlap: 0.3,
            audio_weight: 0.5,
            visual_weight: 0.5,
            agreement_boost: 0.2,
            min_confidence: 0.0,
        }
    }
}

/// Edit planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Keep segments shorter than this are dropped
    pub min_cut_duration: f64,
    /// Fraction of the duration above which cuts produce a warning
    pub warn_cut_ratio: f64,
    /// Padding added before each detection
    pub buffer_before: f64,
    /// Padding added after each detection
    pub buffer_after: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_cut_duration: 0.1,
            warn_cut_ratio: 0.95,
            buffer_before: 0.0,
            buffer_after: 0.0,
        }
    }
}

/// External detection worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_workers: usize,
    /// Forces a single worker
    pub low_resource_mode: bool,
    /// Delay between worker start times (milliseconds)
    pub stagger_ms: u64,
    /// Audio pipeline command; `{input}` is replaced by the media path
    pub audio_command: Vec<String>,
    /// Visual pipeline command; `{input}` is replaced by the media path
    pub visual_command: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            low_resource_mode: false,
            stagger_ms: 0,
            audio_command: Vec::new(),
            visual_command: Vec::new(),
        }
    }
}

impl WorkerConfig {
    /// Concurrency actually used
    pub fn effective_max_workers(&self) -> usize {
        if self.low_resource_mode {
            1
        } else {
            self.max_workers.max(1)
        }
    }
}

/// Interactive project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Undo log capacity; oldest entries are evicted first
    pub undo_capacity: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { undo_capacity: 100 }
    }
}

/// Lexicon sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub use_builtin: bool,
    pub term_files: Vec<PathBuf>,
    pub whitelist_files: Vec<PathBuf>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            term_files: Vec::new(),
            whitelist_files: Vec::new(),
        }
    }
}
