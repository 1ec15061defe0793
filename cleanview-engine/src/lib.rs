//! cleanview-engine library interface
//!
//! Detection, scoring, fusion and edit planning over a video's timeline,
//! plus the interactive Ripple Engine. Every detection stage is a pure
//! function of its inputs; only [`project::Project`] holds mutable state.

pub mod config;
pub mod detections;
pub mod detector;
pub mod error;
pub mod fusion;
pub mod lexicon;
pub mod pipeline;
pub mod planner;
pub mod policy;
pub mod project;
pub mod report;
pub mod types;
pub mod verifier;
pub mod visual;
pub mod worker;

pub use crate::config::EngineConfig;
pub use crate::detector::LexicalDetector;
pub use crate::error::{EngineError, EngineResult};
pub use crate::fusion::{AgreementLevel, FusedSegment, MultimodalFusion};
pub use crate::lexicon::Lexicon;
pub use crate::pipeline::{DetectionPipeline, PipelineInput, PipelineOutput};
pub use crate::planner::{EditPlan, EditPlanner};
pub use crate::policy::PolicyTable;
pub use crate::project::{EditDecision, EditUpdate, Project};
pub use crate::types::{ContentCategory, SegmentScore, Word};
pub use crate::verifier::{HybridVerifier, SemanticOracle, VerificationStatus};
