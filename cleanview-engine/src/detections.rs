//! Detection-interval file
//!
//! ```json
//! {"version": 1, "video_path": "...", "video_hash": "...", "detection_count": 2,
//!  "detections": [{"start": 1.0, "end": 2.0, "reason": "...", "action": "mute",
//!                  "source": "audio", "metadata": {}}]}
//! ```
//!
//! Missing `action`, `source` and `metadata` read as `cut`, `unknown` and
//! `{}`. Entries that do not form a valid interval are skipped with a
//! warning; the rest of the document still loads. Workers print this same
//! document on stdout.

use crate::error::EngineResult;
use cleanview_common::config::write_atomic;
use cleanview_common::TimeInterval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current detection file version
pub const DETECTION_FILE_VERSION: u32 = 1;

/// Serialized detection set for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetectionFile")]
pub struct DetectionFile {
    pub version: u32,
    pub video_path: Option<PathBuf>,
    pub video_hash: Option<String>,
    pub detection_count: usize,
    pub detections: Vec<TimeInterval>,
}

/// On-disk shape; detections stay untyped until validated one by one
#[derive(Deserialize)]
struct RawDetectionFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    video_path: Option<PathBuf>,
    #[serde(default)]
    video_hash: Option<String>,
    #[serde(default)]
    detection_count: usize,
    #[serde(default)]
    detections: Vec<serde_json::Value>,
}

impl From<RawDetectionFile> for DetectionFile {
    fn from(raw: RawDetectionFile) -> Self {
        let detections = deserialize_intervals(raw.detections);
        // detection_count is informational; the detections list wins
        if raw.detection_count != detections.len() {
            debug!(
                declared = raw.detection_count,
                actual = detections.len(),
                "Detection count does not match detections"
            );
        }
        Self {
            version: raw.version,
            video_path: raw.video_path,
            video_hash: raw.video_hash,
            detection_count: detections.len(),
            detections,
        }
    }
}

fn default_version() -> u32 {
    DETECTION_FILE_VERSION
}

impl DetectionFile {
    pub fn new(
        video_path: Option<PathBuf>,
        video_hash: Option<String>,
        detections: Vec<TimeInterval>,
    ) -> Self {
        Self {
            version: DETECTION_FILE_VERSION,
            video_path,
            video_hash,
            detection_count: detections.len(),
            detections,
        }
    }

    /// Parse a detection document
    ///
    /// Fails only when the document itself is malformed; invalid entries are
    /// dropped and `detection_count` is set to the entries kept.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        write_atomic(path, self.to_json()?.as_bytes())?;
        info!(path = %path.display(), detections = self.detections.len(), "Detections saved");
        Ok(())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// One interval as a JSON value
pub fn serialize_interval(interval: &TimeInterval) -> EngineResult<serde_json::Value> {
    Ok(serde_json::to_value(interval)?)
}

/// One interval from a JSON value, applying the documented defaults
pub fn deserialize_interval(value: serde_json::Value) -> EngineResult<TimeInterval> {
    Ok(serde_json::from_value(value)?)
}

/// Intervals from a list of JSON values, skipping entries that fail to parse
pub fn deserialize_intervals(values: Vec<serde_json::Value>) -> Vec<TimeInterval> {
    let total = values.len();
    let intervals: Vec<TimeInterval> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match deserialize_interval(value) {
            Ok(interval) => Some(interval),
            Err(e) => {
                warn!(index, error = %e, "Skipping invalid detection");
                None
            }
        })
        .collect();

    if intervals.len() < total {
        warn!(
            skipped = total - intervals.len(),
            kept = intervals.len(),
            "Invalid detections skipped"
        );
    }
    intervals
}
