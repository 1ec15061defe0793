//! Project sidecar file
//!
//! JSON next to the input video. Saves are atomic. Output coordinates are
//! written for external readers but recomputed on load. The undo log is
//! session-only and never persisted.

use super::{EditDecision, Project};
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use cleanview_common::config::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current sidecar format version
pub const PROJECT_VERSION: u32 = 1;

/// Suffix appended to the input file name
pub const SIDECAR_SUFFIX: &str = ".cleanview.json";

/// On-disk project layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: u32,
    pub input_path: PathBuf,
    #[serde(default)]
    pub input_fingerprint: Option<String>,
    pub input_duration: f64,
    #[serde(default)]
    pub input_fps: f64,
    #[serde(default)]
    pub edits: Vec<EditDecision>,
    #[serde(default = "default_ripple_mode")]
    pub ripple_mode: bool,
    #[serde(default)]
    pub snap_enabled: bool,
    #[serde(default)]
    pub detection_metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

fn default_ripple_mode() -> bool {
    true
}

/// `movie.mp4` → `movie.mp4.cleanview.json`
pub fn sidecar_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

impl Project {
    /// Snapshot of the persisted fields
    pub fn to_file(&self) -> ProjectFile {
        ProjectFile {
            version: PROJECT_VERSION,
            input_path: self.input_path.clone(),
            input_fingerprint: self.input_fingerprint.clone(),
            input_duration: self.input_duration,
            input_fps: self.input_fps,
            edits: self.edits.clone(),
            ripple_mode: self.ripple_mode,
            snap_enabled: self.snap_enabled,
            detection_metadata: self.detection_metadata.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    /// Write the project atomically
    ///
    /// # Errors
    /// Serialization and I/O errors are returned to the caller.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(&self.to_file())?;
        write_atomic(path, json.as_bytes())?;
        info!(path = %path.display(), edits = self.edits.len(), "Project saved");
        Ok(())
    }

    /// Load a project file
    ///
    /// A fingerprint different from `current_fingerprint` only logs a
    /// warning; the load proceeds.
    ///
    /// # Errors
    /// Missing file, invalid JSON or an unsupported version are returned to
    /// the caller, never swallowed.
    pub fn load(
        path: &Path,
        current_fingerprint: Option<&str>,
        undo_capacity: usize,
    ) -> EngineResult<Project> {
        let content = std::fs::read_to_string(path)?;
        let file: ProjectFile = serde_json::from_str(&content)?;

        if file.version > PROJECT_VERSION {
            return Err(EngineError::Project(format!(
                "{} has version {}, newest supported is {}",
                path.display(),
                file.version,
                PROJECT_VERSION
            )));
        }

        if let (Some(saved), Some(current)) = (file.input_fingerprint.as_deref(), current_fingerprint) {
            if saved != current {
                warn!(
                    path = %path.display(),
                    input = %file.input_path.display(),
                    "Input fingerprint changed since the project was saved; edits may not line up"
                );
            }
        }

        let project = Project::from_parts(file, undo_capacity);
        info!(path = %path.display(), edits = project.edit_count(), "Project loaded");
        Ok(project)
    }
}
