//! Ripple Engine
//!
//! A [`Project`] owns the interactive edit list for one input video. Edits
//! are mutated only through `add_edit`, `remove_edit` and `update_edit`;
//! each mutation pushes a full snapshot onto a bounded undo log, and output
//! coordinates are recomputed after every structural change.
//!
//! # Ripple mode
//! On: decisions are visited in source order with a running cut offset.
//! CUT decisions get `output = source − offset` and then add their length
//! to the offset; every other decision gets `output = source − offset`.
//! Off: `output == source`.
//!
//! Projects are single-threaded; callers serialize mutations.

pub mod history;
pub mod store;

pub use history::{EditHistory, HistoryAction, HistoryEntry};
pub use store::{sidecar_path, ProjectFile, PROJECT_VERSION};

use crate::error::{EngineError, EngineResult};
use crate::planner::{self, EditPlan, EditPlanner};
use chrono::{DateTime, Utc};
use cleanview_common::interval::merge_intervals;
use cleanview_common::{Action, MatchSource, TimeInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// One edit in the project timeline
///
/// `output_start` / `output_end` are derived from the source span and the
/// ripple mode; they are never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditDecision {
    pub id: String,
    pub source_start: f64,
    pub source_end: f64,
    #[serde(default)]
    pub output_start: f64,
    #[serde(default)]
    pub output_end: f64,
    pub action: Action,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub source: MatchSource,
}

impl EditDecision {
    pub fn duration(&self) -> f64 {
        self.source_end - self.source_start
    }

    pub fn contains_time(&self, time: f64) -> bool {
        self.source_start <= time && time <= self.source_end
    }

    /// Source span as an interval
    pub fn to_interval(&self) -> Option<TimeInterval> {
        TimeInterval::new(self.source_start, self.source_end, self.reason.clone())
            .ok()
            .map(|i| {
                i.with_action(self.action)
                    .with_source(self.source)
                    .with_metadata("edit_id", serde_json::json!(self.id))
            })
    }
}

/// Partial change applied by [`Project::update_edit`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditUpdate {
    pub source_start: Option<f64>,
    pub source_end: Option<f64>,
    pub action: Option<Action>,
    pub reason: Option<String>,
}

/// Interactive edit session for one input
#[derive(Debug, Clone)]
pub struct Project {
    pub input_path: PathBuf,
    pub input_fingerprint: Option<String>,
    pub input_duration: f64,
    pub input_fps: f64,
    edits: Vec<EditDecision>,
    ripple_mode: bool,
    snap_enabled: bool,
    pub detection_metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    history: EditHistory,
}

impl Project {
    /// New empty project with ripple mode on and snapping off
    pub fn new(input_path: impl Into<PathBuf>, input_duration: f64, input_fps: f64) -> Self {
        let now = Utc::now();
        Self {
            input_path: input_path.into(),
            input_fingerprint: None,
            input_duration: input_duration.max(0.0),
            input_fps: input_fps.max(0.0),
            edits: Vec::new(),
            ripple_mode: true,
            snap_enabled: false,
            detection_metadata: BTreeMap::new(),
            created_at: now,
            modified_at: now,
            history: EditHistory::default(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.input_fingerprint = Some(fingerprint.into());
        self
    }

    /// Replace the undo log with one of the given capacity
    pub fn with_undo_capacity(mut self, capacity: usize) -> Self {
        self.history = EditHistory::new(capacity);
        self
    }

    // ------------------------------------------------------------------
    // Mutations (undoable)
    // ------------------------------------------------------------------

    /// Add an edit; returns its id
    ///
    /// # Errors
    /// `InvalidEdit` for non-finite or negative bounds, `start > end`, or
    /// action `None`.
    pub fn add_edit(
        &mut self,
        source_start: f64,
        source_end: f64,
        action: Action,
        reason: impl Into<String>,
    ) -> EngineResult<String> {
        self.add_edit_from(source_start, source_end, action, reason, MatchSource::Manual)
    }

    fn add_edit_from(
        &mut self,
        source_start: f64,
        source_end: f64,
        action: Action,
        reason: impl Into<String>,
        source: MatchSource,
    ) -> EngineResult<String> {
        let (source_start, source_end) = self.checked_span(source_start, source_end)?;
        if action == Action::None {
            return Err(EngineError::InvalidEdit("Edit action cannot be 'none'".into()));
        }

        let edit = EditDecision {
            id: Uuid::new_v4().to_string(),
            source_start,
            source_end,
            output_start: source_start,
            output_end: source_end,
            action,
            reason: reason.into(),
            source,
        };
        let id = edit.id.clone();

        self.insert(edit.clone());
        self.history.push(HistoryEntry {
            action: HistoryAction::Add,
            edit,
            previous: None,
        });
        self.touch();
        debug!(id = %id, source_start, source_end, %action, "Edit added");
        Ok(id)
    }

    /// Remove an edit by id; returns the removed edit
    pub fn remove_edit(&mut self, id: &str) -> EngineResult<EditDecision> {
        let removed = self
            .take(id)
            .ok_or_else(|| EngineError::EditNotFound(id.to_string()))?;

        self.history.push(HistoryEntry {
            action: HistoryAction::Remove,
            edit: removed.clone(),
            previous: None,
        });
        self.touch();
        debug!(id, "Edit removed");
        Ok(removed)
    }

    /// Change bounds, action or reason of an edit
    pub fn update_edit(&mut self, id: &str, update: EditUpdate) -> EngineResult<EditDecision> {
        let previous = self
            .get_edit(id)
            .cloned()
            .ok_or_else(|| EngineError::EditNotFound(id.to_string()))?;

        let (source_start, source_end) = self.checked_span(
            update.source_start.unwrap_or(previous.source_start),
            update.source_end.unwrap_or(previous.source_end),
        )?;
        let action = update.action.unwrap_or(previous.action);
        if action == Action::None {
            return Err(EngineError::InvalidEdit("Edit action cannot be 'none'".into()));
        }

        let updated = EditDecision {
            source_start,
            source_end,
            action,
            reason: update.reason.unwrap_or_else(|| previous.reason.clone()),
            ..previous.clone()
        };

        self.take(id);
        self.insert(updated.clone());
        self.history.push(HistoryEntry {
            action: HistoryAction::Modify,
            edit: updated,
            previous: Some(previous),
        });
        self.touch();

        self.get_edit(id)
            .cloned()
            .ok_or_else(|| EngineError::EditNotFound(id.to_string()))
    }

    /// Import detection intervals as individual (undoable) edits
    ///
    /// Intervals with action `None` are skipped. Returns the new ids.
    pub fn import_detections(&mut self, intervals: &[TimeInterval]) -> Vec<String> {
        let mut ids = Vec::new();
        for interval in intervals {
            match self.add_edit_from(
                interval.start,
                interval.end,
                interval.action,
                interval.reason.clone(),
                interval.source,
            ) {
                Ok(id) => ids.push(id),
                Err(e) => debug!(%interval, error = %e, "Detection not imported"),
            }
        }
        self.detection_metadata
            .insert("imported_count".into(), serde_json::json!(ids.len()));
        self.detection_metadata
            .insert("imported_at".into(), serde_json::json!(Utc::now().to_rfc3339()));
        ids
    }

    /// Remove every edit, one undoable removal each; returns the count
    pub fn clear(&mut self) -> usize {
        let ids: Vec<String> = self.edits.iter().map(|e| e.id.clone()).collect();
        ids.iter().filter(|id| self.remove_edit(id).is_ok()).count()
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Revert the last mutation; false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.undo() else {
            return false;
        };

        match entry.action {
            HistoryAction::Add => {
                self.take(&entry.edit.id);
            }
            HistoryAction::Remove => self.insert(entry.edit),
            HistoryAction::Modify => {
                self.take(&entry.edit.id);
                if let Some(previous) = entry.previous {
                    self.insert(previous);
                }
            }
        }
        self.touch();
        true
    }

    /// Re-apply the last undone mutation; false when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo() else {
            return false;
        };

        match entry.action {
            HistoryAction::Add => self.insert(entry.edit),
            HistoryAction::Remove => {
                self.take(&entry.edit.id);
            }
            HistoryAction::Modify => {
                self.take(&entry.edit.id);
                self.insert(entry.edit);
            }
        }
        self.touch();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    pub fn ripple_mode(&self) -> bool {
        self.ripple_mode
    }

    /// Switch ripple mode; recomputes output times, not undoable
    pub fn set_ripple_mode(&mut self, enabled: bool) {
        self.ripple_mode = enabled;
        self.recompute_output_times();
    }

    pub fn snap_enabled(&self) -> bool {
        self.snap_enabled
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.snap_enabled = enabled;
    }

    /// Nearest frame boundary when snapping is on and the frame rate is known
    pub fn snap(&self, time: f64) -> f64 {
        if self.snap_enabled && self.input_fps > 0.0 {
            (time * self.input_fps).round() / self.input_fps
        } else {
            time
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Edits ordered by source start
    pub fn edits(&self) -> &[EditDecision] {
        &self.edits
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    pub fn get_edit(&self, id: &str) -> Option<&EditDecision> {
        self.edits.iter().find(|e| e.id == id)
    }

    /// Edits whose source span contains the time
    pub fn edits_at(&self, time: f64) -> Vec<&EditDecision> {
        self.edits.iter().filter(|e| e.contains_time(time)).collect()
    }

    /// Union length of all CUT edits
    pub fn total_cut_duration(&self) -> f64 {
        cleanview_common::interval::total_duration(&self.cut_intervals())
    }

    pub fn output_duration(&self) -> f64 {
        (self.input_duration - self.total_cut_duration()).max(0.0)
    }

    /// Position of a source time in the output; identity when ripple is off
    pub fn source_to_output(&self, time: f64) -> f64 {
        if self.ripple_mode {
            planner::source_to_output(time, &merge_intervals(&self.cut_intervals(), 0.0))
        } else {
            time
        }
    }

    /// Every edit as a source-coordinate interval
    pub fn to_intervals(&self) -> Vec<TimeInterval> {
        self.edits.iter().filter_map(EditDecision::to_interval).collect()
    }

    /// Render plan for the current edit list
    pub fn to_edit_plan(&self, planner: &EditPlanner) -> EditPlan {
        planner.plan_actions(self.input_duration, &self.to_intervals())
    }

    /// Recompute derived output coordinates
    pub fn recompute_output_times(&mut self) {
        if !self.ripple_mode {
            for edit in &mut self.edits {
                edit.output_start = edit.source_start;
                edit.output_end = edit.source_end;
            }
            return;
        }

        let mut offset = 0.0_f64;
        // End of the cut coverage already counted, so overlapping cuts
        // contribute their union once
        let mut counted_until = f64::NEG_INFINITY;

        for edit in &mut self.edits {
            edit.output_start = (edit.source_start - offset).max(0.0);
            edit.output_end = (edit.source_end - offset).max(edit.output_start);

            if edit.action == Action::Cut {
                let from = edit.source_start.max(counted_until);
                if edit.source_end > from {
                    offset += edit.source_end - from;
                }
                counted_until = counted_until.max(edit.source_end);
            }
        }
    }

    fn cut_intervals(&self) -> Vec<TimeInterval> {
        self.edits
            .iter()
            .filter(|e| e.action == Action::Cut)
            .filter_map(EditDecision::to_interval)
            .collect()
    }

    fn checked_span(&self, start: f64, end: f64) -> EngineResult<(f64, f64)> {
        if !start.is_finite() || !end.is_finite() {
            return Err(EngineError::InvalidEdit(format!(
                "Edit bounds must be finite: [{}, {}]",
                start, end
            )));
        }
        if start < 0.0 {
            return Err(EngineError::InvalidEdit(format!("Edit start {} is negative", start)));
        }
        if start > end {
            return Err(EngineError::InvalidEdit(format!(
                "Edit start {} is after end {}",
                start, end
            )));
        }

        let (mut start, mut end) = (self.snap(start), self.snap(end));
        if self.input_duration > 0.0 {
            start = start.min(self.input_duration);
            end = end.min(self.input_duration);
        }
        Ok((start, end.max(start)))
    }

    /// Insert keeping source order (ties by end, then id)
    fn insert(&mut self, edit: EditDecision) {
        self.edits.push(edit);
        self.edits.sort_by(|a, b| {
            a.source_start
                .total_cmp(&b.source_start)
                .then_with(|| a.source_end.total_cmp(&b.source_end))
                .then_with(|| a.id.cmp(&b.id))
        });
        self.recompute_output_times();
    }

    fn take(&mut self, id: &str) -> Option<EditDecision> {
        let index = self.edits.iter().position(|e| e.id == id)?;
        let removed = self.edits.remove(index);
        self.recompute_output_times();
        Some(removed)
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Restore persisted state; output times are recomputed
    pub(crate) fn from_parts(file: ProjectFile, undo_capacity: usize) -> Self {
        let mut project = Self {
            input_path: file.input_path,
            input_fingerprint: file.input_fingerprint,
            input_duration: file.input_duration,
            input_fps: file.input_fps,
            edits: Vec::new(),
            ripple_mode: file.ripple_mode,
            snap_enabled: file.snap_enabled,
            detection_metadata: file.detection_metadata,
            created_at: file.created_at,
            modified_at: file.modified_at,
            history: EditHistory::new(undo_capacity),
        };
        for edit in file.edits {
            if edit.source_start.is_finite() && edit.source_end.is_finite() && edit.source_start <= edit.source_end {
                project.edits.push(edit);
            } else {
                debug!(id = %edit.id, "Dropped persisted edit with invalid bounds");
            }
        }
        project.edits.sort_by(|a, b| {
            a.source_start
                .total_cmp(&b.source_start)
                .then_with(|| a.source_end.total_cmp(&b.source_end))
                .then_with(|| a.id.cmp(&b.id))
        });
        project.recompute_output_times();
        project
    }

    /// Path of the input this project edits
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }
}
