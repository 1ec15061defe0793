//! Human-readable and JSON reports for plans and projects

use crate::planner::EditPlan;
use crate::project::Project;
use cleanview_common::human_time::{format_duration, format_timecode, percent_of};
use cleanview_common::TimeInterval;
use serde_json::{json, Value};
use std::fmt::Write;

/// Multi-line plain-text summary of a plan
pub fn summary_text(plan: &EditPlan) -> String {
    let mut out = String::new();
    let cut_total = plan.total_cut_duration();

    let _ = writeln!(out, "Edit plan");
    let _ = writeln!(out, "  Original duration: {}", format_duration(plan.original_duration));
    let _ = writeln!(
        out,
        "  Output duration:   {} ({:.1}% removed)",
        format_duration(plan.output_duration),
        percent_of(cut_total, plan.original_duration)
    );
    let _ = writeln!(
        out,
        "  Cuts: {}  Audio edits: {}  Blurs: {}  Keep segments: {}",
        plan.cut_intervals.len(),
        plan.audio_edits.len(),
        plan.blur_intervals.len(),
        plan.keep_segments.len()
    );

    if !plan.category_counts.is_empty() {
        let _ = writeln!(out, "  Detections by category:");
        for (category, count) in &plan.category_counts {
            let _ = writeln!(out, "    {:<10} {}", category.as_str(), count);
        }
    }

    if plan.is_empty() {
        let _ = writeln!(out, "  No edits.");
    } else {
        let _ = writeln!(out, "Timeline (cuts in source time, other edits in output time):");
        for interval in timeline_entries(plan) {
            let _ = writeln!(
                out,
                "  {} - {}  {:<5} {}",
                format_timecode(interval.start),
                format_timecode(interval.end),
                interval.action.as_str(),
                interval.reason
            );
        }
    }

    for warning in &plan.warnings {
        let _ = writeln!(out, "WARNING: {}", warning);
    }

    out
}

/// JSON timeline of a plan with per-edit entries and totals
pub fn timeline_json(plan: &EditPlan) -> Value {
    let entries: Vec<Value> = timeline_entries(plan)
        .into_iter()
        .map(|interval| {
            json!({
                "start": interval.start,
                "end": interval.end,
                "start_timecode": format_timecode(interval.start),
                "end_timecode": format_timecode(interval.end),
                "duration": interval.duration(),
                "action": interval.action,
                "source": interval.source,
                "reason": interval.reason,
                "confidence": interval.confidence(),
            })
        })
        .collect();

    json!({
        "original_duration": plan.original_duration,
        "output_duration": plan.output_duration,
        "total_cut_duration": plan.total_cut_duration(),
        "cut_percent": percent_of(plan.total_cut_duration(), plan.original_duration),
        "edit_count": plan.edit_count(),
        "category_counts": plan.category_counts,
        "keep_segments": plan
            .keep_segments
            .iter()
            .map(|k| json!({"start": k.start, "end": k.end}))
            .collect::<Vec<_>>(),
        "edits": entries,
        "warnings": plan.warnings,
    })
}

/// JSON timeline of a project's edit list
pub fn project_timeline(project: &Project) -> Value {
    let edits: Vec<Value> = project
        .edits()
        .iter()
        .map(|edit| {
            json!({
                "id": edit.id,
                "action": edit.action,
                "source": edit.source,
                "reason": edit.reason,
                "source_start": edit.source_start,
                "source_end": edit.source_end,
                "output_start": edit.output_start,
                "output_end": edit.output_end,
                "source_timecode": format!(
                    "{} - {}",
                    format_timecode(edit.source_start),
                    format_timecode(edit.source_end)
                ),
            })
        })
        .collect();

    json!({
        "input_path": project.input_path,
        "input_duration": project.input_duration,
        "output_duration": project.output_duration(),
        "total_cut_duration": project.total_cut_duration(),
        "ripple_mode": project.ripple_mode(),
        "snap_enabled": project.snap_enabled(),
        "edit_count": project.edit_count(),
        "can_undo": project.can_undo(),
        "can_redo": project.can_redo(),
        "edits": edits,
    })
}

/// All edits of a plan ordered by start
fn timeline_entries(plan: &EditPlan) -> Vec<&TimeInterval> {
    let mut entries: Vec<&TimeInterval> = plan
        .cut_intervals
        .iter()
        .chain(&plan.audio_edits)
        .chain(&plan.blur_intervals)
        .collect();
    entries.sort_by(|a, b| a.start.total_cmp(&b.start));
    entries
}
