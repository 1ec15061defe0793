//! Ripple Engine integration tests: edit lists, undo/redo, sidecar
//! persistence and configuration-driven undo capacity.

use cleanview_common::{Action, TimeInterval};
use cleanview_engine::config::PlannerConfig;
use cleanview_engine::project::sidecar_path;
use cleanview_engine::{EditPlanner, EditUpdate, EngineConfig, EngineError, PolicyTable, Project};
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

fn planner() -> EditPlanner {
    EditPlanner::new(Arc::new(PolicyTable::default()), PlannerConfig::default())
}

// ============================================================================
// Ripple
// ============================================================================

#[test]
fn test_cut_then_mute_shifts_mute_in_output() {
    let mut project = Project::new("movie.mp4", 120.0, 24.0);
    project.add_edit(10.0, 15.0, Action::Cut, "scene").unwrap();
    let mute = project.add_edit(20.0, 21.0, Action::Mute, "word").unwrap();

    let edit = project.get_edit(&mute).unwrap();
    assert_eq!((edit.output_start, edit.output_end), (15.0, 16.0));
    assert_eq!(project.output_duration(), 115.0);
    assert_eq!(project.source_to_output(30.0), 25.0);

    project.set_ripple_mode(false);
    let edit = project.get_edit(&mute).unwrap();
    assert_eq!((edit.output_start, edit.output_end), (20.0, 21.0));
}

#[test]
fn test_edit_plan_matches_project() {
    let mut project = Project::new("movie.mp4", 60.0, 24.0);
    project.add_edit(5.0, 10.0, Action::Cut, "a").unwrap();
    project.add_edit(8.0, 12.0, Action::Cut, "b").unwrap();
    project.add_edit(30.0, 31.0, Action::Beep, "c").unwrap();

    let plan = project.to_edit_plan(&planner());
    assert_eq!(plan.cut_intervals.len(), 1);
    assert_eq!(plan.total_cut_duration(), 7.0);
    assert_eq!(plan.output_duration, project.output_duration());
    assert_eq!(plan.audio_edits[0].start, 23.0);
}

// ============================================================================
// Undo / redo
// ============================================================================

#[test]
fn test_full_undo_redo_sequence() {
    let mut project = Project::new("movie.mp4", 60.0, 24.0);
    let id = project.add_edit(1.0, 2.0, Action::Mute, "one").unwrap();
    project
        .update_edit(
            &id,
            EditUpdate {
                action: Some(Action::Cut),
                ..Default::default()
            },
        )
        .unwrap();
    project.remove_edit(&id).unwrap();
    assert_eq!(project.edit_count(), 0);

    assert!(project.undo());
    assert_eq!(project.get_edit(&id).unwrap().action, Action::Cut);
    assert!(project.undo());
    assert_eq!(project.get_edit(&id).unwrap().action, Action::Mute);
    assert!(project.undo());
    assert_eq!(project.edit_count(), 0);
    assert!(!project.undo());

    assert!(project.redo());
    assert!(project.redo());
    assert_eq!(project.get_edit(&id).unwrap().action, Action::Cut);
    assert_eq!(project.output_duration(), 59.0);
}

#[test]
fn test_unknown_id_is_reported() {
    let mut project = Project::new("movie.mp4", 60.0, 24.0);
    assert!(matches!(
        project.remove_edit("missing"),
        Err(EngineError::EditNotFound(_))
    ));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_sidecar_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("movie.mp4");
    std::fs::write(&video, b"not really a video").unwrap();
    let path = sidecar_path(&video);

    let mut project = Project::new(&video, 90.0, 25.0).with_fingerprint("abc");
    project.add_edit(10.0, 20.0, Action::Cut, "scene").unwrap();
    project.add_edit(40.0, 41.0, Action::Mute, "word").unwrap();
    project.set_ripple_mode(false);
    project.save(&path).unwrap();

    // A changed fingerprint only warns
    let loaded = Project::load(&path, Some("different"), 100).unwrap();
    assert_eq!(loaded.edit_count(), 2);
    assert!(!loaded.ripple_mode());
    assert_eq!(loaded.input_fps, 25.0);
    assert_eq!(loaded.edits(), project.edits());
    // The undo log is not persisted
    assert!(!loaded.can_undo());
}

#[test]
fn test_load_missing_and_corrupt_files_fail() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.cleanview.json");
    assert!(matches!(Project::load(&missing, None, 10), Err(EngineError::Io(_))));

    let corrupt = dir.path().join("corrupt.cleanview.json");
    std::fs::write(&corrupt, "{ not json").unwrap();
    assert!(matches!(Project::load(&corrupt, None, 10), Err(EngineError::Json(_))));
}

#[test]
fn test_imported_detections_are_individually_undoable() {
    let mut project = Project::new("movie.mp4", 60.0, 24.0);
    let detections = vec![
        TimeInterval::new(1.0, 2.0, "profanity: shit")
            .unwrap()
            .with_action(Action::Mute),
        TimeInterval::new(3.0, 4.0, "info").unwrap().with_action(Action::None),
        TimeInterval::new(10.0, 12.0, "nudity").unwrap(),
    ];

    let ids = project.import_detections(&detections);
    assert_eq!(ids.len(), 2);
    assert_eq!(project.output_duration(), 58.0);

    assert!(project.undo());
    assert_eq!(project.edit_count(), 1);
    assert_eq!(project.output_duration(), 60.0);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
#[serial]
fn test_undo_capacity_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("cleanview.toml");
    std::fs::write(&config_path, "[project]\nundo_capacity = 2\n").unwrap();

    let config = EngineConfig::load(Some(&config_path)).unwrap();
    assert_eq!(config.project.undo_capacity, 2);

    let mut project =
        Project::new("movie.mp4", 60.0, 24.0).with_undo_capacity(config.project.undo_capacity);
    for i in 0..3 {
        let start = i as f64 * 5.0;
        project.add_edit(start, start + 1.0, Action::Mute, "w").unwrap();
    }

    assert!(project.undo());
    assert!(project.undo());
    assert!(!project.undo());
    assert_eq!(project.edit_count(), 1);
}
