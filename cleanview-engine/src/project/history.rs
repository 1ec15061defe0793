//! Bounded undo/redo log of full edit snapshots

use super::EditDecision;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default undo capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// Kind of structural mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Add,
    Remove,
    Modify,
}

/// One undoable mutation
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    /// Edit after the mutation (the removed edit for `Remove`)
    pub edit: EditDecision,
    /// Edit before the mutation; only for `Modify`
    pub previous: Option<EditDecision>,
}

/// Undo stack with FIFO eviction plus a redo stack
#[derive(Debug, Clone)]
pub struct EditHistory {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EditHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new mutation; clears the redo stack
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.push_undo(entry);
    }

    /// Entry to revert, moved onto the redo stack
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo.pop_back()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Entry to re-apply, moved back onto the undo stack
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo.pop()?;
        self.push_undo(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanview_common::{Action, MatchSource};

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            action: HistoryAction::Add,
            edit: EditDecision {
                id: id.to_string(),
                source_start: 0.0,
                source_end: 1.0,
                output_start: 0.0,
                output_end: 1.0,
                action: Action::Cut,
                reason: String::new(),
                source: MatchSource::Manual,
            },
            previous: None,
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = EditHistory::new(2);
        history.push(entry("a"));
        history.push(entry("b"));
        history.push(entry("c"));
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.undo().unwrap().edit.id, "c");
        assert_eq!(history.undo().unwrap().edit.id, "b");
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = EditHistory::default();
        history.push(entry("a"));
        history.undo();
        assert!(history.can_redo());
        history.push(entry("b"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_redo_returns_to_undo() {
        let mut history = EditHistory::default();
        history.push(entry("a"));
        history.undo();
        assert_eq!(history.redo().unwrap().edit.id, "a");
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history = EditHistory::default();
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }
}
