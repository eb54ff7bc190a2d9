//! Undo/redo history
//!
//! Two kinds of entries share one bounded stack:
//!
//! - Targeted edits (parameter values, renames, positions, globals) store
//!   the [`EditOp`] that reverses them and the one that replays them.
//! - Structural edits (create, destroy, connect, disconnect, reparent,
//!   load) store a full flowstate snapshot, serialised to JSON and
//!   compressed with zstd.
//!
//! Recording can be suspended; suspension nests, so composite edits can
//! disable it around their parts.

use std::collections::VecDeque;

use crate::error::{NodeEngineError, Result};
use crate::flowstate::Flowstate;
use crate::parameter::ParameterValue;

/// A reversible targeted edit
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    SetParameter {
        path: String,
        name: String,
        value: ParameterValue,
    },
    /// Rename the node currently at `path`
    Rename { path: String, name: String },
    SetPosition { path: String, position: (f64, f64) },
    /// `None` deletes the variable
    SetGlobal { key: String, value: Option<String> },
}

#[derive(Debug, Clone)]
pub(crate) enum UndoAction {
    /// Compressed flowstate of the graph before the edit
    Snapshot(Vec<u8>),
    Op { undo: EditOp, redo: EditOp },
}

/// One entry of the history
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub description: String,
    pub(crate) action: UndoAction,
}

impl UndoEntry {
    pub(crate) fn snapshot(description: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            description: description.into(),
            action: UndoAction::Snapshot(bytes),
        }
    }

    /// Whether the entry holds a full snapshot
    pub fn is_snapshot(&self) -> bool {
        matches!(self.action, UndoAction::Snapshot(_))
    }
}

/// Undo and redo stacks with a recording switch
pub struct UndoManager {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    limit: usize,
    suspended: usize,
    compression_level: i32,
}

impl UndoManager {
    pub fn new(limit: usize, compression_level: i32) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
            suspended: 0,
            compression_level,
        }
    }

    /// Whether edits are currently recorded
    pub fn is_recording(&self) -> bool {
        self.suspended == 0
    }

    pub fn disable(&mut self) {
        self.suspended += 1;
    }

    pub fn enable(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    /// Push a new entry; clears the redo stack
    fn record(&mut self, entry: UndoEntry) {
        if !self.is_recording() {
            return;
        }
        log::debug!("Recorded undo entry '{}'", entry.description);
        self.redo.clear();
        self.push_undo_keep_redo(entry);
    }

    pub(crate) fn record_snapshot(&mut self, description: &str, bytes: Vec<u8>) {
        self.record(UndoEntry::snapshot(description, bytes));
    }

    pub(crate) fn record_op(&mut self, description: &str, undo: EditOp, redo: EditOp) {
        self.record(UndoEntry {
            description: description.to_string(),
            action: UndoAction::Op { undo, redo },
        });
    }

    pub(crate) fn push_undo_keep_redo(&mut self, entry: UndoEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub(crate) fn push_redo(&mut self, entry: UndoEntry) {
        self.redo.push(entry);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoEntry> {
        self.undo.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<UndoEntry> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Descriptions of the undo stack, oldest first
    pub fn undo_descriptions(&self) -> Vec<&str> {
        self.undo.iter().map(|e| e.description.as_str()).collect()
    }

    /// Descriptions of the redo stack, next redo last
    pub fn redo_descriptions(&self) -> Vec<&str> {
        self.redo.iter().map(|e| e.description.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Total compressed size of all snapshots
    pub fn compressed_size(&self) -> usize {
        self.undo
            .iter()
            .chain(self.redo.iter())
            .map(|e| match &e.action {
                UndoAction::Snapshot(bytes) => bytes.len(),
                UndoAction::Op { .. } => 0,
            })
            .sum()
    }

    pub(crate) fn compress(&self, document: &Flowstate) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(document)?;
        zstd::encode_all(&json[..], self.compression_level)
            .map_err(|e| NodeEngineError::Compression(e.to_string()))
    }

    pub(crate) fn decompress(&self, bytes: &[u8]) -> Result<Flowstate> {
        let json =
            zstd::decode_all(bytes).map_err(|e| NodeEngineError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(
            crate::constants::defaults::UNDO_LIMIT,
            crate::constants::defaults::SNAPSHOT_COMPRESSION_LEVEL,
        )
    }
}
