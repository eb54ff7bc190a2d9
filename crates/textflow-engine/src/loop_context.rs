//! Loop context manager
//!
//! Tracks the iteration a Looper is currently running, keyed by the
//! Looper's path. Nodes inside a loop body read it to resolve `$$` and
//! `[[i]]` markers.

use std::collections::HashMap;

/// Current iteration of one running Looper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    /// Value of the loop variable
    pub index: i64,
    /// Zero-based count of iterations already run in this pass
    pub iteration: usize,
}

/// Map from Looper path to its current frame
#[derive(Debug, Clone, Default)]
pub struct LoopContext {
    frames: HashMap<String, LoopFrame>,
}

impl LoopContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the current iteration of a Looper
    pub fn set(&mut self, looper_path: &str, frame: LoopFrame) {
        self.frames.insert(looper_path.to_string(), frame);
    }

    /// Frame of a running Looper, if any
    pub fn frame(&self, looper_path: &str) -> Option<LoopFrame> {
        self.frames.get(looper_path).copied()
    }

    /// Loop index for a Looper, 0 when it is not running
    pub fn index(&self, looper_path: &str) -> i64 {
        self.frame(looper_path).map(|f| f.index).unwrap_or(0)
    }

    /// Forget a Looper's frame
    pub fn clear(&mut self, looper_path: &str) {
        self.frames.remove(looper_path);
    }

    /// Move frames when a Looper (or one of its ancestors) is renamed
    pub(crate) fn rebase(&mut self, old_prefix: &str, new_prefix: &str) {
        let moved: Vec<String> = self
            .frames
            .keys()
            .filter(|p| *p == old_prefix || crate::identity::is_descendant(p, old_prefix))
            .cloned()
            .collect();
        for path in moved {
            if let Some(frame) = self.frames.remove(&path) {
                let new_path = crate::identity::rebase(&path, old_prefix, new_prefix);
                self.frames.insert(new_path, frame);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
