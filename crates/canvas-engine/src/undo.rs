//! Undo/redo over compressed board snapshots
//!
//! Every structural change pushes a zstd-compressed JSON snapshot of the
//! board. Snapshots avoid writing an inverse for each mutation and work for
//! any change the session makes.

use std::collections::VecDeque;

use crate::constants;
use crate::error::{EngineError, Result};
use crate::types::Board;

/// Board history as a ring of compressed snapshots
///
/// `cursor` points at the snapshot matching the live board; entries after it
/// are redo history.
pub struct UndoStack {
    snapshots: VecDeque<Vec<u8>>,
    cursor: usize,
    capacity: usize,
}

fn compress(board: &Board) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(board)?;
    zstd::encode_all(json.as_slice(), constants::history::COMPRESSION_LEVEL)
        .map_err(|e| EngineError::Compression(e.to_string()))
}

impl UndoStack {
    /// Keep at most `capacity` snapshots (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record the board as the newest state
    ///
    /// Redo history is discarded. A board identical to the current snapshot
    /// is not recorded again; returns whether a snapshot was added.
    pub fn push(&mut self, board: &Board) -> Result<bool> {
        let snapshot = compress(board)?;
        if self.snapshots.get(self.cursor) == Some(&snapshot) {
            return Ok(false);
        }

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(snapshot);
        if self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.cursor = self.snapshots.len() - 1;
        Ok(true)
    }

    /// Step back; `None` at the oldest snapshot
    pub fn undo(&mut self) -> Option<Result<Board>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.load(self.cursor))
    }

    /// Step forward; `None` when there is nothing to redo
    pub fn redo(&mut self) -> Option<Result<Board>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.load(self.cursor))
    }

    /// Board at the cursor
    pub fn current(&self) -> Option<Result<Board>> {
        (!self.snapshots.is_empty()).then(|| self.load(self.cursor))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }

    /// Bytes held by all snapshots
    pub fn compressed_size(&self) -> usize {
        self.snapshots.iter().map(Vec::len).sum()
    }

    fn load(&self, index: usize) -> Result<Board> {
        let snapshot = self
            .snapshots
            .get(index)
            .ok_or_else(|| EngineError::Compression(format!("no snapshot at {}", index)))?;
        let json = zstd::decode_all(snapshot.as_slice())
            .map_err(|e| EngineError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(constants::history::MAX_SNAPSHOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BoardBuilder;

    fn board_with(label: &str) -> Board {
        BoardBuilder::new("board")
            .add_node("prompt", "text-prompt", (0.0, 0.0))
            .with_parameters(serde_json::json!({"text": label}))
            .build()
    }

    fn label(board: &Board) -> String {
        board.nodes[0].parameters["text"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_push_and_undo() {
        let mut stack = UndoStack::new(10);
        stack.push(&board_with("first")).unwrap();
        stack.push(&board_with("second")).unwrap();
        stack.push(&board_with("third")).unwrap();

        assert_eq!(label(&stack.current().unwrap().unwrap()), "third");
        assert_eq!(label(&stack.undo().unwrap().unwrap()), "second");
        assert_eq!(label(&stack.undo().unwrap().unwrap()), "first");
        assert!(stack.undo().is_none());
    }

    #[test]
    fn test_redo_and_truncate() {
        let mut stack = UndoStack::new(10);
        stack.push(&board_with("first")).unwrap();
        stack.push(&board_with("second")).unwrap();

        stack.undo();
        assert_eq!(label(&stack.redo().unwrap().unwrap()), "second");
        assert!(stack.redo().is_none());

        stack.undo();
        stack.push(&board_with("third")).unwrap();
        assert!(!stack.can_redo());
        assert_eq!(label(&stack.current().unwrap().unwrap()), "third");
    }

    #[test]
    fn test_max_snapshots() {
        let mut stack = UndoStack::new(3);
        for i in 0..5 {
            stack.push(&board_with(&format!("board_{}", i))).unwrap();
        }

        assert_eq!(stack.len(), 3);
        assert_eq!(label(&stack.current().unwrap().unwrap()), "board_4");

        stack.undo();
        stack.undo();
        assert!(!stack.can_undo());
        assert!(stack.compressed_size() > 0);
    }

    #[test]
    fn test_identical_board_not_recorded() {
        let mut stack = UndoStack::new(10);
        assert!(stack.push(&board_with("first")).unwrap());
        assert!(!stack.push(&board_with("first")).unwrap());
        assert_eq!(stack.len(), 1);

        assert!(stack.push(&board_with("second")).unwrap());
        stack.undo();
        // Same as the snapshot under the cursor, so redo history survives
        assert!(!stack.push(&board_with("first")).unwrap());
        assert!(stack.can_redo());
    }

    #[test]
    fn test_can_undo_redo() {
        let mut stack = UndoStack::default();
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());

        stack.push(&board_with("first")).unwrap();
        assert!(!stack.can_undo());

        stack.push(&board_with("second")).unwrap();
        assert!(stack.can_undo());

        stack.undo();
        assert!(stack.can_redo());

        stack.clear();
        assert!(stack.is_empty());
    }
}
