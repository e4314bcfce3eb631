//! Per-pad undo history over full board snapshots.
//!
//! Queue mutations can have board-wide side effects (cycle stats, global
//! windows), so undo restores a complete [`Board`] snapshot instead of
//! trying to reverse a single pad. History is still keyed by pad: each pad
//! gets its own bounded stack and undoing one pad never consumes another
//! pad's history.

use std::collections::HashMap;
use std::collections::VecDeque;

use super::board::Board;
use super::pad::PadId;

/// Snapshots retained per pad before the oldest is dropped.
pub const UNDO_DEPTH: usize = 35;

/// Bounded per-pad stacks of board snapshots.
#[derive(Debug, Default)]
pub struct UndoHistory {
    stacks: HashMap<PadId, VecDeque<Board>>,
}

impl UndoHistory {
    /// Push the pre-mutation snapshot for a pad, evicting the oldest
    /// entry once the stack is full.
    pub fn push(&mut self, pad_id: PadId, snapshot: Board) {
        let stack = self.stacks.entry(pad_id).or_default();
        stack.push_back(snapshot);
        while stack.len() > UNDO_DEPTH {
            stack.pop_front();
        }
    }

    /// Pop the most recent snapshot for a pad, if any.
    pub fn pop(&mut self, pad_id: PadId) -> Option<Board> {
        self.stacks.get_mut(&pad_id)?.pop_back()
    }

    /// Snapshots currently held for a pad.
    pub fn depth(&self, pad_id: PadId) -> usize {
        self.stacks.get(&pad_id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_stamped(updated_at: i64) -> Board {
        Board {
            updated_at,
            ..Board::new()
        }
    }

    #[test]
    fn pop_returns_snapshots_newest_first() {
        let mut history = UndoHistory::default();
        history.push(1, board_stamped(10));
        history.push(1, board_stamped(20));

        assert_eq!(history.pop(1).map(|b| b.updated_at), Some(20));
        assert_eq!(history.pop(1).map(|b| b.updated_at), Some(10));
        assert_eq!(history.pop(1).map(|b| b.updated_at), None);
    }

    #[test]
    fn stacks_are_independent_per_pad() {
        let mut history = UndoHistory::default();
        history.push(1, board_stamped(1));
        history.push(2, board_stamped(2));

        assert_eq!(history.pop(2).map(|b| b.updated_at), Some(2));
        assert_eq!(history.depth(1), 1);
        assert_eq!(history.depth(3), 0);
    }

    #[test]
    fn depth_is_bounded_and_drops_the_oldest() {
        let mut history = UndoHistory::default();
        for stamp in 0..UNDO_DEPTH as i64 + 8 {
            history.push(7, board_stamped(stamp));
        }

        assert_eq!(history.depth(7), UNDO_DEPTH);
        // The newest survives, the first eight pushes are gone.
        assert_eq!(
            history.pop(7).map(|b| b.updated_at),
            Some(UNDO_DEPTH as i64 + 7)
        );
        let mut oldest = None;
        while let Some(board) = history.pop(7) {
            oldest = Some(board.updated_at);
        }
        assert_eq!(oldest, Some(8));
    }
}
