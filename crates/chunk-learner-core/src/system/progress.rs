//! # Progress
//!
//! Completion totals across a store.
//!
//! Percentages are integer-only (rounded down), so the same store always
//! reports the same numbers.

use crate::ChunkState;
use crate::scheduler::ChunkView;
use serde::{Deserialize, Serialize};

/// Completion totals for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Total number of chunks.
    pub total: usize,
    /// Number of completed chunks.
    pub completed: usize,
    /// Number of incomplete chunks whose prerequisites are all done.
    pub available: usize,
    /// Number of incomplete chunks waiting on a prerequisite.
    pub blocked: usize,
    /// `completed * 100 / total`, rounded down. 0 for an empty store.
    pub percent_complete: u8,
}

impl Progress {
    /// Tally derived chunk states.
    #[must_use]
    pub fn from_states(states: impl IntoIterator<Item = ChunkState>) -> Self {
        let mut progress = Self::default();
        for state in states {
            progress.total = progress.total.saturating_add(1);
            match state {
                ChunkState::Completed => progress.completed = progress.completed.saturating_add(1),
                ChunkState::Available => progress.available = progress.available.saturating_add(1),
                ChunkState::Blocked => progress.blocked = progress.blocked.saturating_add(1),
            }
        }
        progress.percent_complete = percent(progress.completed, progress.total);
        progress
    }

    /// Tally a scheduler snapshot.
    #[must_use]
    pub fn from_views(views: &[ChunkView]) -> Self {
        Self::from_states(views.iter().map(|view| view.state))
    }

    /// Number of chunks not yet completed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    /// Whether every chunk is completed. False for an empty store.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let scaled = (part as u64).saturating_mul(100) / (whole as u64);
    scaled.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_is_zero_percent() {
        let progress = Progress::from_states(Vec::<ChunkState>::new());
        assert_eq!(progress, Progress::default());
        assert!(!progress.is_finished());
    }

    #[test]
    fn counts_each_state() {
        let progress = Progress::from_states([
            ChunkState::Completed,
            ChunkState::Available,
            ChunkState::Blocked,
            ChunkState::Blocked,
        ]);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.available, 1);
        assert_eq!(progress.blocked, 2);
        assert_eq!(progress.percent_complete, 25);
        assert_eq!(progress.remaining(), 3);
    }

    #[test]
    fn percent_rounds_down() {
        let progress = Progress::from_states([
            ChunkState::Completed,
            ChunkState::Completed,
            ChunkState::Available,
        ]);
        assert_eq!(progress.percent_complete, 66);
    }

    #[test]
    fn all_completed_is_finished() {
        let progress = Progress::from_states([ChunkState::Completed, ChunkState::Completed]);
        assert_eq!(progress.percent_complete, 100);
        assert!(progress.is_finished());
    }
}
