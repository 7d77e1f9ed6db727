//! # Scheduler
//!
//! Dependency-aware answers to "can this chunk be completed now?" and
//! "what should be worked on next?".
//!
//! The scheduler holds only a shared reference to a store and never mutates
//! it. Every query recomputes from a fresh read, so chunk state
//! (`Blocked` / `Available` / `Completed`) is derived, never stored.
//!
//! Only direct prerequisites are checked. Transitive readiness follows by
//! induction as long as every completion went through the gate.
//!
//! Chunks trapped in a dependency cycle (only possible through raw
//! `insert_dependency`) simply never become available.

use crate::store::ChunkStore;
use crate::system::Progress;
use crate::{Chunk, ChunkError, ChunkId, ChunkState, Dependency};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of the completion gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Every direct prerequisite is completed (or there are none).
    Ready,
    /// The chunk is already completed; completing it again is a no-op.
    AlreadyCompleted,
    /// These direct prerequisites are still incomplete.
    Blocked(Vec<Chunk>),
}

impl Gate {
    /// Whether `mark_completed` may proceed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Gate::Ready)
    }

    /// The incomplete prerequisites, empty unless blocked.
    #[must_use]
    pub fn blockers(&self) -> &[Chunk] {
        match self {
            Gate::Blocked(blockers) => blockers,
            Gate::Ready | Gate::AlreadyCompleted => &[],
        }
    }
}

/// Result of the gate-then-mark workflow in [`complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The chunk is now completed.
    Completed(Chunk),
    /// The chunk was completed before; nothing changed.
    AlreadyCompleted(Chunk),
    /// Nothing changed; `blockers` must be completed first.
    Blocked { chunk: Chunk, blockers: Vec<Chunk> },
}

/// A chunk together with its derived state and direct prerequisite ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkView {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub state: ChunkState,
    pub depends_on: Vec<ChunkId>,
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Read-only scheduling queries over a `ChunkStore`.
#[derive(Debug)]
pub struct Scheduler<'a, S: ChunkStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ChunkStore + ?Sized> Scheduler<'a, S> {
    /// Create a scheduler reading through `store`.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Completion gate for `id`.
    ///
    /// Fails with `ChunkNotFound` if the chunk does not exist. Blocked
    /// results list exactly the incomplete direct prerequisites.
    pub fn can_complete(&self, id: ChunkId) -> Result<Gate, ChunkError> {
        let chunk = self
            .store
            .get_chunk(id)?
            .ok_or(ChunkError::ChunkNotFound(id))?;
        if chunk.completed {
            return Ok(Gate::AlreadyCompleted);
        }

        let blockers: Vec<Chunk> = self
            .store
            .get_dependencies(id)?
            .into_iter()
            .filter(|dep| !dep.completed)
            .collect();

        if blockers.is_empty() {
            Ok(Gate::Ready)
        } else {
            Ok(Gate::Blocked(blockers))
        }
    }

    /// Derived state of the chunk `id`.
    pub fn state(&self, id: ChunkId) -> Result<ChunkState, ChunkError> {
        let chunk = self
            .store
            .get_chunk(id)?
            .ok_or(ChunkError::ChunkNotFound(id))?;
        self.state_of(&chunk)
    }

    /// Derived state of an already-loaded chunk.
    pub fn state_of(&self, chunk: &Chunk) -> Result<ChunkState, ChunkError> {
        if chunk.completed {
            return Ok(ChunkState::Completed);
        }
        let blocked = self
            .store
            .get_dependencies(chunk.id)?
            .iter()
            .any(|dep| !dep.completed);
        Ok(if blocked {
            ChunkState::Blocked
        } else {
            ChunkState::Available
        })
    }

    /// Every chunk with its derived state, in store listing order.
    ///
    /// Reads the chunk list and the edge list once each.
    pub fn views(&self) -> Result<Vec<ChunkView>, ChunkError> {
        let chunks = self.store.list_chunks()?;
        let edges = self.store.dependencies()?;

        let completed: BTreeSet<ChunkId> = chunks
            .iter()
            .filter(|c| c.completed)
            .map(|c| c.id)
            .collect();
        let known: BTreeSet<ChunkId> = chunks.iter().map(|c| c.id).collect();

        let mut prerequisites: BTreeMap<ChunkId, Vec<ChunkId>> = BTreeMap::new();
        for Dependency { chunk, depends_on } in edges {
            if !known.contains(&chunk) || !known.contains(&depends_on) {
                return Err(ChunkError::Corrupt(format!(
                    "Dependency {} -> {} references a missing chunk",
                    chunk, depends_on
                )));
            }
            prerequisites.entry(chunk).or_default().push(depends_on);
        }

        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let depends_on = prerequisites.remove(&chunk.id).unwrap_or_default();
                let state = if chunk.completed {
                    ChunkState::Completed
                } else if depends_on.iter().all(|dep| completed.contains(dep)) {
                    ChunkState::Available
                } else {
                    ChunkState::Blocked
                };
                ChunkView {
                    chunk,
                    state,
                    depends_on,
                }
            })
            .collect())
    }

    /// Every available chunk, best candidate first.
    ///
    /// Ordered by difficulty ascending, then creation time, then id.
    pub fn available(&self) -> Result<Vec<Chunk>, ChunkError> {
        let mut candidates: Vec<Chunk> = self
            .views()?
            .into_iter()
            .filter(|view| view.state == ChunkState::Available)
            .map(|view| view.chunk)
            .collect();
        candidates.sort_by_key(Chunk::priority_key);
        Ok(candidates)
    }

    /// The recommended next chunk, or `None` if nothing is available.
    ///
    /// `None` covers both "everything is done" and "everything left is
    /// blocked"; the two are not distinguished.
    pub fn next_available(&self) -> Result<Option<Chunk>, ChunkError> {
        Ok(self
            .views()?
            .into_iter()
            .filter(|view| view.state == ChunkState::Available)
            .map(|view| view.chunk)
            .min_by_key(Chunk::priority_key))
    }

    /// Completion totals across the whole store.
    pub fn progress(&self) -> Result<Progress, ChunkError> {
        Ok(Progress::from_views(&self.views()?))
    }
}

// =============================================================================
// COMPLETION WORKFLOW
// =============================================================================

/// Run the completion gate for `id` and, only if it passes, mark the chunk
/// completed.
///
/// The gate and the write are two separate store operations. Another
/// process writing to the same store between them is not detected.
pub fn complete<S: ChunkStore + ?Sized>(store: &mut S, id: ChunkId) -> Result<Completion, ChunkError> {
    let gate = Scheduler::new(&*store).can_complete(id)?;
    let chunk = store.get_chunk(id)?.ok_or(ChunkError::ChunkNotFound(id))?;

    match gate {
        Gate::AlreadyCompleted => Ok(Completion::AlreadyCompleted(chunk)),
        Gate::Blocked(blockers) => Ok(Completion::Blocked { chunk, blockers }),
        Gate::Ready => {
            if !store.mark_completed(id)? {
                return Err(ChunkError::ChunkNotFound(id));
            }
            let done = store.get_chunk(id)?.ok_or(ChunkError::ChunkNotFound(id))?;
            Ok(Completion::Completed(done))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
