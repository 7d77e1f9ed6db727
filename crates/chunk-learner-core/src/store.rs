//! # Chunk Store
//!
//! The `ChunkStore` trait and its in-memory implementation.
//!
//! Backends implement a small set of primitives; the validated operations
//! (`create_chunk`, `mark_completed`, `add_dependency`, `get_dependencies`)
//! are provided on top of them so every backend enforces the same rules.
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::primitives::FIRST_CHUNK_ID;
use crate::{Chunk, ChunkError, ChunkId, Dependency, NewChunk, timestamp_now};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// CHUNKSTORE TRAIT
// =============================================================================

/// Durable record of chunks and the prerequisite edges between them.
///
/// Every chunk handed out is an owned snapshot; mutation happens only
/// through these methods. All fallible operations return
/// `Result<T, ChunkError>` so in-memory and persistent backends behave
/// uniformly.
pub trait ChunkStore {
    /// Persist a validated chunk created at `created_at`. Returns its new id.
    fn insert_chunk(
        &mut self,
        draft: NewChunk,
        created_at: DateTime<Utc>,
    ) -> Result<ChunkId, ChunkError>;

    /// Lookup a chunk by id.
    fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>, ChunkError>;

    /// All chunks, oldest first (ties broken by id).
    fn list_chunks(&self) -> Result<Vec<Chunk>, ChunkError>;

    /// Mark a chunk completed at `at`.
    ///
    /// Returns `false` if no such chunk exists. An already-completed chunk
    /// keeps its original `completed_at` and still reports `true`.
    fn mark_completed_at(&mut self, id: ChunkId, at: DateTime<Utc>) -> Result<bool, ChunkError>;

    /// Insert an edge without policy checks.
    ///
    /// Both endpoints must exist (`ChunkNotFound` otherwise). Returns `false`
    /// if the pair is already present. Self-loops and cycles are NOT
    /// rejected here; use `add_dependency` for that.
    fn insert_dependency(&mut self, edge: Dependency) -> Result<bool, ChunkError>;

    /// Ids of the direct prerequisites of `id`, ascending.
    fn prerequisite_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError>;

    /// Ids of the chunks that directly depend on `id`, ascending.
    fn dependent_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError>;

    /// Every edge, ordered by `(chunk, depends_on)`.
    fn dependencies(&self) -> Result<Vec<Dependency>, ChunkError>;

    /// Get the total number of chunks.
    fn chunk_count(&self) -> Result<usize, ChunkError>;

    /// Get the total number of edges.
    fn dependency_count(&self) -> Result<usize, ChunkError>;

    // -------------------------------------------------------------------------
    // Provided operations
    // -------------------------------------------------------------------------

    /// Check if a chunk exists.
    fn contains_chunk(&self, id: ChunkId) -> Result<bool, ChunkError> {
        Ok(self.get_chunk(id)?.is_some())
    }

    /// Create a chunk stamped with the current time.
    ///
    /// Fails with `ChunkError::Validation` (persisting nothing) on an empty
    /// name or a difficulty outside 1..=5.
    fn create_chunk(
        &mut self,
        name: &str,
        description: &str,
        difficulty: i64,
    ) -> Result<ChunkId, ChunkError> {
        let draft = NewChunk::new(name, description, difficulty)?;
        self.insert_chunk(draft, timestamp_now())
    }

    /// Mark a chunk completed now. See `mark_completed_at`.
    ///
    /// This does not check prerequisites; run the scheduler's gate first.
    fn mark_completed(&mut self, id: ChunkId) -> Result<bool, ChunkError> {
        self.mark_completed_at(id, timestamp_now())
    }

    /// Record that `chunk_id` depends on `depends_on`.
    ///
    /// Returns `Ok(false)` if the edge already exists. Rejects self-loops
    /// (`Validation`), unknown endpoints (`ChunkNotFound`) and edges that
    /// would close a cycle (`Cycle`, carrying the cycle path).
    fn add_dependency(&mut self, chunk_id: ChunkId, depends_on: ChunkId) -> Result<bool, ChunkError> {
        let edge = Dependency::new(chunk_id, depends_on);
        if edge.is_self_loop() {
            return Err(ChunkError::Validation(format!(
                "Chunk {} cannot depend on itself",
                chunk_id
            )));
        }
        for id in [chunk_id, depends_on] {
            if !self.contains_chunk(id)? {
                return Err(ChunkError::ChunkNotFound(id));
            }
        }
        if self.prerequisite_ids(chunk_id)?.contains(&depends_on) {
            return Ok(false);
        }
        if let Some(path) = prerequisite_path(self, depends_on, chunk_id)? {
            let mut cycle = Vec::with_capacity(path.len().saturating_add(1));
            cycle.push(chunk_id);
            cycle.extend(path);
            return Err(ChunkError::Cycle(cycle));
        }
        self.insert_dependency(edge)
    }

    /// Full records of the direct prerequisites of `id` (not transitive).
    fn get_dependencies(&self, id: ChunkId) -> Result<Vec<Chunk>, ChunkError> {
        let ids = self.prerequisite_ids(id)?;
        resolve_edges(self, id, &ids, |from, to| Dependency::new(from, to))
    }

    /// Full records of the chunks that directly depend on `id`.
    fn get_dependents(&self, id: ChunkId) -> Result<Vec<Chunk>, ChunkError> {
        let ids = self.dependent_ids(id)?;
        resolve_edges(self, id, &ids, |from, to| Dependency::new(to, from))
    }
}

/// Load the chunks at the far end of `id`'s edges.
///
/// A missing endpoint means the edge table and chunk table disagree, which
/// is reported as corruption.
fn resolve_edges<S: ChunkStore + ?Sized>(
    store: &S,
    id: ChunkId,
    ids: &[ChunkId],
    edge: impl Fn(ChunkId, ChunkId) -> Dependency,
) -> Result<Vec<Chunk>, ChunkError> {
    let mut chunks = Vec::with_capacity(ids.len());
    for &other in ids {
        match store.get_chunk(other)? {
            Some(chunk) => chunks.push(chunk),
            None => {
                let dangling = edge(id, other);
                return Err(ChunkError::Corrupt(format!(
                    "Dependency {} -> {} references a missing chunk",
                    dangling.chunk, dangling.depends_on
                )));
            }
        }
    }
    Ok(chunks)
}

/// Breadth-first search along prerequisite edges from `start` to `target`.
///
/// Returns the path `[start, .., target]` if `target` is a (transitive)
/// prerequisite of `start`.
pub fn prerequisite_path<S: ChunkStore + ?Sized>(
    store: &S,
    start: ChunkId,
    target: ChunkId,
) -> Result<Option<Vec<ChunkId>>, ChunkError> {
    if start == target {
        return Ok(Some(vec![start]));
    }

    let mut prev: BTreeMap<ChunkId, ChunkId> = BTreeMap::new();
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for next in store.prerequisite_ids(current)? {
            if !visited.insert(next) {
                continue;
            }
            prev.insert(next, current);
            if next == target {
                let mut path = vec![target];
                let mut cursor = target;
                while let Some(&p) = prev.get(&cursor) {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return Ok(Some(path));
            }
            queue.push_back(next);
        }
    }

    Ok(None)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Volatile `ChunkStore` backed by ordered maps.
///
/// Mirrors the persistent store's semantics exactly; useful for tests,
/// benchmarks, and scratch planning.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Chunk storage: ChunkId -> Chunk
    chunks: BTreeMap<ChunkId, Chunk>,

    /// Forward adjacency: chunk -> its prerequisites
    prerequisites: BTreeMap<ChunkId, BTreeSet<ChunkId>>,

    /// Reverse adjacency: prerequisite -> chunks depending on it
    dependents: BTreeMap<ChunkId, BTreeSet<ChunkId>>,

    /// Next available ChunkId
    next_chunk_id: u64,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: BTreeMap::new(),
            prerequisites: BTreeMap::new(),
            dependents: BTreeMap::new(),
            next_chunk_id: FIRST_CHUNK_ID,
        }
    }

    /// Get the next chunk id that would be assigned.
    #[must_use]
    pub fn next_chunk_id(&self) -> u64 {
        self.next_chunk_id
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for MemoryStore {
    fn insert_chunk(
        &mut self,
        draft: NewChunk,
        created_at: DateTime<Utc>,
    ) -> Result<ChunkId, ChunkError> {
        let id = ChunkId(self.next_chunk_id);
        self.next_chunk_id = self.next_chunk_id.saturating_add(1);
        self.chunks.insert(id, Chunk::from_draft(id, draft, created_at));
        Ok(id)
    }

    fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>, ChunkError> {
        Ok(self.chunks.get(&id).cloned())
    }

    fn list_chunks(&self) -> Result<Vec<Chunk>, ChunkError> {
        let mut chunks: Vec<Chunk> = self.chunks.values().cloned().collect();
        chunks.sort_by_key(|c| (c.created_at, c.id));
        Ok(chunks)
    }

    fn mark_completed_at(&mut self, id: ChunkId, at: DateTime<Utc>) -> Result<bool, ChunkError> {
        match self.chunks.get_mut(&id) {
            Some(chunk) => {
                chunk.complete(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_dependency(&mut self, edge: Dependency) -> Result<bool, ChunkError> {
        for id in [edge.chunk, edge.depends_on] {
            if !self.chunks.contains_key(&id) {
                return Err(ChunkError::ChunkNotFound(id));
            }
        }
        let inserted = self
            .prerequisites
            .entry(edge.chunk)
            .or_default()
            .insert(edge.depends_on);
        if inserted {
            self.dependents
                .entry(edge.depends_on)
                .or_default()
                .insert(edge.chunk);
        }
        Ok(inserted)
    }

    fn prerequisite_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError> {
        Ok(self
            .prerequisites
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn dependent_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError> {
        Ok(self
            .dependents
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn dependencies(&self) -> Result<Vec<Dependency>, ChunkError> {
        Ok(self
            .prerequisites
            .iter()
            .flat_map(|(chunk, targets)| {
                targets
                    .iter()
                    .map(move |depends_on| Dependency::new(*chunk, *depends_on))
            })
            .collect())
    }

    fn chunk_count(&self) -> Result<usize, ChunkError> {
        Ok(self.chunks.len())
    }

    fn dependency_count(&self) -> Result<usize, ChunkError> {
        Ok(self.prerequisites.values().map(BTreeSet::len).sum())
    }
}

// =============================================================================
// TESTS
// =============================================================================
