//! # chunk-learner-core
//!
//! The deterministic chunk store and dependency-aware scheduler for
//! chunk-learner.
//!
//! A chunk is a unit of learning work with a difficulty rating. Chunks are
//! linked by prerequisite edges; the scheduler answers which chunk can be
//! completed and which one to tackle next.
//!
//! ## Layout
//!
//! - `types` → identifiers, records, derived state, `ChunkError`
//! - `store` → `ChunkStore` trait and the in-memory `MemoryStore`
//! - `storage` → redb-backed `RedbStore` and its typed row layer
//! - `scheduler` → completion gate, next-available selection
//! - `system` → progress metrics
//! - `formats` → versioned export snapshot
//!
//! ## Constraints
//!
//! - No async, no network, no logging dependency
//! - `BTreeMap`/`BTreeSet` only, integer arithmetic only
//! - The scheduler never mutates a store

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod primitives;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Chunk, ChunkError, ChunkId, ChunkState, Dependency, Difficulty, NewChunk,
    normalize_timestamp, timestamp_now,
};

// =============================================================================
// RE-EXPORTS: Store and Scheduler
// =============================================================================

pub use scheduler::{ChunkView, Completion, Gate, Scheduler, complete};
pub use storage::RedbStore;
pub use store::{ChunkStore, MemoryStore, prerequisite_path};

// =============================================================================
// RE-EXPORTS: Formats and System
// =============================================================================

pub use formats::Snapshot;
pub use system::Progress;
