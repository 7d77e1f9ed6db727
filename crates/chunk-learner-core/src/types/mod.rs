//! # Core Type Definitions
//!
//! This module contains all core types for the chunk-learner store and scheduler:
//! - Identifiers and ratings (`ChunkId`, `Difficulty`)
//! - Records (`Chunk`, `NewChunk`, `Dependency`)
//! - Derived scheduling state (`ChunkState`)
//! - Error types (`ChunkError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key `BTreeMap`/`BTreeSet` collections
//! - Are plain owned values: a `Chunk` handed out by a store is a snapshot

use crate::primitives::{MAX_DESCRIPTION_LENGTH, MAX_DIFFICULTY, MAX_NAME_LENGTH, MIN_DIFFICULTY};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a chunk.
///
/// Assigned by the store on creation, starting at 1. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u64);

impl ChunkId {
    /// Get the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

/// Difficulty rating of a chunk, always within `MIN_DIFFICULTY..=MAX_DIFFICULTY`.
///
/// The only constructor is fallible, so a `Difficulty` value in hand is
/// always in range. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    /// Validate a raw rating.
    pub fn new(value: i64) -> Result<Self, ChunkError> {
        if value < i64::from(MIN_DIFFICULTY) || value > i64::from(MAX_DIFFICULTY) {
            return Err(ChunkError::Validation(format!(
                "Difficulty must be between {} and {}, got {}",
                MIN_DIFFICULTY, MAX_DIFFICULTY, value
            )));
        }
        Ok(Self(value as u8))
    }

    /// Get the raw rating.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Render the rating as a row of stars.
    #[must_use]
    pub fn stars(self) -> String {
        "★".repeat(usize::from(self.0))
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = ChunkError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Current UTC time at the precision every backend persists (microseconds).
///
/// Truncating here keeps in-memory and on-disk chunks byte-for-byte equal.
#[must_use]
pub fn timestamp_now() -> DateTime<Utc> {
    normalize_timestamp(Utc::now())
}

/// Truncate a timestamp to microsecond precision.
#[must_use]
pub fn normalize_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

// =============================================================================
// CHUNK
// =============================================================================

/// A unit of learning work.
///
/// `completed_at` is `Some` exactly when `completed` is true. Stores
/// maintain that invariant; the typed row layer rejects records violating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Store-assigned identifier.
    pub id: ChunkId,
    /// Short human-readable label, never empty.
    pub name: String,
    /// Free-text detail, may be empty.
    pub description: String,
    /// Difficulty rating, immutable after creation.
    pub difficulty: Difficulty,
    /// Completion flag; only ever moves from false to true.
    pub completed: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time, set once.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Chunk {
    /// Build the record for a freshly created chunk.
    #[must_use]
    pub fn from_draft(id: ChunkId, draft: NewChunk, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            difficulty: draft.difficulty,
            completed: false,
            created_at: normalize_timestamp(created_at),
            completed_at: None,
        }
    }

    /// Mark the chunk completed at `at`, unless it already is.
    ///
    /// Returns `true` if the record changed. An earlier `completed_at` is
    /// never overwritten.
    pub fn complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(normalize_timestamp(at));
        true
    }

    /// Selection key: lowest difficulty first, then oldest, then lowest id.
    #[must_use]
    pub fn priority_key(&self) -> (Difficulty, DateTime<Utc>, ChunkId) {
        (self.difficulty, self.created_at, self.id)
    }
}

/// Validated input for chunk creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChunk {
    name: String,
    description: String,
    difficulty: Difficulty,
}

impl NewChunk {
    /// Validate creation input.
    ///
    /// The name is trimmed and must be non-empty; the description is trimmed
    /// and may be empty. Both are length-bounded.
    pub fn new(name: &str, description: &str, difficulty: i64) -> Result<Self, ChunkError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChunkError::Validation(
                "Chunk name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ChunkError::Validation(format!(
                "Chunk name length {} exceeds maximum {} bytes",
                name.len(),
                MAX_NAME_LENGTH
            )));
        }

        let description = description.trim();
        if description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(ChunkError::Validation(format!(
                "Description length {} exceeds maximum {} bytes",
                description.len(),
                MAX_DESCRIPTION_LENGTH
            )));
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            difficulty: Difficulty::new(difficulty)?,
        })
    }
}

// =============================================================================
// DEPENDENCY
// =============================================================================

/// Directed prerequisite edge: `chunk` cannot be completed before `depends_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// The dependent chunk.
    pub chunk: ChunkId,
    /// The prerequisite chunk.
    pub depends_on: ChunkId,
}

impl Dependency {
    /// Create a new edge.
    #[must_use]
    pub const fn new(chunk: ChunkId, depends_on: ChunkId) -> Self {
        Self { chunk, depends_on }
    }

    /// Whether the edge points a chunk at itself.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.chunk == self.depends_on
    }
}

// =============================================================================
// CHUNK STATE
// =============================================================================

/// Scheduler view of a chunk. Derived on every query, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    /// Incomplete with at least one incomplete direct prerequisite.
    Blocked,
    /// Incomplete and every direct prerequisite is completed.
    Available,
    /// Terminal.
    Completed,
}

impl ChunkState {
    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ChunkState::Blocked => "Blocked",
            ChunkState::Available => "Available",
            ChunkState::Completed => "Complete",
        }
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the chunk-learner core.
///
/// Expected outcomes (duplicate edges, blocked completion) are values, not
/// errors. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Input rejected at the boundary.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The referenced chunk does not exist.
    #[error("Chunk {0} not found")]
    ChunkNotFound(ChunkId),

    /// The edge would close a dependency cycle. Carries the cycle path.
    #[error("Dependency cycle: {}", format_path(.0))]
    Cycle(Vec<ChunkId>),

    /// The storage medium failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted data failed validation.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A record could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChunkError {
    /// Whether this is a failure of the durable medium rather than of the input.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, ChunkError::Storage(_) | ChunkError::Corrupt(_))
    }
}

fn format_path(path: &[ChunkId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

// =============================================================================
// TESTS
// =============================================================================
