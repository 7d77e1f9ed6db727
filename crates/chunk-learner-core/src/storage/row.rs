//! # Chunk Rows
//!
//! The on-disk shape of a chunk and its checked conversion to `Chunk`.
//!
//! Rows are postcard-encoded. Decoding never trusts the bytes: every row is
//! re-validated against the same invariants creation enforces, so a damaged
//! or hand-edited database surfaces as `ChunkError::Corrupt` instead of
//! leaking an impossible `Chunk` to the scheduler.

use crate::primitives::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::{Chunk, ChunkError, ChunkId, Difficulty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted chunk record. Timestamps are microseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub difficulty: u8,
    pub completed: bool,
    pub created_at_us: i64,
    pub completed_at_us: Option<i64>,
}

impl From<&Chunk> for ChunkRow {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.0,
            name: chunk.name.clone(),
            description: chunk.description.clone(),
            difficulty: chunk.difficulty.value(),
            completed: chunk.completed,
            created_at_us: chunk.created_at.timestamp_micros(),
            completed_at_us: chunk.completed_at.map(|at| at.timestamp_micros()),
        }
    }
}

impl TryFrom<ChunkRow> for Chunk {
    type Error = ChunkError;

    fn try_from(row: ChunkRow) -> Result<Self, Self::Error> {
        let id = ChunkId(row.id);
        let corrupt = |what: &str| ChunkError::Corrupt(format!("chunk {}: {}", id, what));

        if row.name.trim().is_empty() {
            return Err(corrupt("empty name"));
        }
        if row.name.len() > MAX_NAME_LENGTH || row.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(corrupt("field exceeds length limit"));
        }
        let difficulty = Difficulty::new(i64::from(row.difficulty))
            .map_err(|_| corrupt(&format!("difficulty {} out of range", row.difficulty)))?;
        let created_at = from_micros(row.created_at_us).ok_or_else(|| corrupt("bad created_at"))?;

        let completed_at = match (row.completed, row.completed_at_us) {
            (true, Some(us)) => Some(from_micros(us).ok_or_else(|| corrupt("bad completed_at"))?),
            (false, None) => None,
            (true, None) => return Err(corrupt("completed without completed_at")),
            (false, Some(_)) => return Err(corrupt("completed_at set on incomplete chunk")),
        };

        Ok(Chunk {
            id,
            name: row.name,
            description: row.description,
            difficulty,
            completed: row.completed,
            created_at,
            completed_at,
        })
    }
}

impl ChunkRow {
    /// Encode for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChunkError> {
        postcard::to_allocvec(self).map_err(|e| ChunkError::Serialization(e.to_string()))
    }

    /// Decode and validate a stored row under table key `key`.
    pub fn decode(key: u64, bytes: &[u8]) -> Result<Chunk, ChunkError> {
        let row: ChunkRow = postcard::from_bytes(bytes)
            .map_err(|e| ChunkError::Corrupt(format!("chunk #{}: {}", key, e)))?;
        if row.id != key {
            return Err(ChunkError::Corrupt(format!(
                "row stored under #{} claims id #{}",
                key, row.id
            )));
        }
        Chunk::try_from(row)
    }
}

fn from_micros(us: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us)
}
