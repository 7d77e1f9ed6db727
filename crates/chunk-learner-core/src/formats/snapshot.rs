//! # Export Snapshot
//!
//! A complete, self-describing copy of a store: every chunk and every edge,
//! stamped with a format version and the export time.
//!
//! The redb file itself is not a stable interchange format; a snapshot is.
//! Chunks keep the store's listing order and edges are ordered by
//! `(chunk, depends_on)`, so two captures of an unchanged store differ only
//! in `exported_at`.

use crate::primitives::SNAPSHOT_VERSION;
use crate::store::ChunkStore;
use crate::{Chunk, ChunkError, Dependency, timestamp_now};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Serializable copy of a whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version.
    pub format_version: u32,
    /// When the snapshot was taken.
    pub exported_at: DateTime<Utc>,
    /// Every chunk, oldest first.
    pub chunks: Vec<Chunk>,
    /// Every prerequisite edge.
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    /// Read the full contents of `store`.
    pub fn capture<S: ChunkStore + ?Sized>(store: &S) -> Result<Self, ChunkError> {
        Ok(Self {
            format_version: SNAPSHOT_VERSION,
            exported_at: timestamp_now(),
            chunks: store.list_chunks()?,
            dependencies: store.dependencies()?,
        })
    }

    /// Check the snapshot is internally consistent.
    ///
    /// Rejects an unknown format version, duplicate chunk ids and edges
    /// whose endpoints are not in the snapshot.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.format_version != SNAPSHOT_VERSION {
            return Err(ChunkError::Corrupt(format!(
                "Unsupported snapshot version {} (expected {})",
                self.format_version, SNAPSHOT_VERSION
            )));
        }

        let mut ids = BTreeSet::new();
        for chunk in &self.chunks {
            if !ids.insert(chunk.id) {
                return Err(ChunkError::Corrupt(format!(
                    "Duplicate chunk {} in snapshot",
                    chunk.id
                )));
            }
        }

        for edge in &self.dependencies {
            for id in [edge.chunk, edge.depends_on] {
                if !ids.contains(&id) {
                    return Err(ChunkError::Corrupt(format!(
                        "Dependency {} -> {} references a missing chunk",
                        edge.chunk, edge.depends_on
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ChunkId, MemoryStore};

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        let a = store.create_chunk("Learn Pandas", "dataframes", 2).unwrap();
        let b = store.create_chunk("Build ML Model", "", 4).unwrap();
        store.add_dependency(b, a).unwrap();
        store.mark_completed(a).unwrap();
        store
    }

    #[test]
    fn capture_copies_everything() {
        let store = populated();
        let snapshot = Snapshot::capture(&store).unwrap();
        assert_eq!(snapshot.format_version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.chunks, store.list_chunks().unwrap());
        assert_eq!(snapshot.dependencies, vec![Dependency::new(ChunkId(2), ChunkId(1))]);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn json_round_trip_preserves_snapshot() {
        let snapshot = Snapshot::capture(&populated()).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn validate_rejects_dangling_edge() {
        let mut snapshot = Snapshot::capture(&populated()).unwrap();
        snapshot.dependencies.push(Dependency::new(ChunkId(2), ChunkId(9)));
        assert!(matches!(snapshot.validate(), Err(ChunkError::Corrupt(_))));
    }

    #[test]
    fn validate_rejects_unknown_version() {
        let mut snapshot = Snapshot::capture(&MemoryStore::new()).unwrap();
        snapshot.format_version = SNAPSHOT_VERSION + 1;
        assert!(snapshot.validate().is_err());
    }
}
