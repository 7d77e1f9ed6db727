//! # redb-backed Chunk Storage
//!
//! A disk-backed chunk store using the redb embedded database, providing:
//! - ACID transactions (one write transaction per mutating operation)
//! - Crash safety (copy-on-write B-trees)
//! - Zero configuration
//!
//! ## Tables
//!
//! | Table          | Key                    | Value                  |
//! |----------------|------------------------|------------------------|
//! | `chunks`       | chunk id               | postcard `ChunkRow`    |
//! | `dependencies` | (chunk, depends_on)    | `()`                   |
//! | `dependents`   | (depends_on, chunk)    | `()`                   |
//! | `metadata`     | key string             | u64                    |
//!
//! `dependents` is a reverse index kept in the same transaction as
//! `dependencies`, so both directions are range queries.
//!
//! Check-then-act sequences spanning several calls (the completion gate
//! followed by `mark_completed`) are not isolated from other processes.

use super::row::ChunkRow;
use crate::primitives::{FIRST_CHUNK_ID, SCHEMA_VERSION};
use crate::store::ChunkStore;
use crate::{Chunk, ChunkError, ChunkId, Dependency, NewChunk};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Table for chunks: ChunkId(u64) -> serialized ChunkRow bytes
const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");

/// Table for edges: (chunk_id, depends_on_id) -> ()
const DEPENDENCIES: TableDefinition<(u64, u64), ()> = TableDefinition::new("dependencies");

/// Reverse edge index: (depends_on_id, chunk_id) -> ()
const DEPENDENTS: TableDefinition<(u64, u64), ()> = TableDefinition::new("dependents");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_CHUNK_ID: &str = "next_chunk_id";
const SCHEMA_VERSION_KEY: &str = "schema_version";

fn storage_err(e: impl Display) -> ChunkError {
    ChunkError::Storage(e.to_string())
}

/// A disk-backed chunk store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Where the database lives.
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a chunk database at the given path.
    ///
    /// A fresh database is stamped with the current schema version; an
    /// existing one must carry exactly that version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChunkError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(storage_err)?;

        // Initialize tables if they don't exist and check the schema stamp.
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            {
                let chunks = write_txn.open_table(CHUNKS).map_err(storage_err)?;
                let _ = write_txn.open_table(DEPENDENCIES).map_err(storage_err)?;
                let _ = write_txn.open_table(DEPENDENTS).map_err(storage_err)?;
                let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;

                let stamped = meta
                    .get(SCHEMA_VERSION_KEY)
                    .map_err(storage_err)?
                    .map(|v| v.value());
                match stamped {
                    Some(SCHEMA_VERSION) => {}
                    Some(other) => {
                        return Err(ChunkError::Corrupt(format!(
                            "unsupported schema version {} (expected {})",
                            other, SCHEMA_VERSION
                        )));
                    }
                    None => {
                        if chunks.len().map_err(storage_err)? > 0 {
                            return Err(ChunkError::Corrupt(
                                "database has chunks but no schema version".to_string(),
                            ));
                        }
                        meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION)
                            .map_err(storage_err)?;
                    }
                }
            }
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db, path })
    }

    /// Path of the underlying database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the next chunk id that would be assigned.
    pub fn next_chunk_id(&self) -> Result<u64, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let meta = read_txn.open_table(METADATA).map_err(storage_err)?;
        Ok(meta
            .get(NEXT_CHUNK_ID)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(FIRST_CHUNK_ID))
    }

    /// Collect the second key component of every `(id, _)` entry in `table`.
    fn adjacent(
        &self,
        table: TableDefinition<(u64, u64), ()>,
        id: ChunkId,
    ) -> Result<Vec<ChunkId>, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(table).map_err(storage_err)?;

        let mut ids = Vec::new();
        for entry in table
            .range((id.0, 0u64)..=(id.0, u64::MAX))
            .map_err(storage_err)?
        {
            let (key, _) = entry.map_err(storage_err)?;
            let (_, other) = key.value();
            ids.push(ChunkId(other));
        }
        Ok(ids)
    }
}

// =============================================================================
// CHUNKSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl ChunkStore for RedbStore {
    fn insert_chunk(
        &mut self,
        draft: NewChunk,
        created_at: DateTime<Utc>,
    ) -> Result<ChunkId, ChunkError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let id = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let next = meta
                .get(NEXT_CHUNK_ID)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(FIRST_CHUNK_ID);
            let id = ChunkId(next);

            let chunk = Chunk::from_draft(id, draft, created_at);
            let bytes = ChunkRow::from(&chunk).to_bytes()?;

            let mut chunks = write_txn.open_table(CHUNKS).map_err(storage_err)?;
            chunks
                .insert(id.0, bytes.as_slice())
                .map_err(storage_err)?;
            meta.insert(NEXT_CHUNK_ID, next.saturating_add(1))
                .map_err(storage_err)?;
            id
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(id)
    }

    fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let chunks = read_txn.open_table(CHUNKS).map_err(storage_err)?;

        match chunks.get(id.0).map_err(storage_err)? {
            Some(data) => Ok(Some(ChunkRow::decode(id.0, data.value())?)),
            None => Ok(None),
        }
    }

    fn list_chunks(&self) -> Result<Vec<Chunk>, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(CHUNKS).map_err(storage_err)?;

        let mut chunks = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            chunks.push(ChunkRow::decode(key.value(), value.value())?);
        }
        chunks.sort_by_key(|c| (c.created_at, c.id));
        Ok(chunks)
    }

    fn mark_completed_at(&mut self, id: ChunkId, at: DateTime<Utc>) -> Result<bool, ChunkError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let found = {
            let mut chunks = write_txn.open_table(CHUNKS).map_err(storage_err)?;
            let existing = chunks
                .get(id.0)
                .map_err(storage_err)?
                .map(|data| ChunkRow::decode(id.0, data.value()))
                .transpose()?;

            match existing {
                Some(mut chunk) => {
                    if chunk.complete(at) {
                        let bytes = ChunkRow::from(&chunk).to_bytes()?;
                        chunks
                            .insert(id.0, bytes.as_slice())
                            .map_err(storage_err)?;
                    }
                    true
                }
                None => false,
            }
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(found)
    }

    fn insert_dependency(&mut self, edge: Dependency) -> Result<bool, ChunkError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let inserted = {
            let chunks = write_txn.open_table(CHUNKS).map_err(storage_err)?;
            for id in [edge.chunk, edge.depends_on] {
                if chunks.get(id.0).map_err(storage_err)?.is_none() {
                    return Err(ChunkError::ChunkNotFound(id));
                }
            }

            let mut forward = write_txn.open_table(DEPENDENCIES).map_err(storage_err)?;
            let key = (edge.chunk.0, edge.depends_on.0);
            if forward.get(key).map_err(storage_err)?.is_some() {
                false
            } else {
                forward.insert(key, ()).map_err(storage_err)?;
                let mut reverse = write_txn.open_table(DEPENDENTS).map_err(storage_err)?;
                reverse
                    .insert((edge.depends_on.0, edge.chunk.0), ())
                    .map_err(storage_err)?;
                true
            }
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(inserted)
    }

    fn prerequisite_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError> {
        self.adjacent(DEPENDENCIES, id)
    }

    fn dependent_ids(&self, id: ChunkId) -> Result<Vec<ChunkId>, ChunkError> {
        self.adjacent(DEPENDENTS, id)
    }

    fn dependencies(&self) -> Result<Vec<Dependency>, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DEPENDENCIES).map_err(storage_err)?;

        let mut edges = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let (chunk, depends_on) = key.value();
            edges.push(Dependency::new(ChunkId(chunk), ChunkId(depends_on)));
        }
        Ok(edges)
    }

    fn chunk_count(&self) -> Result<usize, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(CHUNKS).map_err(storage_err)?;
        let count = table.len().map_err(storage_err)?;
        Ok(count as usize)
    }

    fn dependency_count(&self) -> Result<usize, ChunkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DEPENDENCIES).map_err(storage_err)?;
        let count = table.len().map_err(storage_err)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::timestamp_now;
    use tempfile::tempdir;

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let a = store.create_chunk("Learn Pandas", "", 2).expect("create");
        let b = store.create_chunk("Build ML Model", "", 4).expect("create");

        assert_eq!((a, b), (ChunkId(1), ChunkId(2)));
        assert_eq!(store.chunk_count().expect("count"), 2);

        assert!(store.add_dependency(b, a).expect("edge"));
        assert_eq!(store.dependency_count().expect("count"), 1);
        assert_eq!(store.prerequisite_ids(b).expect("deps"), vec![a]);
        assert_eq!(store.dependent_ids(a).expect("dependents"), vec![b]);
    }

    #[test]
    fn create_rejects_bad_difficulty_without_persisting() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert!(matches!(
            store.create_chunk("Too easy", "", 0),
            Err(ChunkError::Validation(_))
        ));
        assert!(matches!(
            store.create_chunk("Too hard", "", 6),
            Err(ChunkError::Validation(_))
        ));
        assert_eq!(store.chunk_count().expect("count"), 0);
        assert_eq!(store.next_chunk_id().expect("next"), 1);
    }

    #[test]
    fn persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let (a, b) = {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let a = store.create_chunk("a", "first", 1).expect("create");
            let b = store.create_chunk("b", "second", 3).expect("create");
            store.add_dependency(b, a).expect("edge");
            store.mark_completed(a).expect("complete");
            (a, b)
        };
        // Store dropped here, simulating process exit

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        let chunk_a = store.get_chunk(a).expect("get").expect("exists");
        assert!(chunk_a.completed);
        assert!(chunk_a.completed_at.is_some());
        assert_eq!(chunk_a.description, "first");
        assert_eq!(store.get_dependencies(b).expect("deps"), vec![chunk_a]);

        // Ids are never reused after reopen
        let c = store.create_chunk("c", "", 2).expect("create");
        assert_eq!(c, ChunkId(3));
    }

    #[test]
    fn timestamps_round_trip_exactly() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let at = timestamp_now();
        let id = store
            .insert_chunk(NewChunk::new("x", "", 1).expect("draft"), at)
            .expect("insert");
        let done = at + chrono::Duration::seconds(30);
        store.mark_completed_at(id, done).expect("complete");

        let chunk = store.get_chunk(id).expect("get").expect("exists");
        assert_eq!(chunk.created_at, at);
        assert_eq!(chunk.completed_at, Some(done));
    }

    #[test]
    fn mark_completed_keeps_first_timestamp() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let id = store.create_chunk("x", "", 1).expect("create");

        let first = timestamp_now();
        assert!(store.mark_completed_at(id, first).expect("complete"));
        assert!(store
            .mark_completed_at(id, first + chrono::Duration::hours(1))
            .expect("complete again"));

        let chunk = store.get_chunk(id).expect("get").expect("exists");
        assert_eq!(chunk.completed_at, Some(first));
        assert!(!store.mark_completed(ChunkId(99)).expect("unknown"));
    }

    #[test]
    fn duplicate_edge_leaves_count_unchanged() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let a = store.create_chunk("a", "", 1).expect("create");
        let b = store.create_chunk("b", "", 1).expect("create");

        assert!(store.add_dependency(b, a).expect("first"));
        assert!(!store.add_dependency(b, a).expect("second"));
        assert_eq!(store.dependency_count().expect("count"), 1);
        assert_eq!(store.dependencies().expect("edges"), vec![Dependency::new(b, a)]);
    }

    #[test]
    fn cycle_and_self_loop_rejected() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let a = store.create_chunk("a", "", 1).expect("create");
        let b = store.create_chunk("b", "", 1).expect("create");
        store.add_dependency(b, a).expect("edge");

        assert!(matches!(store.add_dependency(a, a), Err(ChunkError::Validation(_))));
        match store.add_dependency(a, b) {
            Err(ChunkError::Cycle(path)) => assert_eq!(path, vec![a, b, a]),
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(matches!(
            store.add_dependency(a, ChunkId(77)),
            Err(ChunkError::ChunkNotFound(ChunkId(77)))
        ));
        assert_eq!(store.dependency_count().expect("count"), 1);
    }

    #[test]
    fn corrupt_row_is_rejected() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        {
            let write_txn = store.db.begin_write().expect("txn");
            {
                let mut chunks = write_txn.open_table(CHUNKS).expect("table");
                chunks.insert(5, [0xffu8, 0x01].as_slice()).expect("insert");
            }
            write_txn.commit().expect("commit");
        }

        assert!(matches!(store.get_chunk(ChunkId(5)), Err(ChunkError::Corrupt(_))));
        assert!(matches!(store.list_chunks(), Err(ChunkError::Corrupt(_))));
    }

    #[test]
    fn schema_version_mismatch_is_rejected() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            let write_txn = store.db.begin_write().expect("txn");
            {
                let mut meta = write_txn.open_table(METADATA).expect("table");
                meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION + 1)
                    .expect("insert");
            }
            write_txn.commit().expect("commit");
        }

        let result = RedbStore::open(&db_path);
        assert!(matches!(result, Err(ChunkError::Corrupt(_))));
    }

    #[test]
    fn multiple_stores_coexist() {
        let temp = tempdir().expect("temp dir");
        let mut first = RedbStore::open(temp.path().join("one.redb")).expect("open db");
        let mut second = RedbStore::open(temp.path().join("two.redb")).expect("open db");

        first.create_chunk("only in first", "", 1).expect("create");
        assert_eq!(first.chunk_count().expect("count"), 1);
        assert_eq!(second.chunk_count().expect("count"), 0);

        second.create_chunk("only in second", "", 1).expect("create");
        assert_eq!(
            second.get_chunk(ChunkId(1)).expect("get").map(|c| c.name),
            Some("only in second".to_string())
        );
    }
}
