//! # Property-Based Tests
//!
//! Scheduling invariants checked against randomly generated chunk graphs.

use chrono::Duration;
use chunk_learner_core::{
    Chunk, ChunkError, ChunkId, ChunkState, ChunkStore, Gate, MemoryStore, NewChunk, Scheduler,
    timestamp_now,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Build a store from `(difficulty, created_offset_secs)` pairs, candidate
/// edges as index pairs, and a set of indices to complete.
///
/// Edges that would be rejected (self-loops, cycles) are skipped, so the
/// store always holds an acyclic graph.
fn build(
    chunks: &[(i64, i64)],
    edges: &[(usize, usize)],
    completed: &[usize],
) -> (MemoryStore, Vec<ChunkId>) {
    let mut store = MemoryStore::new();
    let base = timestamp_now();
    let ids: Vec<ChunkId> = chunks
        .iter()
        .enumerate()
        .map(|(i, &(difficulty, offset))| {
            let draft = NewChunk::new(&format!("chunk {i}"), "", difficulty).expect("draft");
            store
                .insert_chunk(draft, base + Duration::seconds(offset))
                .expect("insert")
        })
        .collect();

    for &(from, to) in edges {
        let (from, to) = (ids[from % ids.len()], ids[to % ids.len()]);
        match store.add_dependency(from, to) {
            Ok(_) | Err(ChunkError::Validation(_)) | Err(ChunkError::Cycle(_)) => {}
            Err(other) => unreachable!("unexpected error {other}"),
        }
    }

    for &index in completed {
        store.mark_completed(ids[index % ids.len()]).expect("mark");
    }

    (store, ids)
}

/// Brute-force candidate set straight from the definitions.
fn brute_force_candidates(store: &MemoryStore) -> Vec<Chunk> {
    store
        .list_chunks()
        .expect("list")
        .into_iter()
        .filter(|chunk| {
            !chunk.completed
                && store
                    .get_dependencies(chunk.id)
                    .expect("deps")
                    .iter()
                    .all(|dep| dep.completed)
        })
        .collect()
}

fn chunk_specs() -> impl Strategy<Value = Vec<(i64, i64)>> {
    vec((1i64..=5, 0i64..20), 1..25)
}

fn edge_specs() -> impl Strategy<Value = Vec<(usize, usize)>> {
    vec((0usize..64, 0usize..64), 0..40)
}

fn completed_specs() -> impl Strategy<Value = Vec<usize>> {
    vec(0usize..64, 0..10)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// The recommendation is the minimum (difficulty, created_at, id) among
    /// brute-force candidates, and never completed or blocked.
    #[test]
    fn selection_matches_brute_force(
        chunks in chunk_specs(),
        edges in edge_specs(),
        completed in completed_specs(),
    ) {
        let (store, _) = build(&chunks, &edges, &completed);
        let scheduler = Scheduler::new(&store);

        let expected = brute_force_candidates(&store)
            .into_iter()
            .min_by_key(|c| (c.difficulty, c.created_at, c.id));
        let actual = scheduler.next_available().expect("next");
        prop_assert_eq!(actual.clone(), expected);

        if let Some(chunk) = actual {
            prop_assert!(!chunk.completed);
            prop_assert_eq!(scheduler.state(chunk.id).expect("state"), ChunkState::Available);
        }
    }

    /// The available list is exactly the candidate set, sorted.
    #[test]
    fn available_is_sorted_candidate_set(
        chunks in chunk_specs(),
        edges in edge_specs(),
        completed in completed_specs(),
    ) {
        let (store, _) = build(&chunks, &edges, &completed);
        let available = Scheduler::new(&store).available().expect("available");

        let listed: BTreeSet<ChunkId> = available.iter().map(|c| c.id).collect();
        let expected: BTreeSet<ChunkId> =
            brute_force_candidates(&store).iter().map(|c| c.id).collect();
        prop_assert_eq!(listed, expected);

        for pair in available.windows(2) {
            prop_assert!(pair[0].priority_key() < pair[1].priority_key());
        }
    }

    /// Ready implies every direct prerequisite is completed; Blocked lists
    /// exactly the incomplete ones.
    #[test]
    fn gate_is_sound(
        chunks in chunk_specs(),
        edges in edge_specs(),
        completed in completed_specs(),
    ) {
        let (store, ids) = build(&chunks, &edges, &completed);
        let scheduler = Scheduler::new(&store);

        for id in ids {
            let deps = store.get_dependencies(id).expect("deps");
            let incomplete: Vec<ChunkId> =
                deps.iter().filter(|d| !d.completed).map(|d| d.id).collect();

            match scheduler.can_complete(id).expect("gate") {
                Gate::Ready => {
                    prop_assert!(incomplete.is_empty());
                }
                Gate::Blocked(blockers) => {
                    let listed: Vec<ChunkId> = blockers.iter().map(|c| c.id).collect();
                    prop_assert_eq!(listed, incomplete);
                }
                Gate::AlreadyCompleted => {
                    prop_assert!(store.get_chunk(id).expect("get").expect("exists").completed);
                }
            }
        }
    }

    /// Completion never reverts and completed_at is non-null iff completed.
    #[test]
    fn completion_is_monotonic(
        chunks in chunk_specs(),
        marks in vec(0usize..64, 0..30),
    ) {
        let (mut store, ids) = build(&chunks, &[], &[]);
        let mut done = BTreeSet::new();

        for index in marks {
            let id = ids[index % ids.len()];
            let before = store.get_chunk(id).expect("get").expect("exists").completed_at;
            prop_assert!(store.mark_completed(id).expect("mark"));
            let after = store.get_chunk(id).expect("get").expect("exists").completed_at;
            if before.is_some() {
                prop_assert_eq!(before, after);
            }
            done.insert(id);

            for chunk in store.list_chunks().expect("list") {
                prop_assert_eq!(chunk.completed, chunk.completed_at.is_some());
                prop_assert_eq!(chunk.completed, done.contains(&chunk.id));
            }
        }
    }

    /// Re-adding an existing edge returns false and changes nothing.
    #[test]
    fn duplicate_edges_rejected(
        chunks in chunk_specs(),
        edges in edge_specs(),
    ) {
        let (mut store, _) = build(&chunks, &edges, &[]);
        let before = store.dependency_count().expect("count");

        for edge in store.dependencies().expect("edges") {
            prop_assert!(!store.add_dependency(edge.chunk, edge.depends_on).expect("dup"));
        }
        prop_assert_eq!(store.dependency_count().expect("count"), before);
    }

    /// Out-of-range difficulties never persist.
    #[test]
    fn invalid_difficulty_persists_nothing(difficulty in prop_oneof![i64::MIN..1, 6i64..i64::MAX]) {
        let mut store = MemoryStore::new();
        prop_assert!(matches!(
            store.create_chunk("x", "", difficulty),
            Err(ChunkError::Validation(_))
        ));
        prop_assert_eq!(store.chunk_count().expect("count"), 0);
    }

    /// Progress totals always add up.
    #[test]
    fn progress_totals_add_up(
        chunks in chunk_specs(),
        edges in edge_specs(),
        completed in completed_specs(),
    ) {
        let (store, _) = build(&chunks, &edges, &completed);
        let progress = Scheduler::new(&store).progress().expect("progress");

        prop_assert_eq!(progress.total, chunks.len());
        prop_assert_eq!(
            progress.completed + progress.available + progress.blocked,
            progress.total
        );
        prop_assert!(progress.percent_complete <= 100);
    }
}
