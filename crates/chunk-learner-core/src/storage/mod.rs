//! # Storage Module
//!
//! Persistent backends for the chunk store.
//!
//! - `redb_store`: redb-backed `RedbStore`
//! - `row`: typed mapping between stored bytes and `Chunk`

mod redb_store;
pub mod row;

pub use redb_store::RedbStore;
