//! # CLI Errors
//!
//! Everything a command can fail with. `main` logs the error, prints it to
//! stderr and exits with status 1.

use chunk_learner_core::{ChunkError, ChunkId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the chunk-learner binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by the store or scheduler.
    #[error(transparent)]
    Core(#[from] ChunkError),

    /// A command other than `init` ran before the database existed.
    #[error("Database not initialized at {}. Run `chunk-learner init` first.", .0.display())]
    NotInitialized(PathBuf),

    /// The completion gate refused the chunk.
    #[error("Cannot complete chunk {chunk}. Incomplete dependencies: {}", join_ids(.blockers))]
    Blocked {
        chunk: ChunkId,
        blockers: Vec<ChunkId>,
    },

    /// Invalid configuration value or file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output or export could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file is not valid TOML.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

fn join_ids(ids: &[ChunkId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
