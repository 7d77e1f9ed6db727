//! # chunk-learner CLI Module
//!
//! This module implements the CLI interface for chunk-learner.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `add` - Create a chunk (prompts for anything not given as a flag)
//! - `depend` - Add prerequisites to an existing chunk
//! - `list` - List chunks with their state and dependencies
//! - `show` - Show one chunk in detail
//! - `complete` - Mark a chunk completed if its prerequisites are done
//! - `next` - Recommend the next chunk to work on
//! - `status` - Show progress totals
//! - `export` - Write a JSON snapshot of the database

mod commands;

use crate::config::{Config, Overrides};
use crate::error::CliError;
use crate::logging::Verbosity;
use crate::prompt::Prompter;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// chunk-learner - manage your learning journey in bite-sized pieces
///
/// Record learning tasks, say which ones must come first, and get told what
/// to tackle next.
#[derive(Parser, Debug)]
#[command(name = "chunk-learner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the chunk database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true, overrides_with = "no_json")]
    pub json: bool,

    /// Output plain text even if the config file asks for JSON
    #[arg(long, global = true, overrides_with = "json")]
    pub no_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Recreate the database even if it exists (deletes all chunks)
        #[arg(short, long)]
        force: bool,
    },

    /// Add a new learning chunk
    Add {
        /// Chunk name (prompted if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Longer description
        #[arg(short = 'm', long)]
        description: Option<String>,

        /// Difficulty from 1 (easy) to 5 (hard)
        #[arg(short, long)]
        difficulty: Option<i64>,

        /// Prerequisite chunk ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<u64>>,
    },

    /// Add prerequisites to an existing chunk
    Depend {
        /// The chunk that needs the prerequisites
        chunk: u64,

        /// Prerequisite chunk ids
        #[arg(required = true)]
        on: Vec<u64>,
    },

    /// List all chunks
    List {
        /// Only show chunks that can be worked on now, best first
        #[arg(short, long)]
        available: bool,
    },

    /// Show a chunk with its prerequisites and dependents
    Show {
        /// Chunk id
        id: u64,
    },

    /// Mark a chunk as completed
    Complete {
        /// Chunk id
        id: u64,
    },

    /// Show the next chunk you should work on
    Next,

    /// Show progress totals
    Status,

    /// Export all chunks and dependencies as JSON
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    /// Logging verbosity selected by the flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }

    /// Config values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database: self.database.clone(),
            json: match (self.json, self.no_json) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            },
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute a parsed command against the resolved settings.
///
/// Command output goes to stdout; interactive prompts go to stderr.
pub fn execute(command: Option<Commands>, settings: &Config) -> Result<(), CliError> {
    let db_path = settings.database.as_path();
    let json_mode = settings.json;
    let mut out = io::stdout().lock();

    match command {
        Some(Commands::Init { force }) => cmd_init(db_path, json_mode, force, &mut out),
        Some(Commands::Add {
            name,
            description,
            difficulty,
            depends_on,
        }) => {
            let request = AddRequest {
                name,
                description,
                difficulty,
                depends_on,
            };
            cmd_add(db_path, json_mode, request, &mut Prompter::stdio(), &mut out)
        }
        Some(Commands::Depend { chunk, on }) => cmd_depend(db_path, json_mode, chunk, &on, &mut out),
        Some(Commands::List { available }) => cmd_list(db_path, json_mode, available, &mut out),
        Some(Commands::Show { id }) => cmd_show(db_path, json_mode, id, &mut out),
        Some(Commands::Complete { id }) => cmd_complete(db_path, json_mode, id, &mut out),
        Some(Commands::Next) => cmd_next(db_path, json_mode, &mut out),
        Some(Commands::Export { output }) => cmd_export(db_path, json_mode, &output, &mut out),
        Some(Commands::Status) | None => {
            // No subcommand - show status by default
            cmd_status(db_path, json_mode, &mut out)
        }
    }
}
