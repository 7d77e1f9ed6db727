//! # chunk-learner
//!
//! Command-line front end for `chunk-learner-core`: argument parsing,
//! layered configuration, logging setup and interactive prompts.
//!
//! The binary in `main.rs` is a thin wrapper around [`run`].

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod prompt;

use cli::Cli;
use config::Config;
use error::CliError;

/// Execute the command in `cli` with resolved settings.
pub fn run(cli: Cli, config: &Config) -> Result<(), CliError> {
    tracing::debug!(
        database = %config.database.display(),
        json = config.json,
        "resolved configuration"
    );
    cli::execute(cli.command, config)
}
