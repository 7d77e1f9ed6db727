//! # chunk-learner
//!
//! Manage a learning journey in bite-sized pieces.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │          apps/chunk-learner (THE BINARY)      │
//! │                                               │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//! │  │   CLI    │   │  Config  │   │  Prompts  │  │
//! │  │  (clap)  │   │  (toml)  │   │  (stdin)  │  │
//! │  └────┬─────┘   └────┬─────┘   └─────┬─────┘  │
//! │       └──────────────┼───────────────┘        │
//! │                      ▼                        │
//! │            ┌────────────────────┐             │
//! │            │ chunk-learner-core │             │
//! │            │    (THE LOGIC)     │             │
//! │            └────────────────────┘             │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! chunk-learner init
//! chunk-learner add --name "Learn Pandas" --difficulty 2
//! chunk-learner add --name "Build ML Model" --difficulty 4 --depends-on 1
//! chunk-learner next
//! chunk-learner complete 1
//! ```

use chunk_learner::cli::Cli;
use chunk_learner::config::{Config, LogFormat};
use chunk_learner::logging::init_logging;
use clap::Parser;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Resolve config before logging so the log format can come from it.
    let config = Config::load(cli.config.as_deref(), &cli.overrides());
    let log_format = config
        .as_ref()
        .map(|config| config.log_format)
        .unwrap_or(LogFormat::Text);
    init_logging(log_format, cli.verbosity());

    let result = config.and_then(|config| chunk_learner::run(cli, &config));
    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
