//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--verbose` / `--quiet` flags
//! 2. `RUST_LOG` environment variable
//! 3. default to `chunk_learner=warn`
//!
//! Logs are sent to STDERR so that stdout carries only command output
//! (and stays parseable in `--json` mode).

use crate::config::LogFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How chatty the logs should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// `RUST_LOG`, falling back to warnings.
    #[default]
    Normal,
    /// Debug output from this crate.
    Verbose,
}

impl Verbosity {
    /// Map the `--verbose` / `--quiet` flags.
    #[must_use]
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Filter directive forced by the flags, if any.
    #[must_use]
    pub fn directive(self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("chunk_learner=error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("chunk_learner=debug"),
        }
    }
}

/// Filter applied when neither flags nor `RUST_LOG` say otherwise.
pub const DEFAULT_FILTER: &str = "chunk_learner=warn";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(format: LogFormat, verbosity: Verbosity) {
    let filter = match verbosity.directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn normal_defers_to_environment() {
        assert_eq!(Verbosity::Normal.directive(), None);
        assert_eq!(Verbosity::Verbose.directive(), Some("chunk_learner=debug"));
    }
}
