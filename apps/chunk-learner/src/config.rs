//! # Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. TOML file (`--config <path>`, else `chunk-learner.toml` in the working
//!    directory if it exists)
//! 3. environment (`CHUNK_LEARNER_DB`, `CHUNK_LEARNER_LOG_FORMAT`)
//! 4. command-line flags
//!
//! Environment lookup is passed in as a function so resolution stays pure.

use crate::error::CliError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Database file used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "chunk-learner.redb";

/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "chunk-learner.toml";

/// Environment variable overriding the database path.
pub const ENV_DATABASE: &str = "CHUNK_LEARNER_DB";

/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "CHUNK_LEARNER_LOG_FORMAT";

// =============================================================================
// LOG FORMAT
// =============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, CliError> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CliError::Config(format!(
                "Unknown log format '{}'. Use: text, json",
                other
            ))),
        }
    }
}

// =============================================================================
// FILE LAYER
// =============================================================================

/// Contents of a `chunk-learner.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Path to the database. Relative paths resolve against the config
    /// file's directory.
    pub database: Option<PathBuf>,
    /// Default to JSON output.
    pub json: Option<bool>,
    /// Log line format.
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn parse(contents: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&contents)?;

        if let Some(database) = config.database.take() {
            config.database = Some(match path.parent() {
                Some(dir) if database.is_relative() => dir.join(database),
                _ => database,
            });
        }
        Ok(config)
    }
}

/// Pick the config file to read, if any.
///
/// An explicit path must exist. Without one, `chunk-learner.toml` in `cwd`
/// is used when present.
pub fn discover_config_file(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>, CliError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(CliError::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let candidate = cwd.join(DEFAULT_CONFIG_FILE);
    Ok(candidate.is_file().then_some(candidate))
}

// =============================================================================
// RESOLVED CONFIG
// =============================================================================

/// Values taken from command-line flags. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    /// `--json` gives `Some(true)`, `--no-json` gives `Some(false)`.
    pub json: Option<bool>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database file.
    pub database: PathBuf,
    /// Print machine-readable JSON instead of text.
    pub json: bool,
    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            json: false,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Merge the layers. `env` looks up an environment variable.
    pub fn resolve<F>(file: Option<FileConfig>, env: F, overrides: &Overrides) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(file) = file {
            if let Some(database) = file.database {
                config.database = database;
            }
            if let Some(json) = file.json {
                config.json = json;
            }
            if let Some(format) = file.log_format {
                config.log_format = format;
            }
        }

        if let Some(database) = env(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            config.database = PathBuf::from(database);
        }
        if let Some(format) = env(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
            config.log_format = LogFormat::parse(&format)?;
        }

        if let Some(database) = &overrides.database {
            config.database = database.clone();
        }
        if let Some(json) = overrides.json {
            config.json = json;
        }

        Ok(config)
    }

    /// Discover, read and merge every layer from the real environment.
    pub fn load(explicit_file: Option<&Path>, overrides: &Overrides) -> Result<Self, CliError> {
        let cwd = std::env::current_dir()?;
        let file = discover_config_file(explicit_file, &cwd)?
            .map(|path| FileConfig::load(&path))
            .transpose()?;
        Self::resolve(file, |key| std::env::var(key).ok(), overrides)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_layers() {
        let config = Config::resolve(None, env_of(&[]), &Overrides::default()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
    }

    #[test]
    fn file_overrides_defaults() {
        let file = FileConfig::parse("database = \"study.redb\"\njson = true\nlog_format = \"json\"\n")
            .unwrap();
        let config = Config::resolve(Some(file), env_of(&[]), &Overrides::default()).unwrap();
        assert_eq!(config.database, PathBuf::from("study.redb"));
        assert!(config.json);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_file_and_flags_override_env() {
        let file = FileConfig::parse("database = \"file.redb\"").unwrap();
        let env = env_of(&[(ENV_DATABASE, "env.redb")]);

        let config = Config::resolve(Some(file.clone()), &env, &Overrides::default()).unwrap();
        assert_eq!(config.database, PathBuf::from("env.redb"));

        let overrides = Overrides {
            database: Some(PathBuf::from("flag.redb")),
            json: None,
        };
        let config = Config::resolve(Some(file), &env, &overrides).unwrap();
        assert_eq!(config.database, PathBuf::from("flag.redb"));
    }

    #[test]
    fn flag_turns_file_json_off() {
        let file = FileConfig::parse("json = true").unwrap();
        let overrides = Overrides {
            database: None,
            json: Some(false),
        };
        let config = Config::resolve(Some(file.clone()), env_of(&[]), &overrides).unwrap();
        assert!(!config.json);

        let config = Config::resolve(Some(file), env_of(&[]), &Overrides::default()).unwrap();
        assert!(config.json);
    }

    #[test]
    fn blank_env_is_ignored() {
        let env = env_of(&[(ENV_DATABASE, "  ")]);
        let config = Config::resolve(None, env, &Overrides::default()).unwrap();
        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
    }

    #[test]
    fn bad_log_format_in_env_is_an_error() {
        let env = env_of(&[(ENV_LOG_FORMAT, "yaml")]);
        let result = Config::resolve(None, env, &Overrides::default());
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileConfig::parse("databse = \"typo.redb\""),
            Err(CliError::Toml(_))
        ));
    }

    #[test]
    fn relative_database_resolves_against_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "database = \"data/chunks.redb\"").unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.database, Some(dir.path().join("data/chunks.redb")));
    }

    #[test]
    fn discovery_prefers_explicit_then_cwd() {
        let dir = tempdir().unwrap();
        assert_eq!(discover_config_file(None, dir.path()).unwrap(), None);

        let default = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&default, "").unwrap();
        assert_eq!(discover_config_file(None, dir.path()).unwrap(), Some(default));

        let missing = dir.path().join("missing.toml");
        assert!(discover_config_file(Some(&missing), dir.path()).is_err());
    }
}
