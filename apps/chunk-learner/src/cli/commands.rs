//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command except `init` opens an existing database and fails with
//! `CliError::NotInitialized` otherwise. Commands write their output to the
//! `out` writer they are given (stdout in production); in JSON mode that is
//! exactly one pretty-printed JSON document. Prompts never go to `out`.

use crate::error::CliError;
use crate::prompt::Prompter;
use chunk_learner_core::primitives::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use chunk_learner_core::{
    Chunk, ChunkError, ChunkId, ChunkState, ChunkStore, ChunkView, Completion, RedbStore,
    Scheduler, Snapshot, complete,
};
use serde::Serialize;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Open an existing database.
pub fn open_store(db_path: &Path) -> Result<RedbStore, CliError> {
    if !db_path.exists() {
        return Err(CliError::NotInitialized(db_path.to_path_buf()));
    }
    let store = RedbStore::open(db_path)?;
    tracing::debug!(database = %store.path().display(), "opened database");
    Ok(store)
}

/// Write a value as pretty JSON.
fn print_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn fetch_chunk(store: &impl ChunkStore, id: ChunkId) -> Result<Chunk, CliError> {
    Ok(store.get_chunk(id)?.ok_or(ChunkError::ChunkNotFound(id))?)
}

fn state_marker(state: ChunkState) -> &'static str {
    match state {
        ChunkState::Completed => "✓",
        ChunkState::Available => "○",
        ChunkState::Blocked => "✗",
    }
}

fn format_ids(ids: &[ChunkId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate an output path.
///
/// The parent directory must exist; the returned path has a canonical
/// parent and the original file name.
fn validate_output_path(path: &Path) -> Result<PathBuf, CliError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Invalid output directory '{}': {}", parent.display(), e),
        ))
    })?;

    let filename = path.file_name().ok_or_else(|| {
        CliError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Output path '{}' has no file name", path.display()),
        ))
    })?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// DEPENDENCY LINKING
// =============================================================================

/// What happened to one requested prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// The edge was stored.
    Added { depends_on: ChunkId },
    /// The edge already existed.
    Exists { depends_on: ChunkId },
    /// The edge was refused (unknown chunk, self-loop or cycle).
    Rejected { depends_on: ChunkId, reason: String },
}

/// Add each prerequisite to `chunk`, reporting and skipping refusals.
///
/// Storage failures abort; validation failures do not.
pub fn link_dependencies(
    store: &mut impl ChunkStore,
    chunk: ChunkId,
    depends_on: &[ChunkId],
) -> Result<Vec<LinkOutcome>, CliError> {
    let mut outcomes = Vec::with_capacity(depends_on.len());
    for &target in depends_on {
        let outcome = match store.add_dependency(chunk, target) {
            Ok(true) => {
                tracing::info!(chunk = chunk.value(), depends_on = target.value(), "added dependency");
                LinkOutcome::Added { depends_on: target }
            }
            Ok(false) => LinkOutcome::Exists { depends_on: target },
            Err(e) if e.is_storage() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(chunk = chunk.value(), depends_on = target.value(), error = %e, "dependency rejected");
                LinkOutcome::Rejected {
                    depends_on: target,
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn print_links(out: &mut impl Write, chunk: ChunkId, outcomes: &[LinkOutcome]) -> Result<(), CliError> {
    for outcome in outcomes {
        match outcome {
            LinkOutcome::Added { depends_on } => {
                writeln!(out, "✓ Added dependency on chunk {}", depends_on)?;
            }
            LinkOutcome::Exists { depends_on } => {
                writeln!(out, "• Chunk {} already depends on {}", chunk, depends_on)?;
            }
            LinkOutcome::Rejected { depends_on, reason } => {
                writeln!(out, "✗ Failed to add dependency on chunk {}: {}", depends_on, reason)?;
            }
        }
    }
    Ok(())
}

/// Split a comma-separated answer into ids and unparseable pieces.
///
/// Blank pieces are ignored.
pub fn parse_id_list(input: &str) -> (Vec<ChunkId>, Vec<String>) {
    let mut ids = Vec::new();
    let mut invalid = Vec::new();
    for piece in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match piece.trim_start_matches('#').parse::<u64>() {
            Ok(id) => ids.push(ChunkId(id)),
            Err(_) => invalid.push(piece.to_string()),
        }
    }
    (ids, invalid)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
///
/// An existing database is left alone unless `force` is set, in which case
/// it is deleted and recreated empty.
pub fn cmd_init(
    db_path: &Path,
    json_mode: bool,
    force: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if db_path.exists() {
        if !force {
            if json_mode {
                return print_json(out, &serde_json::json!({
                    "database": db_path.display().to_string(),
                    "initialized": false,
                    "message": "Database already exists",
                }));
            }
            writeln!(out, "Database already exists at {}", db_path.display())?;
            writeln!(out, "Use --force to recreate it (this deletes every chunk).")?;
            return Ok(());
        }
        fs::remove_file(db_path)?;
        tracing::warn!(database = %db_path.display(), "removed existing database");
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let _store = RedbStore::open(db_path)?;
    tracing::info!(database = %db_path.display(), "initialized database");

    if json_mode {
        return print_json(out, &serde_json::json!({
            "database": db_path.display().to_string(),
            "initialized": true,
        }));
    }
    writeln!(out, "✓ Database initialized successfully!")?;
    writeln!(out, "Database location: {}", db_path.display())?;
    Ok(())
}

// =============================================================================
// ADD COMMAND
// =============================================================================

/// Fields for a new chunk; `None` means "ask".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<i64>,
    pub depends_on: Option<Vec<u64>>,
}

/// Create a chunk, prompting for what the flags left out.
///
/// Without `--name` the command is interactive: it also asks for a
/// description and, unless `--depends-on` was given, offers to pick
/// prerequisites from the existing chunks. The difficulty is always asked
/// for when missing. Every refused prerequisite is reported and skipped.
pub fn cmd_add<R: BufRead, W: Write>(
    db_path: &Path,
    json_mode: bool,
    request: AddRequest,
    prompter: &mut Prompter<R, W>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let interactive = request.name.is_none();

    if interactive {
        prompter.say("Create a new learning chunk")?;
    }
    let name = match request.name {
        Some(name) => name,
        None => prompter.required_text("Chunk name")?,
    };
    let description = match request.description {
        Some(description) => description,
        None if interactive => prompter.text("Description")?,
        None => String::new(),
    };
    let difficulty = match request.difficulty {
        Some(difficulty) => difficulty,
        None => prompter.number(
            &format!("Difficulty ({}-{})", MIN_DIFFICULTY, MAX_DIFFICULTY),
            i64::from(MIN_DIFFICULTY)..=i64::from(MAX_DIFFICULTY),
        )?,
    };

    let id = store.create_chunk(&name, &description, difficulty)?;
    let chunk = fetch_chunk(&store, id)?;
    tracing::info!(chunk = id.value(), difficulty, "created chunk");
    if !json_mode {
        writeln!(out, "✓ Created chunk {}: {}", id, chunk.name)?;
    }

    let (requested, invalid) = match request.depends_on {
        Some(ids) => (ids.into_iter().map(ChunkId).collect(), Vec::new()),
        None if interactive => select_dependencies(&store, id, prompter)?,
        None => (Vec::new(), Vec::new()),
    };
    let links = link_dependencies(&mut store, id, &requested)?;

    if json_mode {
        return print_json(out, &serde_json::json!({
            "chunk": chunk,
            "dependencies": links,
            "invalid_ids": invalid,
        }));
    }
    for piece in &invalid {
        writeln!(out, "✗ Invalid chunk ID: {}", piece)?;
    }
    print_links(out, id, &links)?;
    Ok(())
}

/// Offer the other chunks as prerequisites and read a comma-separated choice.
fn select_dependencies<R: BufRead, W: Write>(
    store: &impl ChunkStore,
    created: ChunkId,
    prompter: &mut Prompter<R, W>,
) -> Result<(Vec<ChunkId>, Vec<String>), CliError> {
    if !prompter.confirm("Does this chunk depend on any other chunks?", false)? {
        return Ok((Vec::new(), Vec::new()));
    }

    let others: Vec<Chunk> = store
        .list_chunks()?
        .into_iter()
        .filter(|chunk| chunk.id != created)
        .collect();
    if others.is_empty() {
        prompter.say("No other chunks available yet!")?;
        return Ok((Vec::new(), Vec::new()));
    }

    prompter.say("Available chunks:")?;
    for chunk in &others {
        prompter.say(&format!("  {}: {}", chunk.id.value(), chunk.name))?;
    }
    let answer = prompter.text("Enter dependency chunk IDs (comma-separated)")?;
    Ok(parse_id_list(&answer))
}

// =============================================================================
// DEPEND COMMAND
// =============================================================================

/// Add prerequisites to an existing chunk.
pub fn cmd_depend(
    db_path: &Path,
    json_mode: bool,
    chunk: u64,
    on: &[u64],
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let chunk = fetch_chunk(&store, ChunkId(chunk))?;

    let targets: Vec<ChunkId> = on.iter().copied().map(ChunkId).collect();
    let links = link_dependencies(&mut store, chunk.id, &targets)?;

    if json_mode {
        return print_json(out, &serde_json::json!({
            "chunk": chunk.id,
            "dependencies": links,
        }));
    }
    print_links(out, chunk.id, &links)?;
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List chunks, or only the available ones in recommendation order.
pub fn cmd_list(
    db_path: &Path,
    json_mode: bool,
    available_only: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let mut views = Scheduler::new(&store).views()?;

    if available_only {
        views.retain(|view| view.state == ChunkState::Available);
        views.sort_by_key(|view| view.chunk.priority_key());
    }

    if json_mode {
        return print_json(out, &views);
    }

    if views.is_empty() {
        if available_only {
            writeln!(out, "No chunks available right now.")?;
        } else {
            writeln!(out, "No chunks yet! Use `chunk-learner add` to create one.")?;
        }
        return Ok(());
    }

    print_table(out, &views)?;
    Ok(())
}

fn print_table(out: &mut impl Write, views: &[ChunkView]) -> Result<(), CliError> {
    let name_width = views
        .iter()
        .map(|view| view.chunk.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());

    writeln!(
        out,
        "{:>4}  {:<name_width$}  {:<10}  {:<11}  Dependencies",
        "ID", "Name", "Difficulty", "Status"
    )?;
    writeln!(out, "{}", "-".repeat(name_width + 45))?;
    for view in views {
        let status = format!("{} {}", state_marker(view.state), view.state);
        writeln!(
            out,
            "{:>4}  {:<name_width$}  {:<10}  {:<11}  {}",
            view.chunk.id.value(),
            view.chunk.name,
            view.chunk.difficulty.stars(),
            status,
            format_ids(&view.depends_on),
        )?;
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show a chunk, what it needs and what it unlocks.
pub fn cmd_show(db_path: &Path, json_mode: bool, id: u64, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let chunk = fetch_chunk(&store, ChunkId(id))?;
    let state = Scheduler::new(&store).state_of(&chunk)?;
    let dependencies = store.get_dependencies(chunk.id)?;
    let dependents = store.get_dependents(chunk.id)?;

    if json_mode {
        return print_json(out, &serde_json::json!({
            "chunk": chunk,
            "state": state,
            "dependencies": dependencies,
            "dependents": dependents,
        }));
    }

    writeln!(out, "{} {}", chunk.id, chunk.name)?;
    writeln!(out, "{}", "=".repeat(chunk.name.chars().count() + chunk.id.to_string().len() + 1))?;
    writeln!(out, "Difficulty: {} ({})", chunk.difficulty.stars(), chunk.difficulty)?;
    writeln!(out, "Status:     {} {}", state_marker(state), state)?;
    writeln!(out, "Created:    {}", chunk.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    if let Some(at) = chunk.completed_at {
        writeln!(out, "Completed:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    }
    if !chunk.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", chunk.description)?;
    }

    writeln!(out)?;
    if dependencies.is_empty() {
        writeln!(out, "Dependencies: none")?;
    } else {
        writeln!(out, "Dependencies:")?;
        for dep in &dependencies {
            let mark = if dep.completed { "✓" } else { "○" };
            writeln!(out, "  {} {}: {}", mark, dep.id, dep.name)?;
        }
    }
    if !dependents.is_empty() {
        writeln!(out, "Unlocks:")?;
        for dependent in &dependents {
            writeln!(out, "  {}: {}", dependent.id, dependent.name)?;
        }
    }
    Ok(())
}

// =============================================================================
// COMPLETE COMMAND
// =============================================================================

/// Mark a chunk completed if its direct prerequisites are all done.
///
/// A blocked chunk lists its blockers and fails with `CliError::Blocked`.
/// Completing an already-completed chunk is informational.
pub fn cmd_complete(
    db_path: &Path,
    json_mode: bool,
    id: u64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;

    match complete(&mut store, ChunkId(id))? {
        Completion::Completed(chunk) => {
            tracing::info!(chunk = chunk.id.value(), "completed chunk");
            let scheduler = Scheduler::new(&store);
            let mut unlocked: Vec<Chunk> = Vec::new();
            for dependent in store.get_dependents(chunk.id)? {
                if scheduler.state_of(&dependent)? == ChunkState::Available {
                    unlocked.push(dependent);
                }
            }

            if json_mode {
                return print_json(out, &serde_json::json!({
                    "status": "completed",
                    "chunk": chunk,
                    "unlocked": unlocked,
                }));
            }
            writeln!(out, "✓ Completed chunk {}: {}", chunk.id, chunk.name)?;
            for dependent in &unlocked {
                writeln!(out, "  Unlocked {}: {}", dependent.id, dependent.name)?;
            }
            Ok(())
        }
        Completion::AlreadyCompleted(chunk) => {
            if json_mode {
                return print_json(out, &serde_json::json!({
                    "status": "already_completed",
                    "chunk": chunk,
                }));
            }
            writeln!(out, "Chunk {} is already completed!", chunk.id)?;
            Ok(())
        }
        Completion::Blocked { chunk, blockers } => {
            if json_mode {
                print_json(out, &serde_json::json!({
                    "status": "blocked",
                    "chunk": chunk,
                    "blockers": blockers,
                }))?;
            } else {
                writeln!(out, "Cannot complete chunk {}. Incomplete dependencies:", chunk.id)?;
                for dep in &blockers {
                    writeln!(out, "  - {}: {}", dep.id, dep.name)?;
                }
            }
            Err(CliError::Blocked {
                chunk: chunk.id,
                blockers: blockers.iter().map(|dep| dep.id).collect(),
            })
        }
    }
}

// =============================================================================
// NEXT COMMAND
// =============================================================================

/// Recommend the next chunk to work on.
pub fn cmd_next(db_path: &Path, json_mode: bool, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let next = Scheduler::new(&store).next_available()?;

    let Some(chunk) = next else {
        if json_mode {
            return print_json(out, &serde_json::json!({ "next": null }));
        }
        writeln!(
            out,
            "No chunks available! Either you're done or all chunks are blocked by dependencies."
        )?;
        return Ok(());
    };

    let dependencies = store.get_dependencies(chunk.id)?;
    if json_mode {
        return print_json(out, &serde_json::json!({
            "next": chunk,
            "dependencies": dependencies,
        }));
    }

    writeln!(out, "Next chunk to work on:")?;
    writeln!(out)?;
    writeln!(out, "{} {}", chunk.id, chunk.name)?;
    writeln!(out, "Difficulty: {}", chunk.difficulty.stars())?;
    if !chunk.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", chunk.description)?;
    }
    if !dependencies.is_empty() {
        writeln!(out)?;
        writeln!(out, "Dependencies (all completed):")?;
        for dep in &dependencies {
            writeln!(out, "  ✓ {}: {}", dep.id, dep.name)?;
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show progress totals.
pub fn cmd_status(db_path: &Path, json_mode: bool, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let scheduler = Scheduler::new(&store);
    let progress = scheduler.progress()?;
    let next = scheduler.next_available()?;
    let dependency_count = store.dependency_count()?;

    if json_mode {
        return print_json(out, &serde_json::json!({
            "database": db_path.display().to_string(),
            "progress": progress,
            "remaining": progress.remaining(),
            "dependencies": dependency_count,
            "next": next.map(|chunk| chunk.id),
        }));
    }

    writeln!(out, "Chunk Learner Status")?;
    writeln!(out, "====================")?;
    writeln!(out, "Database:     {}", db_path.display())?;
    writeln!(out)?;
    writeln!(out, "Chunks:       {}", progress.total)?;
    writeln!(
        out,
        "Completed:    {} ({}%)",
        progress.completed, progress.percent_complete
    )?;
    writeln!(out, "Remaining:    {}", progress.remaining())?;
    writeln!(out, "Available:    {}", progress.available)?;
    writeln!(out, "Blocked:      {}", progress.blocked)?;
    writeln!(out, "Dependencies: {}", dependency_count)?;
    if let Some(chunk) = next {
        writeln!(out)?;
        writeln!(out, "Next up: {} {}", chunk.id, chunk.name)?;
    } else if progress.is_finished() {
        writeln!(out)?;
        writeln!(out, "Everything is done!")?;
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write a JSON snapshot of every chunk and dependency to `output`.
///
/// The summary goes to `out`; the snapshot itself only goes to the file.
pub fn cmd_export(
    db_path: &Path,
    json_mode: bool,
    output: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let validated_output = validate_output_path(output)?;
    let store = open_store(db_path)?;

    let snapshot = Snapshot::capture(&store)?;
    let data = serde_json::to_vec_pretty(&snapshot)?;
    fs::write(&validated_output, &data)?;

    tracing::info!(
        output = %validated_output.display(),
        chunks = snapshot.chunks.len(),
        dependencies = snapshot.dependencies.len(),
        "exported snapshot"
    );
    if json_mode {
        return print_json(out, &serde_json::json!({
            "output": validated_output.display().to_string(),
            "chunks": snapshot.chunks.len(),
            "dependencies": snapshot.dependencies.len(),
        }));
    }
    writeln!(
        out,
        "Exported {} chunks and {} dependencies to {}",
        snapshot.chunks.len(),
        snapshot.dependencies.len(),
        validated_output.display()
    )?;
    Ok(())
}
