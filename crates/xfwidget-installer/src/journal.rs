use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use xfwidget_core::Action;

use crate::fs_utils::remove_file_if_exists;
use crate::layout::HomeLayout;

pub const RUN_METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Planning,
    Applying,
    Committed,
    RollingBack,
    RolledBack,
    Failed,
    Superseded,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Applying => "applying",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Superseded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: u32,
    pub run_id: String,
    pub status: RunStatus,
    pub started_at_unix: u64,
}

impl RunMetadata {
    pub fn new(started_at_unix: u64) -> Self {
        Self {
            version: RUN_METADATA_VERSION,
            run_id: format!("run-{started_at_unix}-{}", std::process::id()),
            status: RunStatus::Planning,
            started_at_unix,
        }
    }

    pub fn owner_pid(&self) -> Option<u32> {
        self.run_id.rsplit('-').next()?.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoMarker {
    pub undone: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JournalLine {
    Entry(JournalEntry),
    Undo(UndoMarker),
}

#[derive(Debug, Clone)]
pub struct RunJournal {
    layout: HomeLayout,
    run_id: String,
}

impl RunJournal {
    pub fn new(layout: HomeLayout, run_id: impl Into<String>) -> Self {
        Self {
            layout,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        append_journal_entry(&self.layout, &self.run_id, entry)
    }

    pub fn mark_undone(&self, seq: u64) -> Result<()> {
        append_undo_marker(&self.layout, &self.run_id, seq)
    }
}

pub fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && run_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}

pub fn set_active_run(layout: &HomeLayout, run_id: &str) -> Result<PathBuf> {
    let path = layout.active_run_path();
    ensure_parent(&path)?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let existing = read_active_run(layout).ok().flatten();
            let detail = existing
                .map(|existing| format!(" (run={existing})"))
                .unwrap_or_default();
            return Err(anyhow!("another install run is active{detail}"));
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to claim active run file: {}", path.display()));
        }
    };

    file.write_all(format!("{run_id}\n").as_bytes())
        .with_context(|| format!("failed to write active run file: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush active run file: {}", path.display()))?;
    Ok(path)
}

pub fn read_active_run(layout: &HomeLayout) -> Result<Option<String>> {
    let path = layout.active_run_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read active run file: {}", path.display()));
        }
    };

    let run_id = raw.trim();
    if run_id.is_empty() {
        return Ok(None);
    }
    Ok(Some(run_id.to_string()))
}

pub fn clear_active_run(layout: &HomeLayout) -> Result<()> {
    let path = layout.active_run_path();
    remove_file_if_exists(&path)
        .with_context(|| format!("failed to clear active run file: {}", path.display()))
}

pub fn write_run_metadata(layout: &HomeLayout, metadata: &RunMetadata) -> Result<PathBuf> {
    let path = layout.run_metadata_path(&metadata.run_id);
    ensure_parent(&path)?;
    let mut raw =
        serde_json::to_string_pretty(metadata).context("failed to encode run metadata")?;
    raw.push('\n');
    fs::write(&path, raw)
        .with_context(|| format!("failed to write run metadata file: {}", path.display()))?;
    Ok(path)
}

pub fn read_run_metadata(layout: &HomeLayout, run_id: &str) -> Result<Option<RunMetadata>> {
    let path = layout.run_metadata_path(run_id);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read run metadata file: {}", path.display()));
        }
    };
    let metadata = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing run metadata file: {}", path.display()))?;
    Ok(Some(metadata))
}

pub fn update_run_status(layout: &HomeLayout, run_id: &str, status: RunStatus) -> Result<()> {
    let mut metadata = read_run_metadata(layout, run_id)?
        .ok_or_else(|| anyhow!("run metadata not found for '{run_id}'"))?;
    metadata.status = status;
    write_run_metadata(layout, &metadata)?;
    log::debug!("run {run_id} -> {status}");
    Ok(())
}

pub fn append_journal_entry(layout: &HomeLayout, run_id: &str, entry: &JournalEntry) -> Result<()> {
    let line = serde_json::to_string(entry).context("failed to encode journal entry")?;
    append_journal_line(layout, run_id, line)
}

pub fn append_undo_marker(layout: &HomeLayout, run_id: &str, seq: u64) -> Result<()> {
    let line = serde_json::to_string(&UndoMarker { undone: seq })
        .context("failed to encode undo marker")?;
    append_journal_line(layout, run_id, line)
}

fn append_journal_line(layout: &HomeLayout, run_id: &str, mut line: String) -> Result<()> {
    let path = layout.run_journal_path(run_id);
    ensure_parent(&path)?;

    line.push('\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open run journal: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("failed to append run journal: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush run journal: {}", path.display()))?;
    Ok(())
}

/// Recorded actions in order, undone or not. A torn final line (process
/// killed mid-write) is dropped; damage anywhere else is an error.
pub fn read_journal(layout: &HomeLayout, run_id: &str) -> Result<Vec<JournalEntry>> {
    Ok(read_journal_lines(layout, run_id)?
        .into_iter()
        .filter_map(|line| match line {
            JournalLine::Entry(entry) => Some(entry),
            JournalLine::Undo(_) => None,
        })
        .collect())
}

pub fn outstanding_journal_entries(layout: &HomeLayout, run_id: &str) -> Result<Vec<JournalEntry>> {
    let lines = read_journal_lines(layout, run_id)?;
    let undone: HashSet<u64> = lines
        .iter()
        .filter_map(|line| match line {
            JournalLine::Undo(marker) => Some(marker.undone),
            JournalLine::Entry(_) => None,
        })
        .collect();
    Ok(lines
        .into_iter()
        .filter_map(|line| match line {
            JournalLine::Entry(entry) if !undone.contains(&entry.seq) => Some(entry),
            _ => None,
        })
        .collect())
}

fn read_journal_lines(layout: &HomeLayout, run_id: &str) -> Result<Vec<JournalLine>> {
    let path = layout.run_journal_path(run_id);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read run journal: {}", path.display()));
        }
    };

    let lines: Vec<&str> = raw.lines().filter(|line| !line.trim().is_empty()).collect();
    let mut parsed = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str::<JournalLine>(line) {
            Ok(line) => parsed.push(line),
            Err(err) if index + 1 == lines.len() => {
                log::warn!("ignoring torn journal tail in {}: {err}", path.display());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("invalid journal line {} in {}", index + 1, path.display())
                });
            }
        }
    }
    Ok(parsed)
}

pub fn latest_unsettled_run(layout: &HomeLayout) -> Result<Option<RunMetadata>> {
    Ok(unsettled_runs(layout)?.into_iter().max_by(|left, right| {
        (left.started_at_unix, &left.run_id).cmp(&(right.started_at_unix, &right.run_id))
    }))
}

pub fn supersede_unsettled_runs(layout: &HomeLayout, committed_run_id: &str) -> Result<Vec<String>> {
    let mut superseded = Vec::new();
    for metadata in unsettled_runs(layout)? {
        if metadata.run_id == committed_run_id {
            continue;
        }
        update_run_status(layout, &metadata.run_id, RunStatus::Superseded)?;
        log::info!(
            "run {} ({}) superseded by {committed_run_id}",
            metadata.run_id,
            metadata.status
        );
        superseded.push(metadata.run_id);
    }
    superseded.sort();
    Ok(superseded)
}

fn unsettled_runs(layout: &HomeLayout) -> Result<Vec<RunMetadata>> {
    let dir = layout.runs_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", dir.display()));
        }
    };

    let mut runs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(run_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some(metadata) = read_run_metadata(layout, run_id)? else {
            continue;
        };
        if !metadata.status.is_settled() {
            runs.push(metadata);
        }
    }
    Ok(runs)
}

pub fn run_owner_alive(metadata: &RunMetadata) -> bool {
    match metadata.owner_pid() {
        Some(pid) if pid == std::process::id() => true,
        Some(pid) => Path::new("/proc").join(pid.to_string()).exists(),
        None => false,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
