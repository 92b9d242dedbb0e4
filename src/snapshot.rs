//! # Snapshots
//!
//! A [`Snapshot`] maps plugin names to the commit each plugin currently has
//! checked out. Snapshots are persisted as JSON objects with sorted keys and
//! can be fed back to [`crate::checkout::apply_checkout`] to restore that
//! state.
//!
//! ## Rollback History
//!
//! Before every checkout an automatic snapshot is written into the rollback
//! directory, one file per checkout, named by local time as
//! `YYYYMMDDHHMMSS.json`. Applying one of those files does not write a new
//! one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::git;
use crate::job::Job;
use crate::scheduler::Scheduler;
use crate::spec::PluginSpec;

/// Plugin name to commit hash.
pub type Snapshot = BTreeMap<String, String>;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Record the current commit of every plugin.
///
/// Plugins whose commit cannot be read are left out.
pub async fn snapshot(specs: &[PluginSpec], scheduler: &Scheduler) -> Snapshot {
    let mut jobs: Vec<Job> = specs
        .iter()
        .map(|spec| Job::with_command(&spec.path, git::head()))
        .collect();
    scheduler.run(&mut jobs).await;

    specs
        .iter()
        .zip(&jobs)
        .filter(|(_, job)| !job.is_failed())
        .filter_map(|(spec, job)| Some((spec.name.clone(), job.output_line()?)))
        .collect()
}

/// Write a snapshot as pretty-printed JSON, creating parent directories.
pub fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut json = serde_json::to_string_pretty(snapshot)?;
    json.push('\n');
    fs::write(path, json)?;
    debug!("Wrote snapshot of {} plugins to {}", snapshot.len(), path.display());
    Ok(())
}

/// Load a snapshot file, keeping only string values.
pub fn load(path: &Path) -> Result<Snapshot> {
    Ok(load_targets(path)?
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::String(commit) => Some((name, commit)),
            _ => None,
        })
        .collect())
}

/// Load a checkout target file as raw JSON values.
///
/// Fails with [`Error::SnapshotParse`] when the file cannot be read or is not
/// a JSON object.
pub fn load_targets(path: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
    let parse_error = |message: String| Error::SnapshotParse {
        path: path.to_path_buf(),
        message,
    };
    let content = fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(parse_error(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Path for a new rollback snapshot in `dir`, stamped with the local time.
///
/// A `-N` suffix is added when a snapshot was already taken this second.
pub fn rollback_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    let mut path = dir.join(format!("{}.json", stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.json", stamp, n));
        n += 1;
    }
    path
}

/// Rollback snapshots in `dir`, oldest first.
pub fn list_rollbacks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort_by_key(|path| rollback_order(path));
    Ok(paths)
}

/// `(stamp, n)` for `<stamp>-<n>.json`, with `n = 0` for the unsuffixed file.
fn rollback_order(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('-') {
        Some((stamp, n)) => match n.parse() {
            Ok(n) => (stamp.to_string(), n),
            Err(_) => (stem.clone(), 0),
        },
        None => (stem, 0),
    }
}

/// Whether `path` lies inside `dir`. Both are canonicalized when possible.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    path.starts_with(dir)
}
