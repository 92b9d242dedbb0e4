//! # Checkout Executor
//!
//! [`apply_checkout`] moves registered plugins to requested targets. A
//! request is a name-to-target mapping, a snapshot file, or the declared
//! checkout target of every plugin.
//!
//! ## Process
//!
//! 1.  **Resolution**: entries for unregistered plugins, plugins with
//!     checkout disabled, and values that are neither a string nor `true`
//!     are dropped.
//! 2.  **Default branch inference**: `true` becomes the remote's default
//!     branch. Entries whose default branch cannot be read are dropped with
//!     a warning.
//! 3.  **Rollback guard**: the current state is snapshotted into the
//!     rollback directory, unless the request is itself a file in there.
//! 4.  **Apply**: every `pre_change` hook fires, then all plugins move in
//!     lockstep (stash, checkout, fast-forward, `FETCH_HEAD` reset), then
//!     every `post_change` hook fires. One plugin failing never stops the
//!     others or any hook.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::git;
use crate::hooks::{fire_all, HookKind};
use crate::job::{clean_all, Job, JobError};
use crate::notify::Level;
use crate::scheduler::Scheduler;
use crate::snapshot;
use crate::spec::{CheckoutTarget, PluginSpec};

/// A requested checkout target for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetValue {
    /// Branch, tag or commit.
    Ref(String),
    /// The remote's default branch.
    DefaultBranch,
    /// Anything else read from a file. Always dropped.
    Other(serde_json::Value),
}

impl From<serde_json::Value> for TargetValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(target) => TargetValue::Ref(target),
            serde_json::Value::Bool(true) => TargetValue::DefaultBranch,
            other => TargetValue::Other(other),
        }
    }
}

impl From<&str> for TargetValue {
    fn from(target: &str) -> Self {
        TargetValue::Ref(target.to_string())
    }
}

/// Plugin name to requested target.
pub type TargetMap = BTreeMap<String, TargetValue>;

/// What to check out.
#[derive(Debug, Clone)]
pub enum CheckoutRequest {
    Map(TargetMap),
    /// A snapshot or target file on disk.
    File(PathBuf),
    /// Every plugin's declared checkout target.
    Declared,
}

impl From<snapshot::Snapshot> for CheckoutRequest {
    fn from(snapshot: snapshot::Snapshot) -> Self {
        CheckoutRequest::Map(
            snapshot
                .into_iter()
                .map(|(name, commit)| (name, TargetValue::Ref(commit)))
                .collect(),
        )
    }
}

/// Outcome of [`apply_checkout`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutReport {
    /// Plugins that were checked out and their concrete target, in
    /// registration order.
    pub applied: Vec<(String, String)>,
    /// Names whose checkout failed.
    pub failed: Vec<String>,
    /// Rollback snapshot written before applying, if any.
    pub rollback: Option<PathBuf>,
}

/// Check out `request` across `specs`.
///
/// Only a request file that cannot be loaded fails the call. Per-plugin
/// failures are recorded in the report and in each spec's state.
pub async fn apply_checkout(
    specs: &mut [PluginSpec],
    request: CheckoutRequest,
    scheduler: &Scheduler,
    rollback_dir: &Path,
) -> Result<CheckoutReport> {
    let skip_rollback = match &request {
        CheckoutRequest::File(path) => snapshot::is_within(path, rollback_dir),
        _ => false,
    };
    let targets = request_targets(specs, request)?;
    let entries = resolve_entries(specs, &targets);
    let entries = infer_default_branches(specs, entries, scheduler).await;

    let mut report = CheckoutReport::default();
    if entries.is_empty() {
        debug!("Nothing to check out");
        return Ok(report);
    }

    if skip_rollback {
        debug!("Request is a rollback snapshot; not taking another");
    } else {
        let current = snapshot::snapshot(specs, scheduler).await;
        let path = snapshot::rollback_path(rollback_dir);
        snapshot::write(&path, &current)?;
        info!("Saved rollback snapshot to {}", path.display());
        report.rollback = Some(path);
    }

    let errors = run_sequence(specs, &entries, scheduler).await;
    for ((index, target), error) in entries.into_iter().zip(errors) {
        let spec = &mut specs[index];
        match error {
            Some(error) => {
                spec.state.error.get_or_insert_with(|| error.to_string());
                report.failed.push(spec.name.clone());
            }
            None => report.applied.push((spec.name.clone(), target)),
        }
    }
    Ok(report)
}

fn request_targets(specs: &[PluginSpec], request: CheckoutRequest) -> Result<TargetMap> {
    Ok(match request {
        CheckoutRequest::Map(map) => map,
        CheckoutRequest::File(path) => snapshot::load_targets(&path)?
            .into_iter()
            .map(|(name, value)| (name, TargetValue::from(value)))
            .collect(),
        CheckoutRequest::Declared => specs
            .iter()
            .filter_map(|spec| {
                let value = match &spec.checkout {
                    Some(CheckoutTarget::Ref(target)) => TargetValue::Ref(target.clone()),
                    Some(CheckoutTarget::DefaultBranch) | None => TargetValue::DefaultBranch,
                    Some(CheckoutTarget::Disabled) => return None,
                };
                Some((spec.name.clone(), value))
            })
            .collect(),
    })
}

/// Keep entries for registered, checkout-enabled plugins with usable values,
/// in registration order.
fn resolve_entries(specs: &[PluginSpec], targets: &TargetMap) -> Vec<(usize, TargetValue)> {
    specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| !spec.is_checkout_disabled())
        .filter_map(|(index, spec)| match targets.get(&spec.name)? {
            TargetValue::Other(value) => {
                debug!("Ignoring checkout target {} for '{}'", value, spec.name);
                None
            }
            value => Some((index, value.clone())),
        })
        .collect()
}

async fn infer_default_branches(
    specs: &[PluginSpec],
    entries: Vec<(usize, TargetValue)>,
    scheduler: &Scheduler,
) -> Vec<(usize, String)> {
    let mut jobs: Vec<Job> = entries
        .iter()
        .map(|(index, value)| {
            let mut job = Job::new(&specs[*index].path);
            if *value == TargetValue::DefaultBranch {
                job.set_command(git::default_branch());
            }
            job
        })
        .collect();
    scheduler.run(&mut jobs).await;

    entries
        .into_iter()
        .zip(&jobs)
        .filter_map(|((index, value), job)| match value {
            TargetValue::Ref(target) => Some((index, target)),
            TargetValue::DefaultBranch => {
                let branch = job
                    .output_line()
                    .and_then(|line| git::parse_default_branch(&line));
                if branch.is_none() {
                    scheduler.notify(
                        &format!(
                            "Could not infer default branch for '{}'; skipping checkout",
                            specs[index].name
                        ),
                        Level::Warning,
                    );
                }
                branch.map(|branch| (index, branch))
            }
            TargetValue::Other(_) => None,
        })
        .collect()
}

/// Move `specs[index]` to `target` for every entry, with change hooks around
/// the whole batch. Returns the first failure of each entry.
pub(crate) async fn run_sequence(
    specs: &[PluginSpec],
    entries: &[(usize, String)],
    scheduler: &Scheduler,
) -> Vec<Option<JobError>> {
    let notifier = scheduler.notifier();
    let selected: Vec<&PluginSpec> = entries.iter().map(|(index, _)| &specs[*index]).collect();

    fire_all(selected.iter().copied(), HookKind::PreChange, notifier);

    // Stashing is best-effort and never blocks the checkout
    let stash_message = format!(
        "plugsync: stash before checkout {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let mut stash_jobs: Vec<Job> = selected
        .iter()
        .map(|spec| Job::with_command(&spec.path, git::stash(&stash_message)))
        .collect();
    scheduler.run(&mut stash_jobs).await;
    for (spec, job) in selected.iter().zip(&stash_jobs) {
        if job.is_failed() {
            scheduler.notify(
                &format!("Could not stash changes in '{}'", spec.name),
                Level::Warning,
            );
        }
    }

    let mut jobs: Vec<Job> = selected.iter().map(|spec| Job::new(&spec.path)).collect();
    for ((spec, job), (_, target)) in selected.iter().zip(jobs.iter_mut()).zip(entries) {
        job.set_command(git::checkout(target));
        job.exit_message = Some(format!("Checked out '{}' in '{}'", target, spec.name));
    }
    scheduler.run(&mut jobs).await;
    clean_all(&mut jobs);

    for (job, (_, target)) in jobs.iter_mut().zip(entries) {
        job.set_command(git::remote_branch_exists(target));
    }
    scheduler.run(&mut jobs).await;
    let is_branch: Vec<bool> = jobs
        .iter()
        .zip(entries)
        .map(|(job, (_, target))| job.output_line() == Some(git::remote_ref(target)))
        .collect();
    clean_all(&mut jobs);

    for ((job, (_, target)), branch) in jobs.iter_mut().zip(entries).zip(&is_branch) {
        if *branch {
            job.set_command(git::merge_ff_only(target));
        }
    }
    scheduler.run(&mut jobs).await;
    clean_all(&mut jobs);

    for job in jobs.iter_mut() {
        job.set_command(git::head());
    }
    scheduler.run(&mut jobs).await;
    for (spec, job) in selected.iter().zip(&jobs) {
        let Some(head) = job.output_line() else {
            continue;
        };
        if let Err(e) = reset_fetch_head(&spec.path, &head) {
            scheduler.notify(
                &format!("Could not reset FETCH_HEAD of '{}': {}", spec.name, e),
                Level::Warning,
            );
        }
    }
    clean_all(&mut jobs);

    fire_all(selected.iter().copied(), HookKind::PostChange, notifier);

    jobs.into_iter().map(|job| job.error).collect()
}

/// Point `FETCH_HEAD` at `head` so the next download diffs from the new
/// checkout.
fn reset_fetch_head(path: &Path, head: &str) -> std::io::Result<()> {
    fs::write(path.join(".git").join("FETCH_HEAD"), format!("{}\n", head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{normalize, SpecOptions};

    fn specs() -> Vec<PluginSpec> {
        let root = Path::new("/plugins");
        let a = normalize(
            "/src/A",
            SpecOptions {
                checkout: Some(CheckoutTarget::Ref("main".to_string())),
                ..Default::default()
            },
            root,
        )
        .unwrap();
        let b = normalize(
            "/src/B",
            SpecOptions {
                checkout: Some(CheckoutTarget::Disabled),
                ..Default::default()
            },
            root,
        )
        .unwrap();
        let c = normalize("/src/D", SpecOptions::default(), root).unwrap();
        vec![a, b, c]
    }

    #[test]
    fn test_target_value_from_json() {
        assert_eq!(
            TargetValue::from(serde_json::json!("v1.0")),
            TargetValue::Ref("v1.0".to_string())
        );
        assert_eq!(TargetValue::from(serde_json::json!(true)), TargetValue::DefaultBranch);
        assert!(matches!(
            TargetValue::from(serde_json::json!(false)),
            TargetValue::Other(_)
        ));
        assert!(matches!(
            TargetValue::from(serde_json::json!(1)),
            TargetValue::Other(_)
        ));
    }

    #[test]
    fn test_resolve_entries_filters_unknown_disabled_and_invalid() {
        let specs = specs();
        let mut targets = TargetMap::new();
        targets.insert("A".to_string(), "v1.0".into());
        targets.insert("B".to_string(), "main".into());
        targets.insert("C".to_string(), "main".into());
        targets.insert("D".to_string(), TargetValue::Other(serde_json::json!(3)));

        let entries = resolve_entries(&specs, &targets);
        assert_eq!(entries, vec![(0, TargetValue::Ref("v1.0".to_string()))]);
    }

    #[test]
    fn test_declared_request_uses_spec_targets() {
        let specs = specs();
        let targets = request_targets(&specs, CheckoutRequest::Declared).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets["A"], TargetValue::Ref("main".to_string()));
        assert_eq!(targets["D"], TargetValue::DefaultBranch);
        assert!(!targets.contains_key("B"));
    }

    #[test]
    fn test_snapshot_converts_to_request() {
        let mut snap = snapshot::Snapshot::new();
        snap.insert("A".to_string(), "abc1234".to_string());
        match CheckoutRequest::from(snap) {
            CheckoutRequest::Map(map) => {
                assert_eq!(map["A"], TargetValue::Ref("abc1234".to_string()))
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_request_file_errors_propagate() {
        let specs = specs();
        let result = request_targets(
            &specs,
            CheckoutRequest::File(PathBuf::from("/definitely/missing.json")),
        );
        assert!(matches!(
            result,
            Err(crate::error::Error::SnapshotParse { .. })
        ));
    }
}
