//! Implementation of the 5 stages of the plugsync update operation.
//!
//! ## Overview
//!
//! The update operation follows 5 stages, each issuing exactly one git
//! command per plugin and then waiting on the scheduler:
//! 1. Prepare - Point the remote at the declared source
//! 2. Preprocess - Record HEAD, the default branch and the track branch commit
//! 3. Download - Fetch branches and tags (skipped for a dry preview)
//! 4. Process - Resolve the checkout target and compute commit logs
//! 5. Checkout - Move plugins whose resolved commit differs from HEAD
//!
//! All stages share one [`Job`] per plugin. A failure is sticky: later stages
//! skip that plugin, which keeps whatever state it had, and every other
//! plugin carries on.

use crate::git;
use crate::job::{clean_all, Job};
use crate::scheduler::Scheduler;
use crate::spec::{PluginSpec, NO_COMMITS};

pub mod checkout;
pub mod download;
pub mod orchestrator;
pub mod prepare;
pub mod preprocess;
pub mod process;

pub use orchestrator::{execute_update, UpdateOptions};

/// Resolve each target to a commit hash.
///
/// A target naming a remote branch resolves to the remote-tracking ref
/// (`origin/<target>`); anything else is resolved as a literal revision.
/// `None` targets issue no command and yield `None`.
pub(crate) async fn resolve_targets(
    targets: &[Option<String>],
    jobs: &mut [Job],
    scheduler: &Scheduler,
) -> Vec<Option<String>> {
    for (job, target) in jobs.iter_mut().zip(targets) {
        if let Some(target) = target {
            job.set_command(git::remote_branch_exists(target));
        }
    }
    scheduler.run(jobs).await;

    let revisions: Vec<Option<String>> = jobs
        .iter()
        .zip(targets)
        .map(|(job, target)| {
            let target = target.as_ref()?;
            let remote = git::remote_ref(target);
            if job.output_line().as_deref() == Some(remote.as_str()) {
                Some(remote)
            } else {
                Some(target.clone())
            }
        })
        .collect();
    clean_all(jobs);

    for (job, revision) in jobs.iter_mut().zip(&revisions) {
        if let Some(revision) = revision {
            job.set_command(git::resolve(revision));
        }
    }
    scheduler.run(jobs).await;

    let commits = jobs
        .iter()
        .zip(&revisions)
        .map(|(job, revision)| {
            revision.as_ref()?;
            job.output_line().filter(|line| git::is_commit_hash(line))
        })
        .collect();
    clean_all(jobs);
    commits
}

/// Run one `git log` per plugin over `from...to` and render the result.
///
/// Ranges with a missing end or equal ends issue no command and render as
/// [`NO_COMMITS`].
pub(crate) async fn commit_logs(
    ranges: &[(Option<String>, Option<String>)],
    jobs: &mut [Job],
    scheduler: &Scheduler,
) -> Vec<String> {
    for (job, (from, to)) in jobs.iter_mut().zip(ranges) {
        if let (Some(from), Some(to)) = (from, to) {
            if from != to {
                job.set_command(git::log_range(from, to));
            }
        }
    }
    scheduler.run(jobs).await;

    let logs = jobs
        .iter()
        .map(|job| {
            let lines = job.output_lines();
            if job.command.is_empty() || job.is_failed() || lines.is_empty() {
                NO_COMMITS.to_string()
            } else {
                lines.join("\n")
            }
        })
        .collect();
    clean_all(jobs);
    logs
}

/// Copy the first failure of each job into its spec.
pub(crate) fn record_errors(specs: &mut [PluginSpec], jobs: &[Job]) {
    for (spec, job) in specs.iter_mut().zip(jobs) {
        if spec.state.error.is_none() {
            if let Some(error) = &job.error {
                spec.state.error = Some(error.to_string());
            }
        }
    }
}
