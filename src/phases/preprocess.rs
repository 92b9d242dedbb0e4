//! Stage 2: Preprocess
//!
//! Records the state of each plugin before anything is downloaded:
//!
//! 1.  **Head**: the commit currently checked out.
//! 2.  **Default branch**: read from the remote's symbolic `HEAD`. Plugins
//!     without an explicit checkout target or track branch default to it, and
//!     a checkout target of `true` is replaced by it.
//! 3.  **Track start**: the commit of the track branch, falling back to the
//!     head when it cannot be resolved. The track log computed in stage 4
//!     starts here.

use super::{record_errors, resolve_targets};
use crate::git;
use crate::job::{clean_all, Job};
use crate::scheduler::Scheduler;
use crate::spec::{CheckoutTarget, PluginSpec};

/// Execute stage 2.
pub async fn execute(specs: &mut [PluginSpec], jobs: &mut [Job], scheduler: &Scheduler) {
    for job in jobs.iter_mut() {
        job.set_command(git::head());
    }
    scheduler.run(jobs).await;
    for (spec, job) in specs.iter_mut().zip(jobs.iter()) {
        spec.state.head_commit = job.output_line().filter(|line| git::is_commit_hash(line));
    }
    clean_all(jobs);

    for job in jobs.iter_mut() {
        job.set_command(git::default_branch());
    }
    scheduler.run(jobs).await;
    for (spec, job) in specs.iter_mut().zip(jobs.iter()) {
        let Some(branch) = job
            .output_line()
            .and_then(|line| git::parse_default_branch(&line))
        else {
            continue;
        };
        apply_default_branch(spec, branch);
    }
    clean_all(jobs);

    let tracks: Vec<Option<String>> = specs.iter().map(|spec| spec.track.clone()).collect();
    let commits = resolve_targets(&tracks, jobs, scheduler).await;
    for (spec, commit) in specs.iter_mut().zip(commits) {
        spec.state.track_from_commit = commit.or_else(|| spec.state.head_commit.clone());
    }

    record_errors(specs, jobs);
}

/// Fill unset targets from the remote's default branch.
fn apply_default_branch(spec: &mut PluginSpec, branch: String) {
    match spec.checkout {
        None | Some(CheckoutTarget::DefaultBranch) => {
            spec.checkout = Some(CheckoutTarget::Ref(branch.clone()));
        }
        Some(CheckoutTarget::Ref(_)) | Some(CheckoutTarget::Disabled) => {}
    }
    if spec.track.is_none() {
        spec.track = Some(branch.clone());
    }
    spec.state.default_branch = Some(branch);
}
