//! Stage 4: Process
//!
//! Works out where each plugin would move and what changed upstream:
//!
//! 1.  **Checkout commit**: the checkout target resolved to a commit.
//!     Plugins with checkout disabled resolve to their current head, so the
//!     checkout stage never moves them.
//! 2.  **Track end**: the track branch resolved again, now that stage 3 has
//!     fetched.
//! 3.  **Logs**: `head...checkout`, `track start...track end`, and
//!     `checkout...track end` (upstream commits the checkout target does not
//!     contain). Empty ranges render as the `<no commits>` placeholder.

use super::{commit_logs, record_errors, resolve_targets};
use crate::job::Job;
use crate::scheduler::Scheduler;
use crate::spec::PluginSpec;

/// Execute stage 4.
pub async fn execute(specs: &mut [PluginSpec], jobs: &mut [Job], scheduler: &Scheduler) {
    let targets: Vec<Option<String>> = specs
        .iter()
        .map(|spec| spec.checkout_ref().map(str::to_string))
        .collect();
    let commits = resolve_targets(&targets, jobs, scheduler).await;
    for (spec, commit) in specs.iter_mut().zip(commits) {
        spec.state.resolved_checkout_commit = if spec.is_checkout_disabled() {
            spec.state.head_commit.clone()
        } else {
            commit
        };
    }

    let tracks: Vec<Option<String>> = specs.iter().map(|spec| spec.track.clone()).collect();
    let commits = resolve_targets(&tracks, jobs, scheduler).await;
    for (spec, commit) in specs.iter_mut().zip(commits) {
        spec.state.track_to_commit = commit;
    }

    let ranges = collect_ranges(specs, |spec| {
        (
            spec.state.head_commit.clone(),
            spec.state.resolved_checkout_commit.clone(),
        )
    });
    for (spec, log) in specs.iter_mut().zip(commit_logs(&ranges, jobs, scheduler).await) {
        spec.state.checkout_log = log;
    }

    let ranges = collect_ranges(specs, |spec| {
        (
            spec.state.track_from_commit.clone(),
            spec.state.track_to_commit.clone(),
        )
    });
    for (spec, log) in specs.iter_mut().zip(commit_logs(&ranges, jobs, scheduler).await) {
        spec.state.track_log = log;
    }

    let ranges = collect_ranges(specs, |spec| {
        (
            spec.state.resolved_checkout_commit.clone(),
            spec.state.track_to_commit.clone(),
        )
    });
    for (spec, log) in specs.iter_mut().zip(commit_logs(&ranges, jobs, scheduler).await) {
        spec.state.pending_log = log;
    }

    record_errors(specs, jobs);
}

fn collect_ranges<F>(specs: &[PluginSpec], range: F) -> Vec<(Option<String>, Option<String>)>
where
    F: Fn(&PluginSpec) -> (Option<String>, Option<String>),
{
    specs.iter().map(range).collect()
}
