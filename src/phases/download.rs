//! Stage 3: Download
//!
//! Fetches branches and tags for every plugin. Each finished fetch is
//! reported through the scheduler's notifier.

use super::record_errors;
use crate::git;
use crate::job::{clean_all, Job};
use crate::scheduler::Scheduler;
use crate::spec::PluginSpec;

/// Execute stage 3.
pub async fn execute(specs: &mut [PluginSpec], jobs: &mut [Job], scheduler: &Scheduler) {
    for (spec, job) in specs.iter().zip(jobs.iter_mut()) {
        job.set_command(git::fetch());
        job.exit_message = Some(format!("Downloaded updates for '{}'", spec.name));
    }
    scheduler.run(jobs).await;
    record_errors(specs, jobs);
    clean_all(jobs);
}
