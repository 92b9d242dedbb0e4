//! Stage 1: Prepare
//!
//! Points every plugin's remote at its declared source. This repairs
//! checkouts whose remote drifted (the manifest changed, or someone edited
//! the remote by hand) and is a no-op otherwise. A plugin that fails here is
//! skipped by every later stage.

use super::record_errors;
use crate::git;
use crate::job::{clean_all, Job};
use crate::scheduler::Scheduler;
use crate::spec::PluginSpec;

/// Execute stage 1: set the remote URL of each plugin.
pub async fn execute(specs: &mut [PluginSpec], jobs: &mut [Job], scheduler: &Scheduler) {
    for (spec, job) in specs.iter().zip(jobs.iter_mut()) {
        job.set_command(git::set_remote_url(&spec.source));
    }
    scheduler.run(jobs).await;
    record_errors(specs, jobs);
    clean_all(jobs);
}
