//! Orchestrator for the complete update operation
//!
//! This module runs the stages in order over one job per plugin and provides
//! a single entry point for callers.

use super::{checkout, download, prepare, preprocess, process};
use crate::job::{jobs_for, Job};
use crate::scheduler::Scheduler;
use crate::spec::{PluginSpec, SyncState};

/// Which optional stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Fetch from remotes. `false` gives a dry preview from local data.
    pub download: bool,
    /// Check out the resolved commits without asking.
    pub apply: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            download: true,
            apply: false,
        }
    }
}

/// Execute the update operation (stages 1-5)
///
/// Runs Prepare, Preprocess, Download (when `options.download`), Process and,
/// when `options.apply`, Checkout. State from any previous run is discarded.
/// Failures never abort the run: inspect each spec's `state` afterwards.
pub async fn execute_update(
    specs: &mut [PluginSpec],
    scheduler: &Scheduler,
    options: UpdateOptions,
) {
    for spec in specs.iter_mut() {
        spec.state = SyncState::default();
    }
    let mut jobs: Vec<Job> = jobs_for(specs.iter().map(|spec| spec.path.as_path()));

    // Stage 1: Prepare
    prepare::execute(specs, &mut jobs, scheduler).await;

    // Stage 2: Preprocess
    preprocess::execute(specs, &mut jobs, scheduler).await;

    // Stage 3: Download (skipped for a dry preview)
    if options.download {
        download::execute(specs, &mut jobs, scheduler).await;
    }

    // Stage 4: Process
    process::execute(specs, &mut jobs, scheduler).await;

    // Stage 5: Checkout (only when no confirmation is needed)
    if options.apply {
        checkout::execute(specs, scheduler).await;
    }
}
