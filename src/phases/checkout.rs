//! Stage 5: Checkout
//!
//! Moves every plugin whose resolved checkout commit differs from its head.
//! Plugins already at the resolved commit get a "no changes" status and no
//! command. Plugins that failed an earlier stage are marked failed and left
//! alone.

use crate::checkout::run_sequence;
use crate::scheduler::Scheduler;
use crate::spec::{PluginSpec, SyncStatus};

/// Execute stage 5.
pub async fn execute(specs: &mut [PluginSpec], scheduler: &Scheduler) {
    let mut entries = Vec::new();
    for (index, spec) in specs.iter_mut().enumerate() {
        if let Some(error) = &spec.state.error {
            spec.state.status = Some(SyncStatus::Failed(error.clone()));
            continue;
        }
        if spec.state.head_commit.is_none() || spec.state.resolved_checkout_commit.is_none() {
            continue;
        }
        if !spec.state.has_checkout_change() {
            spec.state.status = Some(SyncStatus::NoChanges);
            continue;
        }
        if let Some(target) = spec.checkout_ref() {
            entries.push((index, target.to_string()));
        }
    }

    let errors = run_sequence(specs, &entries, scheduler).await;
    for ((index, _), error) in entries.iter().zip(errors) {
        let state = &mut specs[*index].state;
        match error {
            Some(error) => {
                let message = error.to_string();
                state.error.get_or_insert_with(|| message.clone());
                state.status = Some(SyncStatus::Failed(message));
            }
            None => state.status = Some(SyncStatus::CheckedOut),
        }
    }
}
