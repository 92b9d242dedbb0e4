//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Errors should tell users what went
//! wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plugsync::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Manifest not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::manifest_not_found(path));
//! ```

use std::path::Path;

/// Generate an error for when the manifest file is not found.
///
/// Includes hints about:
/// - Creating a new manifest
/// - Using the -c/--config flag
/// - Using the PLUGSYNC_CONFIG environment variable
pub fn manifest_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Manifest not found: {path}\n\n\
         hint: Create a plugsync.yaml file with a 'plugins:' list\n\
         hint: Use -c/--config to specify a different path\n\
         hint: Set PLUGSYNC_CONFIG environment variable",
        path = path.display()
    )
}

/// Generate an error for a plugin name that is not in the manifest.
///
/// Suggests the closest registered name when there is one.
pub fn unknown_plugin(name: &str, registered: &[&str]) -> anyhow::Error {
    let did_you_mean = did_you_mean(name, registered)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown plugin: {name}{did_you_mean}\n\n\
         hint: Run 'plugsync list' to see registered plugins"
    )
}

/// Generate an error for a checkout target file that could not be used.
pub fn snapshot_unusable(path: &Path, error: &crate::error::Error) -> anyhow::Error {
    anyhow::anyhow!(
        "Cannot check out from {path}\n\
         error: {error}\n\n\
         hint: Snapshot files are JSON objects mapping plugin names to commits\n\
         hint: Run 'plugsync snapshot --output <FILE>' to create one",
        path = path.display()
    )
}

/// Generate an error for `clean` without `--force` in a non-interactive
/// session.
pub fn clean_needs_force() -> anyhow::Error {
    anyhow::anyhow!(
        "Refusing to delete directories without confirmation\n\n\
         hint: Use --force to delete without asking\n\
         hint: Use --dry-run to only list what would be deleted"
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
pub fn did_you_mean<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}
