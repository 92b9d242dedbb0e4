//! Git command templates.
//!
//! Every stage of the update engine issues exactly one of these commands per
//! plugin. They are plain argv vectors handed to the scheduler, never passed
//! through a shell, so sources and refs cannot inject extra arguments or
//! commands. Output formats are fixed so the stages can parse them.
//!
//! All commands use the system `git`, which picks up the user's SSH keys,
//! credential helpers and `~/.gitconfig` automatically.

use std::path::Path;

/// Name of the remote every managed plugin tracks.
pub const REMOTE: &str = "origin";

/// Clone `source` into `path`.
///
/// Uses a blobless partial clone; git falls back to a full clone for
/// transports that do not support filters.
pub fn clone(source: &str, path: &Path) -> Vec<String> {
    vec![
        "git".to_string(),
        "clone".to_string(),
        "--quiet".to_string(),
        "--filter=blob:none".to_string(),
        "--origin".to_string(),
        REMOTE.to_string(),
        // Guard against sources that look like options
        "--".to_string(),
        source.to_string(),
        path.to_string_lossy().into_owned(),
    ]
}

/// Stash uncommitted changes (no-op when the tree is clean).
pub fn stash(message: &str) -> Vec<String> {
    argv(["git", "stash", "--quiet", "--message", message])
}

/// Check out `target` (branch, tag or commit).
pub fn checkout(target: &str) -> Vec<String> {
    argv(["git", "checkout", "--quiet", target, "--"])
}

/// Fast-forward the current branch to the remote-tracking branch of the same
/// name.
pub fn merge_ff_only(branch: &str) -> Vec<String> {
    argv([
        "git",
        "merge",
        "--quiet",
        "--ff-only",
        &remote_ref(branch),
    ])
}

/// Point the remote at `source`.
pub fn set_remote_url(source: &str) -> Vec<String> {
    argv(["git", "remote", "set-url", REMOTE, source])
}

/// Resolve a revision expression to a single commit hash.
pub fn resolve(rev: &str) -> Vec<String> {
    argv(["git", "rev-list", "-1", rev, "--"])
}

/// Hash of the commit currently checked out.
pub fn head() -> Vec<String> {
    resolve("HEAD")
}

/// Print `origin/<branch>` when that remote-tracking branch exists, nothing
/// otherwise. Exits 0 in both cases.
pub fn remote_branch_exists(branch: &str) -> Vec<String> {
    argv([
        "git",
        "branch",
        "--list",
        "--remotes",
        "--format=%(refname:short)",
        &remote_ref(branch),
    ])
}

/// One line per commit of the symmetric difference `from...to`.
///
/// Lines start with `>` for commits reachable only from `to` and `<` for
/// commits reachable only from `from`.
pub fn log_range(from: &str, to: &str) -> Vec<String> {
    argv([
        "git",
        "log",
        "--left-right",
        "--topo-order",
        "--format=%m %h %s",
        &format!("{}...{}", from, to),
        "--",
    ])
}

/// The remote's default branch, printed as `origin/<branch>`.
pub fn default_branch() -> Vec<String> {
    argv(["git", "rev-parse", "--abbrev-ref", &format!("{}/HEAD", REMOTE)])
}

/// Fetch branches and tags from the remote.
pub fn fetch() -> Vec<String> {
    argv(["git", "fetch", "--quiet", "--tags", "--force", REMOTE])
}

/// `origin/<branch>`.
pub fn remote_ref(branch: &str) -> String {
    format!("{}/{}", REMOTE, branch)
}

/// Strip the `origin/` prefix from `git rev-parse --abbrev-ref origin/HEAD`
/// output. Returns `None` when the output does not name a remote branch.
pub fn parse_default_branch(output: &str) -> Option<String> {
    let output = output.trim();
    let branch = output.strip_prefix(REMOTE)?.strip_prefix('/')?;
    // `origin/HEAD` is printed back verbatim when the symbolic ref is missing
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch.to_string())
    }
}

/// Render `git log --left-right` output as the added-commit lines only.
pub fn added_commits(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("> "))
        .map(str::to_string)
        .collect()
}

/// Whether `output` looks like a full or abbreviated commit hash.
pub fn is_commit_hash(output: &str) -> bool {
    let output = output.trim();
    (7..=64).contains(&output.len()) && output.chars().all(|c| c.is_ascii_hexdigit())
}

fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
