//! # Plugin Specs
//!
//! A [`PluginSpec`] is the normalized declaration of one managed repository
//! plus the reconciliation state the update pipeline computes for it.
//!
//! ## Normalization
//!
//! [`normalize`] turns a source string and a typed [`SpecOptions`] value into
//! a spec. It is pure: no filesystem or network access happens here.
//!
//! - A bare `owner/repo` source becomes `https://github.com/owner/repo`.
//!   URLs and local paths pass through unchanged.
//! - The name defaults to the basename of the source.
//! - Every field is validated up front; the first violation is returned as
//!   [`Error::Validation`] naming the field.
//!
//! Untyped input (manifest YAML) is converted into `SpecOptions` by
//! [`crate::config`], which performs the per-field type checks.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::hooks::Hooks;

/// Placeholder for a log whose commit range is empty or unknown.
pub const NO_COMMITS: &str = "<no commits>";

const GITHUB_PREFIX: &str = "https://github.com/";

/// What a plugin should be checked out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutTarget {
    /// A branch, tag or commit.
    Ref(String),
    /// The remote's default branch (`true` in manifests).
    DefaultBranch,
    /// Never check out (`false` in manifests).
    Disabled,
}

impl CheckoutTarget {
    pub fn from_bool(value: bool) -> Self {
        if value {
            CheckoutTarget::DefaultBranch
        } else {
            CheckoutTarget::Disabled
        }
    }

    pub fn as_ref_name(&self) -> Option<&str> {
        match self {
            CheckoutTarget::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for CheckoutTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutTarget::Ref(r) => f.write_str(r),
            CheckoutTarget::DefaultBranch => f.write_str("<default branch>"),
            CheckoutTarget::Disabled => f.write_str("<disabled>"),
        }
    }
}

/// Explicit options accepted by [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct SpecOptions {
    pub name: Option<String>,
    pub checkout: Option<CheckoutTarget>,
    /// Branch whose upstream changes are reported.
    pub track: Option<String>,
    pub hooks: Hooks,
}

/// Outcome of the checkout stage for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum SyncStatus {
    /// Already at the resolved commit; no checkout issued.
    NoChanges,
    /// Checked out to the resolved commit.
    CheckedOut,
    /// A command for this plugin failed.
    Failed(String),
}

/// Fields computed by the update pipeline. Later stages only add to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub head_commit: Option<String>,
    pub default_branch: Option<String>,
    pub track_from_commit: Option<String>,
    pub track_to_commit: Option<String>,
    pub resolved_checkout_commit: Option<String>,
    /// Commits between the head and the resolved checkout commit.
    pub checkout_log: String,
    /// Upstream commits on the track branch since the last update.
    pub track_log: String,
    /// Track-branch commits not contained in the resolved checkout commit.
    pub pending_log: String,
    pub status: Option<SyncStatus>,
    /// First command failure seen for this plugin during the run.
    pub error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            head_commit: None,
            default_branch: None,
            track_from_commit: None,
            track_to_commit: None,
            resolved_checkout_commit: None,
            checkout_log: NO_COMMITS.to_string(),
            track_log: NO_COMMITS.to_string(),
            pending_log: NO_COMMITS.to_string(),
            status: None,
            error: None,
        }
    }
}

impl SyncState {
    /// Whether checking out would move the plugin.
    pub fn has_checkout_change(&self) -> bool {
        match (&self.head_commit, &self.resolved_checkout_commit) {
            (Some(head), Some(target)) => head != target,
            _ => false,
        }
    }
}

/// A normalized plugin declaration.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub source: String,
    /// Unique key and directory name.
    pub name: String,
    /// Local checkout location.
    pub path: PathBuf,
    pub checkout: Option<CheckoutTarget>,
    pub track: Option<String>,
    pub hooks: Hooks,
    pub state: SyncState,
}

impl PluginSpec {
    pub fn is_checkout_disabled(&self) -> bool {
        self.checkout == Some(CheckoutTarget::Disabled)
    }

    /// Checkout target as a ref name, once the pipeline has filled in the
    /// default branch.
    pub fn checkout_ref(&self) -> Option<&str> {
        self.checkout.as_ref().and_then(CheckoutTarget::as_ref_name)
    }

    pub fn is_installed(&self) -> bool {
        self.path.join(".git").exists()
    }
}

/// Normalize a plugin declaration into a spec rooted at `plugin_root`.
pub fn normalize(source: &str, options: SpecOptions, plugin_root: &Path) -> Result<PluginSpec> {
    let source = source.trim();
    if source.is_empty() {
        return Err(Error::validation("source", "must be a non-empty string"));
    }
    let source = expand_source(source);

    let name = match options.name {
        Some(name) => name,
        None => default_name(&source).ok_or_else(|| Error::Validation {
            field: "name".to_string(),
            message: format!("cannot infer a name from source '{}'", source),
            hint: Some("Set 'name' explicitly".to_string()),
        })?,
    };
    validate_name(&name)?;

    if let Some(CheckoutTarget::Ref(target)) = &options.checkout {
        if target.trim().is_empty() {
            return Err(Error::validation("checkout", "must not be an empty string"));
        }
    }
    if let Some(track) = &options.track {
        if track.trim().is_empty() {
            return Err(Error::validation("track", "must not be an empty string"));
        }
    }

    Ok(PluginSpec {
        path: plugin_root.join(&name),
        source,
        name,
        checkout: options.checkout,
        track: options.track,
        hooks: options.hooks,
        state: SyncState::default(),
    })
}

/// Rewrite `owner/repo` to a GitHub URL; leave everything else untouched.
pub fn expand_source(source: &str) -> String {
    if is_github_shorthand(source) {
        format!("{}{}", GITHUB_PREFIX, source)
    } else {
        source.to_string()
    }
}

/// `owner/repo`: exactly one slash, no scheme, not a relative or absolute
/// path, not an scp-like `host:path`.
pub fn is_github_shorthand(source: &str) -> bool {
    if url::Url::parse(source).is_ok() {
        return false;
    }
    let Some((owner, repo)) = source.split_once('/') else {
        return false;
    };
    !owner.is_empty()
        && !repo.is_empty()
        && !repo.contains('/')
        && !owner.starts_with('.')
        && !owner.starts_with('~')
        && !source.contains(':')
        && !source.contains('\\')
        && !source.chars().any(char::is_whitespace)
}

/// Basename of the source, ignoring trailing slashes and a `.git` suffix.
pub fn default_name(source: &str) -> Option<String> {
    source
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\', ':'])
        .next()
        .map(|base| base.strip_suffix(".git").unwrap_or(base))
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "must be a non-empty string"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::Validation {
            field: "name".to_string(),
            message: format!("'{}' is not a valid directory name", name),
            hint: Some("Names become directories under the plugin root".to_string()),
        });
    }
    Ok(())
}
