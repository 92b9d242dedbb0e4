//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures that build local git repositories to act as
//! plugin upstreams, so no test needs the network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     require_git!();
//!     let fixture = TestFixture::new();
//!     let upstream = fixture.upstream("tool");
//!     upstream.commit("init.lua", "return {}", "initial");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use plugsync::notify::RecordingNotifier;
use plugsync::scheduler::{Scheduler, SchedulerSettings};
use plugsync::session::Session;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git_available, Upstream, TestFixture};
}

/// Skip the current test when `git` is not installed.
#[allow(unused_macros)]
macro_rules! require_git {
    () => {
        if !$crate::common::git_available() {
            eprintln!("git not found; skipping");
            return;
        }
    };
}

/// Whether a usable `git` binary is on `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity and return trimmed stdout.
///
/// Panics when the command fails.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "plugsync tests")
        .env("GIT_AUTHOR_EMAIL", "tests@plugsync.invalid")
        .env("GIT_COMMITTER_NAME", "plugsync tests")
        .env("GIT_COMMITTER_EMAIL", "tests@plugsync.invalid")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A local repository standing in for a plugin's remote.
pub struct Upstream {
    pub path: PathBuf,
}

impl Upstream {
    /// Commit `content` to `file` and return the new commit hash.
    pub fn commit(&self, file: &str, content: &str, message: &str) -> String {
        std::fs::write(self.path.join(file), content).expect("failed to write file");
        git(&self.path, &["add", file]);
        git(&self.path, &["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn tag(&self, name: &str) {
        git(&self.path, &["tag", name]);
    }

    pub fn branch(&self, name: &str) {
        git(&self.path, &["branch", name]);
    }

    pub fn head(&self) -> String {
        git(&self.path, &["rev-parse", "HEAD"])
    }

    pub fn source(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// A temporary directory holding upstream repositories, a plugin root and a
/// rollback directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn plugin_root(&self) -> PathBuf {
        self.path().join("plugins")
    }

    pub fn rollback_dir(&self) -> PathBuf {
        self.path().join("rollback")
    }

    /// Create an empty upstream repository on branch `main`.
    pub fn upstream(&self, name: &str) -> Upstream {
        let path = self.path().join("upstream").join(name);
        std::fs::create_dir_all(&path).expect("failed to create upstream dir");
        git(&path, &["init", "--quiet"]);
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Upstream { path }
    }

    /// A session rooted in this fixture, recording notifications.
    pub fn session(&self) -> (Session, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = SchedulerSettings {
            concurrency: 4,
            ..Default::default()
        };
        let scheduler = Scheduler::new(settings, notifier.clone());
        let session = Session::new(self.plugin_root(), self.rollback_dir(), scheduler);
        (session, notifier)
    }

    /// Write `content` as the fixture's manifest and return its path.
    pub fn manifest(&self, content: &str) -> PathBuf {
        let path = self.path().join("plugsync.yaml");
        std::fs::write(&path, content).expect("failed to write manifest");
        path
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Files in `dir`, or zero when it does not exist.
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}
