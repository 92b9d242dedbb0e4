//! # Jobs
//!
//! A [`Job`] describes one external command bound to a working directory,
//! together with the output it produced. Jobs are created once per plugin for
//! a pipeline run and reused by every stage of that run.
//!
//! ## Sticky Errors
//!
//! Between stages a job is [`Job::clean`]ed: the command, exit message and
//! stdout are reset, but `error` (and the diagnostic `stderr`) are kept. The
//! scheduler skips any job that already carries an error, so once a stage
//! fails for a plugin every later stage is a no-op for it. The plugin keeps
//! whatever state it had and the other plugins carry on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Why a job failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The process exited with a non-zero code.
    #[error("PROCESS EXITED WITH ERROR CODE {code}{}", stderr_suffix(.stderr))]
    Exited { code: i32, stderr: String },
    /// Reading the process output failed.
    #[error("STREAM ERROR: {message}")]
    Stream { message: String },
    /// The process could not be started.
    #[error("FAILED TO START {program}: {message}")]
    Spawn { program: String, message: String },
    /// The scheduler gave up waiting for the job.
    #[error("PROCESS TIMED OUT AFTER {:.1}s", .after.as_secs_f64())]
    TimedOut { after: Duration },
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.trim() {
        "" => String::new(),
        text => format!("\n{}", text),
    }
}

/// One external command invocation and its accumulated output.
#[derive(Debug, Clone, Default)]
pub struct Job {
    /// Program and arguments. Empty means there is nothing to run.
    pub command: Vec<String>,
    /// Directory the command runs in.
    pub working_dir: PathBuf,
    /// Progress label reported once the job finishes.
    pub exit_message: Option<String>,
    /// Bytes the process wrote to stdout during the current stage.
    pub stdout: Vec<u8>,
    /// Bytes the process wrote to stderr, across all stages.
    pub stderr: Vec<u8>,
    /// First failure seen by this job. Never reset by [`Job::clean`].
    pub error: Option<JobError>,
}

impl Job {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Create a job with a command already set.
    pub fn with_command<I, S>(working_dir: impl Into<PathBuf>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut job = Self::new(working_dir);
        job.set_command(command);
        job
    }

    pub fn set_command<I, S>(&mut self, command: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Reset per-stage fields. Errors survive.
    pub fn clean(&mut self) {
        self.command.clear();
        self.exit_message = None;
        self.stdout.clear();
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the scheduler should treat this job as already finished.
    pub fn should_skip(&self) -> bool {
        self.is_failed() || self.command.is_empty()
    }

    /// Record a failure unless one is already present.
    pub fn fail(&mut self, error: JobError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// First non-empty trimmed line of stdout.
    pub fn output_line(&self) -> Option<String> {
        String::from_utf8_lossy(&self.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    /// All non-empty stdout lines, right-trimmed.
    pub fn output_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.stdout)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Command rendered for log output.
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

/// Create one fresh job per working directory, keeping input order.
pub fn jobs_for<'a, I>(dirs: I) -> Vec<Job>
where
    I: IntoIterator<Item = &'a Path>,
{
    dirs.into_iter().map(Job::new).collect()
}

/// Clean every job between stages.
pub fn clean_all(jobs: &mut [Job]) {
    jobs.iter_mut().for_each(Job::clean);
}
