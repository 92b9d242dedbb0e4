//! # Bounded-Parallel Job Scheduler
//!
//! The [`Scheduler`] runs a slice of [`Job`]s with a bounded number of
//! processes in flight and a wall-clock budget for the whole batch.
//!
//! ## Algorithm
//!
//! A cursor walks the job slice in order. Up to `concurrency` jobs are
//! dispatched immediately; every completion dispatches the next unstarted
//! job. Processes therefore *start* in slice order but *finish* in any order.
//! Results are written back to `jobs[i]` by index, so callers must key off
//! the job position and never off completion order.
//!
//! Before spawning, a job that already carries an error or has an empty
//! command is counted as finished without running anything. This is how
//! "nothing to do" jobs and the sticky-error short-circuit work.
//!
//! ## Timeouts
//!
//! The batch budget is `timeout_per_job * jobs.len()`. When it elapses, the
//! jobs still running are marked [`JobError::TimedOut`] and the caller is
//! released. With [`OnTimeout::Kill`] the outstanding child processes are
//! killed before `run` returns; with [`OnTimeout::Detach`] they are left
//! running in the background and their output is discarded.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::job::{Job, JobError};
use crate::notify::{Level, Notifier};

/// Default per-job timeout.
pub const DEFAULT_TIMEOUT_PER_JOB: Duration = Duration::from_secs(30);

/// What happens to running processes when the batch budget elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnTimeout {
    /// Kill outstanding processes before returning.
    #[default]
    Kill,
    /// Return immediately and leave outstanding processes running.
    Detach,
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Maximum number of processes in flight. Values below 1 are treated as 1.
    pub concurrency: usize,
    pub timeout_per_job: Duration,
    pub on_timeout: OnTimeout,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_per_job: DEFAULT_TIMEOUT_PER_JOB,
            on_timeout: OnTimeout::default(),
        }
    }
}

/// 80% of the available parallelism, rounded down, at least 1.
pub fn default_concurrency() -> usize {
    let units = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    ((units * 4) / 5).max(1)
}

/// Observer for process lifecycle inside a batch.
pub trait SchedulerEvents: Send + Sync {
    /// A process for `jobs[index]` was dispatched.
    fn job_started(&self, _index: usize) {}
    /// The process for `jobs[index]` finished (successfully or not).
    fn job_finished(&self, _index: usize) {}
}

/// Runs jobs with bounded parallelism.
#[derive(Clone)]
pub struct Scheduler {
    settings: SchedulerSettings,
    notifier: Arc<dyn Notifier>,
    events: Option<Arc<dyn SchedulerEvents>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Result of one spawned process, before it is folded into its job.
#[derive(Debug, Default)]
struct ProcessOutcome {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    error: Option<JobError>,
}

impl Scheduler {
    pub fn new(settings: SchedulerSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings,
            notifier,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn SchedulerEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn notify(&self, message: &str, level: Level) {
        self.notifier.notify(message, level);
    }

    /// Run all jobs and block until they finish or the batch budget elapses.
    pub async fn run(&self, jobs: &mut [Job]) {
        let total = jobs.len();
        if total == 0 {
            return;
        }

        let concurrency = self.settings.concurrency.max(1);
        let multiplier = u32::try_from(total).unwrap_or(u32::MAX);
        let budget = self.settings.timeout_per_job.saturating_mul(multiplier);
        let deadline = Instant::now() + budget;
        let kill_on_drop = self.settings.on_timeout == OnTimeout::Kill;

        let mut in_flight: JoinSet<(usize, ProcessOutcome)> = JoinSet::new();
        let mut task_index = HashMap::new();
        let mut running = vec![false; total];
        let mut cursor = 0;
        let mut finished = 0;

        loop {
            while in_flight.len() < concurrency && cursor < total {
                let index = cursor;
                cursor += 1;

                let job = &jobs[index];
                if job.should_skip() {
                    finished += 1;
                    continue;
                }

                debug!(
                    "Running `{}` in {}",
                    job.display_command(),
                    job.working_dir.display()
                );
                let command = job.command.clone();
                let working_dir = job.working_dir.clone();
                let handle = in_flight.spawn(async move {
                    (index, run_process(command, working_dir, kill_on_drop).await)
                });
                task_index.insert(handle.id(), index);
                running[index] = true;
                if let Some(events) = &self.events {
                    events.job_started(index);
                }
            }

            if in_flight.is_empty() {
                break;
            }

            match tokio::time::timeout_at(deadline, in_flight.join_next_with_id()).await {
                Ok(Some(Ok((id, (index, outcome))))) => {
                    task_index.remove(&id);
                    running[index] = false;
                    finished += 1;
                    self.finish_job(&mut jobs[index], outcome, finished, total);
                    if let Some(events) = &self.events {
                        events.job_finished(index);
                    }
                }
                Ok(Some(Err(join_error))) => {
                    let Some(index) = task_index.remove(&join_error.id()) else {
                        continue;
                    };
                    running[index] = false;
                    finished += 1;
                    let outcome = ProcessOutcome {
                        error: Some(JobError::Stream {
                            message: join_error.to_string(),
                        }),
                        ..Default::default()
                    };
                    self.finish_job(&mut jobs[index], outcome, finished, total);
                    if let Some(events) = &self.events {
                        events.job_finished(index);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    self.expire(jobs, &running, cursor, budget);
                    match self.settings.on_timeout {
                        OnTimeout::Kill => {
                            in_flight.abort_all();
                            // Drain so every child is dropped (and killed) before returning.
                            while in_flight.join_next().await.is_some() {}
                        }
                        OnTimeout::Detach => in_flight.detach_all(),
                    }
                    break;
                }
            }
        }
    }

    fn finish_job(&self, job: &mut Job, outcome: ProcessOutcome, finished: usize, total: usize) {
        job.stdout.extend_from_slice(&outcome.stdout);
        job.stderr.extend_from_slice(&outcome.stderr);

        if let Some(error) = outcome.error {
            self.notifier.notify(
                &format!(
                    "`{}` failed in {}: {}",
                    job.display_command(),
                    job.working_dir.display(),
                    error
                ),
                Level::Error,
            );
            job.fail(error);
        }

        if let Some(message) = &job.exit_message {
            self.notifier
                .notify(&format!("({}/{}) {}", finished, total, message), Level::Info);
        }
    }

    /// Fail every job still running at the deadline, plus every job past
    /// `cursor` that was never dispatched.
    fn expire(&self, jobs: &mut [Job], running: &[bool], cursor: usize, budget: Duration) {
        let unfinished = jobs
            .iter_mut()
            .enumerate()
            .filter(|(index, job)| running[*index] || (*index >= cursor && !job.should_skip()));
        for (_, job) in unfinished {
            let error = JobError::TimedOut { after: budget };
            self.notifier.notify(
                &format!(
                    "`{}` in {}: {}",
                    job.display_command(),
                    job.working_dir.display(),
                    error
                ),
                Level::Error,
            );
            job.fail(error);
        }
    }
}

async fn run_process(
    command: Vec<String>,
    working_dir: PathBuf,
    kill_on_drop: bool,
) -> ProcessOutcome {
    let Some((program, args)) = command.split_first() else {
        return ProcessOutcome::default();
    };

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .current_dir(&working_dir)
        // Never block on a credential prompt
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(kill_on_drop);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutcome {
                error: Some(JobError::Spawn {
                    program: program.clone(),
                    message: e.to_string(),
                }),
                ..Default::default()
            }
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr, status) =
        tokio::join!(read_stream(stdout), read_stream(stderr), child.wait());

    let mut outcome = ProcessOutcome::default();
    let mut synthetic = Vec::new();

    match stdout {
        Ok(bytes) => outcome.stdout = bytes,
        Err(e) => {
            synthetic.push(format!("STDOUT STREAM ERROR: {}", e));
            outcome.error = Some(JobError::Stream {
                message: e.to_string(),
            });
        }
    }
    match stderr {
        Ok(bytes) => outcome.stderr = bytes,
        Err(e) => {
            synthetic.push(format!("STDERR STREAM ERROR: {}", e));
            if outcome.error.is_none() {
                outcome.error = Some(JobError::Stream {
                    message: e.to_string(),
                });
            }
        }
    }

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            // Terminated by a signal when there is no code
            let code = status.code().unwrap_or(-1);
            synthetic.insert(0, format!("PROCESS EXITED WITH ERROR CODE {}", code));
            outcome.error = Some(JobError::Exited {
                code,
                stderr: String::from_utf8_lossy(&outcome.stderr).into_owned(),
            });
        }
        Err(e) => {
            synthetic.push(format!("WAIT ERROR: {}", e));
            if outcome.error.is_none() {
                outcome.error = Some(JobError::Stream {
                    message: e.to_string(),
                });
            }
        }
    }

    if !synthetic.is_empty() {
        let mut prefixed = synthetic.join("\n").into_bytes();
        prefixed.push(b'\n');
        prefixed.append(&mut outcome.stderr);
        outcome.stderr = prefixed;
    }

    outcome
}

async fn read_stream<R>(stream: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        current: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<usize>>,
        finished: Mutex<Vec<usize>>,
    }

    impl SchedulerEvents for Counter {
        fn job_started(&self, index: usize) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.lock().unwrap().push(index);
        }

        fn job_finished(&self, index: usize) {
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(index);
        }
    }

    fn scheduler(concurrency: usize, timeout: Duration) -> (Scheduler, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = SchedulerSettings {
            concurrency,
            timeout_per_job: timeout,
            on_timeout: OnTimeout::Kill,
        };
        (Scheduler::new(settings, notifier.clone()), notifier)
    }

    fn sh(script: &str) -> Job {
        Job::with_command(std::env::temp_dir(), ["sh", "-c", script])
    }

    #[test]
    fn test_default_concurrency_is_at_least_one() {
        assert!(default_concurrency() >= 1);
        let units = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        assert!(default_concurrency() <= units);
    }

    #[tokio::test]
    async fn test_run_empty_slice() {
        let (scheduler, notifier) = scheduler(2, Duration::from_secs(1));
        scheduler.run(&mut []).await;
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let (scheduler, _) = scheduler(2, Duration::from_secs(10));
        let mut jobs = vec![sh("echo hello")];
        scheduler.run(&mut jobs).await;
        assert_eq!(jobs[0].output_line(), Some("hello".to_string()));
        assert!(jobs[0].error.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_recorded() {
        let (scheduler, notifier) = scheduler(2, Duration::from_secs(10));
        let mut jobs = vec![sh("echo oops >&2; exit 3")];
        scheduler.run(&mut jobs).await;

        match &jobs[0].error {
            Some(JobError::Exited { code, stderr }) => {
                assert_eq!(*code, 3);
                assert!(stderr.contains("oops"));
            }
            other => panic!("expected exit error, got {:?}", other),
        }
        let stderr = String::from_utf8_lossy(&jobs[0].stderr);
        assert!(stderr.starts_with("PROCESS EXITED WITH ERROR CODE 3\n"));
        assert!(stderr.contains("oops"));
        assert_eq!(notifier.at_level(Level::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let (scheduler, _) = scheduler(1, Duration::from_secs(10));
        let mut jobs = vec![Job::with_command(
            std::env::temp_dir(),
            ["plugsync-definitely-not-a-program"],
        )];
        scheduler.run(&mut jobs).await;
        assert!(matches!(jobs[0].error, Some(JobError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_spawns_nothing() {
        let (scheduler, notifier) = scheduler(2, Duration::from_secs(1));
        let counter = Arc::new(Counter::default());
        let scheduler = scheduler.with_events(counter.clone());

        let mut jobs = vec![Job::new(std::env::temp_dir()), Job::new(std::env::temp_dir())];
        jobs[0].exit_message = Some("never reported".to_string());
        scheduler.run(&mut jobs).await;

        assert!(counter.started.lock().unwrap().is_empty());
        assert!(jobs.iter().all(|j| j.error.is_none() && j.stdout.is_empty()));
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_is_skipped_on_next_stage() {
        let (scheduler, _) = scheduler(2, Duration::from_secs(10));
        let mut jobs = vec![sh("exit 1"), sh("echo first")];
        scheduler.run(&mut jobs).await;
        assert!(jobs[0].is_failed());

        crate::job::clean_all(&mut jobs);
        assert!(jobs[0].is_failed());
        assert!(!jobs[0].stderr.is_empty());

        jobs[0].set_command(["sh", "-c", "echo should-not-run"]);
        jobs[1].set_command(["sh", "-c", "echo second"]);
        scheduler.run(&mut jobs).await;

        assert!(jobs[0].stdout.is_empty());
        assert_eq!(jobs[1].output_line(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (scheduler, _) = scheduler(3, Duration::from_secs(10));
        let counter = Arc::new(Counter::default());
        let scheduler = scheduler.with_events(counter.clone());

        let mut jobs: Vec<Job> = (0..8).map(|_| sh("sleep 0.1")).collect();
        scheduler.run(&mut jobs).await;

        assert_eq!(counter.peak.load(Ordering::SeqCst), 3);
        assert_eq!(counter.current.load(Ordering::SeqCst), 0);
        assert_eq!(*counter.started.lock().unwrap(), (0..8).collect::<Vec<_>>());
        assert!(jobs.iter().all(|j| j.error.is_none()));
    }

    #[tokio::test]
    async fn test_parallel_speedup() {
        let (scheduler, _) = scheduler(3, Duration::from_secs(10));
        let mut jobs: Vec<Job> = (0..6).map(|_| sh("sleep 0.3")).collect();

        let start = std::time::Instant::now();
        scheduler.run(&mut jobs).await;
        let elapsed = start.elapsed();

        // Two waves of 0.3s; sequential would be 1.8s
        assert!(elapsed >= Duration::from_millis(550), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn test_results_are_bound_to_job_index() {
        let (scheduler, _) = scheduler(3, Duration::from_secs(10));
        let counter = Arc::new(Counter::default());
        let scheduler = scheduler.with_events(counter.clone());

        let mut jobs = vec![
            sh("sleep 0.4; echo zero"),
            sh("sleep 0.2; echo one"),
            sh("echo two"),
        ];
        scheduler.run(&mut jobs).await;

        assert_eq!(*counter.finished.lock().unwrap(), vec![2, 1, 0]);
        assert_eq!(jobs[0].output_line(), Some("zero".to_string()));
        assert_eq!(jobs[1].output_line(), Some("one".to_string()));
        assert_eq!(jobs[2].output_line(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_exit_messages_carry_progress() {
        let (scheduler, notifier) = scheduler(1, Duration::from_secs(10));
        let mut jobs = vec![sh("true"), sh("true")];
        jobs[0].exit_message = Some("Downloaded a".to_string());
        jobs[1].exit_message = Some("Downloaded b".to_string());
        scheduler.run(&mut jobs).await;

        assert_eq!(
            notifier.at_level(Level::Info),
            vec!["(1/2) Downloaded a", "(2/2) Downloaded b"]
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_outstanding_processes() {
        let (scheduler, notifier) = scheduler(2, Duration::from_millis(200));
        let mut jobs = vec![sh("sleep 5"), sh("sleep 5")];

        let start = std::time::Instant::now();
        scheduler.run(&mut jobs).await;

        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(jobs
            .iter()
            .all(|j| matches!(j.error, Some(JobError::TimedOut { .. }))));
        assert_eq!(notifier.at_level(Level::Error).len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_fails_jobs_never_dispatched() {
        let (scheduler, _) = scheduler(1, Duration::from_millis(200));
        let mut jobs = vec![
            sh("sleep 5"),
            sh("echo never"),
            Job::new(std::env::temp_dir()),
        ];
        scheduler.run(&mut jobs).await;

        assert!(matches!(jobs[0].error, Some(JobError::TimedOut { .. })));
        assert!(matches!(jobs[1].error, Some(JobError::TimedOut { .. })));
        assert!(jobs[1].stdout.is_empty());
        // Nothing to run, nothing to expire
        assert!(jobs[2].error.is_none());
    }

    #[tokio::test]
    async fn test_timeout_detach_releases_caller() {
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = SchedulerSettings {
            concurrency: 1,
            timeout_per_job: Duration::from_millis(100),
            on_timeout: OnTimeout::Detach,
        };
        let scheduler = Scheduler::new(settings, notifier);
        let mut jobs = vec![sh("sleep 2")];

        let start = std::time::Instant::now();
        scheduler.run(&mut jobs).await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(matches!(jobs[0].error, Some(JobError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_timeout_budget_scales_with_job_count() {
        // 4 jobs * 400ms budget covers two sequential 0.3s jobs
        let (scheduler, _) = scheduler(1, Duration::from_millis(400));
        let mut jobs = vec![
            sh("sleep 0.3"),
            sh("sleep 0.3"),
            Job::new(std::env::temp_dir()),
            Job::new(std::env::temp_dir()),
        ];
        scheduler.run(&mut jobs).await;
        assert!(jobs.iter().all(|j| j.error.is_none()));
    }
}
