//! Worker-pool orchestration for formatter jobs.
//!
//! One worker, one job, one subprocess at a time. With a single worker jobs
//! run sequentially in submission order on the caller's thread, so aggregate
//! output is deterministic. With more workers a local rayon pool is used and
//! results are drained in completion order, which is explicitly unordered
//! with respect to submission.
//!
//! Per-job failures are recovered: they surface as warnings in the report
//! and the job contributes no diff. Faults of the pool itself are fatal and
//! discard any undrained results.

use crate::discover::RunConfig;
use crate::job::{run_job, FileJob, JobOutcome, JobStatus};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::mpsc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),

    #[error("worker pool failed; remaining jobs were abandoned")]
    PoolFault,
}

/// Per-batch switches that are not part of the ambient [`RunConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Let the formatter rewrite files itself instead of producing diffs.
    pub in_place: bool,
    /// Print the invocations without running them.
    pub dry_run: bool,
}

/// One recovered per-job failure.
#[derive(Debug)]
pub struct JobFailure {
    pub file: PathBuf,
    pub message: String,
}

/// Aggregate result of one batch.
#[derive(Debug, Default)]
pub struct ExecReport {
    /// Concatenated diff lines from every job that produced differences.
    pub patch_lines: Vec<String>,
    /// Recovered failures, one per failed job.
    pub failures: Vec<JobFailure>,
    /// Number of jobs submitted.
    pub job_count: usize,
}

impl ExecReport {
    /// Whether anything is available to patch.
    pub fn can_patch(&self) -> bool {
        !self.patch_lines.is_empty()
    }

    /// Whether every submitted job failed.
    pub fn all_failed(&self) -> bool {
        self.job_count > 0 && self.failures.len() == self.job_count
    }
}

/// Runs batches of [`FileJob`]s against one [`RunConfig`].
pub struct Executor<'a> {
    config: &'a RunConfig,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Run a batch to completion.
    ///
    /// Callers that need deterministic aggregate output must configure a
    /// single worker; multi-worker batches accumulate in completion order.
    pub fn run(&self, jobs: &[FileJob], options: ExecOptions) -> Result<ExecReport, PoolError> {
        let mut report = ExecReport {
            job_count: jobs.len(),
            ..ExecReport::default()
        };
        if jobs.is_empty() {
            return Ok(report);
        }

        let workers = self.config.worker_count(jobs.len());
        if workers <= 1 {
            for job in jobs {
                let outcome = run_job(self.config, job, options.in_place, options.dry_run);
                collect(&mut report, outcome);
            }
            return Ok(report);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        let (tx, rx) = mpsc::channel::<JobOutcome>();

        let config = self.config;
        let scope_tx = tx.clone();
        let scope_result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            pool.scope(move |scope| {
                for job in jobs {
                    let tx = scope_tx.clone();
                    scope.spawn(move |_| {
                        let outcome = run_job(config, job, options.in_place, options.dry_run);
                        // A send failure means the coordinator is gone; the
                        // result is lost by design.
                        let _ = tx.send(outcome);
                    });
                }
            });
        }));
        drop(tx);

        if scope_result.is_err() {
            // Infrastructure fault, not attributable to one job. Undrained
            // results are discarded.
            return Err(PoolError::PoolFault);
        }

        for outcome in rx {
            collect(&mut report, outcome);
        }
        Ok(report)
    }
}

fn collect(report: &mut ExecReport, outcome: JobOutcome) {
    match outcome.status {
        JobStatus::Done {
            diff_lines,
            stderr_lines,
        } => {
            for line in &stderr_lines {
                log::debug!("{}: formatter stderr: {line}", outcome.file.display());
            }
            if diff_lines.is_empty() {
                return;
            }
            report.patch_lines.extend(diff_lines);
        }
        JobStatus::Failed { message } => {
            log::warn!("{message}");
            report.failures.push(JobFailure {
                file: outcome.file,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_patch_set;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// An uppercasing "formatter": fails for any path containing `fail`.
    #[cfg(unix)]
    fn uppercasing_formatter(dir: &Path) -> PathBuf {
        install_script(
            dir,
            "fake-formatter",
            "case \"$1\" in *fail*) echo \"boom: $1\" >&2; exit 1;; esac\ntr 'a-z' 'A-Z' < \"$1\"",
        )
    }

    fn config_with(exe: &Path, jobs: usize) -> RunConfig {
        let mut config = RunConfig::new(exe);
        config.jobs = jobs;
        config
    }

    #[cfg(unix)]
    #[test]
    fn failed_jobs_become_warnings_and_siblings_survive() {
        let dir = TempDir::new().unwrap();
        let exe = uppercasing_formatter(dir.path());

        let mut jobs = Vec::new();
        for name in ["one.c", "fail_two.c", "three.c", "fail_four.c", "five.c"] {
            let path = dir.path().join(name);
            fs::write(&path, format!("content of {name}\n")).unwrap();
            jobs.push(FileJob::whole_file(path));
        }

        let config = config_with(&exe, 3);
        let report = Executor::new(&config)
            .run(&jobs, ExecOptions::default())
            .unwrap();

        assert_eq!(report.failures.len(), 2);
        assert!(!report.all_failed());
        let set = parse_patch_set(&crate::diff::to_text(&report.patch_lines)).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn identical_output_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        let exe = install_script(dir.path(), "cat-formatter", "cat \"$1\"");
        let path = dir.path().join("already.c");
        fs::write(&path, "already formatted\n").unwrap();

        let config = config_with(&exe, 1);
        let report = Executor::new(&config)
            .run(&[FileJob::whole_file(path)], ExecOptions::default())
            .unwrap();

        assert!(!report.can_patch());
        assert!(report.failures.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn single_worker_preserves_submission_order() {
        let dir = TempDir::new().unwrap();
        let exe = uppercasing_formatter(dir.path());

        let mut jobs = Vec::new();
        for name in ["b.c", "a.c", "c.c"] {
            let path = dir.path().join(name);
            fs::write(&path, format!("{name}\n")).unwrap();
            jobs.push(FileJob::whole_file(path));
        }

        let config = config_with(&exe, 1);
        let report = Executor::new(&config)
            .run(&jobs, ExecOptions::default())
            .unwrap();

        let set = parse_patch_set(&crate::diff::to_text(&report.patch_lines)).unwrap();
        let names: Vec<_> = set
            .iter()
            .map(|p| p.source_filename.file_name().unwrap().to_os_string())
            .collect();
        assert_eq!(names, vec!["b.c", "a.c", "c.c"]);
    }

    #[cfg(unix)]
    #[test]
    fn hung_formatter_is_killed_at_the_deadline() {
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let exe = install_script(dir.path(), "hang-formatter", "sleep 30");
        let path = dir.path().join("a.c");
        fs::write(&path, "x\n").unwrap();

        let mut config = config_with(&exe, 1);
        config.timeout = Duration::from_millis(200);
        let report = Executor::new(&config)
            .run(&[FileJob::whole_file(path)], ExecOptions::default())
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("timeout"));
        assert!(report.all_failed());
    }

    #[test]
    fn empty_batch_is_a_silent_success() {
        let config = RunConfig::new("clang-format");
        let report = Executor::new(&config)
            .run(&[], ExecOptions::default())
            .unwrap();
        assert!(!report.can_patch());
        assert!(!report.all_failed());
    }
}
