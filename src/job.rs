//! One unit of formatter work: read a file, run the external formatter over
//! it (whole file or selected line ranges), and turn the result into diff
//! lines.
//!
//! Workers report through [`JobOutcome`] only. A failed invocation, a bad
//! file, or a timed-out formatter all become `JobStatus::Failed` values; no
//! panic crosses back to the coordinator.

use crate::diff::make_diff;
use crate::discover::RunConfig;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A 1-based, inclusive line range within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A unit of parallel work, immutable once submitted.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub file: PathBuf,
    /// `None` means format the whole file.
    pub ranges: Option<Vec<LineRange>>,
}

impl FileJob {
    pub fn whole_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ranges: None,
        }
    }

    pub fn line_ranges(file: impl Into<PathBuf>, ranges: Vec<LineRange>) -> Self {
        Self {
            file: file.into(),
            ranges: Some(ranges),
        }
    }
}

/// The single typed result a worker hands back to the coordinator.
#[derive(Debug)]
pub struct JobOutcome {
    pub file: PathBuf,
    pub status: JobStatus,
}

#[derive(Debug)]
pub enum JobStatus {
    /// The formatter ran; `diff_lines` is empty when the output was
    /// byte-identical to the input (the job then contributes nothing).
    Done {
        diff_lines: Vec<String>,
        stderr_lines: Vec<String>,
    },
    /// Recoverable per-job failure; siblings keep running.
    Failed { message: String },
}

/// Executable health check run before any job is scheduled.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("command '{command}' failed to start: {source}")]
    FailedToStart {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{command}' returned non-zero exit status")]
    NonZeroExit { command: String },
}

/// Run `<exe> --version` to prove the formatter exists and is runnable.
pub fn verify_executable(config: &RunConfig) -> Result<(), StartupError> {
    let command = format!("{} --version", config.exe.display());
    let status = Command::new(&config.exe)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| StartupError::FailedToStart {
            command: command.clone(),
            source,
        })?;
    if !status.success() {
        return Err(StartupError::NonZeroExit { command });
    }
    Ok(())
}

/// Arguments for one formatter invocation, exe excluded.
///
/// Whole file: `<exe> [-i] <file> [-style S]`.
/// Line ranges: `<exe> <file> [-lines S:E]... [-style S]`.
pub fn build_invocation(config: &RunConfig, job: &FileJob, in_place: bool) -> Vec<String> {
    let mut args = Vec::new();
    match &job.ranges {
        None => {
            if in_place {
                args.push("-i".to_string());
            }
            args.push(job.file.display().to_string());
        }
        Some(ranges) => {
            args.push(job.file.display().to_string());
            for range in ranges {
                args.push("-lines".to_string());
                args.push(range.to_string());
            }
        }
    }
    if let Some(style) = &config.style {
        args.push("-style".to_string());
        args.push(style.clone());
    }
    args
}

/// Run one job to completion. Never panics across this boundary.
pub fn run_job(config: &RunConfig, job: &FileJob, in_place: bool, dry_run: bool) -> JobOutcome {
    let file = job.file.clone();
    let status = run_job_inner(config, job, in_place, dry_run);
    JobOutcome { file, status }
}

fn run_job_inner(config: &RunConfig, job: &FileJob, in_place: bool, dry_run: bool) -> JobStatus {
    let args = build_invocation(config, job, in_place);

    if dry_run {
        println!("{} {}", config.exe.display(), args.join(" "));
        return JobStatus::Done {
            diff_lines: Vec::new(),
            stderr_lines: Vec::new(),
        };
    }

    let original = match fs::read_to_string(&job.file) {
        Ok(content) => content,
        Err(e) => {
            return JobStatus::Failed {
                message: format!("{}: {e}", job.file.display()),
            }
        }
    };

    log::debug!("running {} {}", config.exe.display(), args.join(" "));
    let output = match run_with_deadline(config, &args) {
        Ok(output) => output,
        Err(message) => return JobStatus::Failed { message },
    };

    let stderr_lines: Vec<String> = output.stderr.lines().map(str::to_string).collect();
    if in_place {
        // The formatter rewrote the file itself; there is no diff to report.
        return JobStatus::Done {
            diff_lines: Vec::new(),
            stderr_lines,
        };
    }

    JobStatus::Done {
        diff_lines: make_diff(&job.file, &original, &output.stdout),
        stderr_lines,
    }
}

struct FormatterOutput {
    stdout: String,
    stderr: String,
}

/// Run the formatter with piped output and a bounded wait.
///
/// The child is polled until it exits or the configured deadline passes; on
/// expiry it is killed and the job fails. Output pipes are drained on their
/// own threads so a chatty formatter cannot deadlock against a full pipe.
fn run_with_deadline(config: &RunConfig, args: &[String]) -> Result<FormatterOutput, String> {
    let command_line = format!("{} {}", config.exe.display(), args.join(" "));

    let mut child = Command::new(&config.exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("command '{command_line}' failed to start: {e}"))?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_pipe(stdout_pipe));
    let stderr_reader = std::thread::spawn(move || read_pipe(stderr_pipe));

    let deadline = Instant::now() + config.timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!(
                        "command '{command_line}' exceeded {}s timeout and was killed",
                        config.timeout.as_secs()
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                let _ = child.kill();
                return Err(format!("command '{command_line}' could not be waited on: {e}"));
            }
        }
    };

    let stdout = stdout_reader
        .join()
        .unwrap_or_default();
    let stderr = stderr_reader
        .join()
        .unwrap_or_default();

    if !status.success() {
        return Err(format!(
            "command '{command_line}' returned non-zero exit status {}: {}",
            status.code().unwrap_or(-1),
            stderr.trim_end()
        ));
    }

    Ok(FormatterOutput { stdout, stderr })
}

fn read_pipe(pipe: Option<impl Read>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_invocation_shape() {
        let config = RunConfig::new("clang-format");
        let job = FileJob::whole_file("src/a.c");
        assert_eq!(build_invocation(&config, &job, false), vec!["src/a.c"]);
        assert_eq!(
            build_invocation(&config, &job, true),
            vec!["-i", "src/a.c"]
        );
    }

    #[test]
    fn line_range_invocation_shape() {
        let mut config = RunConfig::new("clang-format");
        config.style = Some("Google".to_string());
        let job = FileJob::line_ranges(
            "src/a.c",
            vec![LineRange::new(3, 7), LineRange::new(12, 12)],
        );
        assert_eq!(
            build_invocation(&config, &job, false),
            vec!["src/a.c", "-lines", "3:7", "-lines", "12:12", "-style", "Google"]
        );
    }

    #[test]
    fn missing_executable_is_a_startup_error() {
        let config = RunConfig::new("/nonexistent/definitely-not-a-formatter");
        assert!(matches!(
            verify_executable(&config),
            Err(StartupError::FailedToStart { .. })
        ));
    }

    #[test]
    fn missing_file_fails_the_job_not_the_process() {
        let config = RunConfig::new("true");
        let job = FileJob::whole_file("/nonexistent/input.c");
        let outcome = run_job(&config, &job, false, false);
        assert!(matches!(outcome.status, JobStatus::Failed { .. }));
    }
}
