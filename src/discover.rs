//! Run configuration and candidate-file discovery.
//!
//! All knobs live in one immutable [`RunConfig`] built at startup and
//! threaded into the executor; nothing here is process-global or mutable
//! after construction.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions formatted when the caller does not override them.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "c", "h", "C", "H", "cpp", "hpp", "cc", "hh", "c++", "h++", "cxx", "hxx",
];

/// Exclude patterns are also read from this file when it exists.
pub const DEFAULT_IGNORE_FILE: &str = ".clang-format-ignore";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("invalid exclude pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path to the external formatter executable.
    pub exe: PathBuf,
    /// Formatting style passed through as `-style <STYLE>`.
    pub style: Option<String>,
    /// File extensions considered for formatting (no leading dot).
    pub extensions: Vec<String>,
    /// Glob patterns for paths to skip.
    pub exclude_patterns: Vec<String>,
    /// Worker count; 0 means one per CPU.
    pub jobs: usize,
    /// Bounded wait for one formatter invocation.
    pub timeout: Duration,
}

impl RunConfig {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            style: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: Vec::new(),
            jobs: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Effective worker count for a batch: min(jobs, requested), where a
    /// requested count of 0 means one worker per CPU.
    pub fn worker_count(&self, job_count: usize) -> usize {
        let requested = if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        };
        requested.min(job_count)
    }

    /// Compile the exclude patterns into a matcher.
    pub fn exclude_set(&self) -> Result<GlobSet, DiscoverError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|source| DiscoverError::BadPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| DiscoverError::BadPattern {
            pattern: String::new(),
            source,
        })
    }

    /// Whether a path passes the extension filter and the exclude patterns.
    pub fn selects(&self, path: &Path, excludes: &GlobSet) -> bool {
        if excludes.is_match(path) {
            return false;
        }
        has_extension(path, &self.extensions)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|e| e == ext),
        None => false,
    }
}

/// Read exclude patterns from an ignore file.
///
/// Missing file means no patterns; `#` comments and blank lines are skipped.
pub fn excludes_from_file(ignore_file: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(ignore_file) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Expand the given roots into the list of files to format.
///
/// Plain files pass through unfiltered (the caller named them explicitly).
/// Directories are walked when `recursive` is set, pruning excluded
/// directories and keeping only files with a configured extension.
pub fn discover_files(
    roots: &[PathBuf],
    recursive: bool,
    config: &RunConfig,
) -> Result<Vec<PathBuf>, DiscoverError> {
    let excludes = config.exclude_set()?;
    let mut files = Vec::new();

    for root in roots {
        if recursive && root.is_dir() {
            let walker = WalkDir::new(root)
                .into_iter()
                .filter_entry(|entry| !(entry.file_type().is_dir() && excludes.is_match(entry.path())));
            for entry in walker {
                let entry = entry?;
                if entry.file_type().is_file() && config.selects(entry.path(), &excludes) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(root.clone());
        }
    }
    Ok(files)
}
