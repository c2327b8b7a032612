//! fmt-patcher: turn external reformatting into reviewable, safely applied
//! patches.
//!
//! The crate wraps a clang-format style formatter. It never formats code
//! itself: it runs the formatter over whole files or over the changed line
//! ranges of a pending git change set, turns the output into a restricted
//! unified diff, and applies that diff back only after validating every
//! hunk's pre-image against the live file.
//!
//! # Architecture
//!
//! - [`patch`] holds the diff model ([`Hunk`] / [`Patch`] / [`PatchSet`]).
//! - [`parse`] builds a [`PatchSet`] from concatenated tagged diff text.
//! - [`diff`] produces that text from (original, reformatted) pairs.
//! - [`job`] and [`exec`] run one formatter subprocess per file across a
//!   bounded worker pool, tolerating per-job failure.
//! - [`gate`] shows the aggregate and drives Apply / Ignore / Cancel.
//! - [`apply`] rewrites files atomically, or not at all.
//!
//! # Safety
//!
//! - Every hunk's pre-image is validated before any byte is written; a stale
//!   patch leaves the file untouched.
//! - File rewrites are atomic (tempfile + fsync + rename) and preserve the
//!   original permission bits.
//! - Worker failures never take down sibling jobs; workers communicate
//!   through typed results only.

pub mod apply;
pub mod diff;
pub mod discover;
pub mod exec;
pub mod exit;
pub mod gate;
pub mod job;
pub mod parse;
pub mod patch;
pub mod vcs;

// Re-exports
pub use apply::ApplyError;
pub use discover::{RunConfig, DEFAULT_EXTENSIONS, DEFAULT_IGNORE_FILE};
pub use exec::{ExecOptions, ExecReport, Executor, PoolError};
pub use exit::ExitStatus;
pub use gate::{Decision, DecisionPolicy, FixedPolicy, TerminalPrompt};
pub use job::{FileJob, JobOutcome, JobStatus, LineRange, StartupError};
pub use parse::{parse_patch_set, ParseError};
pub use patch::{Hunk, HunkLine, LineKind, Patch, PatchSet};
pub use vcs::{ChangeProvider, GitChanges, VcsError};
