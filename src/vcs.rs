//! Version-control collaborator boundary.
//!
//! The formatter pipeline needs exactly three things from version control:
//! which paths the pending change set introduces, which target-side line
//! ranges of each modified path changed, and a way to re-stage paths after a
//! patch is applied. [`ChangeProvider`] is that boundary; [`GitChanges`]
//! implements it over the `git` CLI.

use crate::job::LineRange;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("git failed to start: {0}")]
    FailedToStart(#[source] std::io::Error),

    #[error("git {args}: {stderr}")]
    CommandFailed { args: String, stderr: String },
}

/// What the gate needs from the pending change set.
pub trait ChangeProvider {
    /// Paths newly introduced by the pending change set.
    fn added_paths(&self) -> Result<Vec<PathBuf>, VcsError>;

    /// For each modified path, the 1-based inclusive target-side line ranges
    /// that changed relative to the prior committed version.
    fn modified_line_ranges(&self) -> Result<Vec<(PathBuf, Vec<LineRange>)>, VcsError>;

    /// Re-stage the pending change set after files were rewritten.
    fn restage(&self) -> Result<(), VcsError>;
}

/// `git` CLI implementation of [`ChangeProvider`].
#[derive(Debug, Clone)]
pub struct GitChanges {
    /// Compare the index against HEAD (hook mode) instead of the working
    /// tree against HEAD (standalone mode).
    staged_only: bool,
}

impl GitChanges {
    /// Pending = staged changes. Used by the pre-commit hook path.
    pub fn staged() -> Self {
        Self { staged_only: true }
    }

    /// Pending = working-tree changes against HEAD. Used by standalone review.
    pub fn working_tree() -> Self {
        Self { staged_only: false }
    }

    fn diff_args(&self) -> Vec<&'static str> {
        if self.staged_only {
            vec!["diff", "--cached"]
        } else {
            vec!["diff", "HEAD"]
        }
    }

    fn run_git(&self, args: &[&str]) -> Result<String, VcsError> {
        log::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .output()
            .map_err(VcsError::FailedToStart)?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ChangeProvider for GitChanges {
    fn added_paths(&self) -> Result<Vec<PathBuf>, VcsError> {
        let mut args = self.diff_args();
        args.extend(["--name-only", "--diff-filter=A"]);
        let stdout = self.run_git(&args)?;
        Ok(stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn modified_line_ranges(&self) -> Result<Vec<(PathBuf, Vec<LineRange>)>, VcsError> {
        // -U0 hunk headers give the exact changed target-side ranges without
        // context padding.
        let mut args = self.diff_args();
        args.extend(["-U0", "--diff-filter=M"]);
        let stdout = self.run_git(&args)?;
        Ok(ranges_from_diff(&stdout))
    }

    fn restage(&self) -> Result<(), VcsError> {
        self.run_git(&["add", "-u"])?;
        Ok(())
    }
}

/// Collect target-side changed ranges per file from `git diff -U0` output.
///
/// All ranges of a file accumulate; hunks with a zero target count (pure
/// deletions) touch no target lines and are skipped.
fn ranges_from_diff(diff: &str) -> Vec<(PathBuf, Vec<LineRange>)> {
    let mut by_file: Vec<(PathBuf, Vec<LineRange>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            let name = rest.strip_prefix("b/").unwrap_or(rest);
            if name == "/dev/null" {
                // Deleted file; its hunks touch no target lines.
                current = None;
                continue;
            }
            by_file.push((PathBuf::from(name), Vec::new()));
            current = Some(by_file.len() - 1);
        } else if let Some((_, _, start, count)) = crate::parse::hunk_header(line) {
            if count == 0 {
                continue;
            }
            if let Some(index) = current {
                by_file[index].1.push(LineRange::new(start, start + count - 1));
            }
        }
    }

    by_file.retain(|(_, ranges)| !ranges.is_empty());
    by_file
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
diff --git a/src/one.c b/src/one.c
index 111..222 100644
--- a/src/one.c
+++ b/src/one.c
@@ -4,0 +5,3 @@ int main()
+a
+b
+c
@@ -20 +23,2 @@ int main()
-x
+y
+z
diff --git a/src/two.c b/src/two.c
index 333..444 100644
--- a/src/two.c
+++ b/src/two.c
@@ -7,2 +7,0 @@ void f()
-gone
-gone too
";

    #[test]
    fn ranges_accumulate_per_file() {
        let ranges = ranges_from_diff(SAMPLE);
        assert_eq!(ranges.len(), 1);
        let (file, ranges) = &ranges[0];
        assert_eq!(file, &PathBuf::from("src/one.c"));
        assert_eq!(
            ranges,
            &vec![LineRange::new(5, 7), LineRange::new(23, 24)]
        );
    }

    #[test]
    fn pure_deletions_touch_no_target_lines() {
        let diff = "\
--- a/src/two.c
+++ b/src/two.c
@@ -7,2 +7,0 @@
-gone
-gone too
";
        assert!(ranges_from_diff(diff).is_empty());
    }

    #[test]
    fn deleted_file_target_is_ignored() {
        let diff = "\
--- a/src/dead.c
+++ /dev/null
@@ -1,3 +0,0 @@
-a
-b
-c
";
        assert!(ranges_from_diff(diff).is_empty());
    }
}
