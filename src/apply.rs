//! Context-validating patch application.
//!
//! Applying a [`Patch`] walks the live file line by line, checks every
//! pre-image line of every hunk against what is actually on disk, and builds
//! the post-image in memory. Nothing is written unless the whole patch
//! matches, and the write itself is atomic (tempfile + persist). A stale
//! patch, one computed against content that has since changed, is rejected
//! without touching the file.

use crate::patch::{LineKind, Patch, PatchSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("hunk does not match source file {file} at line {line_number}")]
    HunkMismatch {
        file: String,
        line_number: usize,
        expected: String,
        found: String,
    },

    #[error("premature end of source file {file}")]
    PrematureEnd { file: String },

    #[error("I/O error applying patch to {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApplyError {
    fn io(file: &Path, source: std::io::Error) -> Self {
        ApplyError::Io {
            file: file.display().to_string(),
            source,
        }
    }
}

impl Patch {
    /// Rewrite `source_filename` (or `target_filename`, when different) to
    /// the post-image implied by this patch, or fail without modifying it.
    pub fn apply(&self) -> Result<(), ApplyError> {
        let source = self.source_filename.as_path();
        let file = source.display().to_string();
        let content = fs::read_to_string(source).map_err(|e| ApplyError::io(source, e))?;

        // Terminators stay attached so untouched lines are copied verbatim,
        // CRLF and missing final newline included.
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut output = String::with_capacity(content.len());
        let mut cursor = 0usize;

        for hunk in &self.hunks {
            // Copy through everything ahead of the hunk. A pure insertion
            // (`@@ -N,0 ...`) names the line the new content follows, so
            // line N itself is copied first.
            let start = if hunk.source_line_count == 0 {
                hunk.source_line_start
            } else {
                hunk.source_line_start.saturating_sub(1)
            };
            while cursor < start {
                let line = lines.get(cursor).ok_or_else(|| ApplyError::PrematureEnd {
                    file: file.clone(),
                })?;
                output.push_str(line);
                cursor += 1;
            }

            for hunk_line in &hunk.lines {
                match hunk_line.kind {
                    LineKind::Added => {
                        output.push_str(&hunk_line.text);
                        if hunk_line.terminated {
                            output.push('\n');
                        }
                    }
                    LineKind::Context | LineKind::Removed => {
                        let line =
                            lines.get(cursor).ok_or_else(|| ApplyError::PrematureEnd {
                                file: file.clone(),
                            })?;
                        cursor += 1;
                        let found = line.trim_end_matches(['\r', '\n']);
                        if found != hunk_line.text {
                            return Err(ApplyError::HunkMismatch {
                                file: file.clone(),
                                line_number: cursor,
                                expected: hunk_line.text.clone(),
                                found: found.to_string(),
                            });
                        }
                        if hunk_line.kind == LineKind::Context {
                            output.push_str(line);
                        }
                    }
                }
            }
        }

        // Everything after the last hunk is copied verbatim.
        for line in lines.iter().skip(cursor) {
            output.push_str(line);
        }

        let permissions = fs::metadata(source)
            .map_err(|e| ApplyError::io(source, e))?
            .permissions();
        let target = self.target_filename.as_path();
        atomic_write(target, output.as_bytes()).map_err(|e| ApplyError::io(target, e))?;
        fs::set_permissions(target, permissions).map_err(|e| ApplyError::io(target, e))?;
        Ok(())
    }
}

impl PatchSet {
    /// Apply every patch in order.
    ///
    /// There is no cross-file rollback: a failure leaves earlier files
    /// applied and stops at the failing one. The failing file itself is
    /// untouched.
    pub fn apply(&self) -> Result<(), ApplyError> {
        for patch in self.iter() {
            patch.apply()?;
        }
        Ok(())
    }
}

/// Atomic file replacement: tempfile in the target directory, sync, rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut temp = match parent {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
