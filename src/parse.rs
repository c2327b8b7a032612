//! Parser for the restricted unified-diff dialect this crate emits.
//!
//! The dialect tags its file headers with `(original)` / `(reformatted)`
//! suffixes so the stream cannot be confused with arbitrary third-party diff
//! text, and records a missing final newline with the usual
//! `\ No newline at end of file` marker. Zero or more diffs may be
//! concatenated back-to-back; the parser is a four-state machine over the
//! line stream:
//!
//! ```text
//! ScanFilename -> HunkHeader -> HunkBody -> ScanNextState
//!       ^                          |              |
//!       +---- next file ----------------- next hunk
//! ```

use crate::patch::{Hunk, HunkLine, LineKind, Patch, PatchSet};
use thiserror::Error;

pub const SOURCE_HEADER_TAG: &str = "(original)";
pub const TARGET_HEADER_TAG: &str = "(reformatted)";

/// Follows a body line that ends its file without a newline.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line_number}: second source header while '{pending}' is still open")]
    DoubleSource { line_number: usize, pending: String },

    #[error("line {line_number}: unable to parse source filename from diff header")]
    BadSourceHeader { line_number: usize },

    #[error("line {line_number}: unable to parse target filename from diff header")]
    BadTargetHeader { line_number: usize },

    #[error("line {line_number}: target header without a preceding source header")]
    TargetWithoutSource { line_number: usize },

    #[error("line {line_number}: unable to parse hunk header for file {file}")]
    BadHunkHeader { line_number: usize, file: String },

    #[error("line {line_number}: extra lines for hunk for target {file}")]
    HunkOverflow { line_number: usize, file: String },

    #[error("line {line_number}: hunk out of order for file {file}")]
    HunkOutOfOrder { line_number: usize, file: String },

    #[error("line {line_number}: malformed trailing content after hunk")]
    TrailingContent { line_number: usize },

    #[error("unexpected end of diff inside a hunk for file {file}")]
    UnexpectedEof { file: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ScanFilename,
    HunkHeader,
    HunkBody,
    ScanNextState,
}

/// Parse concatenated unified-diff text into a [`PatchSet`].
pub fn parse_patch_set(text: &str) -> Result<PatchSet, ParseError> {
    let mut set = PatchSet::new();
    let mut pending_source: Option<String> = None;
    let mut patch: Option<Patch> = None;
    let mut hunk: Option<Hunk> = None;
    let mut state = State::ScanFilename;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;

        // Decide whether the completed hunk is followed by a new file, a new
        // hunk of the same file, or garbage. The line is then reprocessed by
        // the state it selected.
        if state == State::ScanNextState {
            if line.starts_with('\\') {
                // The no-newline marker annotates the final body line of
                // the hunk just closed.
                match last_line_mut(&mut patch) {
                    Some(last) => last.terminated = false,
                    None => return Err(ParseError::TrailingContent { line_number }),
                }
                continue;
            }
            if source_header(line).is_some() {
                if let Some(done) = patch.take() {
                    set.push(done);
                }
                state = State::ScanFilename;
            } else if hunk_header(line).is_some() {
                state = State::HunkHeader;
            } else {
                return Err(ParseError::TrailingContent { line_number });
            }
        }

        match state {
            State::ScanFilename => {
                if line.starts_with("---") {
                    if let Some(pending) = pending_source.take() {
                        return Err(ParseError::DoubleSource {
                            line_number,
                            pending,
                        });
                    }
                    match source_header(line) {
                        Some(path) => pending_source = Some(path.to_string()),
                        None => return Err(ParseError::BadSourceHeader { line_number }),
                    }
                } else if line.starts_with("+++") {
                    let target = target_header(line)
                        .ok_or(ParseError::BadTargetHeader { line_number })?;
                    let source = pending_source
                        .take()
                        .ok_or(ParseError::TargetWithoutSource { line_number })?;
                    patch = Some(Patch::new(source, target));
                    state = State::HunkHeader;
                }
                // Anything else ahead of the first header is ignored.
            }
            State::HunkHeader => {
                let file = current_file(&patch);
                let (s, sc, t, tc) =
                    hunk_header(line).ok_or(ParseError::BadHunkHeader { line_number, file })?;
                let new_hunk = Hunk::new(s, sc, t, tc);
                if new_hunk.is_complete() {
                    // Degenerate zero-count hunk closes with an empty body.
                    close_hunk(&mut patch, new_hunk, line_number)?;
                    state = State::ScanNextState;
                } else {
                    hunk = Some(new_hunk);
                    state = State::HunkBody;
                }
            }
            State::HunkBody => {
                let current = hunk
                    .as_mut()
                    .expect("state machine opens a hunk before entering HunkBody");
                // The no-newline marker annotates the previous body line
                // and does not count against the hunk.
                if line.starts_with('\\') {
                    let last = current
                        .lines
                        .last_mut()
                        .ok_or(ParseError::TrailingContent { line_number })?;
                    last.terminated = false;
                    continue;
                }
                let (kind, text) = classify(line);
                current.lines.push(HunkLine::new(kind, text));

                if current.source_lines_seen() > current.source_line_count
                    || current.target_lines_seen() > current.target_line_count
                {
                    return Err(ParseError::HunkOverflow {
                        line_number,
                        file: current_file(&patch),
                    });
                }
                if current.is_complete() {
                    let done = hunk
                        .take()
                        .expect("hunk checked complete above");
                    close_hunk(&mut patch, done, line_number)?;
                    state = State::ScanNextState;
                }
            }
            State::ScanNextState => unreachable!("resolved before the state dispatch"),
        }
    }

    if hunk.is_some() {
        return Err(ParseError::UnexpectedEof {
            file: current_file(&patch),
        });
    }
    if let Some(done) = patch {
        set.push(done);
    }
    Ok(set)
}

fn last_line_mut(patch: &mut Option<Patch>) -> Option<&mut HunkLine> {
    patch.as_mut()?.hunks.last_mut()?.lines.last_mut()
}

fn current_file(patch: &Option<Patch>) -> String {
    patch
        .as_ref()
        .map(|p| p.target_filename.display().to_string())
        .unwrap_or_default()
}

fn close_hunk(patch: &mut Option<Patch>, hunk: Hunk, line_number: usize) -> Result<(), ParseError> {
    let patch = patch
        .as_mut()
        .expect("state machine opens a patch before parsing hunks");
    if !patch.push_hunk(hunk) {
        return Err(ParseError::HunkOutOfOrder {
            line_number,
            file: patch.target_filename.display().to_string(),
        });
    }
    Ok(())
}

/// Matches `--- <path>\t(original)` and yields the path.
fn source_header(line: &str) -> Option<&str> {
    tagged_header(line, "--- ", SOURCE_HEADER_TAG)
}

/// Matches `+++ <path>\t(reformatted)` and yields the path.
fn target_header(line: &str) -> Option<&str> {
    let path = tagged_header(line, "+++ ", TARGET_HEADER_TAG)?;
    if path.is_empty() {
        return None;
    }
    Some(path)
}

fn tagged_header<'a>(line: &'a str, prefix: &str, tag: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    // The tab ahead of the tag delimits the path, so spaces inside the
    // path are fine.
    let (path, suffix) = rest.split_once('\t')?;
    if suffix != tag {
        return None;
    }
    Some(path)
}

/// Matches `@@ -S[,C] +S[,C] @@`; an omitted count defaults to 1.
pub(crate) fn hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let (source, rest) = rest.split_once(" +")?;
    let (target, _) = rest.split_once(" @@")?;
    let (s, sc) = line_range(source)?;
    let (t, tc) = line_range(target)?;
    Some((s, sc, t, tc))
}

fn line_range(spec: &str) -> Option<(usize, usize)> {
    match spec.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((spec.parse().ok()?, 1)),
    }
}

fn classify(line: &str) -> (LineKind, String) {
    if let Some(rest) = line.strip_prefix('-') {
        (LineKind::Removed, rest.to_string())
    } else if let Some(rest) = line.strip_prefix('+') {
        (LineKind::Added, rest.to_string())
    } else {
        // Context lines carry a leading space in well-formed diffs; anything
        // else is treated as context with the first column dropped only when
        // the space is present.
        let rest = line.strip_prefix(' ').unwrap_or(line);
        (LineKind::Context, rest.to_string())
    }
}
