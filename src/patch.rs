//! In-memory representation of a restricted unified diff.
//!
//! A [`Hunk`] is one contiguous source-range replacement, a [`Patch`] is the
//! ordered hunks for one file, and a [`PatchSet`] is one patch per touched
//! file. Instances are produced by [`crate::parse`] and consumed once by the
//! applier in [`crate::apply`].

use std::path::PathBuf;

/// Classification of one body line of a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Present in both the pre-image and the post-image.
    Context,
    /// Present only in the pre-image.
    Removed,
    /// Present only in the post-image.
    Added,
}

/// One tagged body line. `text` carries no line terminator; `terminated`
/// records whether the line had one in the diff, so a file ending without
/// a final newline survives the round trip byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    pub text: String,
    pub terminated: bool,
}

impl HunkLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            terminated: true,
        }
    }
}

/// One contiguous block of a unified diff (`@@ -S[,C] +S[,C] @@` plus body).
///
/// Invariants once complete:
/// - context + removed line count == `source_line_count`
/// - context + added line count == `target_line_count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// First pre-image line covered, 1-based.
    pub source_line_start: usize,
    /// Number of pre-image lines covered.
    pub source_line_count: usize,
    /// First post-image line covered, 1-based.
    pub target_line_start: usize,
    /// Number of post-image lines covered.
    pub target_line_count: usize,
    /// Ordered body lines.
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    pub fn new(
        source_line_start: usize,
        source_line_count: usize,
        target_line_start: usize,
        target_line_count: usize,
    ) -> Self {
        Self {
            source_line_start,
            source_line_count,
            target_line_start,
            target_line_count,
            lines: Vec::new(),
        }
    }

    /// Body lines consumed from the pre-image so far (context + removed).
    pub fn source_lines_seen(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Added)
            .count()
    }

    /// Body lines contributed to the post-image so far (context + added).
    pub fn target_lines_seen(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Removed)
            .count()
    }

    /// Whether both running counts have reached the header counts.
    pub fn is_complete(&self) -> bool {
        self.source_lines_seen() == self.source_line_count
            && self.target_lines_seen() == self.target_line_count
    }

    /// The expected pre-image lines, in order (context + removed).
    pub fn pre_image(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Added)
            .map(|l| l.text.as_str())
    }

    /// One past the last pre-image line covered by this hunk.
    pub fn source_line_end(&self) -> usize {
        self.source_line_start + self.source_line_count
    }
}

/// All hunks for one file, before/after names taken from the diff headers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Patch does nothing until apply() is called"]
pub struct Patch {
    pub source_filename: PathBuf,
    pub target_filename: PathBuf,
    /// Hunks ordered by strictly increasing, non-overlapping source ranges.
    pub hunks: Vec<Hunk>,
}

impl Patch {
    pub fn new(source_filename: impl Into<PathBuf>, target_filename: impl Into<PathBuf>) -> Self {
        Self {
            source_filename: source_filename.into(),
            target_filename: target_filename.into(),
            hunks: Vec::new(),
        }
    }

    /// Append a completed hunk, enforcing the ordering invariant.
    ///
    /// Returns `false` if the hunk starts before the end of the previous one.
    pub fn push_hunk(&mut self, hunk: Hunk) -> bool {
        if let Some(last) = self.hunks.last() {
            if hunk.source_line_start < last.source_line_end() {
                return false;
            }
        }
        self.hunks.push(hunk);
        true
    }
}

/// The patches for a batch of files, in parse order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "a PatchSet does nothing until apply() is called"]
pub struct PatchSet {
    pub patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk_with(lines: &[(LineKind, &str)], s: usize, sc: usize, t: usize, tc: usize) -> Hunk {
        let mut h = Hunk::new(s, sc, t, tc);
        for (kind, text) in lines {
            h.lines.push(HunkLine::new(*kind, *text));
        }
        h
    }

    #[test]
    fn running_counts_follow_line_kinds() {
        let h = hunk_with(
            &[
                (LineKind::Context, "a"),
                (LineKind::Removed, "b"),
                (LineKind::Added, "B"),
                (LineKind::Context, "c"),
            ],
            1,
            3,
            1,
            3,
        );
        assert_eq!(h.source_lines_seen(), 3);
        assert_eq!(h.target_lines_seen(), 3);
        assert!(h.is_complete());
    }

    #[test]
    fn pre_image_skips_added_lines() {
        let h = hunk_with(
            &[
                (LineKind::Context, "a"),
                (LineKind::Added, "new"),
                (LineKind::Removed, "old"),
            ],
            1,
            2,
            1,
            2,
        );
        let pre: Vec<_> = h.pre_image().collect();
        assert_eq!(pre, vec!["a", "old"]);
    }

    #[test]
    fn push_hunk_rejects_overlap() {
        let mut patch = Patch::new("f.c", "f.c");
        assert!(patch.push_hunk(Hunk::new(1, 3, 1, 3)));
        // Starts inside the previous hunk's source range.
        assert!(!patch.push_hunk(Hunk::new(3, 2, 3, 2)));
        // Adjacent is fine.
        assert!(patch.push_hunk(Hunk::new(4, 2, 4, 2)));
        assert_eq!(patch.hunks.len(), 2);
    }

    #[test]
    fn patch_set_preserves_insertion_order() {
        let mut set = PatchSet::new();
        assert!(set.is_empty());
        set.push(Patch::new("a.c", "a.c"));
        set.push(Patch::new("b.c", "b.c"));
        let names: Vec<_> = set.iter().map(|p| p.source_filename.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
        assert_eq!(set.len(), 2);
    }
}
