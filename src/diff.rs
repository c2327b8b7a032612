//! Unified-diff generation and rendering.
//!
//! Diffs are computed between the on-disk content and the formatter's stdout
//! with three lines of context, and serialized in the tagged dialect that
//! [`crate::parse`] understands: `--- <path>\t(original)` /
//! `+++ <path>\t(reformatted)` headers and `@@ -S[,C] +S[,C] @@` hunks.

use colored::Colorize;
use similar::{ChangeTag, DiffOp, TextDiff};
use std::io::Write;
use std::path::Path;

use crate::parse::{NO_NEWLINE_MARKER, SOURCE_HEADER_TAG, TARGET_HEADER_TAG};

/// Compute the tagged unified diff between two versions of one file.
///
/// Returns one element per diff line, without terminators. A body line that
/// ends its file without a newline is followed by the standard
/// `\ No newline at end of file` marker. Identical inputs produce an empty
/// vector, which callers treat as "nothing to patch".
pub fn make_diff(file: &Path, original: &str, reformatted: &str) -> Vec<String> {
    let diff = TextDiff::from_lines(original, reformatted);
    let groups = diff.grouped_ops(3);
    if groups.is_empty() {
        return Vec::new();
    }

    let name = file.display();
    let mut lines = Vec::new();
    lines.push(format!("--- {name}\t{SOURCE_HEADER_TAG}"));
    lines.push(format!("+++ {name}\t{TARGET_HEADER_TAG}"));

    for group in &groups {
        lines.push(hunk_header(group));
        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                let text = change.value().trim_end_matches(['\r', '\n']);
                lines.push(format!("{sign}{text}"));
                if change.missing_newline() {
                    lines.push(NO_NEWLINE_MARKER.to_string());
                }
            }
        }
    }
    lines
}

fn hunk_header(group: &[DiffOp]) -> String {
    // grouped_ops never yields an empty group; fall back to a zero range if
    // it ever does.
    let old = group
        .first()
        .map(|f| f.old_range().start..group.last().map_or(0, |l| l.old_range().end))
        .unwrap_or(0..0);
    let new = group
        .first()
        .map(|f| f.new_range().start..group.last().map_or(0, |l| l.new_range().end))
        .unwrap_or(0..0);
    format!(
        "@@ -{} +{} @@",
        range_spec(old.start, old.len()),
        range_spec(new.start, new.len())
    )
}

/// Unified-diff range: 1-based start, count omitted when it is 1.
fn range_spec(start_zero_based: usize, count: usize) -> String {
    let start = if count == 0 {
        start_zero_based
    } else {
        start_zero_based + 1
    };
    if count == 1 {
        format!("{start}")
    } else {
        format!("{start},{count}")
    }
}

/// Join diff lines back into parseable text.
pub fn to_text(lines: &[String]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Print diff lines, optionally colorized in the usual scheme: bold file
/// headers, cyan hunk headers, green additions, red removals.
pub fn print_diff(out: &mut impl Write, lines: &[String], use_color: bool) -> std::io::Result<()> {
    for line in lines {
        if !use_color {
            writeln!(out, "{line}")?;
            continue;
        }
        let styled = if line.starts_with("--- ") || line.starts_with("+++ ") {
            line.bold().to_string()
        } else if line.starts_with("@@ ") {
            line.cyan().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else {
            line.clone()
        };
        writeln!(out, "{styled}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_patch_set;
    use std::path::PathBuf;

    #[test]
    fn identical_content_produces_no_diff() {
        let lines = make_diff(Path::new("a.c"), "same\n", "same\n");
        assert!(lines.is_empty());
    }

    #[test]
    fn single_line_reformat_produces_one_hunk() {
        let lines = make_diff(
            Path::new("a.c"),
            "int main(){return 0;}\n",
            "int main() { return 0; }\n",
        );
        assert_eq!(
            lines,
            vec![
                "--- a.c\t(original)".to_string(),
                "+++ a.c\t(reformatted)".to_string(),
                "@@ -1 +1 @@".to_string(),
                "-int main(){return 0;}".to_string(),
                "+int main() { return 0; }".to_string(),
            ]
        );
    }

    #[test]
    fn hunks_carry_three_lines_of_context() {
        let original: String = (1..=9).map(|i| format!("l{i}\n")).collect();
        let reformatted = original.replace("l5\n", "L5\n");
        let lines = make_diff(Path::new("f.c"), &original, &reformatted);
        assert_eq!(lines[2], "@@ -2,7 +2,7 @@");
        assert_eq!(
            &lines[3..],
            &[
                " l2", " l3", " l4", "-l5", "+L5", " l6", " l7", " l8",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn generated_diff_reparses_to_identical_structure() {
        let original: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let reformatted = original
            .replace("line 2\n", "LINE 2\n")
            .replace("line 20\n", "LINE 20\n");
        let lines = make_diff(Path::new("f.c"), &original, &reformatted);
        let set = parse_patch_set(&to_text(&lines)).unwrap();

        assert_eq!(set.len(), 1);
        let patch = &set.patches[0];
        assert_eq!(patch.source_filename, PathBuf::from("f.c"));
        assert_eq!(patch.hunks.len(), 2);
        for hunk in &patch.hunks {
            assert_eq!(hunk.source_lines_seen(), hunk.source_line_count);
            assert_eq!(hunk.target_lines_seen(), hunk.target_line_count);
        }
        // Reserializing the parsed set preserves hunk boundaries.
        assert_eq!(patch.hunks[0].source_line_start, 1);
        assert_eq!(patch.hunks[1].source_line_start, 17);
    }

    #[test]
    fn missing_final_newlines_are_marked() {
        let lines = make_diff(Path::new("a.c"), "int x=1;", "int x = 1;");
        assert_eq!(
            &lines[3..],
            &[
                "-int x=1;",
                "\\ No newline at end of file",
                "+int x = 1;",
                "\\ No newline at end of file",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn range_spec_matches_unified_conventions() {
        assert_eq!(range_spec(0, 1), "1");
        assert_eq!(range_spec(4, 3), "5,3");
        assert_eq!(range_spec(7, 0), "7");
    }
}
