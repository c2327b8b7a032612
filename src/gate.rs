//! Review gate: show the aggregated patch, obtain a decision, apply safely.
//!
//! The decision itself sits behind [`DecisionPolicy`] so the same flow
//! serves an interactive terminal (hook or standalone review) and
//! non-interactive callers that supply a fixed policy.

use crate::apply::ApplyError;
use crate::exit::ExitStatus;
use crate::parse::{parse_patch_set, ParseError};
use crate::vcs::{ChangeProvider, VcsError};
use colored::Colorize;
use std::io::{self, BufRead, BufReader, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Apply the patch (and, in hook mode, re-stage and continue).
    Apply,
    /// Leave the files as they are.
    Ignore,
    /// Abort the surrounding operation. Only offered in hook mode.
    Cancel,
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("failed to read decision: {0}")]
    Io(#[from] io::Error),
}

/// How a decision is obtained. Implementations may block (a terminal
/// prompt) or answer immediately (a fixed CI policy).
pub trait DecisionPolicy {
    fn decide(&mut self) -> io::Result<Decision>;
}

/// Always answers with the same decision. For CI and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub Decision);

impl DecisionPolicy for FixedPolicy {
    fn decide(&mut self) -> io::Result<Decision> {
        Ok(self.0)
    }
}

/// Interactive prompt with no retry limit: unrecognized input re-prompts.
pub struct TerminalPrompt {
    allow_cancel: bool,
    input: Box<dyn BufRead>,
}

impl TerminalPrompt {
    /// Hook mode: offers Apply / Ignore / Cancel. Reads from the controlling
    /// terminal when possible, since git hooks run with stdin redirected.
    pub fn hook() -> Self {
        #[cfg(unix)]
        if let Ok(tty) = std::fs::File::open("/dev/tty") {
            return Self::from_reader(BufReader::new(tty), true);
        }
        Self::from_reader(BufReader::new(io::stdin()), true)
    }

    /// Standalone review: offers Apply / Ignore only.
    pub fn standalone() -> Self {
        Self::from_reader(BufReader::new(io::stdin()), false)
    }

    /// Prompt fed from an arbitrary reader.
    pub fn from_reader(input: impl BufRead + 'static, allow_cancel: bool) -> Self {
        Self {
            allow_cancel,
            input: Box::new(input),
        }
    }

    fn options(&self) -> &'static str {
        if self.allow_cancel {
            "[a/i/c]"
        } else {
            "[a/i]"
        }
    }

    fn print_menu(&self) {
        if self.allow_cancel {
            println!(
                "\nThe staged content is not formatted correctly.\n\
                 The patch shown above can be applied automatically to fix the formatting.\n\
                 You can:\n\
                 [a]: Apply the patch and continue the commit\n\
                 [i]: Ignore the patch and commit anyway ({})\n\
                 [c]: Cancel the commit\n\
                 What would you like to do? [a/i/c]",
                "NOT RECOMMENDED!".red().bold()
            );
        } else {
            println!(
                "\nThe modified content is not formatted correctly.\n\
                 The patch shown above can be applied automatically to fix the formatting.\n\
                 You can:\n\
                 [a]: Apply the patch\n\
                 [i]: Ignore the patch\n\
                 What would you like to do? [a/i]"
            );
        }
    }
}

impl DecisionPolicy for TerminalPrompt {
    fn decide(&mut self) -> io::Result<Decision> {
        self.print_menu();
        loop {
            io::stdout().flush()?;
            let mut response = String::new();
            if self.input.read_line(&mut response)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before a decision was made",
                ));
            }
            match response.trim().to_lowercase().as_str() {
                "a" => return Ok(Decision::Apply),
                "i" => return Ok(Decision::Ignore),
                "c" if self.allow_cancel => return Ok(Decision::Cancel),
                _ => println!("Unknown response. Options are {}", self.options()),
            }
        }
    }
}

/// Drive the gate over the two aggregated diffs.
///
/// `new_file_diff` covers newly introduced files (formatted whole);
/// `modified_diff` covers modified files (formatted over changed ranges
/// only). An empty aggregate succeeds silently without consulting the
/// policy. Apply patches new files first, then modified files, and
/// re-stages through `restager` when one is supplied.
pub fn review(
    new_file_diff: &[String],
    modified_diff: &[String],
    policy: &mut dyn DecisionPolicy,
    restager: Option<&dyn ChangeProvider>,
) -> Result<ExitStatus, GateError> {
    if new_file_diff.is_empty() && modified_diff.is_empty() {
        return Ok(ExitStatus::Success);
    }

    match policy.decide()? {
        Decision::Apply => {
            parse_patch_set(&crate::diff::to_text(new_file_diff))?.apply()?;
            parse_patch_set(&crate::diff::to_text(modified_diff))?.apply()?;
            if let Some(restager) = restager {
                restager.restage()?;
            }
            Ok(ExitStatus::Success)
        }
        Decision::Ignore => Ok(ExitStatus::Success),
        Decision::Cancel => Ok(ExitStatus::Trouble),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::make_diff;
    use std::fs;
    use tempfile::TempDir;

    /// Fails the test if the gate consults it.
    struct MustNotDecide;

    impl DecisionPolicy for MustNotDecide {
        fn decide(&mut self) -> io::Result<Decision> {
            panic!("policy consulted for an empty aggregate");
        }
    }

    #[test]
    fn unrecognized_responses_reprompt_until_a_valid_one() {
        let mut prompt = TerminalPrompt::from_reader(io::Cursor::new("x\nwhat\na\n"), false);
        assert_eq!(prompt.decide().unwrap(), Decision::Apply);
    }

    #[test]
    fn cancel_is_rejected_outside_hook_mode() {
        let mut prompt = TerminalPrompt::from_reader(io::Cursor::new("c\ni\n"), false);
        assert_eq!(prompt.decide().unwrap(), Decision::Ignore);
    }

    #[test]
    fn cancel_is_accepted_in_hook_mode() {
        let mut prompt = TerminalPrompt::from_reader(io::Cursor::new("c\n"), true);
        assert_eq!(prompt.decide().unwrap(), Decision::Cancel);
    }

    #[test]
    fn input_closing_before_a_decision_is_an_error() {
        let mut prompt = TerminalPrompt::from_reader(io::Cursor::new("nope\n"), true);
        let err = prompt.decide().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn empty_aggregate_succeeds_without_prompting() {
        let status = review(&[], &[], &mut MustNotDecide, None).unwrap();
        assert_eq!(status, ExitStatus::Success);
    }

    #[test]
    fn apply_rewrites_new_files_then_modified_files() {
        let dir = TempDir::new().unwrap();
        let new_file = dir.path().join("new.c");
        let modified = dir.path().join("mod.c");
        fs::write(&new_file, "int x=1;\n").unwrap();
        fs::write(&modified, "int y=2;\n").unwrap();

        let new_diff = make_diff(&new_file, "int x=1;\n", "int x = 1;\n");
        let mod_diff = make_diff(&modified, "int y=2;\n", "int y = 2;\n");

        let status = review(
            &new_diff,
            &mod_diff,
            &mut FixedPolicy(Decision::Apply),
            None,
        )
        .unwrap();

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fs::read_to_string(&new_file).unwrap(), "int x = 1;\n");
        assert_eq!(fs::read_to_string(&modified).unwrap(), "int y = 2;\n");
    }

    #[test]
    fn ignore_leaves_files_untouched() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.c");
        fs::write(&file, "int x=1;\n").unwrap();
        let diff = make_diff(&file, "int x=1;\n", "int x = 1;\n");

        let status = review(&diff, &[], &mut FixedPolicy(Decision::Ignore), None).unwrap();

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fs::read_to_string(&file).unwrap(), "int x=1;\n");
    }

    #[test]
    fn cancel_aborts_with_trouble() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.c");
        fs::write(&file, "int x=1;\n").unwrap();
        let diff = make_diff(&file, "int x=1;\n", "int x = 1;\n");

        let status = review(&diff, &[], &mut FixedPolicy(Decision::Cancel), None).unwrap();

        assert_eq!(status, ExitStatus::Trouble);
        assert_eq!(fs::read_to_string(&file).unwrap(), "int x=1;\n");
    }
}
