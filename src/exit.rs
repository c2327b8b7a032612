//! Process exit statuses.

use std::process::ExitCode;

/// Outcome of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Nothing left unformatted.
    Success,
    /// A diff exists and was not applied.
    Diff,
    /// Startup failure, fatal pool failure, or a cancelled commit.
    Trouble,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Diff => 1,
            ExitStatus::Trouble => 2,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Diff.code(), 1);
        assert_eq!(ExitStatus::Trouble.code(), 2);
    }
}
