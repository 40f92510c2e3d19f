//! The final outcome of a subject run.

use std::fmt;

use tether_pilot::ansi::strip_ansi;

use crate::error::HarnessError;

/// Captured stdout, stderr, and exit code of a finished subject.
///
/// An exit code of 0 means success. A process killed by a signal reports
/// `-signum`, and `-1` means no status could be obtained at all. A non-zero
/// code is data for the caller to assert on, never a harness error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl RunResult {
    /// Assemble a result.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Everything the subject wrote to stdout, unmodified.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Everything the subject wrote to stderr, unmodified.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Whether the subject exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout with ANSI sequences removed.
    pub fn stdout_stripped(&self) -> String {
        strip_ansi(&self.stdout)
    }

    /// stderr with ANSI sequences removed.
    pub fn stderr_stripped(&self) -> String {
        strip_ansi(&self.stderr)
    }

    /// Fail unless the exit code is 0.
    pub fn assert_success(&self) -> Result<&Self, HarnessError> {
        if self.success() {
            return Ok(self);
        }
        Err(HarnessError::AssertionFailed {
            message: format!("expected exit code 0, got {}", self.exit_code),
            captured: self.to_string(),
        })
    }

    /// Fail unless the ANSI-stripped stdout contains `needle`.
    pub fn assert_stdout_contains(&self, needle: &str) -> Result<&Self, HarnessError> {
        if self.stdout_stripped().contains(needle) {
            return Ok(self);
        }
        Err(HarnessError::AssertionFailed {
            message: format!("expected stdout to contain {needle:?}"),
            captured: self.stdout.clone(),
        })
    }

    /// Fail unless the ANSI-stripped stderr contains `needle`.
    pub fn assert_stderr_contains(&self, needle: &str) -> Result<&Self, HarnessError> {
        if self.stderr_stripped().contains(needle) {
            return Ok(self);
        }
        Err(HarnessError::AssertionFailed {
            message: format!("expected stderr to contain {needle:?}"),
            captured: self.stderr.clone(),
        })
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "exit code: {}", self.exit_code)?;
        writeln!(f, "--- stdout ---\n{}", self.stdout)?;
        write!(f, "--- stderr ---\n{}", self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_exit_code_zero() {
        assert!(RunResult::new("", "", 0).success());
        assert!(!RunResult::new("", "", 1).success());
        assert!(!RunResult::new("", "", -1).success());
    }

    #[test]
    fn stripped_views_leave_raw_output_alone() {
        let result = RunResult::new("\x1b[32mgreen\x1b[0m", "\x1b[31mred\x1b[0m", 0);
        assert_eq!(result.stdout_stripped(), "green");
        assert_eq!(result.stderr_stripped(), "red");
        assert_eq!(result.stdout(), "\x1b[32mgreen\x1b[0m");
    }

    #[test]
    fn assertions_pass_and_chain() {
        let result = RunResult::new("\x1b[1mHello, Alice!\x1b[0m", "warn: x", 0);
        result
            .assert_success()
            .and_then(|r| r.assert_stdout_contains("Hello, Alice!"))
            .and_then(|r| r.assert_stderr_contains("warn"))
            .expect("assertions should pass");
    }

    #[test]
    fn failed_assertion_carries_output() {
        let result = RunResult::new("actual output", "", 2);
        match result.assert_success() {
            Err(HarnessError::AssertionFailed { message, captured }) => {
                assert!(message.contains("got 2"));
                assert!(captured.contains("actual output"));
            }
            other => panic!("expected AssertionFailed, got {other:?}"),
        }
        assert!(result.assert_stdout_contains("missing").is_err());
    }

    #[test]
    fn display_shows_both_streams() {
        let text = RunResult::new("out", "err", 3).to_string();
        assert!(text.contains("exit code: 3"));
        assert!(text.contains("--- stdout ---\nout"));
        assert!(text.contains("--- stderr ---\nerr"));
    }
}
