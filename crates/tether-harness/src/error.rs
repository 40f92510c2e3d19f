//! Error types for the harness crate.

use std::fmt;

/// Which output stream an operation looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Errors that can occur while driving a subject process.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The expected text did not appear while the process was still running.
    #[error("timeout waiting for {expected:?} on {stream}\nCaptured output:\n{captured}")]
    Timeout {
        /// The text or pattern that was expected.
        expected: String,
        /// The stream that was being watched.
        stream: StreamKind,
        /// Everything captured on that stream at the time of the timeout.
        captured: String,
    },
    /// An operation was attempted in a state that does not allow it, such as
    /// writing after stdin was closed or closing a session twice.
    #[error("invalid session state: {0}")]
    InvalidState(String),
    /// An output assertion failed.
    #[error("assertion failed: {message}\nCaptured output:\n{captured}")]
    AssertionFailed {
        /// Description of what was expected.
        message: String,
        /// The output the assertion ran against.
        captured: String,
    },
    /// Configuration or launch failure from the process layer.
    #[error(transparent)]
    Pilot(#[from] tether_types::TetherError),
    /// An invalid regex pattern was provided.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// Writing to the subject failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
