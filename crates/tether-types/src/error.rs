//! Error types shared across the tether crates.

/// Errors raised while configuring or launching a subject process.
///
/// Each variant corresponds to a different stage: resolving configuration,
/// starting the OS process, or allocating the pseudo-terminal.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("launch error: {0}")]
    LaunchError(String),

    #[error("pty error: {0}")]
    PtyError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
