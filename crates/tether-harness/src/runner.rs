//! One-shot runs of the subject.
//!
//! A [`Runner`] holds everything needed to start the subject (binary path,
//! working directory, environment overrides, and the harness configuration)
//! and runs it to completion, optionally feeding a stdin payload first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use tether_pilot::{LaunchMode, LaunchSpec};
use tether_types::HarnessConfig;

use crate::error::HarnessError;
use crate::result::RunResult;
use crate::session::Session;

/// Starts the subject binary in one-shot or interactive form.
#[derive(Debug, Clone)]
pub struct Runner {
    binary: PathBuf,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    config: HarnessConfig,
}

impl Runner {
    /// A runner for `binary`.
    pub fn new(binary: impl Into<PathBuf>, config: &HarnessConfig) -> Self {
        Self {
            binary: binary.into(),
            working_dir: None,
            env: Vec::new(),
            config: config.clone(),
        }
    }

    /// A runner for the binary selected by `config`.
    ///
    /// Uses the configured override when present, otherwise
    /// `default_relative` under the project root found from `start_dir`.
    pub fn from_config(
        config: &HarnessConfig,
        default_relative: impl AsRef<Path>,
        start_dir: impl AsRef<Path>,
    ) -> Result<Self, HarnessError> {
        let binary = config.resolve_binary(default_relative.as_ref(), start_dir.as_ref())?;
        debug!(binary = %binary.display(), "resolved subject binary");
        Ok(Self::new(binary, config))
    }

    /// Run the subject in `dir`.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment override for the subject.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run with no input and wait for the subject to exit.
    ///
    /// stdin is closed right away. The wait is bounded by the configured run
    /// timeout; a subject still running after it is killed and reports `-1`
    /// or its signal code.
    pub fn run<I, S>(&self, args: I) -> Result<RunResult, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.spec(args, LaunchMode::Piped);
        info!(binary = %self.binary.display(), args = ?spec.args, "running subject");
        let mut session = Session::start(&spec, &self.config)?;
        session.close(self.config.run_timeout)
    }

    /// Run with `stdin` written to the subject's terminal.
    ///
    /// An empty payload behaves exactly like [`run`](Self::run). Otherwise the
    /// subject runs in a pseudo-terminal, the payload is written without
    /// closing input, and the subject gets up to `timeout` to exit before it
    /// is killed. A subject that exits before taking its input still yields
    /// a result.
    pub fn run_with_stdin<I, S>(
        &self,
        stdin: &str,
        timeout: Duration,
        args: I,
    ) -> Result<RunResult, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if stdin.is_empty() {
            return self.run(args);
        }
        let spec = self.spec(args, LaunchMode::Pty);
        info!(
            binary = %self.binary.display(),
            args = ?spec.args,
            stdin_bytes = stdin.len(),
            "running subject with input"
        );
        let mut session = Session::start(&spec, &self.config)?;
        if let Err(e) = session.write(stdin) {
            // The terminal can report EIO just before the exit status is
            // visible.
            if !session.wait_for_exit(self.config.poll_interval) {
                return Err(e);
            }
            debug!(error = %e, "subject exited before its input was written");
        }
        Ok(session.finish(timeout))
    }

    /// Start an interactive session in a pseudo-terminal.
    pub fn spawn<I, S>(&self, args: I) -> Result<Session, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.spec(args, LaunchMode::Pty);
        info!(binary = %self.binary.display(), args = ?spec.args, "spawning interactive subject");
        Session::start(&spec, &self.config)
    }

    fn spec<I, S>(&self, args: I, mode: LaunchMode) -> LaunchSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = LaunchSpec::new(&self.binary, args)
            .with_config(&self.config)
            .mode(mode);
        spec.working_dir = self.working_dir.clone();
        spec.env = self.env.clone();
        spec
    }
}
