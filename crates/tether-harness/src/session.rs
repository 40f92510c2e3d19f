//! Interactive sessions with a live subject.
//!
//! A [`Session`] owns a started subject and the two drainer threads that
//! capture its output. The caller's thread writes input and polls the shared
//! buffers; every wait is bounded by a timeout.
//!
//! Lifecycle: writes are accepted until stdin is closed, the process exits,
//! or the session is closed. [`Session::close`] ends input, waits for the
//! process (escalating to signals if needed), joins the drainers, and returns
//! the final [`RunResult`]. A session dropped without `close` kills its
//! process group.

use std::path::PathBuf;
use std::process::Child;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use tether_pilot::ansi::strip_ansi;
use tether_pilot::launch::LaunchedProcess;
use tether_pilot::terminate::{self, TerminateConfig, FORCED_EXIT_CODE};
use tether_pilot::{launch, Drainer, LaunchMode, LaunchSpec, ProcessInput, SyncBuffer};
use tether_types::HarnessConfig;

use crate::error::{HarnessError, StreamKind};
use crate::key::Key;
use crate::result::RunResult;
use crate::screen::ScreenSnapshot;

/// How long a drainer gets to deliver the tail of a stream once the process
/// has exited.
const DRAIN_SETTLE: Duration = Duration::from_secs(1);

/// A running subject with captured output.
pub struct Session {
    child: Child,
    input: Option<ProcessInput>,
    stdout: SyncBuffer,
    stderr: SyncBuffer,
    stdout_drainer: Drainer,
    stderr_drainer: Drainer,
    mode: LaunchMode,
    size: (u16, u16),
    exit_code: Option<i32>,
    closed: bool,
    poll_interval: Duration,
    default_timeout: Duration,
    close_timeout: Duration,
    debug: bool,
    terminate: TerminateConfig,
}

impl Session {
    /// Start the subject described by `spec` and begin capturing its output.
    pub fn start(spec: &LaunchSpec, config: &HarnessConfig) -> Result<Self, HarnessError> {
        let LaunchedProcess {
            mut child,
            input,
            stdout,
            stderr,
            mode,
        } = launch(spec)?;
        let terminate = TerminateConfig::default();

        let stdout_buf = SyncBuffer::new();
        let stderr_buf = SyncBuffer::new();
        let drainers = Drainer::spawn("stdout", stdout, stdout_buf.clone(), config.debug)
            .and_then(|out| {
                let err = Drainer::spawn("stderr", stderr, stderr_buf.clone(), config.debug)?;
                Ok((out, err))
            });
        let (stdout_drainer, stderr_drainer) = match drainers {
            Ok(pair) => pair,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "failed to start drainers, killing subject");
                terminate::force_kill(&mut child, &terminate);
                return Err(e.into());
            }
        };

        info!(
            pid = child.id(),
            program = %spec.program.display(),
            ?mode,
            "session started"
        );

        Ok(Self {
            child,
            input: Some(input),
            stdout: stdout_buf,
            stderr: stderr_buf,
            stdout_drainer,
            stderr_drainer,
            mode,
            size: (spec.rows, spec.cols),
            exit_code: None,
            closed: false,
            poll_interval: config.poll_interval,
            default_timeout: config.default_timeout,
            close_timeout: config.close_timeout,
            debug: config.debug,
            terminate,
        })
    }

    /// Start `program` with `args` inside a pseudo-terminal.
    pub fn spawn<I, S>(
        program: impl Into<PathBuf>,
        args: I,
        config: &HarnessConfig,
    ) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = LaunchSpec::new(program, args)
            .with_config(config)
            .mode(LaunchMode::Pty);
        Self::start(&spec, config)
    }

    // -- input ------------------------------------------------------------

    /// Write text to the subject's stdin.
    pub fn write(&mut self, text: &str) -> Result<(), HarnessError> {
        self.write_bytes(text.as_bytes())
    }

    /// Write raw bytes to the subject's stdin.
    ///
    /// Fails with [`HarnessError::InvalidState`] once the session is closed,
    /// stdin is closed, or the process has exited.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), HarnessError> {
        if self.closed {
            return Err(HarnessError::InvalidState("session is closed".into()));
        }
        if let Some(code) = self.poll_exit() {
            return Err(HarnessError::InvalidState(format!(
                "process has exited with code {code}"
            )));
        }
        let Some(input) = self.input.as_mut() else {
            return Err(HarnessError::InvalidState("stdin is closed".into()));
        };
        if self.debug {
            debug!(bytes = data.len(), text = %String::from_utf8_lossy(data), "writing input");
        }
        match input.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) => match self.poll_exit() {
                // The subject went away between the check and the write.
                Some(code) => Err(HarnessError::InvalidState(format!(
                    "process has exited with code {code}"
                ))),
                None => Err(e.into()),
            },
        }
    }

    /// Write `text` followed by a newline.
    pub fn write_line(&mut self, text: &str) -> Result<(), HarnessError> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.write(&line)
    }

    pub fn write_char(&mut self, c: char) -> Result<(), HarnessError> {
        self.send_key(Key::Char(c))
    }

    /// Send the bytes a terminal produces for `key`.
    pub fn send_key(&mut self, key: Key) -> Result<(), HarnessError> {
        self.write_bytes(&key.to_bytes())
    }

    pub fn enter(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Enter)
    }

    pub fn escape(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Escape)
    }

    pub fn tab(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Tab)
    }

    pub fn space(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Space)
    }

    pub fn backspace(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Backspace)
    }

    pub fn delete(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Delete)
    }

    pub fn arrow_up(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Up)
    }

    pub fn arrow_down(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Down)
    }

    pub fn arrow_left(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Left)
    }

    pub fn arrow_right(&mut self) -> Result<(), HarnessError> {
        self.send_key(Key::Right)
    }

    /// Send Ctrl + `letter`.
    pub fn ctrl(&mut self, letter: char) -> Result<(), HarnessError> {
        self.send_key(Key::Ctrl(letter))
    }

    pub fn ctrl_c(&mut self) -> Result<(), HarnessError> {
        self.ctrl('c')
    }

    pub fn ctrl_d(&mut self) -> Result<(), HarnessError> {
        self.ctrl('d')
    }

    /// Signal end of input to the subject.
    ///
    /// In PTY mode this sends the terminal EOF character. Later writes fail.
    pub fn close_stdin(&mut self) -> Result<(), HarnessError> {
        if self.closed {
            return Err(HarnessError::InvalidState("session is closed".into()));
        }
        let Some(input) = self.input.take() else {
            return Err(HarnessError::InvalidState("stdin is already closed".into()));
        };
        debug!(pid = self.child.id(), "closing stdin");
        input.close()?;
        Ok(())
    }

    // -- output -----------------------------------------------------------

    /// Everything captured on stdout so far.
    pub fn read_available(&self) -> String {
        self.stdout.snapshot_text()
    }

    /// Everything captured on stderr so far.
    pub fn read_stderr_available(&self) -> String {
        self.stderr.snapshot_text()
    }

    /// Every raw byte captured on stdout so far.
    pub fn read_available_bytes(&self) -> Vec<u8> {
        self.stdout.snapshot_bytes()
    }

    /// Wait until stdout contains `pattern`, ignoring ANSI sequences.
    ///
    /// Returns the full raw stdout capture at the time of the match. If the
    /// process exits before the pattern appears, returns the final capture
    /// without error; only a live process that stays silent past `timeout`
    /// yields [`HarnessError::Timeout`].
    pub fn read_until(&mut self, pattern: &str, timeout: Duration) -> Result<String, HarnessError> {
        self.read_until_with(pattern, timeout, true)
    }

    /// [`read_until`](Self::read_until) with explicit control over ANSI
    /// stripping before matching.
    pub fn read_until_with(
        &mut self,
        pattern: &str,
        timeout: Duration,
        ignore_ansi: bool,
    ) -> Result<String, HarnessError> {
        self.wait_for(StreamKind::Stdout, pattern, timeout, ignore_ansi, |text| {
            text.contains(pattern)
        })
    }

    /// Wait until stderr contains `pattern`, ignoring ANSI sequences.
    pub fn read_stderr_until(
        &mut self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, HarnessError> {
        self.read_stderr_until_with(pattern, timeout, true)
    }

    pub fn read_stderr_until_with(
        &mut self,
        pattern: &str,
        timeout: Duration,
        ignore_ansi: bool,
    ) -> Result<String, HarnessError> {
        self.wait_for(StreamKind::Stderr, pattern, timeout, ignore_ansi, |text| {
            text.contains(pattern)
        })
    }

    /// Wait until the ANSI-stripped stdout matches the regex `pattern`.
    pub fn read_until_regex(
        &mut self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, HarnessError> {
        let re = Regex::new(pattern)?;
        let expected = format!("pattern: {pattern}");
        self.wait_for(StreamKind::Stdout, &expected, timeout, true, |text| {
            re.is_match(text)
        })
    }

    fn wait_for<F>(
        &mut self,
        stream: StreamKind,
        expected: &str,
        timeout: Duration,
        ignore_ansi: bool,
        matches: F,
    ) -> Result<String, HarnessError>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let found = |snapshot: &str| {
            if ignore_ansi {
                matches(&strip_ansi(snapshot))
            } else {
                matches(snapshot)
            }
        };

        loop {
            let snapshot = self.buffer(stream).snapshot_text();
            if found(&snapshot) {
                return Ok(snapshot);
            }

            if self.poll_exit().is_some() {
                self.drainer(stream).wait(DRAIN_SETTLE);
                let snapshot = self.buffer(stream).snapshot_text();
                if !found(&snapshot) {
                    debug!(%stream, expected, "process exited before output appeared");
                }
                return Ok(snapshot);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HarnessError::Timeout {
                    expected: expected.to_string(),
                    stream,
                    captured: snapshot,
                });
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn buffer(&self, stream: StreamKind) -> &SyncBuffer {
        match stream {
            StreamKind::Stdout => &self.stdout,
            StreamKind::Stderr => &self.stderr,
        }
    }

    fn drainer(&self, stream: StreamKind) -> &Drainer {
        match stream {
            StreamKind::Stdout => &self.stdout_drainer,
            StreamKind::Stderr => &self.stderr_drainer,
        }
    }

    /// Render captured stdout on an emulated terminal of the session's size.
    pub fn screen(&self) -> ScreenSnapshot {
        ScreenSnapshot::render(&self.stdout.snapshot_bytes(), self.size.0, self.size.1)
    }

    // -- process state ----------------------------------------------------

    /// Whether the subject is still running.
    pub fn is_alive(&mut self) -> bool {
        !self.closed && self.poll_exit().is_none()
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit code, once the process has been observed to exit.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// The timeout configured for pattern waits.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Wait up to `timeout` for the subject to exit on its own.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        if self.poll_exit().is_some() {
            return true;
        }
        match terminate::wait_timeout(&mut self.child, timeout, self.poll_interval) {
            Some(status) => {
                self.exit_code = Some(terminate::exit_code(status));
                true
            }
            None => false,
        }
    }

    /// Record and return the exit code if the process has exited.
    fn poll_exit(&mut self) -> Option<i32> {
        if self.exit_code.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    let code = terminate::exit_code(status);
                    debug!(pid = self.child.id(), code, "subject exited");
                    self.exit_code = Some(code);
                }
                Ok(None) => {}
                Err(e) => debug!(pid = self.child.id(), error = %e, "try_wait failed"),
            }
        }
        self.exit_code
    }

    // -- shutdown ---------------------------------------------------------

    /// End the session and collect the result.
    ///
    /// Closes stdin, waits up to `wait_timeout` for the process to exit, then
    /// escalates SIGTERM to SIGKILL. The exit code is `-1` if no status
    /// could be obtained. Drainers get a bounded join; a second `close`
    /// fails with [`HarnessError::InvalidState`].
    pub fn close(&mut self, wait_timeout: Duration) -> Result<RunResult, HarnessError> {
        if self.closed {
            return Err(HarnessError::InvalidState("session is already closed".into()));
        }
        self.closed = true;
        self.release_input();

        let status = terminate::wait_timeout(&mut self.child, wait_timeout, self.poll_interval)
            .or_else(|| {
                info!(pid = self.child.id(), ?wait_timeout, "subject still running, terminating");
                terminate::terminate(&mut self.child, &self.terminate)
            });
        Ok(self.collect(status))
    }

    /// [`close`](Self::close) with the configured close timeout.
    pub fn close_default(&mut self) -> Result<RunResult, HarnessError> {
        self.close(self.close_timeout)
    }

    /// Wait for exit with input left open, kill on expiry, then close input.
    pub(crate) fn finish(mut self, timeout: Duration) -> RunResult {
        self.closed = true;
        let status = terminate::wait_timeout(&mut self.child, timeout, self.poll_interval)
            .or_else(|| {
                warn!(pid = self.child.id(), ?timeout, "subject did not exit in time, killing");
                terminate::force_kill(&mut self.child, &self.terminate)
            });
        self.release_input();
        self.collect(status)
    }

    fn release_input(&mut self) {
        if let Some(input) = self.input.take() {
            if let Err(e) = input.close() {
                debug!(pid = self.child.id(), error = %e, "closing stdin failed");
            }
        }
    }

    fn collect(&mut self, status: Option<std::process::ExitStatus>) -> RunResult {
        let code = status.map_or(FORCED_EXIT_CODE, terminate::exit_code);
        self.exit_code = Some(code);

        self.stdout_drainer.join(DRAIN_SETTLE);
        self.stderr_drainer.join(DRAIN_SETTLE);

        info!(pid = self.child.id(), code, "session closed");
        RunResult::new(
            self.stdout.snapshot_text(),
            self.stderr.snapshot_text(),
            code,
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.poll_exit().is_none() {
            debug!(pid = self.child.id(), "session dropped while running, killing subject");
            terminate::force_kill(&mut self.child, &self.terminate);
        }
    }
}
