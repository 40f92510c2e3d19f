//! Building and starting the subject process.
//!
//! [`launch`] turns a [`LaunchSpec`] into a running child in one of two modes.
//! Both modes hand back the same [`LaunchedProcess`] shape (a child handle,
//! an input writer, and two output readers) so everything above this module
//! is indifferent to whether a terminal is involved.

use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info};

use tether_types::{HarnessConfig, InstrumentationConfig, TetherError, DEFAULT_TERM};

use crate::pty::PtyPair;

/// End-of-file character for a terminal in canonical mode (Ctrl-D).
const TERMINAL_EOF: u8 = 0x04;

/// How the subject's standard streams are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Anonymous pipes for stdin, stdout, and stderr.
    Piped,
    /// stdin and stdout on a pseudo-terminal; stderr on a pipe.
    Pty,
}

/// Everything needed to start the subject.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Path to the subject binary.
    pub program: PathBuf,
    /// Arguments passed to the subject.
    pub args: Vec<String>,
    /// Working directory; inherits the parent's when `None`.
    pub working_dir: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Stream wiring.
    pub mode: LaunchMode,
    /// Terminal rows in PTY mode (default: 24).
    pub rows: u16,
    /// Terminal columns in PTY mode (default: 80).
    pub cols: u16,
    /// Terminal type exported when none is present.
    pub term: String,
    /// Instrumentation wrapper around the invocation.
    pub instrumentation: Option<InstrumentationConfig>,
}

impl LaunchSpec {
    /// A spec for `program` with `args`, piped, with default settings.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            env: Vec::new(),
            mode: LaunchMode::Piped,
            rows: 24,
            cols: 80,
            term: DEFAULT_TERM.to_string(),
            instrumentation: None,
        }
    }

    /// Pick up the terminal type and instrumentation settings from `config`.
    pub fn with_config(mut self, config: &HarnessConfig) -> Self {
        self.term = config.term.clone();
        self.instrumentation = config.instrumentation.clone();
        self
    }

    /// Select the stream wiring.
    pub fn mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the subject in `dir`.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the PTY window size.
    pub fn size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// The program and arguments actually executed, after applying the
    /// instrumentation wrapper if one is configured.
    pub fn invocation(&self) -> (PathBuf, Vec<String>) {
        match &self.instrumentation {
            None => (self.program.clone(), self.args.clone()),
            Some(agent) => {
                let output_dir = self.agent_output_dir(agent);
                let mut args = Vec::with_capacity(self.args.len() + agent.launcher_args.len() + 2);
                args.push(agent.agent_option(&output_dir));
                args.extend(agent.launcher_args.iter().cloned());
                args.push(self.program.display().to_string());
                args.extend(self.args.iter().cloned());
                (PathBuf::from(&agent.launcher), args)
            }
        }
    }

    fn agent_output_dir(&self, agent: &InstrumentationConfig) -> PathBuf {
        if agent.output_dir.is_absolute() {
            return agent.output_dir.clone();
        }
        match &self.working_dir {
            Some(dir) => dir.join(&agent.output_dir),
            None => agent.output_dir.clone(),
        }
    }

    /// Whether the child would otherwise start without a usable `TERM`.
    fn term_missing(&self) -> bool {
        let effective = self
            .env
            .iter()
            .rev()
            .find(|(key, _)| key == "TERM")
            .map(|(_, value)| value.clone())
            .or_else(|| std::env::var("TERM").ok());
        effective.map_or(true, |value| value.is_empty())
    }
}

/// The write side of the subject's stdin.
pub struct ProcessInput {
    writer: Box<dyn Write + Send>,
    mode: LaunchMode,
}

impl ProcessInput {
    /// Write all of `data` and flush it through.
    pub fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Signal end of input.
    ///
    /// A terminal has no half-close, so in PTY mode the EOF character is sent
    /// before the writer is dropped; the master stays open through the reader.
    pub fn close(mut self) -> std::io::Result<()> {
        if self.mode == LaunchMode::Pty {
            self.write_all(&[TERMINAL_EOF])?;
        }
        Ok(())
    }
}

/// A started subject with its streams.
pub struct LaunchedProcess {
    /// The OS process handle.
    pub child: Child,
    /// Writer for the subject's stdin.
    pub input: ProcessInput,
    /// Reader for the subject's stdout (the PTY master in PTY mode).
    pub stdout: Box<dyn Read + Send>,
    /// Reader for the subject's stderr.
    pub stderr: Box<dyn Read + Send>,
    /// How the streams are wired.
    pub mode: LaunchMode,
}

/// Start the subject described by `spec`.
///
/// Fails with [`TetherError::ConfigError`] before spawning anything if the
/// subject binary does not exist, and with [`TetherError::LaunchError`] if the
/// OS refuses to start the process.
pub fn launch(spec: &LaunchSpec) -> Result<LaunchedProcess, TetherError> {
    if !spec.program.exists() {
        return Err(TetherError::ConfigError(format!(
            "subject binary {} does not exist",
            spec.program.display()
        )));
    }

    let (program, args) = spec.invocation();
    if let Some(agent) = &spec.instrumentation {
        let output_dir = spec.agent_output_dir(agent);
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            TetherError::ConfigError(format!(
                "cannot create instrumentation output dir {}: {e}",
                output_dir.display()
            ))
        })?;
        info!(
            launcher = %program.display(),
            output_dir = %output_dir.display(),
            mode = ?agent.mode,
            "wrapping subject with instrumentation agent"
        );
    }

    let mut command = Command::new(&program);
    command.args(&args);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    if spec.term_missing() {
        command.env("TERM", &spec.term);
    }

    let launched = match spec.mode {
        LaunchMode::Piped => spawn_piped(command, &program)?,
        LaunchMode::Pty => spawn_in_pty(command, &program, spec.rows, spec.cols)?,
    };
    debug!(
        program = %program.display(),
        ?args,
        pid = launched.child.id(),
        mode = ?spec.mode,
        "subject started"
    );
    Ok(launched)
}

fn spawn_piped(mut command: Command, program: &Path) -> Result<LaunchedProcess, TetherError> {
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    let mut child = command.spawn().map_err(|e| launch_error(program, &e))?;

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(TetherError::LaunchError(
            "piped child is missing a standard stream".into(),
        ));
    };

    Ok(LaunchedProcess {
        child,
        input: ProcessInput {
            writer: Box::new(stdin),
            mode: LaunchMode::Piped,
        },
        stdout: Box::new(stdout),
        stderr: Box::new(stderr),
        mode: LaunchMode::Piped,
    })
}

fn spawn_in_pty(
    mut command: Command,
    program: &Path,
    rows: u16,
    cols: u16,
) -> Result<LaunchedProcess, TetherError> {
    let pair = PtyPair::open(rows, cols)?;
    pair.attach(&mut command)?;
    command.stderr(Stdio::piped());
    let spawned = command.spawn();
    // The command holds duplicates of the slave; they must be closed before
    // the master can observe end-of-stream.
    drop(command);
    let mut child = spawned.map_err(|e| launch_error(program, &e))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TetherError::LaunchError("pty child is missing stderr".into()))?;
    let (reader, writer) = pair.into_master_io()?;

    Ok(LaunchedProcess {
        child,
        input: ProcessInput {
            writer: Box::new(writer),
            mode: LaunchMode::Pty,
        },
        stdout: Box::new(reader),
        stderr: Box::new(stderr),
        mode: LaunchMode::Pty,
    })
}

fn launch_error(program: &Path, e: &std::io::Error) -> TetherError {
    TetherError::LaunchError(format!("failed to start {}: {e}", program.display()))
}
