//! Harness configuration populated once from the process environment.
//!
//! [`HarnessConfig`] collects every test-run tunable (subject binary override,
//! debug logging, default timeouts, instrumentation wrapping) in one place.
//! It is read at startup with [`HarnessConfig::from_env`] and then passed by
//! reference to the launcher, sessions, and runners. Nothing deeper in the
//! stack reads environment variables on its own.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::TetherError;

/// Terminal type exported to the child when neither the caller nor the parent
/// environment provides one.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Files whose presence marks a directory as the project root.
pub const PROJECT_MARKERS: [&str; 2] = ["Cargo.lock", ".git"];

/// Explicit path to the subject binary.
pub const ENV_BINARY: &str = "TETHER_BINARY";
/// Enables debug logging of captured output.
pub const ENV_DEBUG: &str = "TETHER_DEBUG";
/// Default timeout for pattern waits, in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "TETHER_TIMEOUT_MS";
/// Upper bound for one-shot runs without stdin, in milliseconds.
pub const ENV_RUN_TIMEOUT_MS: &str = "TETHER_RUN_TIMEOUT_MS";
/// Enables the instrumentation agent wrapper.
pub const ENV_AGENT: &str = "TETHER_AGENT";
/// `merge` or `overwrite`.
pub const ENV_AGENT_MODE: &str = "TETHER_AGENT_MODE";
/// Output directory for the instrumentation artifact.
pub const ENV_AGENT_DIR: &str = "TETHER_AGENT_DIR";
/// Program that hosts the instrumentation agent.
pub const ENV_AGENT_LAUNCHER: &str = "TETHER_AGENT_LAUNCHER";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_AGENT_DIR: &str = "target/native-image-agent";
const DEFAULT_AGENT_LAUNCHER: &str = "java";

/// How the instrumentation agent combines its output with an existing artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Merge newly recorded behavior into the existing artifact.
    #[default]
    Merge,
    /// Replace the existing artifact.
    Overwrite,
}

impl AgentMode {
    /// The agent option key selecting this mode's output directory handling.
    pub fn dir_option(self) -> &'static str {
        match self {
            AgentMode::Merge => "config-merge-dir",
            AgentMode::Overwrite => "config-output-dir",
        }
    }
}

impl FromStr for AgentMode {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(AgentMode::Merge),
            "overwrite" => Ok(AgentMode::Overwrite),
            other => Err(TetherError::ConfigError(format!(
                "{ENV_AGENT_MODE} must be 'merge' or 'overwrite', got {other:?}"
            ))),
        }
    }
}

/// Settings for re-wrapping the subject invocation with an instrumentation agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// Program that hosts the agent (e.g. `java`).
    pub launcher: String,
    /// Arguments placed between the agent option and the subject binary.
    pub launcher_args: Vec<String>,
    /// Directory receiving the recorded artifact. Relative paths resolve
    /// against the launch working directory.
    pub output_dir: PathBuf,
    /// Merge into or overwrite the existing artifact.
    pub mode: AgentMode,
}

impl InstrumentationConfig {
    /// The agent option prefixed to the invocation, pointing at `output_dir`.
    pub fn agent_option(&self, output_dir: &Path) -> String {
        format!(
            "-agentlib:native-image-agent={}={}",
            self.mode.dir_option(),
            output_dir.display()
        )
    }
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            launcher: DEFAULT_AGENT_LAUNCHER.to_string(),
            launcher_args: vec!["-jar".to_string()],
            output_dir: PathBuf::from(DEFAULT_AGENT_DIR),
            mode: AgentMode::default(),
        }
    }
}

/// Test-run tunables for the harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Explicit subject binary (from `TETHER_BINARY`).
    pub binary: Option<PathBuf>,
    /// Log every captured chunk at debug level.
    pub debug: bool,
    /// Timeout used by waits that are not given an explicit one.
    pub default_timeout: Duration,
    /// Upper bound for a one-shot run without stdin.
    pub run_timeout: Duration,
    /// How long `close` waits for a natural exit before escalating.
    pub close_timeout: Duration,
    /// Interval between buffer polls while waiting.
    pub poll_interval: Duration,
    /// Terminal type guaranteed in the child environment.
    pub term: String,
    /// Instrumentation wrapper, present only when opted in.
    pub instrumentation: Option<InstrumentationConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            binary: None,
            debug: false,
            default_timeout: DEFAULT_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            term: DEFAULT_TERM.to_string(),
            instrumentation: None,
        }
    }
}

impl HarnessConfig {
    /// Read the configuration from the current process environment.
    pub fn from_env() -> Result<Self, TetherError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset. Malformed booleans, numbers, or
    /// agent modes are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TetherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.binary = get(ENV_BINARY).map(PathBuf::from);
        if let Some(raw) = get(ENV_DEBUG) {
            config.debug = parse_bool(ENV_DEBUG, &raw)?;
        }
        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            config.default_timeout = parse_millis(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_RUN_TIMEOUT_MS) {
            config.run_timeout = parse_millis(ENV_RUN_TIMEOUT_MS, &raw)?;
        }

        let agent_enabled = match get(ENV_AGENT) {
            Some(raw) => parse_bool(ENV_AGENT, &raw)?,
            None => false,
        };
        if agent_enabled {
            let mut agent = InstrumentationConfig::default();
            if let Some(raw) = get(ENV_AGENT_MODE) {
                agent.mode = raw.parse()?;
            }
            if let Some(dir) = get(ENV_AGENT_DIR) {
                agent.output_dir = PathBuf::from(dir);
            }
            if let Some(launcher) = get(ENV_AGENT_LAUNCHER) {
                agent.launcher = launcher;
            }
            config.instrumentation = Some(agent);
        } else if let Some(raw) = get(ENV_AGENT_MODE) {
            // Validated even while the agent is off.
            raw.parse::<AgentMode>()?;
        }

        Ok(config)
    }

    /// Locate the subject binary.
    ///
    /// An explicit override must name an existing file. Otherwise the binary
    /// is expected at `default_relative` under the project root discovered
    /// from `start_dir`.
    pub fn resolve_binary(
        &self,
        default_relative: &Path,
        start_dir: &Path,
    ) -> Result<PathBuf, TetherError> {
        if let Some(explicit) = &self.binary {
            if explicit.is_file() {
                return Ok(explicit.clone());
            }
            return Err(TetherError::ConfigError(format!(
                "{ENV_BINARY} points at {} which is not an existing file",
                explicit.display()
            )));
        }

        let root = project_root(start_dir).ok_or_else(|| {
            TetherError::ConfigError(format!(
                "no project root ({}) found above {}",
                PROJECT_MARKERS.join(" or "),
                start_dir.display()
            ))
        })?;
        let candidate = root.join(default_relative);
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(TetherError::ConfigError(format!(
                "subject binary not found at {}",
                candidate.display()
            )))
        }
    }
}

/// Find the nearest ancestor of `start` (inclusive) containing a project marker.
pub fn project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, TetherError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(TetherError::ConfigError(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, TetherError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| TetherError::ConfigError(format!("{key} must be milliseconds: {e}")))
}
