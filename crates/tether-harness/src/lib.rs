//! Drive a command-line executable as an opaque subprocess.
//!
//! This crate spawns the subject (optionally inside a pseudo-terminal), feeds
//! it input over time, captures stdout and stderr incrementally on background
//! threads, waits for expected text with bounded timeouts, and produces a
//! final [`RunResult`] once the process is gone.
//!
//! # Overview
//!
//! - [`Session`]: interactive, stateful handle on a live subject
//! - [`Runner`]: one-shot runs with an optional stdin payload
//! - [`Expect`]: builder-style API for waiting, sending keys, and asserting
//! - [`Key`]: terminal key encoding (arrows, ctrl, escape, etc.)
//! - [`RunResult`]: captured stdout, stderr, and exit code
//! - [`ScreenSnapshot`]: captured stdout rendered through a terminal emulator
//! - [`HarnessError`]: timeout, usage, and launch errors
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tether_harness::{HarnessConfig, Runner};
//!
//! let config = HarnessConfig::from_env()?;
//! let runner = Runner::new("/usr/local/bin/subject", &config);
//! let mut session = runner.spawn(["hello", "--who", "X"])?;
//! session.read_until("weather", Duration::from_secs(3))?;
//! session.arrow_down()?;
//! session.enter()?;
//! let result = session.close(Duration::from_secs(2))?;
//! assert_eq!(result.exit_code(), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod expect;
pub mod key;
pub mod logging;
pub mod result;
pub mod runner;
pub mod screen;
pub mod session;

pub use error::{HarnessError, StreamKind};
pub use expect::Expect;
pub use key::Key;
pub use result::RunResult;
pub use runner::Runner;
pub use screen::ScreenSnapshot;
pub use session::Session;
pub use tether_pilot::{LaunchMode, LaunchSpec};
pub use tether_types::HarnessConfig;
