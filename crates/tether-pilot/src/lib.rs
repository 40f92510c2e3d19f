//! Process plumbing for driving an opaque subject executable.
//!
//! Starts the subject with plain pipes or inside a pseudo-terminal, drains its
//! output streams on background threads into shared buffers, and tears the
//! process down with signal escalation.
//!
//! # Architecture
//!
//! - [`launch`]: builds the OS process for a [`launch::LaunchSpec`] in either mode
//! - [`pty`]: pseudo-terminal allocation and controlling-terminal setup
//! - [`buffer::SyncBuffer`]: lock-protected byte/text accumulator with snapshots
//! - [`drain::Drainer`]: one background reader per output stream
//! - [`ansi`]: ANSI escape sequence stripping for pattern matching
//! - [`terminate`]: SIGTERM, grace period, SIGKILL, bounded reap

pub mod ansi;
pub mod buffer;
pub mod drain;
pub mod launch;
pub mod pty;
pub mod terminate;

pub use buffer::SyncBuffer;
pub use drain::Drainer;
pub use launch::{launch, LaunchMode, LaunchSpec, LaunchedProcess, ProcessInput};
