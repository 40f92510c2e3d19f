//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tether_harness::logging::init_logging;
use tether_harness::{HarnessConfig, Runner};

/// Generous bound for waits on the demo binary.
pub const WAIT: Duration = Duration::from_secs(5);

/// Harness configuration from the environment, pointed at the demo binary.
pub fn demo_config() -> HarnessConfig {
    let mut config = HarnessConfig::from_env().expect("TETHER_* variables should be valid");
    config.binary = Some(demo_binary());
    init_logging(&config);
    config
}

/// Path of the `tether-demo` binary Cargo built for these tests.
pub fn demo_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tether-demo"))
}

/// A runner for the demo binary, resolved the way a real test suite would.
pub fn demo_runner() -> Runner {
    Runner::from_config(
        &demo_config(),
        "target/debug/tether-demo",
        env!("CARGO_MANIFEST_DIR"),
    )
    .expect("demo binary should resolve")
}
