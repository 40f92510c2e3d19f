//! Core types shared across the tether crates.
//!
//! Defines the error type raised by the process layer and the harness
//! configuration populated once from the environment.

pub mod config;
pub mod error;

pub use config::{
    AgentMode, HarnessConfig, InstrumentationConfig, DEFAULT_TERM, PROJECT_MARKERS,
};
pub use error::TetherError;
