//! diagpost CLI library.
//!
//! The binary (`main.rs`) is a thin wrapper; command handlers live here so
//! integration tests can drive them directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
