//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// diagpost -- diagnostic log and snapshot ingestion.
///
/// Use `diagpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "diagpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the diagpost.toml configuration file.
    #[arg(short, long, default_value = "diagpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest one log upload (gzip or plain text).
    Log(LogArgs),

    /// Ingest newline-delimited log records from stdin.
    Stream(StreamArgs),

    /// Store one snapshot envelope (JSON).
    Snapshot(SnapshotArgs),

    /// Inspect or reload the log filter configuration.
    Filter(FilterArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- log ----

/// Ingest one log upload.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Upload body file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Client IP recorded with the upload.
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,
}

// ---- stream ----

/// Ingest stdin line by line with hot reload active.
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Client IP recorded with every record.
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,
}

// ---- snapshot ----

/// Store one snapshot envelope.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Envelope JSON file, or `-` for stdin.
    pub envelope: PathBuf,
}

// ---- filter ----

/// Inspect or reload the log filter configuration.
#[derive(Args, Debug)]
pub struct FilterArgs {
    #[command(subcommand)]
    pub action: FilterAction,
}

#[derive(Subcommand, Debug)]
pub enum FilterAction {
    /// Show counters and loaded rules.
    Stats,
    /// Re-read the filter configuration file.
    Reload,
}

// ---- config ----

/// Manage diagpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, storage, filter, escalation).
        #[arg(long)]
        section: Option<String>,
    },
}
