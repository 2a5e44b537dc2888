//! CLI-specific error types and exit code mapping

use diagpost_core::error::DiagpostError;
use diagpost_ingest::IngestError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Upload or envelope could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from diagpost-core.
    #[error("{0}")]
    Core(#[from] DiagpostError),

    /// Ingest domain error (persistence, transport).
    #[error("ingest error: {0}")]
    Ingest(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Input could not decode   |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(DiagpostError::Config(_)) => 2,
            Self::Decode(_) => 3,
            Self::Io(_) | Self::Core(DiagpostError::Io(_)) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Ingest(_) => 1,
        }
    }
}

impl From<IngestError> for CliError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Decode { reason } => Self::Decode(reason),
            err @ IngestError::Config { .. } => Self::Config(err.to_string()),
            IngestError::Io(io) => Self::Io(io),
            other => Self::Ingest(other.to_string()),
        }
    }
}
