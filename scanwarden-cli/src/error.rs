//! CLI-specific error types and exit code mapping

use scanwarden_core::error::{ConfigError, ScanwardenError};
use scanwarden_engine::ScanEngineError;

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

    /// The scan ran but did not produce a usable result.
    #[error("scan failed: {0}")]
    Scan(String),

    /// The user interrupted a running scan.
    #[error("scan interrupted")]
    Interrupted,

    /// Logging or metrics setup failed.
    #[error("initialization failed: {0}")]
    Init(#[from] anyhow::Error),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from scanwarden-core.
    #[error("{0}")]
    Core(#[from] ScanwardenError),

    /// Wrapped scan engine error.
    #[error("{0}")]
    Engine(#[from] ScanEngineError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration or request error   |
    /// | 4    | Scan failed or produced no result |
    /// | 10   | IO error                         |
    /// | 130  | Interrupted (Ctrl-C)             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(ScanwardenError::Config(_)) => 2,
            Self::Engine(e) if e.is_config() => 2,
            Self::Scan(_) => 4,
            Self::Io(_) | Self::Core(ScanwardenError::Io(_)) => 10,
            Self::Interrupted => 130,
            Self::Command(_)
            | Self::Init(_)
            | Self::JsonSerialize(_)
            | Self::Core(_)
            | Self::Engine(_) => 1,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
