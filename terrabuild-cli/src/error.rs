//! CLI error type and exit codes.

use terrabuild::config::ConfigError;
use terrabuild::emit::EmitError;
use terrabuild::BuildError;
use thiserror::Error;

/// Errors surfaced to the user by a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad configuration or configuration key.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command line input.
    #[error("{0}")]
    Usage(String),

    /// The build itself failed.
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    /// The output directory could not be prepared.
    #[error("Output error: {0}")]
    Output(#[from] EmitError),

    /// The log file could not be opened.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// `2` for input problems the user can fix on the command line, `1` for
    /// everything that went wrong while building.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) | CliError::Usage(_) | CliError::Logging(_) => 2,
            CliError::Build(_) | CliError::Output(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage("bad".into()).exit_code(), 2);
        assert_eq!(CliError::Build(BuildError::NoSources).exit_code(), 1);
    }

    #[test]
    fn test_config_error_converts() {
        let err: CliError = ConfigError::UnknownKey("dataset.colour".into()).into();
        assert!(err.to_string().contains("dataset.colour"));
    }
}
