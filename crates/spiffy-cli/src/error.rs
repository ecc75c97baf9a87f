//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Test execution error
    #[error("Test execution failed: {message}")]
    TestExecution {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracker library error
    #[error("Tracker error: {0}")]
    Tracker(#[from] spiffy::TrackerError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Report generation error
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a test execution error
    #[must_use]
    pub fn test_execution(message: impl Into<String>) -> Self {
        Self::TestExecution {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a report generation error
    #[must_use]
    pub fn report_generation(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }

    /// Process exit code: 2 for usage and environment problems, 1 otherwise
    #[must_use]
    pub const fn exit_status(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("SPIFFY_BASE_URL is not a URL");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("SPIFFY_BASE_URL"));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn test_test_execution_error() {
        let err = CliError::test_execution("2 merchant(s) failed");
        assert!(err.to_string().contains("Test execution"));
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("unknown merchant");
        assert!(err.to_string().contains("Invalid argument"));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn test_report_generation_error() {
        let err = CliError::report_generation("disk full");
        assert!(err.to_string().contains("Report generation"));
    }

    #[test]
    fn test_from_tracker_error() {
        let err: CliError = spiffy::TrackerError::AgentMissing.into();
        assert!(err.to_string().starts_with("Tracker error:"));
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_from_io_error() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().contains("I/O error"));
    }
}
