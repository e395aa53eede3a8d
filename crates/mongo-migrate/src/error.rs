//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration and request validation errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for unreachable or rejecting endpoints.
pub const EXIT_CONNECTIVITY_ERROR: u8 = 2;
/// Exit code for a missing dump/restore executable.
pub const EXIT_TOOL_NOT_FOUND: u8 = 3;
/// Exit code for a dump/restore process that exited non-zero.
pub const EXIT_PROCESS_ERROR: u8 = 4;
/// Exit code for a missing dump artifact.
pub const EXIT_INTEGRITY_ERROR: u8 = 5;
/// Exit code for a cancelled migration.
pub const EXIT_CANCELLED: u8 = 6;
/// Exit code for filesystem errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for serialization errors.
pub const EXIT_SERIALIZATION_ERROR: u8 = 8;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed migration request, raised before anything is spawned.
    #[error("Invalid migration request: {0}")]
    Validation(String),

    /// Endpoint unreachable or authentication rejected.
    #[error("Cannot connect to {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    /// Dump or restore executable is not installed on this host.
    #[error("{tool} not found - is it installed and on PATH?")]
    ToolNotFound { tool: String },

    /// Dump or restore process exited unsuccessfully.
    #[error("{tool} failed with {}", describe_exit(.code))]
    ProcessExit { tool: String, code: Option<i32> },

    /// Expected dump output is missing after a successful dump.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl MigrateError {
    /// Create a Connectivity error for an endpoint.
    pub fn connectivity(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Connectivity {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a ProcessExit error.
    pub fn process_exit(tool: impl Into<String>, code: Option<i32>) -> Self {
        MigrateError::ProcessExit {
            tool: tool.into(),
            code,
        }
    }

    /// Process exit code to report from the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Validation(_) => EXIT_CONFIG_ERROR,
            MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Connectivity { .. } => EXIT_CONNECTIVITY_ERROR,
            MigrateError::ToolNotFound { .. } => EXIT_TOOL_NOT_FOUND,
            MigrateError::ProcessExit { .. } => EXIT_PROCESS_ERROR,
            MigrateError::Integrity(_) => EXIT_INTEGRITY_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Json(_) => EXIT_SERIALIZATION_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exit_message_carries_code() {
        let err = MigrateError::process_exit("mongorestore", Some(1));
        assert_eq!(err.to_string(), "mongorestore failed with exit code 1");
        assert_eq!(err.exit_code(), EXIT_PROCESS_ERROR);
    }

    #[test]
    fn test_process_exit_without_code() {
        let err = MigrateError::process_exit("mongodump", None);
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_exit_codes_by_kind() {
        assert_eq!(MigrateError::Validation("x".into()).exit_code(), 1);
        assert_eq!(MigrateError::connectivity("mongodb://h", "refused").exit_code(), 2);
        assert_eq!(
            MigrateError::ToolNotFound {
                tool: "mongodump".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(MigrateError::Integrity("gone".into()).exit_code(), 5);
        assert_eq!(MigrateError::Cancelled.exit_code(), 6);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), 7);
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let detailed = MigrateError::from(io).format_detailed();
        assert!(detailed.starts_with("Error: IO error: denied"));
    }
}
