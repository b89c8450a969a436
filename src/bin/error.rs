//! CLI Error types and handling
//!
//! This module defines error types specific to CLI operations.

use std::fmt;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    UnknownCommand(String),
    NoCommand,
    ConfigurationError(String),
    NetworkError(String),
    IoError(String),
    ParseError { field: String, message: String },
    ClusterError(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::UnknownCommand(cmd) => {
                write!(f, "Unknown command '{}'. Use --help to see available commands", cmd)
            }
            CliError::NoCommand => {
                write!(f, "No command provided. Use --help to see available commands")
            }
            CliError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CliError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            CliError::IoError(msg) => write!(f, "IO error: {}", msg),
            CliError::ParseError { field, message } => {
                if field.is_empty() {
                    write!(f, "Parse error: {}", message)
                } else {
                    write!(f, "Parse error ({}): {}", field, message)
                }
            }
            CliError::ClusterError(msg) => write!(f, "Cluster error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError(err.to_string())
    }
}

impl From<waypoint::SearchError> for CliError {
    fn from(err: waypoint::SearchError) -> Self {
        match err {
            waypoint::SearchError::Io(msg) => CliError::IoError(msg),
            other => CliError::NetworkError(other.to_string()),
        }
    }
}

impl From<waypoint::config::ConfigError> for CliError {
    fn from(err: waypoint::config::ConfigError) -> Self {
        CliError::ConfigurationError(err.to_string())
    }
}
