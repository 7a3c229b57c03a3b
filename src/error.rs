//! Configuration error types for kicad-mcp.
//!
//! Errors raised by the KiCad client itself live in [`crate::kicad::error`];
//! this module only covers configuration loading, which happens before any
//! backend exists.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid backend".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid backend"));
    }
}
