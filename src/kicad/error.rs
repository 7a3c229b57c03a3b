//! Error taxonomy for KiCad client operations.
//!
//! The taxonomy is deliberately closed: four kinds, each with a stable
//! machine-readable code that callers (MCP tools, CLI commands) may match on.
//! Callers must not interpret anything beyond the kind and the message.

use thiserror::Error;

/// Result type for KiCad client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during KiCad client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Not connected, a connection attempt failed, or a helper process
    /// could not be spawned.
    #[error("{message}")]
    Connection {
        /// Human-readable description.
        message: String,
    },

    /// A time-bounded operation exceeded its limit.
    ///
    /// Reserved for protocol evolution: no current operation produces it.
    #[error("{message}")]
    Timeout {
        /// Human-readable description.
        message: String,
    },

    /// A project or board could not be located or opened.
    #[error("{message}")]
    Project {
        /// Human-readable description.
        message: String,
    },

    /// A requested action failed after a valid connection and project state:
    /// invalid parameters, external process failure, capability not
    /// implemented, or referenced entity not found.
    #[error("{message}")]
    Operation {
        /// Human-readable description.
        message: String,
    },
}

impl ClientError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a project error.
    pub fn project(message: impl Into<String>) -> Self {
        Self::Project {
            message: message.into(),
        }
    }

    /// Creates an operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }

    /// Creates an operation error marking a capability the backend does not
    /// implement yet. Callers can distinguish "not implemented" from
    /// "failed" by the message prefix.
    pub fn not_implemented(capability: &str) -> Self {
        Self::Operation {
            message: format!("{capability} not implemented by this backend"),
        }
    }

    /// Returns the stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::Project { .. } => "PROJECT_ERROR",
            Self::Operation { .. } => "OPERATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_message() {
        let err = ClientError::connection("Not connected to KiCad");
        assert_eq!(err.to_string(), "Not connected to KiCad");
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ClientError::connection("x").code(), "CONNECTION_ERROR");
        assert_eq!(ClientError::timeout("x").code(), "TIMEOUT_ERROR");
        assert_eq!(ClientError::project("x").code(), "PROJECT_ERROR");
        assert_eq!(ClientError::operation("x").code(), "OPERATION_ERROR");
    }

    #[test]
    fn not_implemented_is_operation_kind() {
        let err = ClientError::not_implemented("Auto-routing");
        assert_eq!(err.code(), "OPERATION_ERROR");
        assert!(err.to_string().contains("not implemented"));
        assert!(err.to_string().contains("Auto-routing"));
    }
}
