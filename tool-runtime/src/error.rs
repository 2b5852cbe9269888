//! Error types for tool execution and registration.

use std::time::Duration;

use thiserror::Error;

/// Boxed underlying cause of an execution failure.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Code for generic handler failures.
pub const EXECUTION_FAILED: &str = "execution_failed";
/// Code for runtime faults such as handler panics.
pub const INTERNAL_ERROR: &str = "internal_error";
/// Code for handlers that overran their deadline.
pub const TIMEOUT: &str = "timeout";

/// Errors returned by tool handlers and the execution pipeline.
///
/// Only [`ToolError::Validation`] messages and sanitized
/// [`ToolError::Execution`] messages ever reach the caller; causes and
/// unclassified errors are logged and replaced with a generic message.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input failed binding, limits or constraint checks.
    #[error("validation failed for field '{field}': {message}")]
    Validation {
        /// Offending field path.
        field: String,
        /// Caller-facing explanation.
        message: String,
    },
    /// The handler or runtime failed.
    #[error("{message}")]
    Execution {
        /// Stable failure code.
        code: String,
        /// Caller-facing explanation.
        message: String,
        /// Underlying error, never shown to the caller.
        #[source]
        cause: Option<BoxedCause>,
    },
    /// Any other error.
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ToolError {
    /// Creates a validation error for `field`.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an execution error with code `execution_failed`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(EXECUTION_FAILED, message)
    }

    /// Creates an execution error with code `internal_error`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Creates an execution error with code `timeout`.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TIMEOUT,
            format!("tool execution timed out after {}ms", after.as_millis()),
        )
    }

    /// Creates an execution error with a custom code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            code: code.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches an underlying cause to an execution error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_cause(self, source: impl Into<BoxedCause>) -> Self {
        match self {
            Self::Execution { code, message, .. } => Self::Execution {
                code,
                message,
                cause: Some(source.into()),
            },
            other => other,
        }
    }

    /// Stable code of an execution error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Execution { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Field path of a validation error.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether this error is a validation failure.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this error reports a deadline overrun.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code() == Some(TIMEOUT)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Unclassified(err.into())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unclassified(err.into())
    }
}

/// Errors raised while registering tools.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool `{name}` already registered")]
    DuplicateTool {
        /// Conflicting name.
        name: String,
    },
    /// The tool name failed validation.
    #[error(transparent)]
    InvalidName(#[from] tool_primitives::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn constructors_assign_codes() {
        assert_eq!(ToolError::failed("x").code(), Some(EXECUTION_FAILED));
        assert_eq!(ToolError::internal("x").code(), Some(INTERNAL_ERROR));
        assert_eq!(ToolError::new("quota", "x").code(), Some("quota"));
        assert!(ToolError::timeout(Duration::from_millis(50)).is_timeout());
        assert!(ToolError::invalid_input("a", "b").code().is_none());
    }

    #[test]
    fn cause_is_kept_as_source_only() {
        let io = std::io::Error::other("disk at /home/alice/db is full");
        let err = ToolError::failed("write failed").with_cause(io);
        assert_eq!(err.to_string(), "write failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn with_cause_ignores_validation_errors() {
        let err = ToolError::invalid_input("name", "required").with_cause("boom");
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn foreign_errors_are_unclassified() {
        let err: ToolError = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert!(matches!(err, ToolError::Unclassified(_)));
        let err: ToolError = std::io::Error::other("x").into();
        assert!(matches!(err, ToolError::Unclassified(_)));
    }
}
