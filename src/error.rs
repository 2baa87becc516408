//! Error types shared by every control-plane component

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the control plane.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Out-of-range number, malformed enum or wrong matrix shape
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown object, link, block or band
    #[error("not found: {0}")]
    NotFound(String),

    /// A module's parameter layout could not be determined
    #[error("module unavailable: {0}")]
    ProbeFailure(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted file exists but is not valid JSON for its format
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The live graph rejected or failed a command
    #[error("graph backend error: {0}")]
    Backend(String),

    /// Serialization failure outside of file handling
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ControlError>;

/// Coarse error classes an API layer maps to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unavailable,
    Persistence,
    Backend,
}

impl ErrorKind {
    /// HTTP status code for this class
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Unavailable => 503,
            ErrorKind::Persistence => 500,
            ErrorKind::Backend => 502,
        }
    }
}

impl ControlError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ControlError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ControlError::NotFound(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        ControlError::Backend(msg.into())
    }

    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ControlError::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ControlError::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ControlError::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ControlError::Parse {
            path: path.into(),
            source,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::Validation(_) => ErrorKind::Validation,
            ControlError::NotFound(_) => ErrorKind::NotFound,
            ControlError::ProbeFailure(_) => ErrorKind::Unavailable,
            ControlError::ReadFile { .. }
            | ControlError::WriteFile { .. }
            | ControlError::CreateDir { .. }
            | ControlError::Parse { .. }
            | ControlError::Json(_) => ErrorKind::Persistence,
            ControlError::Backend(_) => ErrorKind::Backend,
        }
    }

    /// True for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "mock")
    }

    #[test]
    fn test_kind_and_status() {
        assert_eq!(ControlError::validation("x").kind().http_status(), 400);
        assert_eq!(ControlError::not_found("x").kind().http_status(), 404);
        assert_eq!(
            ControlError::ProbeFailure("x".into()).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            ControlError::write_file("/a", mock_io_err()).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(ControlError::backend("x").kind().http_status(), 502);
    }

    #[test]
    fn test_client_errors() {
        assert!(ControlError::validation("bad").is_client_error());
        assert!(ControlError::not_found("gone").is_client_error());
        assert!(!ControlError::backend("down").is_client_error());
    }

    #[test]
    fn test_display_includes_path() {
        let err = ControlError::write_file("/state/settings.json", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to write file"), "got: {msg}");
        assert!(msg.contains("/state/settings.json"), "got: {msg}");
        assert!(err.source().is_some());
    }
}
