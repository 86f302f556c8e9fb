//! Error types for Keel

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keel error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Missing or contradictory caller-supplied configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// A required host capability is absent
    #[error("Environment error: {message}")]
    Environment {
        /// Error message
        message: String,
    },

    /// Malformed path or option value
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Filesystem traversal or read failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path the operation was acting on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Document (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build an environment error
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build an I/O error naming the offending path
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this is an I/O error whose cause is `kind`
    #[must_use]
    pub fn is_io_kind(&self, kind: std::io::ErrorKind) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == kind)
    }
}

/// Result type alias for Keel operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = Error::io(
            "/sys/fs/cgroup/foo/cgroup.procs",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );

        assert!(err.to_string().contains("/sys/fs/cgroup/foo/cgroup.procs"));
        assert!(err.is_io_kind(std::io::ErrorKind::NotFound));
        assert!(!err.is_io_kind(std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_constructors() {
        assert!(matches!(
            Error::configuration("x"),
            Error::Configuration { .. }
        ));
        assert!(matches!(Error::environment("x"), Error::Environment { .. }));
        assert!(matches!(Error::validation("x"), Error::Validation { .. }));
    }
}
