//! Centralized error types for mboxcontacts.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the mboxcontacts library.
///
/// Problems with a single message are not errors: they are counted as
/// [`SkipReason`](crate::parser::record::SkipReason)s and the run continues.
#[derive(Error, Debug)]
pub enum ContactsError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The contact report could not be written.
    #[error("Could not write report to '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The report could not be serialized.
    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A signature pattern failed to compile.
    #[error("Invalid {kind} pattern '{pattern}': {reason}")]
    InvalidPattern {
        kind: String,
        pattern: String,
        reason: String,
    },

    /// An external pattern table could not be parsed.
    #[error("Invalid pattern table '{path}': {reason}")]
    InvalidPatternTable { path: PathBuf, reason: String },

    /// A configuration file could not be parsed.
    #[error("Invalid configuration '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, ContactsError>`.
pub type Result<T> = std::result::Result<T, ContactsError>;

impl ContactsError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map an open/metadata error to `FileNotFound` when appropriate.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// `true` for errors raised while writing the output artifact.
    pub fn is_output_error(&self) -> bool {
        matches!(self, Self::ReportWrite { .. } | Self::Serialize(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_maps_not_found() {
        let err = ContactsError::open(
            "/no/such.mbox",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ContactsError::FileNotFound(_)));
        assert_eq!(err.to_string(), "File not found: /no/such.mbox");

        let deny = ContactsError::open(
            "deny.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(deny.to_string(), "File not found: deny.txt");
    }

    #[test]
    fn test_open_keeps_other_io_errors() {
        let err = ContactsError::open(
            "/locked.mbox",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ContactsError::Io { .. }));
        assert!(!err.is_output_error());
    }

    #[test]
    fn test_report_write_is_output_error() {
        let err = ContactsError::ReportWrite {
            path: PathBuf::from("out.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(err.is_output_error());
        assert!(err.to_string().contains("out.json"));
    }
}
