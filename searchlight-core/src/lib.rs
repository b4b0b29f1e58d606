//! Searchlight Core - request-serving engine for a local file-search front end
//!
//! This crate provides the stateful and I/O-heavy building blocks behind the
//! Searchlight server: the TTL-bounded query cache, byte-range file delivery,
//! the live transcoding pipe, media classification, and configuration.

pub mod cache;
pub mod config;
pub mod media;
pub mod paths;
pub mod streaming;
pub mod tracing_setup;

use std::path::PathBuf;

// Re-export main types for convenient access
pub use cache::{CacheEntry, CacheSnapshot, QueryCache, spawn_sweeper};
pub use config::{ConfigError, SearchlightConfig};
pub use media::EntryKind;
pub use streaming::{FfmpegTranscoder, RangeContentServer, Transcoder, TranscodingPipe};

/// Broad failure categories shared by every request path.
///
/// Handlers translate each category to one fixed HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Unavailable,
    Upstream,
    Internal,
}

/// Errors surfaced while serving a search or media request.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Range header was malformed or cannot be satisfied for this file.
    #[error("Range not satisfiable: '{header}' for {file_size} bytes")]
    InvalidRange { header: String, file_size: u64 },

    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Upstream search failed: {reason}")]
    Upstream { reason: String },

    #[error("I/O error during {operation}: {source}")]
    Internal {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServeError {
    /// Returns the failure category used for status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServeError::InvalidArgument { .. } | ServeError::InvalidRange { .. } => {
                ErrorKind::InvalidArgument
            }
            ServeError::NotFound { .. } => ErrorKind::NotFound,
            ServeError::Unavailable { .. } => ErrorKind::Unavailable,
            ServeError::Upstream { .. } => ErrorKind::Upstream,
            ServeError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Maps an I/O error on `path` to `NotFound` or `Internal`.
    pub fn from_io(path: &std::path::Path, operation: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ServeError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ServeError::Internal {
                operation: format!("{operation} {}", path.display()),
                source,
            }
        }
    }

    /// Returns a short message suitable for an HTTP error body.
    pub fn user_message(&self) -> String {
        match self {
            ServeError::InvalidArgument { reason } => reason.clone(),
            ServeError::InvalidRange { .. } => "Invalid range request".to_string(),
            ServeError::NotFound { .. } => "File not found".to_string(),
            ServeError::Unavailable { reason } => reason.clone(),
            ServeError::Upstream { reason } => format!("Search failed: {reason}"),
            ServeError::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = ServeError::from_io(
            std::path::Path::new("/missing"),
            "open",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_other_io_maps_to_internal() {
        let err = ServeError::from_io(
            std::path::Path::new("/locked"),
            "open",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_invalid_range_is_an_argument_error() {
        let err = ServeError::InvalidRange {
            header: "bytes=9-1".to_string(),
            file_size: 10,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
