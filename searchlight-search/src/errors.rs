//! Error types for locating files.

use searchlight_core::ServeError;
use thiserror::Error;

/// Errors that can occur while asking backends for matching paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocatorError {
    /// A single backend could not answer the query.
    #[error("{backend} failed: {reason}")]
    BackendFailed {
        /// Name of the backend that failed
        backend: String,
        /// Why it failed
        reason: String,
    },

    /// The locator was built without any backends.
    #[error("No search backends configured")]
    NoBackends,

    /// Every backend was tried and each one failed.
    #[error("All search backends failed: {}", .failures.join("; "))]
    AllBackendsFailed {
        /// One message per backend, in the order they were tried
        failures: Vec<String>,
    },
}

impl LocatorError {
    /// Shorthand for a [`LocatorError::BackendFailed`].
    pub fn backend(backend: &str, reason: impl Into<String>) -> Self {
        LocatorError::BackendFailed {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<LocatorError> for ServeError {
    fn from(err: LocatorError) -> Self {
        ServeError::Upstream {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use searchlight_core::ErrorKind;

    use super::*;

    #[test]
    fn test_all_failed_lists_each_backend() {
        let err = LocatorError::AllBackendsFailed {
            failures: vec![
                "command failed: exit status 1".to_string(),
                "walk failed: no roots".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("command failed"));
        assert!(message.contains("walk failed"));
    }

    #[test]
    fn test_converts_to_upstream() {
        let err: ServeError = LocatorError::NoBackends.into();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }
}
