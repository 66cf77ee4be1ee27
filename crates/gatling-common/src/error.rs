//! Error types for the Gatling operator
//!
//! Errors carry the resource they relate to so a log line alone is enough
//! to locate the failing object.

use thiserror::Error;

/// Main error type for Gatling operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// An object is missing something the request needs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the offending object
        resource: String,
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Create a validation error for a named resource
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation errors need a spec change. Kubernetes 4xx errors are not
    /// retried except for 409, which only means another writer got there
    /// first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
            ),
            Error::Validation { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    // ==========================================================================
    // Story Tests: How errors steer the reconcile loop
    // ==========================================================================

    /// Story: A stale status write is retried on the next reconcile
    #[test]
    fn story_conflict_is_retried() {
        assert!(api_error(409).is_retryable());
    }

    /// Story: Forbidden or missing objects are not retried blindly
    #[test]
    fn story_client_errors_are_not_retried() {
        assert!(!api_error(404).is_retryable());
        assert!(!api_error(403).is_retryable());
    }

    /// Story: API server hiccups are retried
    #[test]
    fn story_server_errors_are_retryable() {
        assert!(api_error(500).is_retryable());
        assert!(api_error(503).is_retryable());
    }

    /// Story: Bad configuration surfaces with the resource name
    #[test]
    fn story_validation_names_the_resource() {
        let err = Error::validation_for("load-test-1-runner", "object has no namespace");
        assert!(err.to_string().contains("load-test-1-runner"));
        assert!(err.to_string().contains("namespace"));
        assert!(!err.is_retryable());
    }
}
