//! Unified error handling for lroctl-core
//!
//! Every fallible engine operation returns [`LroError`]. The helper
//! predicates let callers separate transient polling failures (which the
//! wait loop retries) from protocol violations and terminal outcomes (which
//! it never retries).
//!
//! # Example
//!
//! ```rust
//! use lroctl_core::{LroError, ServiceError};
//!
//! let err = LroError::ServiceFailure(ServiceError::new("Conflict", "scale set is busy"));
//! assert!(err.is_service_failure());
//! assert!(!err.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::http::TransportError;
use crate::service_error::ServiceError;

/// Core error type for long-running operation tracking
#[derive(Error, Debug)]
pub enum LroError {
    /// Transport failure while polling the control plane
    #[error("failed to send polling request: {0}")]
    Network(#[source] TransportError),

    /// A poll returned a status code outside the polling set while the
    /// operation was still running
    #[error("polling request returned unexpected status {status}: {error}")]
    UnexpectedStatus { status: u16, error: ServiceError },

    /// Transport failure while submitting the initial request
    #[error("failed to submit request: {0}")]
    Submission(#[source] TransportError),

    /// The control plane violated the long-running operation convention
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation reached a terminal, unsuccessful state
    #[error("operation failed: {0}")]
    ServiceFailure(ServiceError),

    /// The caller cancelled, or the polling deadline passed
    #[error("operation cancelled: {0}")]
    Cancelled(#[source] CancelCause),

    /// Transient polling failures exceeded the configured budget
    #[error("the number of retries has been exceeded ({attempts} attempts): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<LroError>,
    },

    /// The submitted request used a verb with no tracker
    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(String),

    /// No result URL is known and the operation did not succeed
    #[error("missing URL for retrieving result")]
    MissingResult,

    /// The handle has no tracker yet
    #[error("operation has not been submitted")]
    NotSubmitted,
}

/// Why a wait or network call was abandoned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// The caller's cancellation token fired
    #[error("cancellation requested")]
    Cancelled,

    /// The overall polling timeout elapsed
    #[error("polling deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, LroError>;

impl LroError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        LroError::Protocol(message.into())
    }

    /// Returns true if the wait loop may retry after this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LroError::Network(_) | LroError::UnexpectedStatus { .. }
        )
    }

    /// Returns true if this is a cancellation or deadline error
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LroError::Cancelled(_))
    }

    /// Returns true if the operation itself failed or was canceled
    #[must_use]
    pub fn is_service_failure(&self) -> bool {
        matches!(self, LroError::ServiceFailure(_))
    }

    /// Returns true if this is a protocol violation
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, LroError::Protocol(_))
    }

    /// The structured service error carried by this error, if any
    #[must_use]
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            LroError::ServiceFailure(e) | LroError::UnexpectedStatus { error: e, .. } => Some(e),
            LroError::RetriesExhausted { source, .. } => source.service_error(),
            _ => None,
        }
    }
}
