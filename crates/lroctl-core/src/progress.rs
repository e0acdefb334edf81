//! Progress reporting while waiting on an operation
//!
//! [`OperationHandle::wait_for_completion`](crate::OperationHandle::wait_for_completion)
//! accepts an optional callback so a CLI can drive a spinner or log lines.
//! Library consumers that don't care pass `None`.

use std::time::Duration;

/// Progress events emitted during the wait loop
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A poll succeeded and the operation is still running
    Polling {
        url: String,
        status: String,
        elapsed: Duration,
    },
    /// A transient polling failure will be retried
    Retrying {
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// The operation succeeded
    Completed { status: String, elapsed: Duration },
    /// The operation failed or the wait was abandoned
    Failed { error: String },
}

/// Callback type for progress updates
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
