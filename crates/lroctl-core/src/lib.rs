//! # lroctl-core
//!
//! Tracking engine for long-running operations on resource-management
//! control planes. A mutating request (PUT, PATCH, POST or DELETE) that
//! cannot finish synchronously is answered with a status code and headers
//! telling the client where, and how long, to keep asking. This crate turns
//! that protocol into a single [`OperationHandle`] that can be polled step
//! by step, waited on, serialized to resume elsewhere, and finally asked for
//! the finished resource.
//!
//! ## Crate Structure
//!
//! ```text
//! lroctl-core/
//! ├── src/
//! │   ├── lib.rs
//! │   ├── operation.rs      # OperationHandle: submit, poll, wait, result
//! │   ├── tracker/          # per-verb polling state machine
//! │   ├── service_error.rs  # service error documents
//! │   ├── http.rs           # Request, Response and the Sender seam
//! │   ├── client.rs         # reqwest-backed Sender
//! │   ├── backoff.rs        # delays, deadlines and cancellation
//! │   ├── progress.rs       # wait-loop progress events
//! │   ├── config/           # TOML configuration
//! │   └── error.rs          # LroError
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use lroctl_core::{Config, OperationHandle, ReqwestSender};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::load()?;
//! let sender = ReqwestSender::from_config(&config.http)?;
//! let cancel = CancellationToken::new();
//!
//! let mut op = OperationHandle::from_response(initial_response)?;
//! op.wait_for_completion(&sender, &config.polling, &cancel, None).await?;
//! let resource = op.get_result(&sender, &cancel).await?;
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod operation;
pub mod progress;
pub mod service_error;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use client::ReqwestSender;
pub use config::{Config, HttpConfig, PollingConfig};
pub use error::{CancelCause, LroError, Result};
pub use http::{Request, Response, Sender, TransportError};
pub use operation::OperationHandle;
pub use progress::{ProgressCallback, ProgressEvent};
pub use service_error::ServiceError;
pub use tracker::{OperationState, PollingMethod, PollingTracker, TrackerState, Verb};
