//! Caller-facing handle for one long-running operation
//!
//! An [`OperationHandle`] starts either from a request that has not been
//! sent yet or from the initial response the caller already holds. Once the
//! first response is known it owns exactly one [`PollingTracker`] for the
//! rest of its life.
//!
//! # Example
//!
//! ```rust,ignore
//! use lroctl_core::{Config, OperationHandle, ReqwestSender, Request};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::load()?;
//! let sender = ReqwestSender::from_config(&config.http)?;
//! let mut op = OperationHandle::new(Request::new(Method::PUT, scale_set_url).with_json(&body)?);
//!
//! op.wait_for_completion(&sender, &config.polling, &CancellationToken::new(), None).await?;
//! let scale_set = op.get_result(&sender, &CancellationToken::new()).await?;
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::{self, CancelScope, Deadline};
use crate::config::PollingConfig;
use crate::error::{LroError, Result};
use crate::http::{Request, Response, Sender};
use crate::progress::{ProgressCallback, ProgressEvent, emit};
use crate::service_error::ServiceError;
use crate::tracker::{PollingMethod, PollingTracker, TrackerState, Verb};

#[derive(Debug)]
enum Phase {
    /// Submission not yet executed
    Pending(Request),
    /// First response known
    Tracking(PollingTracker),
}

/// Tracks one mutating request from submission to a terminal outcome
///
/// Mutating methods take `&mut self`, so a handle is driven by one caller at
/// a time. Independent handles share nothing.
#[derive(Debug)]
pub struct OperationHandle {
    phase: Phase,
}

impl OperationHandle {
    /// A handle for a request that will be sent on the first poll
    pub fn new(request: Request) -> Self {
        Self {
            phase: Phase::Pending(request),
        }
    }

    /// A handle for an operation whose initial response is already known
    ///
    /// A failing initial response is reported as
    /// [`LroError::ServiceFailure`].
    pub fn from_response(response: Response) -> Result<Self> {
        let tracker = PollingTracker::from_response(response)?;
        if let Some(err) = tracker.polling_error() {
            return Err(err);
        }
        Ok(Self {
            phase: Phase::Tracking(tracker),
        })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, Phase::Tracking(_))
    }

    pub fn tracker(&self) -> Option<&PollingTracker> {
        match &self.phase {
            Phase::Tracking(t) => Some(t),
            Phase::Pending(_) => None,
        }
    }

    /// Current lifecycle state, empty before submission
    pub fn status(&self) -> &str {
        self.tracker().map(PollingTracker::status).unwrap_or_default()
    }

    pub fn method(&self) -> Option<Verb> {
        match &self.phase {
            Phase::Tracking(t) => Some(t.method()),
            Phase::Pending(r) => Verb::from_method(&r.method),
        }
    }

    pub fn polling_method(&self) -> PollingMethod {
        self.tracker()
            .map(PollingTracker::polling_method)
            .unwrap_or_default()
    }

    pub fn polling_url(&self) -> Option<&str> {
        self.tracker()
            .map(PollingTracker::polling_uri)
            .filter(|s| !s.is_empty())
    }

    pub fn result_url(&self) -> Option<&str> {
        self.tracker()
            .map(PollingTracker::result_uri)
            .filter(|s| !s.is_empty())
    }

    /// The most recent response received for this operation
    pub fn response(&self) -> Option<&Response> {
        self.tracker().and_then(PollingTracker::latest_response)
    }

    pub fn service_error(&self) -> Option<&ServiceError> {
        self.tracker().and_then(PollingTracker::service_error)
    }

    /// The service's `Retry-After` hint on the latest response
    pub fn polling_delay(&self) -> Option<Duration> {
        self.response().and_then(Response::retry_after)
    }

    pub fn is_terminated(&self) -> bool {
        self.tracker().is_some_and(PollingTracker::has_terminated)
    }

    pub fn has_failed(&self) -> bool {
        self.tracker().is_some_and(PollingTracker::has_failed)
    }

    pub fn has_succeeded(&self) -> bool {
        self.tracker().is_some_and(PollingTracker::has_succeeded)
    }

    /// Send the pending request and start tracking it
    ///
    /// Does nothing once the handle is resolved. A transport failure or a
    /// protocol violation in the initial response leaves the request pending;
    /// re-submitting is the caller's decision.
    pub async fn submit(&mut self, sender: &dyn Sender, cancel: &CancellationToken) -> Result<()> {
        self.submit_in(sender, &CancelScope::new(cancel, None)).await
    }

    async fn submit_in(&mut self, sender: &dyn Sender, scope: &CancelScope<'_>) -> Result<()> {
        let request = match &self.phase {
            Phase::Pending(request) => request.clone(),
            Phase::Tracking(_) => return Ok(()),
        };
        if Verb::from_method(&request.method).is_none() {
            return Err(LroError::UnsupportedMethod(request.method.to_string()));
        }

        debug!(method = %request.method, url = %request.url, "submitting request");
        let response = scope
            .guard(sender.send(request))
            .await
            .map_err(LroError::Cancelled)?
            .map_err(LroError::Submission)?;

        let tracker = PollingTracker::from_response(response)?;
        let failure = tracker.polling_error();
        debug!(
            state = tracker.status(),
            polling_method = %tracker.polling_method(),
            "tracking operation"
        );
        self.phase = Phase::Tracking(tracker);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Perform one polling step
    ///
    /// Returns `Ok(true)` once the operation succeeded and `Ok(false)` while
    /// it is still running. An error with [`is_terminated`](Self::is_terminated)
    /// set is the terminal failure; any other error is a failed polling
    /// attempt the caller may retry. Terminal handles answer without a
    /// network call.
    pub async fn poll(&mut self, sender: &dyn Sender, cancel: &CancellationToken) -> Result<bool> {
        self.poll_in(sender, &CancelScope::new(cancel, None)).await
    }

    async fn poll_in(&mut self, sender: &dyn Sender, scope: &CancelScope<'_>) -> Result<bool> {
        if !self.is_resolved() {
            self.submit_in(sender, scope).await?;
        }
        let Phase::Tracking(tracker) = &mut self.phase else {
            return Err(LroError::NotSubmitted);
        };

        if !tracker.has_terminated() {
            tracker.poll_for_status(sender, scope).await?;
            tracker.check_for_errors()?;
            let applicable = tracker.provisioning_state_applicable();
            tracker.update_polling_state(applicable)?;
            tracker.refresh_polling_uri()?;

            if tracker.has_terminated() {
                info!(
                    method = %tracker.method(),
                    state = tracker.status(),
                    "operation reached terminal state"
                );
            } else {
                debug!(state = tracker.status(), "operation in progress");
            }
        }

        match tracker.polling_error() {
            Some(err) => Err(err),
            None => Ok(tracker.has_terminated()),
        }
    }

    /// Poll until the operation terminates
    ///
    /// Sleeps for the service's `Retry-After` hint (or the configured
    /// polling delay) between successful polls. Transient failures back off
    /// and count against `retry_attempts`; protocol violations, terminal
    /// failures and cancellation return immediately. The configured polling
    /// timeout bounds the whole loop.
    pub async fn wait_for_completion(
        &mut self,
        sender: &dyn Sender,
        config: &PollingConfig,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let start = Instant::now();
        let deadline = config.polling_timeout().map(Deadline::after);
        let scope = CancelScope::new(cancel, deadline);

        let result = self
            .wait_in(sender, config, &scope, &on_progress, start)
            .await;
        if let Err(err) = &result {
            emit(
                &on_progress,
                ProgressEvent::Failed {
                    error: err.to_string(),
                },
            );
        }
        result
    }

    async fn wait_in(
        &mut self,
        sender: &dyn Sender,
        config: &PollingConfig,
        scope: &CancelScope<'_>,
        on_progress: &Option<ProgressCallback>,
        start: Instant,
    ) -> Result<()> {
        if !self.is_resolved() {
            self.submit_in(sender, scope).await?;
        }
        if !self.is_terminated()
            && let Some(delay) = self.polling_delay()
        {
            debug!(?delay, "initial polling delay");
            scope.sleep(delay).await.map_err(LroError::Cancelled)?;
        }

        let mut attempts: u32 = 0;
        loop {
            let delay = match self.poll_in(sender, scope).await {
                Ok(true) => {
                    emit(
                        on_progress,
                        ProgressEvent::Completed {
                            status: self.status().to_string(),
                            elapsed: start.elapsed(),
                        },
                    );
                    return Ok(());
                }
                Ok(false) => {
                    emit(
                        on_progress,
                        ProgressEvent::Polling {
                            url: self.polling_url().unwrap_or_default().to_string(),
                            status: self.status().to_string(),
                            elapsed: start.elapsed(),
                        },
                    );
                    let delay = backoff::polling_delay(self.response(), config);
                    if self.polling_delay().is_some() {
                        debug!(?delay, "using Retry-After polling delay");
                    }
                    delay
                }
                Err(err) if self.is_terminated() || !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempts >= config.retry_attempts {
                        return Err(LroError::RetriesExhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }
                    let delay = backoff::retry_delay(config, attempts);
                    attempts += 1;
                    warn!(attempt = attempts, ?delay, error = %err, "polling failed, retrying");
                    emit(
                        on_progress,
                        ProgressEvent::Retrying {
                            attempt: attempts,
                            delay,
                            error: err.to_string(),
                        },
                    );
                    delay
                }
            };

            scope.sleep(delay).await.map_err(LroError::Cancelled)?;
        }
    }

    /// Fetch the finished resource
    ///
    /// GETs the result URL when one is known. Otherwise the latest polling
    /// response is the result, but only for a succeeded operation.
    pub async fn get_result(
        &self,
        sender: &dyn Sender,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let tracker = self.tracker().ok_or(LroError::NotSubmitted)?;

        if tracker.result_uri().is_empty() {
            return match tracker.latest_response() {
                Some(response) if tracker.has_succeeded() => Ok(response.clone()),
                _ => Err(LroError::MissingResult),
            };
        }

        let url = Url::parse(tracker.result_uri()).map_err(|e| {
            LroError::protocol(format!("invalid result URL '{}': {e}", tracker.result_uri()))
        })?;
        CancelScope::new(cancel, None)
            .guard(sender.send(Request::get(url)))
            .await
            .map_err(LroError::Cancelled)?
            .map_err(LroError::Network)
    }
}

impl Serialize for OperationHandle {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.phase {
            Phase::Tracking(tracker) => tracker.state().serialize(serializer),
            Phase::Pending(_) => Err(<S::Error as serde::ser::Error>::custom(
                "cannot serialize an operation that has not been submitted",
            )),
        }
    }
}

#[derive(Deserialize)]
struct VerbProbe {
    method: Option<String>,
}

impl<'de> Deserialize<'de> for OperationHandle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let document = Value::deserialize(deserializer)?;

        let probe = VerbProbe::deserialize(&document).map_err(D::Error::custom)?;
        let method = probe
            .method
            .ok_or_else(|| D::Error::custom("missing 'method' property"))?;
        let verb: Verb = method.parse().map_err(D::Error::custom)?;

        let mut state = TrackerState::deserialize(&document).map_err(D::Error::custom)?;
        state.method = verb;

        Ok(Self {
            phase: Phase::Tracking(PollingTracker::resume(state)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSender, response};
    use reqwest::Method;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const RESOURCE: &str = "https://management.example.com/scaleSets/pool-a";
    const OPERATION: &str = "https://management.example.com/operations/op-1";
    const MONITOR: &str = "https://management.example.com/monitors/m-1";

    fn request(method: Method) -> Request {
        Request::new(method, Url::parse(RESOURCE).unwrap())
    }

    fn initial(method: Method, status: u16) -> Response {
        let mut resp = response(status);
        resp.request_method = method;
        resp.request_url = Url::parse(RESOURCE).unwrap();
        resp
    }

    fn fast_config(retry_attempts: u32) -> PollingConfig {
        PollingConfig {
            polling_delay_ms: 1_000,
            polling_timeout_secs: 0,
            retry_attempts,
            retry_delay_ms: 500,
            max_retry_delay_ms: 2_000,
        }
    }

    fn delete_handle() -> OperationHandle {
        OperationHandle::from_response(initial(Method::DELETE, 202).with_header("Location", MONITOR))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_lifecycle_with_async_operation() {
        let sender = ScriptedSender::new()
            .reply(
                response(201)
                    .with_header("Azure-AsyncOperation", OPERATION)
                    .with_json(&json!({"properties": {"provisioningState": "Creating"}})),
            )
            .reply(response(200).with_json(&json!({"status": "InProgress"})))
            .reply(response(200).with_json(&json!({"status": "Succeeded"})))
            .reply(response(200).with_json(&json!({"name": "pool-a"})));
        let cancel = CancellationToken::new();
        let mut op = OperationHandle::new(request(Method::PUT));

        assert!(!op.poll(&sender, &cancel).await.unwrap());
        assert_eq!(op.polling_method(), PollingMethod::AsyncOperation);
        assert_eq!(op.status(), "InProgress");
        assert!(op.poll(&sender, &cancel).await.unwrap());
        assert!(op.has_succeeded());

        let result = op.get_result(&sender, &cancel).await.unwrap();
        assert_eq!(result.body_text(), r#"{"name":"pool-a"}"#);

        let urls: Vec<String> = sender.requests().iter().map(|r| r.url.to_string()).collect();
        assert_eq!(urls, vec![RESOURCE, OPERATION, OPERATION, RESOURCE]);
        assert_eq!(sender.requests()[0].method, Method::PUT);
    }

    #[tokio::test]
    async fn test_poll_on_terminal_handle_is_idempotent() {
        let sender = ScriptedSender::new().reply(response(200).with_json(&json!({
            "properties": {"provisioningState": "Failed"},
            "error": {"code": "ScaleSetBusy", "message": "another operation is running"}
        })));
        let cancel = CancellationToken::new();
        let mut op = delete_handle();

        for _ in 0..3 {
            let err = op.poll(&sender, &cancel).await.unwrap_err();
            assert!(op.is_terminated());
            assert_eq!(err.service_error().unwrap().code, "ScaleSetBusy");
        }
        assert_eq!(sender.request_count(), 1);

        let sender = ScriptedSender::new();
        let mut op = OperationHandle::from_response(initial(Method::POST, 204)).unwrap();
        assert!(op.poll(&sender, &cancel).await.unwrap());
        assert!(op.poll(&sender, &cancel).await.unwrap());
        assert_eq!(sender.request_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_error_is_not_terminal() {
        let sender = ScriptedSender::new().fail("connection reset by peer");
        let cancel = CancellationToken::new();
        let mut op = delete_handle();

        let err = op.poll(&sender, &cancel).await.unwrap_err();
        assert!(matches!(err, LroError::Network(_)));
        assert!(!op.is_terminated());
        assert_eq!(op.status(), "InProgress");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_within_budget() {
        let sender = ScriptedSender::new()
            .fail("connection reset by peer")
            .reply(response(200));
        let mut op = delete_handle();

        op.wait_for_completion(&sender, &fast_config(1), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(op.has_succeeded());
        assert_eq!(sender.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_with_zero_budget_exhausts_immediately() {
        let sender = ScriptedSender::new()
            .fail("connection reset by peer")
            .reply(response(200));
        let mut op = delete_handle();

        let err = op
            .wait_for_completion(&sender, &fast_config(0), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LroError::RetriesExhausted { attempts: 0, .. }));
        assert_eq!(sender.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_polling() {
        let sender = ScriptedSender::new()
            .reply(response(202))
            .reply(response(200));
        let mut op = delete_handle();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = op
            .wait_for_completion(&sender, &fast_config(3), &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LroError::Cancelled(crate::error::CancelCause::Cancelled)
        ));
        assert_eq!(sender.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_timeout_yields_deadline_cancellation() {
        let mut sender = ScriptedSender::new();
        for _ in 0..10 {
            sender = sender.reply(response(202));
        }
        let mut op = delete_handle();
        let config = PollingConfig {
            polling_timeout_secs: 3,
            ..fast_config(3)
        };

        let err = op
            .wait_for_completion(&sender, &config, &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LroError::Cancelled(crate::error::CancelCause::DeadlineExceeded(d)) if d == Duration::from_secs(3)
        ));
        assert!(!op.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_is_not_retried() {
        let sender = ScriptedSender::new()
            .reply(response(200).with_json(&json!({"name": "op-1"})))
            .reply(response(200).with_json(&json!({"status": "Succeeded"})));
        let mut op = OperationHandle::from_response(
            initial(Method::POST, 202).with_header("Azure-AsyncOperation", OPERATION),
        )
        .unwrap();

        let err = op
            .wait_for_completion(&sender, &fast_config(5), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(sender.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_retried() {
        let sender = ScriptedSender::new()
            .reply(response(503).with_json(&json!({"error": {"code": "ServerBusy", "message": "later"}})))
            .reply(response(204));
        let mut op = delete_handle();

        op.wait_for_completion(&sender, &fast_config(2), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(op.has_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_terminal_failure() {
        let sender = ScriptedSender::new()
            .reply(response(200).with_json(&json!({"status": "InProgress"})))
            .reply(response(200).with_json(&json!({
                "status": "Canceled",
                "error": {"code": "OperationCanceled", "message": "superseded"}
            })));
        let mut op = OperationHandle::from_response(
            initial(Method::PATCH, 202).with_header("Azure-AsyncOperation", OPERATION),
        )
        .unwrap();

        let err = op
            .wait_for_completion(&sender, &fast_config(3), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_service_failure());
        assert!(op.has_failed());
        assert_eq!(op.service_error().unwrap().code, "OperationCanceled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_retry_after_is_honoured() {
        let sender = ScriptedSender::new().reply(response(200));
        let mut op = OperationHandle::from_response(
            initial(Method::DELETE, 202)
                .with_header("Location", MONITOR)
                .with_header("Retry-After", "20"),
        )
        .unwrap();

        let start = tokio::time::Instant::now();
        op.wait_for_completion(&sender, &fast_config(0), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let sender = ScriptedSender::new()
            .fail("timeout")
            .reply(response(202))
            .reply(response(200));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ProgressCallback = Box::new(move |event| sink.lock().unwrap().push(event));
        let mut op = delete_handle();

        op.wait_for_completion(&sender, &fast_config(3), &CancellationToken::new(), Some(callback))
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ProgressEvent::Retrying { attempt: 1, .. }));
        assert!(matches!(&events[1], ProgressEvent::Polling { url, .. } if url == MONITOR));
        assert!(matches!(&events[2], ProgressEvent::Completed { status, .. } if status == "Succeeded"));
    }

    #[tokio::test]
    async fn test_submission_failure_leaves_request_pending() {
        let sender = ScriptedSender::new().fail("connection refused");
        let mut op = OperationHandle::new(request(Method::POST));

        let err = op
            .wait_for_completion(&sender, &fast_config(3), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LroError::Submission(_)));
        assert!(!op.is_resolved());
        assert_eq!(sender.request_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_method_makes_no_call() {
        let sender = ScriptedSender::new();
        let mut op = OperationHandle::new(request(Method::GET));

        let err = op.submit(&sender, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LroError::UnsupportedMethod(_)));
        assert_eq!(sender.request_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_submission_status_resolves_to_terminal() {
        let sender = ScriptedSender::new().reply(
            response(409).with_json(&json!({"error": {"code": "Conflict", "message": "exists"}})),
        );
        let mut op = OperationHandle::new(request(Method::PUT));

        let err = op.submit(&sender, &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_service_failure());
        assert!(op.is_resolved());
        assert!(op.has_failed());
    }

    #[tokio::test]
    async fn test_get_result_without_result_url() {
        let cancel = CancellationToken::new();
        let sender = ScriptedSender::new();

        let op = OperationHandle::from_response(
            initial(Method::POST, 200).with_json(&json!({"restarted": 3})),
        )
        .unwrap();
        let result = op.get_result(&sender, &cancel).await.unwrap();
        assert_eq!(result.body_text(), r#"{"restarted":3}"#);

        let op = OperationHandle::from_response(
            initial(Method::POST, 202).with_header("Azure-AsyncOperation", OPERATION),
        )
        .unwrap();
        let err = op.get_result(&sender, &cancel).await.unwrap_err();
        assert!(matches!(err, LroError::MissingResult));
        assert_eq!(sender.request_count(), 0);
    }

    #[test]
    fn test_round_trip_for_every_verb() {
        let cases = [
            (Method::PUT, initial(Method::PUT, 201).with_header("Location", MONITOR)),
            (
                Method::PATCH,
                initial(Method::PATCH, 202).with_header("Azure-AsyncOperation", OPERATION),
            ),
            (
                Method::POST,
                initial(Method::POST, 202)
                    .with_header("Azure-AsyncOperation", OPERATION)
                    .with_header("Location", MONITOR),
            ),
            (Method::DELETE, initial(Method::DELETE, 202).with_header("Location", MONITOR)),
        ];

        for (method, resp) in cases {
            let op = OperationHandle::from_response(resp).unwrap();
            let encoded = serde_json::to_string(&op).unwrap();
            let decoded: OperationHandle = serde_json::from_str(&encoded).unwrap();

            let before = op.tracker().unwrap().state();
            let after = decoded.tracker().unwrap().state();
            assert_eq!(before, after, "{method}");
            assert_eq!(decoded.method(), Verb::from_method(&method));
        }
    }

    #[test]
    fn test_encoded_shape() {
        let op = OperationHandle::from_response(
            initial(Method::POST, 202)
                .with_header("Azure-AsyncOperation", OPERATION)
                .with_header("Location", MONITOR),
        )
        .unwrap();

        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(
            encoded,
            json!({
                "method": "POST",
                "pollingMethod": "AsyncOperation",
                "pollingURI": OPERATION,
                "lroState": "InProgress",
                "resultURI": MONITOR
            })
        );
    }

    #[test]
    fn test_decode_reads_method_by_name_not_position() {
        let document = json!({
            "lroState": "Failed",
            "error": {"code": "Failed", "message": "boom"},
            "pollingURI": MONITOR,
            "pollingMethod": "Location",
            "resultURI": "",
            "method": "delete"
        });
        let op: OperationHandle = serde_json::from_value(document).unwrap();

        assert_eq!(op.method(), Some(Verb::Delete));
        assert!(op.has_failed());
        assert_eq!(op.service_error().unwrap().message, "boom");
    }

    #[tokio::test]
    async fn test_decoded_failure_without_error_is_not_success() {
        let document = json!({
            "method": "PUT",
            "pollingMethod": "RequestURI",
            "pollingURI": RESOURCE,
            "lroState": "Failed",
            "resultURI": RESOURCE
        });
        let mut op: OperationHandle = serde_json::from_value(document).unwrap();
        let sender = ScriptedSender::new();

        let err = op.poll(&sender, &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_service_failure());
        assert_eq!(err.service_error().unwrap().code, "Failed");

        let err = op
            .wait_for_completion(&sender, &fast_config(3), &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_service_failure());
        assert_eq!(sender.request_count(), 0);

        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(encoded["error"]["code"], "Failed");
        let decoded: OperationHandle = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.tracker().unwrap().state(), op.tracker().unwrap().state());
    }

    #[test]
    fn test_decode_rejects_missing_or_unsupported_method() {
        let err = serde_json::from_value::<OperationHandle>(json!({"lroState": "InProgress"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing 'method'"));

        let err = serde_json::from_value::<OperationHandle>(
            json!({"method": "GET", "lroState": "InProgress"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported method"));
    }

    #[test]
    fn test_unresolved_handle_cannot_be_serialized() {
        let op = OperationHandle::new(request(Method::PUT));
        assert!(serde_json::to_string(&op).is_err());
    }

    #[tokio::test]
    async fn test_resumed_handle_continues_polling() {
        let document = json!({
            "method": "PUT",
            "pollingMethod": "AsyncOperation",
            "pollingURI": OPERATION,
            "lroState": "InProgress",
            "resultURI": RESOURCE
        });
        let mut op: OperationHandle = serde_json::from_value(document).unwrap();
        let sender = ScriptedSender::new()
            .reply(response(200).with_json(&json!({"status": "Succeeded"})));

        assert!(op.poll(&sender, &CancellationToken::new()).await.unwrap());
        assert_eq!(sender.requests()[0].url.as_str(), OPERATION);
        assert_eq!(op.result_url(), Some(RESOURCE));
    }
}
