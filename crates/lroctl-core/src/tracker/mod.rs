//! Polling trackers for in-flight operations
//!
//! A [`PollingTracker`] holds the mutable state of one long-running
//! operation: which convention is used to find its status, the URLs
//! involved, the current lifecycle state and the latest response. All four
//! verbs share the same record; the [`Verb`] tag selects the rules that
//! differ between them.

mod verb;

pub use verb::{UnsupportedVerb, Verb};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;
use url::Url;

use crate::backoff::CancelScope;
use crate::error::{LroError, Result};
use crate::http::{HEADER_ASYNC_OPERATION, HEADER_LOCATION, Request, Response, Sender};
use crate::service_error::{GENERIC_FAILURE_MESSAGE, ServiceError};

/// Which convention is used to find the operation's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PollingMethod {
    /// Dedicated operation-status resource from the async-operation header
    #[serde(rename = "AsyncOperation")]
    AsyncOperation,
    /// Resource location from the Location header
    #[serde(rename = "Location")]
    Location,
    /// The original request URL
    #[serde(rename = "RequestURI")]
    RequestUri,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl fmt::Display for PollingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollingMethod::AsyncOperation => "AsyncOperation",
            PollingMethod::Location => "Location",
            PollingMethod::RequestUri => "RequestURI",
            PollingMethod::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Lifecycle state reported by the control plane
///
/// Services may report values outside the canonical four; those are kept
/// verbatim and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationState(String);

impl OperationState {
    pub const IN_PROGRESS: &'static str = "InProgress";
    pub const SUCCEEDED: &'static str = "Succeeded";
    pub const FAILED: &'static str = "Failed";
    pub const CANCELED: &'static str = "Canceled";

    pub fn in_progress() -> Self {
        Self(Self::IN_PROGRESS.to_string())
    }

    pub fn succeeded() -> Self {
        Self(Self::SUCCEEDED.to_string())
    }

    pub fn failed() -> Self {
        Self(Self::FAILED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_succeeded(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::SUCCEEDED)
    }

    pub fn is_failed(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::FAILED) || self.0.eq_ignore_ascii_case(Self::CANCELED)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_succeeded() || self.is_failed()
    }
}

impl From<&str> for OperationState {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OperationState {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted part of a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub method: Verb,
    #[serde(rename = "pollingMethod", default)]
    pub polling_method: PollingMethod,
    #[serde(rename = "pollingURI", default)]
    pub polling_uri: String,
    #[serde(rename = "lroState")]
    pub lro_state: OperationState,
    #[serde(rename = "resultURI", default)]
    pub result_uri: String,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

impl TrackerState {
    fn new(method: Verb) -> Self {
        Self {
            method,
            polling_method: PollingMethod::Unknown,
            polling_uri: String::new(),
            lro_state: OperationState::in_progress(),
            result_uri: String::new(),
            error: None,
        }
    }
}

/// State machine for one in-flight operation
#[derive(Debug, Clone)]
pub struct PollingTracker {
    state: TrackerState,
    latest_response: Option<Response>,
    decoded_body: Map<String, Value>,
}

impl PollingTracker {
    /// Build a tracker from the response to the original mutating request
    ///
    /// A failing status yields a terminal tracker carrying the service
    /// error rather than an `Err`; errors are reserved for unsupported verbs
    /// and protocol violations.
    pub fn from_response(response: Response) -> Result<Self> {
        let verb = Verb::from_method(&response.request_method)
            .ok_or_else(|| LroError::UnsupportedMethod(response.request_method.to_string()))?;

        let mut tracker = Self {
            state: TrackerState::new(verb),
            latest_response: Some(response),
            decoded_body: Map::new(),
        };
        tracker.initialize_state()?;
        if !tracker.has_failed() {
            tracker.update_polling_method()?;
        }
        Ok(tracker)
    }

    /// Rebuild a tracker from persisted state
    ///
    /// A failed state without a stored error gets the generic failure error.
    pub fn resume(mut state: TrackerState) -> Self {
        if state.lro_state.is_failed() && state.error.is_none() {
            state.error = Some(ServiceError::new(
                state.lro_state.as_str(),
                GENERIC_FAILURE_MESSAGE,
            ));
        }
        Self {
            state,
            latest_response: None,
            decoded_body: Map::new(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn method(&self) -> Verb {
        self.state.method
    }

    pub fn polling_method(&self) -> PollingMethod {
        self.state.polling_method
    }

    pub fn polling_uri(&self) -> &str {
        &self.state.polling_uri
    }

    pub fn result_uri(&self) -> &str {
        &self.state.result_uri
    }

    pub fn status(&self) -> &str {
        self.state.lro_state.as_str()
    }

    pub fn service_error(&self) -> Option<&ServiceError> {
        self.state.error.as_ref()
    }

    pub fn latest_response(&self) -> Option<&Response> {
        self.latest_response.as_ref()
    }

    pub fn decoded_body(&self) -> &Map<String, Value> {
        &self.decoded_body
    }

    pub fn has_terminated(&self) -> bool {
        self.state.lro_state.is_terminal()
    }

    pub fn has_failed(&self) -> bool {
        self.state.lro_state.is_failed()
    }

    pub fn has_succeeded(&self) -> bool {
        self.state.lro_state.is_succeeded()
    }

    /// The terminal failure as an error, if the operation failed
    pub fn polling_error(&self) -> Option<LroError> {
        self.state.error.clone().map(LroError::ServiceFailure)
    }

    fn latest(&self) -> Result<&Response> {
        self.latest_response
            .as_ref()
            .ok_or_else(|| LroError::protocol("no response has been received for this operation"))
    }

    fn initialize_state(&mut self) -> Result<()> {
        let (status, decoded) = {
            let response = self.latest()?;
            let decoded = if is_polling_status(response.status) {
                decode_body(&response.body)?
            } else {
                decode_body(&response.body).unwrap_or_default()
            };
            (response.status, decoded)
        };
        self.decoded_body = decoded;

        self.state.lro_state = match status {
            StatusCode::OK => self
                .provisioning_state()
                .map(OperationState::from)
                .unwrap_or_else(OperationState::succeeded),
            StatusCode::CREATED => self
                .provisioning_state()
                .map(OperationState::from)
                .unwrap_or_else(OperationState::in_progress),
            StatusCode::ACCEPTED => OperationState::in_progress(),
            StatusCode::NO_CONTENT => OperationState::succeeded(),
            _ => OperationState::failed(),
        };

        if self.has_failed() {
            self.update_error_from_response();
            return Ok(());
        }
        self.init_polling_method()
    }

    fn provisioning_state(&self) -> Option<&str> {
        self.decoded_body
            .get("properties")
            .and_then(|p| p.get("provisioningState"))
            .and_then(Value::as_str)
    }

    fn update_error_from_response(&mut self) {
        let body = self
            .latest_response
            .as_ref()
            .map(|r| r.body.as_slice())
            .unwrap_or_default();
        let error = ServiceError::from_failed_response(self.state.lro_state.as_str(), body);
        self.state.error = Some(error);
    }

    fn set_polling(&mut self, method: PollingMethod, uri: String) {
        self.state.polling_method = method;
        self.state.polling_uri = uri;
    }

    /// Default polling convention from the headers, async-operation first
    fn init_polling_method(&mut self) -> Result<()> {
        let (async_op, location) = {
            let response = self.latest()?;
            (
                header_url(response, HEADER_ASYNC_OPERATION),
                header_url(response, HEADER_LOCATION),
            )
        };
        if let Some(url) = async_op? {
            self.set_polling(PollingMethod::AsyncOperation, url);
            return Ok(());
        }
        if let Some(url) = location? {
            self.set_polling(PollingMethod::Location, url);
        }
        Ok(())
    }

    /// Verb-specific polling and result URLs for the initial response
    fn update_polling_method(&mut self) -> Result<()> {
        let (status, request_url, async_op, location) = {
            let response = self.latest()?;
            (
                response.status,
                response.request_url.to_string(),
                header_url(response, HEADER_ASYNC_OPERATION),
                header_url(response, HEADER_LOCATION),
            )
        };
        let verb = self.state.method;

        if verb.polls_request_uri() {
            if self.state.polling_uri.is_empty() {
                self.state.polling_uri = request_url.clone();
            }
            if self.state.result_uri.is_empty() {
                self.state.result_uri = request_url;
            }
            if self.state.polling_method == PollingMethod::Unknown {
                self.state.polling_method = PollingMethod::RequestUri;
            }
        }

        match (verb, status) {
            (Verb::Put | Verb::Patch, StatusCode::CREATED) => {
                if let Some(url) = async_op? {
                    self.set_polling(PollingMethod::AsyncOperation, url);
                }
            }
            (Verb::Put | Verb::Patch, StatusCode::ACCEPTED) => {
                let async_op = async_op?;
                if let Some(url) = &async_op {
                    self.set_polling(PollingMethod::AsyncOperation, url.clone());
                }
                match location {
                    Err(e) if async_op.is_none() => return Err(e),
                    Ok(Some(url)) => {
                        if async_op.is_none() {
                            self.set_polling(PollingMethod::Location, url.clone());
                        }
                        self.state.result_uri = url;
                    }
                    _ => {}
                }
                if verb == Verb::Patch && self.state.polling_method == PollingMethod::RequestUri {
                    return Err(LroError::protocol("didn't get a polling URL"));
                }
            }
            (Verb::Post | Verb::Delete, StatusCode::CREATED) => {
                let url = location?.ok_or_else(|| {
                    LroError::protocol("missing Location header in 201 response")
                })?;
                self.state.result_uri = url.clone();
                self.set_polling(PollingMethod::Location, url);
            }
            (Verb::Post | Verb::Delete, StatusCode::ACCEPTED) => {
                let async_op = async_op?;
                if let Some(url) = &async_op {
                    self.set_polling(PollingMethod::AsyncOperation, url.clone());
                }
                match location {
                    Err(e) if self.state.polling_uri.is_empty() => return Err(e),
                    Ok(Some(url)) => {
                        if async_op.is_none() {
                            self.set_polling(PollingMethod::Location, url.clone());
                        }
                        self.state.result_uri = url;
                    }
                    _ => {}
                }
                if self.state.polling_uri.is_empty() {
                    return Err(LroError::protocol("didn't get a polling URL"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Follow a new status URL handed out by an in-progress poll response
    ///
    /// The polling method never changes after initialization; only the
    /// header matching the current method is honoured.
    pub(crate) fn refresh_polling_uri(&mut self) -> Result<()> {
        let header = match self.state.polling_method {
            PollingMethod::AsyncOperation => HEADER_ASYNC_OPERATION,
            PollingMethod::Location => HEADER_LOCATION,
            PollingMethod::RequestUri | PollingMethod::Unknown => return Ok(()),
        };
        let refreshed = {
            let response = self.latest()?;
            if !matches!(response.status, StatusCode::CREATED | StatusCode::ACCEPTED) {
                return Ok(());
            }
            header_url(response, header)?
        };
        if let Some(url) = refreshed {
            self.state.polling_uri = url;
        }
        Ok(())
    }

    /// GET the polling URL and record the response
    pub(crate) async fn poll_for_status(
        &mut self,
        sender: &dyn Sender,
        scope: &CancelScope<'_>,
    ) -> Result<()> {
        let url = Url::parse(&self.state.polling_uri).map_err(|e| {
            LroError::protocol(format!(
                "invalid polling URL '{}': {e}",
                self.state.polling_uri
            ))
        })?;

        let response = scope
            .guard(sender.send(Request::get(url)))
            .await
            .map_err(LroError::Cancelled)?
            .map_err(LroError::Network)?;

        debug!(
            method = %self.state.method,
            url = %self.state.polling_uri,
            status = response.status.as_u16(),
            "polled operation status"
        );
        self.record_poll_response(response)
    }

    fn record_poll_response(&mut self, response: Response) -> Result<()> {
        let status = response.status;
        if is_polling_status(status) {
            let decoded = decode_body(&response.body);
            self.latest_response = Some(response);
            self.state.error = None;
            match decoded {
                Ok(body) => {
                    self.decoded_body = body;
                    Ok(())
                }
                Err(e) => {
                    self.decoded_body = Map::new();
                    Err(e)
                }
            }
        } else {
            let error =
                ServiceError::from_failed_response(self.state.lro_state.as_str(), &response.body);
            self.latest_response = Some(response);
            Err(LroError::UnexpectedStatus {
                status: status.as_u16(),
                error,
            })
        }
    }

    /// Validate the latest poll response against the polling convention
    pub(crate) fn check_for_errors(&self) -> Result<()> {
        let response = self.latest()?;

        if self.state.polling_method == PollingMethod::AsyncOperation {
            if response.body.is_empty() {
                return Err(LroError::protocol(
                    "for async-operation polling the response body cannot be empty",
                ));
            }
            if !self.decoded_body.contains_key("status") {
                return Err(LroError::protocol(
                    "missing status property in async-operation response body",
                ));
            }
        }

        if self.state.method == Verb::Put {
            let async_op = header_url(response, HEADER_ASYNC_OPERATION)?;
            let location = header_url(response, HEADER_LOCATION)?;
            if async_op.is_none() && location.is_none() && is_blank(&response.body) {
                return Err(LroError::protocol("the response did not contain a body"));
            }
        }
        Ok(())
    }

    /// Whether provisioning state is a terminal signal for the latest response
    pub(crate) fn provisioning_state_applicable(&self) -> bool {
        self.latest_response
            .as_ref()
            .is_some_and(|r| self.state.method.provisioning_state_applicable(r.status))
    }

    /// Derive the lifecycle state from the latest poll response
    pub(crate) fn update_polling_state(&mut self, provisioning_state_applicable: bool) -> Result<()> {
        let status = self.latest()?.status;

        let reported = match self.decoded_body.get("status") {
            Some(value)
                if self.state.polling_method == PollingMethod::AsyncOperation
                    && !value.is_null() =>
            {
                let s = value.as_str().ok_or_else(|| {
                    LroError::protocol(
                        "status property in async-operation response body is not a string",
                    )
                })?;
                Some(OperationState::from(s))
            }
            _ => None,
        };

        self.state.lro_state = if let Some(state) = reported {
            state
        } else if status == StatusCode::ACCEPTED {
            OperationState::in_progress()
        } else if provisioning_state_applicable {
            self.provisioning_state()
                .map(OperationState::from)
                .unwrap_or_else(OperationState::succeeded)
        } else {
            return Err(LroError::protocol(
                "the response from the async operation has an invalid status code",
            ));
        };

        if self.has_failed() {
            self.update_error_from_response();
        }
        Ok(())
    }
}

fn is_polling_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT
    )
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn decode_body(body: &[u8]) -> Result<Map<String, Value>> {
    if is_blank(body) {
        return Ok(Map::new());
    }
    serde_json::from_slice(body)
        .map_err(|e| LroError::protocol(format!("failed to decode response body: {e}")))
}

/// An absolute URL from a header; absent or empty headers yield `None`
fn header_url(response: &Response, name: &str) -> Result<Option<String>> {
    let Some(raw) = response.headers.get(name) else {
        return Ok(None);
    };
    let value = raw
        .to_str()
        .map_err(|_| LroError::protocol(format!("invalid {name} header value")))?;
    if value.is_empty() {
        return Ok(None);
    }
    Url::parse(value)
        .map(|_| Some(value.to_string()))
        .map_err(|_| LroError::protocol(format!("invalid polling URL '{value}'")))
}
