//! HTTP request/response values and the [`Sender`] seam
//!
//! The engine never talks to a transport directly. Provider clients hand it a
//! [`Request`] to submit (or a [`Response`] they already received) and a
//! [`Sender`] able to execute further requests. Bodies are fully buffered so
//! the tracker can inspect them as often as it needs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Header carrying the dedicated operation-status URL
pub const HEADER_ASYNC_OPERATION: &str = "Azure-AsyncOperation";

/// Header carrying the resource location URL
pub const HEADER_LOCATION: &str = "Location";

/// Advisory wait hint, in seconds
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// A request ready to be executed by a [`Sender`]
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header, replacing any previous value
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body and the matching content type
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }
}

/// A fully buffered response, remembering the request that produced it
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub request_method: Method,
    pub request_url: Url,
}

impl Response {
    pub fn new(status: StatusCode, request_method: Method, request_url: Url) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
            request_method,
            request_url,
        }
    }

    /// Add a header; invalid names or values are dropped
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: &serde_json::Value) -> Self {
        let bytes = body.to_string().into_bytes();
        self.with_header("Content-Type", "application/json")
            .with_body(bytes)
    }

    /// Header value as a string, if present and valid UTF-8-ish ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Retry-After` hint, when it is a whole number of seconds
    pub fn retry_after(&self) -> Option<Duration> {
        self.header(HEADER_RETRY_AFTER)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure reaching the control plane
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "failed to connect".to_string()
        } else {
            "HTTP request failed".to_string()
        };
        Self::with_source(message, err)
    }
}

/// Executes HTTP requests on behalf of the engine
///
/// Implementations carry authentication and any other decoration the
/// provider needs. The engine holds at most one request in flight per
/// operation handle.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}
