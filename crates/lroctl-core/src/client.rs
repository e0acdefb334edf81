//! [`Sender`] backed by a [`reqwest::Client`]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::config::{ConfigError, HttpConfig};
use crate::http::{Request, Response, Sender, TransportError};

/// Sends engine requests through a shared reqwest client
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    /// Wrap an already configured client, e.g. one carrying auth middleware
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let invalid = || ConfigError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let mut header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            if header_name == reqwest::header::AUTHORIZATION {
                header_value.set_sensitive(true);
            }
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self::new(builder.build()?))
    }
}

#[async_trait]
impl Sender for ReqwestSender {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            headers,
            body,
            request_method: method,
            request_url: url,
        })
    }
}
