//! Structured error payloads returned by cloud control planes
//!
//! Control planes report failures as `{"error": {...}}` or as the bare error
//! object. The `details` member should be an array of objects, but some
//! services send a single object instead, so both shapes are accepted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Message used when a failure carries no parseable error payload
pub const GENERIC_FAILURE_MESSAGE: &str = "The async operation failed.";

/// Key under `innererror` holding the decode failure text
pub const UNMARSHAL_ERROR_KEY: &str = "unmarshalError";

/// Normalized error record from a control plane response
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Map<String, Value>>,
    #[serde(rename = "innererror", skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Map<String, Value>>,
    #[serde(rename = "additionalInfo", skip_serializing_if = "Vec::is_empty")]
    pub additional_info: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ListDetails {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    details: Option<Vec<Map<String, Value>>>,
    #[serde(default, rename = "innererror")]
    inner_error: Option<Map<String, Value>>,
    #[serde(default, rename = "additionalInfo")]
    additional_info: Option<Vec<Map<String, Value>>>,
}

#[derive(Deserialize)]
struct SingleDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    details: Option<Map<String, Value>>,
    #[serde(default, rename = "innererror")]
    inner_error: Option<Map<String, Value>>,
    #[serde(default, rename = "additionalInfo")]
    additional_info: Option<Vec<Map<String, Value>>>,
}

impl ServiceError {
    /// Create an error with only a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Parse an error object, accepting `details` as an array or a single object
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match ListDetails::deserialize(value) {
            Ok(e) => Ok(Self {
                code: e.code,
                message: e.message,
                target: e.target,
                details: e.details.unwrap_or_default(),
                inner_error: e.inner_error,
                additional_info: e.additional_info.unwrap_or_default(),
            }),
            Err(_) => {
                let e = SingleDetail::deserialize(value)?;
                Ok(Self {
                    code: e.code,
                    message: e.message,
                    target: e.target,
                    details: e.details.into_iter().collect(),
                    inner_error: e.inner_error,
                    additional_info: e.additional_info.unwrap_or_default(),
                })
            }
        }
    }

    /// Extract an error from a response body, wrapped in `error` or bare
    ///
    /// Returns `Ok(None)` when the body parsed but carried no error code.
    pub fn from_body(body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_document(&value)
    }

    fn from_document(value: &Value) -> Result<Option<Self>, serde_json::Error> {
        let candidate = match value.get("error") {
            Some(inner) if !inner.is_null() => inner,
            _ => value,
        };
        let parsed = Self::from_value(candidate)?;
        Ok((!parsed.code.is_empty()).then_some(parsed))
    }

    /// Build the best available error for a failed response
    ///
    /// Falls back to a generic error whose code is `state` when the body has
    /// no recognizable payload. Decode failures are kept under
    /// `innererror.unmarshalError` and any parseable document is attached
    /// as `additionalInfo`.
    pub fn from_failed_response(state: &str, body: &[u8]) -> Self {
        let mut decode_error = None;
        let mut document = None;

        if !body.is_empty() {
            match serde_json::from_slice::<Value>(body) {
                Ok(value) => {
                    match Self::from_document(&value) {
                        Ok(Some(parsed)) => return parsed,
                        Ok(None) => {}
                        Err(e) => decode_error = Some(e.to_string()),
                    }
                    document = value.as_object().filter(|m| !m.is_empty()).cloned();
                }
                Err(e) => decode_error = Some(e.to_string()),
            }
        }

        let mut fallback = Self::new(state, GENERIC_FAILURE_MESSAGE);
        if let Some(text) = decode_error {
            let mut inner = Map::new();
            inner.insert(UNMARSHAL_ERROR_KEY.to_string(), Value::String(text));
            fallback.inner_error = Some(inner);
        }
        if let Some(document) = document {
            fallback.additional_info = vec![document];
        }
        fallback
    }
}

impl<'de> Deserialize<'de> for ServiceError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code={:?} Message={:?}", self.code, self.message)?;
        if let Some(target) = &self.target {
            write!(f, " Target={target:?}")?;
        }
        if !self.details.is_empty()
            && let Ok(json) = serde_json::to_string(&self.details)
        {
            write!(f, " Details={json}")?;
        }
        if let Some(inner) = &self.inner_error
            && let Ok(json) = serde_json::to_string(inner)
        {
            write!(f, " InnerError={json}")?;
        }
        if !self.additional_info.is_empty()
            && let Ok(json) = serde_json::to_string(&self.additional_info)
        {
            write!(f, " AdditionalInfo={json}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}
