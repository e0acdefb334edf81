//! Verb-specific polling rules
//!
//! PUT and PATCH may complete synchronously, so they fall back to polling the
//! request URL. POST and DELETE must name the status resource in a header.

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The HTTP verb that created an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Verb {
    Put,
    Patch,
    Post,
    Delete,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::PUT => Some(Verb::Put),
            Method::PATCH => Some(Verb::Patch),
            Method::POST => Some(Verb::Post),
            Method::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }

    /// Whether `properties.provisioningState` is a meaningful terminal
    /// signal for a response with this status
    pub fn provisioning_state_applicable(&self, status: StatusCode) -> bool {
        match self {
            Verb::Put | Verb::Patch => {
                status == StatusCode::OK || status == StatusCode::CREATED
            }
            Verb::Post | Verb::Delete => {
                status == StatusCode::OK || status == StatusCode::NO_CONTENT
            }
        }
    }

    /// PUT and PATCH poll the request URL when no header says otherwise
    pub(crate) fn polls_request_uri(&self) -> bool {
        matches!(self, Verb::Put | Verb::Patch)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method string names no supported verb
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method '{0}'")]
pub struct UnsupportedVerb(pub String);

impl FromStr for Verb {
    type Err = UnsupportedVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "POST" => Ok(Verb::Post),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(UnsupportedVerb(s.to_string())),
        }
    }
}

impl TryFrom<String> for Verb {
    type Error = UnsupportedVerb;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
