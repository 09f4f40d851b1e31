//! Captured live traffic: the request/response pair a validation call checks.
//!
//! These are caller-supplied, read-only inputs. Headers are carried as plain
//! maps and looked up case-insensitively; status codes arrive as a number or
//! string on the wire and are normalized to a string.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A captured live request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveRequest {
    /// Absolute request URL, including the query string.
    pub url: String,

    pub method: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Already-parsed query map. When supplied it takes precedence over
    /// parameters extracted from the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A captured live response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    /// Normalized to a string; accepts `200` or `"200"` on the wire.
    #[serde(deserialize_with = "status_code_as_string")]
    pub status_code: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl LiveResponse {
    /// Numeric status code, when the normalized string is numeric.
    pub fn status_code_numeric(&self) -> Option<u16> {
        self.status_code.parse().ok()
    }
}

/// Request coordinates needed to match a response back to its operation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub url: String,
    pub method: String,
}

impl From<&LiveRequest> for RequestContext {
    fn from(request: &LiveRequest) -> Self {
        RequestContext {
            url: request.url.clone(),
            method: request.method.clone(),
        }
    }
}

/// Case-insensitive header lookup.
pub fn lookup_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn status_code_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "statusCode must be a number or string, found {other}"
        ))),
    }
}
