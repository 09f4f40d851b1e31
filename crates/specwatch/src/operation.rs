//! Operation model for resolved contract documents.
//!
//! A contract document arrives fully dereferenced from the external resolver:
//! every operation is self-contained, with its parameters and response shapes
//! inlined. The types here are the immutable in-memory form those records take
//! for the lifetime of an [`OperationCache`](crate::cache::OperationCache).

use crate::schema::Schema;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Responses map key for the contract's catch-all response shape.
pub const DEFAULT_RESPONSE: &str = "default";

/// HTTP verbs an operation can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVerb {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "PUT")]
    Put,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "DELETE")]
    Delete,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "HEAD")]
    Head,
    #[serde(alias = "OPTIONS")]
    Options,
}

impl HttpVerb {
    /// Parse a verb case-insensitively. Returns `None` for verbs no contract
    /// operation can declare (e.g. `TRACE`, `CONNECT`).
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.to_ascii_lowercase().as_str() {
            "get" => Some(HttpVerb::Get),
            "put" => Some(HttpVerb::Put),
            "post" => Some(HttpVerb::Post),
            "delete" => Some(HttpVerb::Delete),
            "patch" => Some(HttpVerb::Patch),
            "head" => Some(HttpVerb::Head),
            "options" => Some(HttpVerb::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Put => "put",
            HttpVerb::Post => "post",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
            HttpVerb::Head => "head",
            HttpVerb::Options => "options",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Literal text that must match the request segment.
    Literal(String),
    /// A `{parameterName}` placeholder matching any single non-empty segment.
    Parameter(String),
}

/// An operation's path template, parsed into ordered segments.
///
/// On the wire this is the raw template string, e.g.
/// `/subscriptions/{subscriptionId}/providers/Microsoft.Storage/storageAccounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    /// Parse a template string. Empty segments (double slashes, trailing
    /// slash) are dropped, matching how request paths are segmented.
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
                    PathSegment::Parameter(s[1..s.len() - 1].to_string())
                } else {
                    PathSegment::Literal(s.to_string())
                }
            })
            .collect();
        PathTemplate {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Extract the provider namespace: the literal segment immediately
    /// following a `providers` literal, lower-cased. A `{parameter}` in that
    /// position is not a recognizable provider.
    pub fn provider_namespace(&self) -> Option<String> {
        let mut iter = self.segments.iter().peekable();
        while let Some(segment) = iter.next() {
            if let PathSegment::Literal(lit) = segment {
                if lit.eq_ignore_ascii_case("providers") {
                    if let Some(PathSegment::Literal(ns)) = iter.peek() {
                        return Some(ns.to_lowercase());
                    }
                }
            }
        }
        None
    }

    /// Position of a named `{parameter}` segment, if declared.
    pub fn parameter_position(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| match s {
            PathSegment::Parameter(p) => p == name,
            PathSegment::Literal(_) => false,
        })
    }

    /// Compare the template against concrete request path segments.
    ///
    /// Segment counts must match exactly; `{parameter}` segments match any
    /// non-empty value. Literal comparison honors `case_sensitive` except for
    /// the segment following a `providers` literal, which is always compared
    /// case-insensitively (provider namespace casing drifts in real traffic).
    pub fn matches(&self, request_segments: &[String], case_sensitive: bool) -> bool {
        if self.segments.len() != request_segments.len() {
            return false;
        }

        let mut after_providers = false;
        for (template, actual) in self.segments.iter().zip(request_segments) {
            let provider_position = after_providers;
            after_providers = false;

            match template {
                PathSegment::Parameter(_) => {
                    if actual.is_empty() {
                        return false;
                    }
                }
                PathSegment::Literal(lit) => {
                    let matched = if case_sensitive && !provider_position {
                        lit == actual
                    } else {
                        lit.eq_ignore_ascii_case(actual)
                    };
                    if !matched {
                        return false;
                    }
                    if lit.eq_ignore_ascii_case("providers") {
                        after_providers = true;
                    }
                }
            }
        }
        true
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PathTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PathTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(de::Error::custom("path template must not be empty"));
        }
        Ok(PathTemplate::parse(&raw))
    }
}

/// Where a declared parameter's value is carried in the live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

/// One declared operation parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,

    /// Location of the value in the live request.
    #[serde(rename = "in")]
    pub location: ParameterLocation,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,

    /// When set, path/query values are taken verbatim instead of
    /// percent-decoded before validation.
    #[serde(default)]
    pub skip_url_encoding: bool,
}

/// Declared shape of one response (a concrete status code or `default`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,

    /// Declared response headers, name to value schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Schema>,
}

/// One contract operation: a (verb, path template) pair plus its declared
/// parameters and response shapes. Created during cache construction and
/// never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,

    pub http_verb: HttpVerb,

    pub path_template: PathTemplate,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Status-code string (or `default`) to declared response shape.
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseSpec>,

    #[serde(default)]
    pub produces_content_types: Vec<String>,
}

impl Operation {
    /// Declared response for a concrete status code string.
    pub fn response_for(&self, status_code: &str) -> Option<&ResponseSpec> {
        self.responses.get(status_code)
    }

    /// The catch-all `default` response, if declared (or synthesized at
    /// cache-build time).
    pub fn default_response(&self) -> Option<&ResponseSpec> {
        self.responses.get(DEFAULT_RESPONSE)
    }
}

/// A fully dereferenced contract document as handed over by the external
/// resolver.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    /// Identifier used in per-document failure reporting (file path, URL, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// The contract's declared API version. Absent versions are filed under
    /// the unknown-api-version bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl ContractDocument {
    /// Deserialize a resolved document from its JSON form.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Display name for failure reporting.
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or("<unnamed document>")
    }
}
