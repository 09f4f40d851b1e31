//! Operation matcher: resolve a live request URL and verb to the contract
//! operation(s) it corresponds to, or a structured reason why none matched.
//!
//! Matching is staged: provider bucket, then api-version bucket, then verb
//! bucket, then segment-exact template comparison. Each stage miss carries its
//! own failure reason so callers can tell "unknown provider" apart from "known
//! provider, unloaded api-version".

use crate::cache::{CacheLookup, OperationCache, UNKNOWN_API_VERSION, UNKNOWN_PROVIDER};
use crate::operation::{HttpVerb, Operation};
use crate::result::ErrorCode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Query parameter carrying the API version to match against.
pub const API_VERSION_PARAMETER: &str = "api-version";

/// Programming-contract violations while preparing a request for matching.
/// These are the fatal channel; matching misses are [`MatchFailure`] values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request URL '{0}' could not be parsed")]
    MalformedUrl(String),
}

/// A request URL broken into path segments and query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Path segments exactly as they appeared in the URL.
    pub raw_segments: Vec<String>,
    /// Percent-decoded path segments.
    pub segments: Vec<String>,
    /// Percent-decoded query parameters.
    pub query: HashMap<String, String>,
    /// Query parameter values exactly as they appeared in the URL, for
    /// parameters declared with `skipUrlEncoding`.
    pub raw_query: HashMap<String, String>,
}

impl ParsedUrl {
    /// Parse an absolute URL or an absolute-path reference. Fragments are
    /// ignored. Anything without a path is malformed.
    pub fn parse(url: &str) -> Result<Self, RequestError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(RequestError::MalformedUrl(url.to_string()));
        }

        let after_authority = match trimmed.find("://") {
            Some(scheme_end) => {
                let rest = &trimmed[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) => &rest[path_start..],
                    // Authority only: no path, but a query may still follow.
                    None => match rest.find('?') {
                        Some(q) => &rest[q..],
                        None => "",
                    },
                }
            }
            None if trimmed.starts_with('/') => trimmed,
            None => return Err(RequestError::MalformedUrl(url.to_string())),
        };

        let without_fragment = after_authority
            .split_once('#')
            .map(|(head, _)| head)
            .unwrap_or(after_authority);

        let (path, query_string) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));

        let raw_segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        let segments = raw_segments.iter().map(|s| percent_decode(s)).collect();

        let mut query = HashMap::new();
        let mut raw_query = HashMap::new();
        for pair in query_string.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded_key = percent_decode(key);
            raw_query.insert(decoded_key.clone(), value.to_string());
            // Query values use form encoding, where '+' is a space.
            query.insert(decoded_key, percent_decode(&value.replace('+', " ")));
        }

        Ok(ParsedUrl {
            raw_segments,
            segments,
            query,
            raw_query,
        })
    }

    /// The `api-version` query parameter, if present.
    pub fn api_version(&self) -> Option<&str> {
        self.query.get(API_VERSION_PARAMETER).map(String::as_str)
    }

    /// Provider namespace extracted from the path, lower-cased: the segment
    /// following a `providers` segment. Same rule the cache applies to
    /// template paths at build time.
    pub fn provider_namespace(&self) -> Option<String> {
        let mut iter = self.segments.iter().peekable();
        while let Some(segment) = iter.next() {
            if segment.eq_ignore_ascii_case("providers") {
                if let Some(next) = iter.peek() {
                    return Some(next.to_lowercase());
                }
            }
        }
        None
    }
}

fn percent_decode(text: &str) -> String {
    match urlencoding::decode(text) {
        Ok(decoded) => decoded.into_owned(),
        // Invalid escapes fall back to the raw text rather than failing.
        Err(_) => text.to_string(),
    }
}

/// Why matching produced no operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    /// No cache bucket for the request's provider namespace.
    ProviderNotFound { provider: String },
    /// Provider known, but no bucket for the request's api-version.
    ApiVersionNotFound {
        provider: String,
        api_version: String,
    },
    /// Provider and api-version known, but no operations for the verb.
    VerbNotFound { verb: String },
    /// Candidates existed, but no path template matched the request path.
    NoMatchingTemplate { path: String },
}

impl MatchFailure {
    pub fn code(&self) -> ErrorCode {
        match self {
            MatchFailure::ProviderNotFound { .. } => {
                ErrorCode::OperationNotFoundInCacheWithProvider
            }
            MatchFailure::ApiVersionNotFound { .. } => ErrorCode::OperationNotFoundInCacheWithApi,
            MatchFailure::VerbNotFound { .. } => ErrorCode::OperationNotFoundInCacheWithVerb,
            MatchFailure::NoMatchingTemplate { .. } => ErrorCode::OperationNotFoundInCache,
        }
    }
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::ProviderNotFound { provider } => {
                write!(f, "no operations cached for provider '{provider}'")
            }
            MatchFailure::ApiVersionNotFound {
                provider,
                api_version,
            } => write!(
                f,
                "provider '{provider}' has no operations for api-version '{api_version}'"
            ),
            MatchFailure::VerbNotFound { verb } => {
                write!(f, "no cached operations for verb '{verb}'")
            }
            MatchFailure::NoMatchingTemplate { path } => {
                write!(f, "no operation path template matches '{path}'")
            }
        }
    }
}

/// Result of matching one request: all matching operations, or a failure
/// reason and none. More than one operation means the contract declares
/// overlapping templates; the ambiguity is surfaced, never hidden.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub operations: Vec<Arc<Operation>>,
    pub failure: Option<MatchFailure>,
}

impl MatchOutcome {
    fn matched(operations: Vec<Arc<Operation>>) -> Self {
        MatchOutcome {
            operations,
            failure: None,
        }
    }

    fn failed(failure: MatchFailure) -> Self {
        MatchOutcome {
            operations: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn is_match(&self) -> bool {
        !self.operations.is_empty()
    }
}

/// Resolve a request URL and verb against the cache.
///
/// Requests without an `api-version` query parameter are looked up under the
/// unknown-api-version bucket, mirroring how versionless contracts are filed.
pub fn match_operations(
    cache: &OperationCache,
    url: &str,
    verb: &str,
) -> Result<MatchOutcome, RequestError> {
    let parsed = ParsedUrl::parse(url)?;
    Ok(match_parsed(cache, &parsed, verb))
}

/// Matching core over an already-parsed URL; shared with the validators so a
/// request is parsed once per validation call.
pub(crate) fn match_parsed(cache: &OperationCache, parsed: &ParsedUrl, verb: &str) -> MatchOutcome {
    let provider = parsed
        .provider_namespace()
        .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());
    let api_version = parsed.api_version().unwrap_or(UNKNOWN_API_VERSION);

    // A verb outside the contract verb space parses to None and is a
    // verb-stage miss, reported only once the earlier stages have hit.
    let candidates = match cache.lookup(&provider, api_version, HttpVerb::parse(verb)) {
        CacheLookup::ProviderMiss => {
            return MatchOutcome::failed(MatchFailure::ProviderNotFound { provider })
        }
        CacheLookup::ApiVersionMiss => {
            return MatchOutcome::failed(MatchFailure::ApiVersionNotFound {
                provider,
                api_version: api_version.to_string(),
            })
        }
        CacheLookup::VerbMiss => {
            return MatchOutcome::failed(MatchFailure::VerbNotFound {
                verb: verb.to_string(),
            })
        }
        CacheLookup::Hit(operations) => operations,
    };

    let case_sensitive = cache.options().is_path_case_sensitive;
    let matched: Vec<Arc<Operation>> = candidates
        .iter()
        .filter(|op| op.path_template.matches(&parsed.segments, case_sensitive))
        .cloned()
        .collect();

    debug!(
        provider = %provider,
        api_version = %api_version,
        verb = verb,
        candidates = candidates.len(),
        matched = matched.len(),
        "operation match"
    );

    if matched.is_empty() {
        return MatchOutcome::failed(MatchFailure::NoMatchingTemplate {
            path: format!("/{}", parsed.segments.join("/")),
        });
    }
    MatchOutcome::matched(matched)
}
