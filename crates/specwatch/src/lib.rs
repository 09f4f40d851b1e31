//! Live API traffic conformance validation against resolved contract
//! documents.
//!
//! Specwatch ingests fully dereferenced OpenAPI-style contract documents,
//! indexes their operations by (provider namespace, api-version, verb), and
//! checks captured request/response traffic for conformance with the declared
//! parameters, bodies, status codes, and headers.
//!
//! The cache is built once and is immutable afterwards; validation calls are
//! pure in-memory comparisons that can run concurrently from any number of
//! threads. Every public call returns a result value: matching misses and
//! structural mismatches are findings inside a [`ValidationResult`], never
//! panics or errors. Only contract violations of the API itself (an
//! unloadable document set) use the fatal channel.
//!
//! # Example
//!
//! ```
//! use specwatch::{build_cache, validate_request_response, CacheOptions, ContractDocument,
//!                 LiveRequest, LiveResponse, ReportOptions};
//! use serde_json::json;
//!
//! let document = ContractDocument::from_json(json!({
//!     "apiVersion": "2024-01-01",
//!     "operations": [{
//!         "operationId": "Widgets_Get",
//!         "httpVerb": "get",
//!         "pathTemplate": "/providers/Contoso.Widgets/widgets/{name}",
//!         "responses": {"200": {"schema": {"type": "object"}}}
//!     }]
//! }))?;
//! let build = build_cache([Ok(document)], CacheOptions::default())?;
//!
//! let request: LiveRequest = serde_json::from_value(json!({
//!     "url": "https://example.com/providers/Contoso.Widgets/widgets/w1?api-version=2024-01-01",
//!     "method": "GET"
//! }))?;
//! let response: LiveResponse = serde_json::from_value(json!({
//!     "statusCode": 200,
//!     "body": {}
//! }))?;
//!
//! let report =
//!     validate_request_response(&build.cache, &request, &response, &ReportOptions::default());
//! assert!(report.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod live;
pub mod matcher;
pub mod operation;
pub mod result;
pub mod schema;
pub mod validate;

pub use cache::{
    CacheBuild, CacheBuildError, CacheOptions, CacheStats, DocumentFailure, OperationCache,
    SharedCache, UNKNOWN_API_VERSION, UNKNOWN_PROVIDER,
};
pub use live::{lookup_header, LiveRequest, LiveResponse, RequestContext};
pub use matcher::{
    match_operations, MatchFailure, MatchOutcome, ParsedUrl, RequestError, API_VERSION_PARAMETER,
};
pub use operation::{
    ContractDocument, HttpVerb, Operation, Parameter, ParameterLocation, PathSegment, PathTemplate,
    ResponseSpec, DEFAULT_RESPONSE,
};
pub use result::{
    aggregate, ErrorCode, ReportOptions, Severity, ValidationError, ValidationReport,
    ValidationResult,
};
pub use schema::{DefaultChecker, RawIssue, Schema, StructuralChecker};
pub use validate::{validate_request, validate_response};

/// Build an operation cache from resolver output.
///
/// Each item is one document's resolution result; individual failures are
/// collected in the returned [`CacheBuild`] and only a total load failure is
/// fatal.
pub fn build_cache(
    sources: impl IntoIterator<Item = Result<ContractDocument, DocumentFailure>>,
    options: CacheOptions,
) -> Result<CacheBuild, CacheBuildError> {
    OperationCache::build(sources, options)
}

/// Validate one captured transaction, combining the request and response
/// results into a single report with `includeErrors` filtering applied.
///
/// Equivalent to calling [`validate_request`] and [`validate_response`] with
/// the same inputs and aggregating the two results.
pub fn validate_request_response(
    cache: &OperationCache,
    request: &LiveRequest,
    response: &LiveResponse,
    options: &ReportOptions,
) -> ValidationReport {
    let request_result = validate_request(cache, request);
    let response_result = validate_response(cache, response, &RequestContext::from(request));
    aggregate(&request_result, &response_result, options)
}
