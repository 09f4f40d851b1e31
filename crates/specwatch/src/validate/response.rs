//! Live response validation: status-code policy, declared headers, body.

use super::{ambiguity_warning, coerce_scalar, translate_issue};
use crate::cache::OperationCache;
use crate::live::{lookup_header, LiveResponse, RequestContext};
use crate::matcher::{match_parsed, ParsedUrl};
use crate::operation::{Operation, ResponseSpec};
use crate::result::{ErrorCode, ValidationError, ValidationResult};
use crate::schema::StructuralChecker;
use tracing::debug;

/// Match the originating request's URL and verb to an operation, then check
/// the live response against its declared shape.
pub fn validate_response(
    cache: &OperationCache,
    response: &LiveResponse,
    context: &RequestContext,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    let parsed = match ParsedUrl::parse(&context.url) {
        Ok(parsed) => parsed,
        Err(err) => {
            result.add(ValidationError::error(
                ErrorCode::ErrorInPreparingRequest,
                err.to_string(),
            ));
            return result;
        }
    };

    let outcome = match_parsed(cache, &parsed, &context.method);
    if let Some(failure) = outcome.failure {
        result.add(ValidationError::error(failure.code(), failure.to_string()));
        return result;
    }
    if let Some(warning) = ambiguity_warning(&outcome.operations) {
        result.add(warning);
    }

    validate_against_operation(&outcome.operations[0], response, cache.checker(), &mut result);
    result
}

fn validate_against_operation(
    operation: &Operation,
    response: &LiveResponse,
    checker: &dyn StructuralChecker,
    result: &mut ValidationResult,
) {
    let status = response.status_code.as_str();
    let numeric = response.status_code_numeric();

    debug!(
        operation_id = %operation.operation_id,
        status_code = status,
        "validating response"
    );

    let spec = match operation.response_for(status) {
        Some(spec) => spec,
        None => {
            let is_error_range = numeric.map(|code| code >= 400).unwrap_or(false);
            match operation.default_response() {
                // Any undeclared error code is acceptable when a default
                // error shape is declared; the body is held to that shape.
                Some(default_spec) if is_error_range => default_spec,
                Some(_) => {
                    result.add(ValidationError::error(
                        ErrorCode::InvalidResponseCode,
                        format!(
                            "status code {status} is not declared by operation '{}'",
                            operation.operation_id
                        ),
                    ));
                    return;
                }
                None if is_error_range => {
                    result.add(ValidationError::error(
                        ErrorCode::ResponseStatusCodeNotInSpec,
                        format!(
                            "error status code {status} is not declared and operation '{}' has no default response",
                            operation.operation_id
                        ),
                    ));
                    return;
                }
                None => {
                    result.add(ValidationError::error(
                        ErrorCode::InvalidResponseCode,
                        format!(
                            "status code {status} is not declared by operation '{}'",
                            operation.operation_id
                        ),
                    ));
                    return;
                }
            }
        }
    };

    validate_headers(spec, response, checker, result);
    validate_body(operation, spec, response, checker, result);
}

fn validate_headers(
    spec: &ResponseSpec,
    response: &LiveResponse,
    checker: &dyn StructuralChecker,
    result: &mut ValidationResult,
) {
    // Undeclared live headers are never findings; only declared ones are held
    // to their schema.
    for (name, schema) in &spec.headers {
        match lookup_header(&response.headers, name) {
            Some(text) => {
                let value = coerce_scalar(text, schema);
                for raw in checker.check(schema, &value) {
                    result.add(translate_issue(raw, &format!("headers.{name}")));
                }
            }
            None => {
                result.add(
                    ValidationError::warning(
                        ErrorCode::MissingResponseHeader,
                        format!("declared response header '{name}' is not present"),
                    )
                    .with_path(format!("headers.{name}")),
                );
            }
        }
    }
}

fn validate_body(
    operation: &Operation,
    spec: &ResponseSpec,
    response: &LiveResponse,
    checker: &dyn StructuralChecker,
    result: &mut ValidationResult,
) {
    let Some(body) = response.body.as_ref().filter(|b| !b.is_null()) else {
        return;
    };

    // Absent content-type means the operation's first declared produced
    // content type; only JSON payloads are structurally checkable.
    let content_type = lookup_header(&response.headers, "content-type")
        .map(str::to_string)
        .or_else(|| operation.produces_content_types.first().cloned());
    if let Some(ct) = content_type {
        if !ct.to_ascii_lowercase().contains("json") {
            return;
        }
    }

    let Some(schema) = &spec.schema else {
        result.add(ValidationError::error(
            ErrorCode::ResponseSchemaNotInSpec,
            format!(
                "response carries a body but operation '{}' declares no schema for status code {}",
                operation.operation_id, response.status_code
            ),
        ));
        return;
    };

    for raw in checker.check(schema, body) {
        result.add(translate_issue(raw, ""));
    }
}
