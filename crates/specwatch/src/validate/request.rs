//! Live request validation against a matched operation's declared parameters.

use super::{ambiguity_warning, coerce_scalar, translate_issue};
use crate::cache::OperationCache;
use crate::live::{lookup_header, LiveRequest};
use crate::matcher::{match_parsed, ParsedUrl};
use crate::operation::{Operation, ParameterLocation};
use crate::result::{ErrorCode, ValidationError, ValidationResult};
use crate::schema::StructuralChecker;
use serde_json::Value;
use tracing::debug;

/// Match the request to its operation and validate the declared parameters.
///
/// Failures to even prepare the check (an unparsable URL) are reported as an
/// `ErrorInPreparingRequest` finding, never propagated as a fatal failure.
pub fn validate_request(cache: &OperationCache, request: &LiveRequest) -> ValidationResult {
    let mut result = ValidationResult::new();

    let mut parsed = match ParsedUrl::parse(&request.url) {
        Ok(parsed) => parsed,
        Err(err) => {
            result.add(ValidationError::error(
                ErrorCode::ErrorInPreparingRequest,
                err.to_string(),
            ));
            return result;
        }
    };

    // A caller-supplied query map wins over whatever the URL carried, for
    // matching and parameter lookup alike. Supplied values arrive already
    // parsed, so they land in both the decoded and raw maps verbatim.
    if let Some(query) = &request.query {
        for (key, value) in query {
            parsed.query.insert(key.clone(), value.clone());
            parsed.raw_query.insert(key.clone(), value.clone());
        }
    }

    let outcome = match_parsed(cache, &parsed, &request.method);
    if let Some(failure) = outcome.failure {
        result.add(ValidationError::error(failure.code(), failure.to_string()));
        return result;
    }
    if let Some(warning) = ambiguity_warning(&outcome.operations) {
        result.add(warning);
    }

    validate_parameters(
        &outcome.operations[0],
        &parsed,
        request,
        cache.checker(),
        &mut result,
    );
    result
}

fn validate_parameters(
    operation: &Operation,
    parsed: &ParsedUrl,
    request: &LiveRequest,
    checker: &dyn StructuralChecker,
    result: &mut ValidationResult,
) {
    debug!(
        operation_id = %operation.operation_id,
        parameters = operation.parameters.len(),
        "validating request parameters"
    );

    for parameter in &operation.parameters {
        let value = locate_value(operation, parameter, parsed, request);

        let Some(value) = value else {
            if parameter.required {
                result.add(
                    ValidationError::error(
                        ErrorCode::MissingRequiredParameter,
                        format!(
                            "required {} parameter '{}' is missing",
                            location_label(parameter.location),
                            parameter.name
                        ),
                    )
                    .with_path(parameter.name.clone()),
                );
            }
            continue;
        };

        let Some(schema) = &parameter.schema else {
            continue;
        };

        let root = match parameter.location {
            // Body findings point straight into the payload.
            ParameterLocation::Body => "",
            _ => parameter.name.as_str(),
        };
        for raw in checker.check(schema, &value) {
            result.add(translate_issue(raw, root));
        }
    }
}

fn locate_value(
    operation: &Operation,
    parameter: &crate::operation::Parameter,
    parsed: &ParsedUrl,
    request: &LiveRequest,
) -> Option<Value> {
    match parameter.location {
        ParameterLocation::Path => {
            let position = operation.path_template.parameter_position(&parameter.name)?;
            let segment = if parameter.skip_url_encoding {
                parsed.raw_segments.get(position)?
            } else {
                parsed.segments.get(position)?
            };
            Some(scalar_value(segment, parameter))
        }
        ParameterLocation::Query => {
            // The parsed maps already carry any caller-supplied overrides.
            let text = if parameter.skip_url_encoding {
                parsed.raw_query.get(&parameter.name)?
            } else {
                parsed.query.get(&parameter.name)?
            };
            Some(scalar_value(text, parameter))
        }
        ParameterLocation::Header => {
            let text = lookup_header(&request.headers, &parameter.name)?;
            Some(scalar_value(text, parameter))
        }
        ParameterLocation::Body => match &request.body {
            Some(body) if !body.is_null() => Some(body.clone()),
            _ => None,
        },
    }
}

fn scalar_value(text: &str, parameter: &crate::operation::Parameter) -> Value {
    match &parameter.schema {
        Some(schema) => coerce_scalar(text, schema),
        None => Value::String(text.to_string()),
    }
}

fn location_label(location: ParameterLocation) -> &'static str {
    match location {
        ParameterLocation::Path => "path",
        ParameterLocation::Query => "query",
        ParameterLocation::Header => "header",
        ParameterLocation::Body => "body",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, OperationCache};
    use crate::operation::ContractDocument;
    use serde_json::json;

    fn cache() -> OperationCache {
        let document = ContractDocument::from_json(json!({
            "apiVersion": "2024-01-01",
            "operations": [{
                "operationId": "StorageAccounts_Create",
                "httpVerb": "put",
                "pathTemplate": "/subscriptions/{subscriptionId}/providers/Microsoft.Storage/storageAccounts/{accountName}",
                "parameters": [
                    {"name": "subscriptionId", "in": "path", "required": true,
                     "schema": {"type": "string", "format": "uuid"}},
                    {"name": "accountName", "in": "path", "required": true,
                     "schema": {"type": "string", "minLength": 3, "maxLength": 24, "pattern": "^[a-z0-9]+$"}},
                    {"name": "api-version", "in": "query", "required": true,
                     "schema": {"type": "string"}},
                    {"name": "timeout", "in": "query", "required": false,
                     "schema": {"type": "integer", "maximum": 120}},
                    {"name": "x-ms-client-request-id", "in": "header", "required": false,
                     "schema": {"type": "string", "format": "uuid"}},
                    {"name": "accountParameters", "in": "body", "required": true,
                     "schema": {
                         "type": "object",
                         "required": ["location"],
                         "properties": {
                             "location": {"type": "string"},
                             "sku": {"type": "string", "enum": ["Standard_LRS", "Premium_LRS"]}
                         },
                         "additionalProperties": false
                     }}
                ],
                "responses": {"200": {}}
            }]
        }))
        .unwrap();
        OperationCache::from_documents([document], CacheOptions::default())
            .unwrap()
            .cache
    }

    fn request(url: &str, body: Option<Value>) -> LiveRequest {
        serde_json::from_value(json!({
            "url": url,
            "method": "PUT",
            "headers": {},
            "body": body
        }))
        .unwrap()
    }

    const VALID_URL: &str = "https://management.example.com/subscriptions/9eea0e0b-47a4-4d5e-a29f-5e09fcf72eb0/providers/Microsoft.Storage/storageAccounts/mystore01?api-version=2024-01-01";

    #[test]
    fn test_valid_request_passes() {
        let result = validate_request(
            &cache(),
            &request(VALID_URL, Some(json!({"location": "westus", "sku": "Standard_LRS"}))),
        );
        assert!(result.is_valid(), "unexpected findings: {:?}", result.errors);
    }

    #[test]
    fn test_missing_required_body() {
        let result = validate_request(&cache(), &request(VALID_URL, None));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::MissingRequiredParameter);
        assert_eq!(result.errors[0].path.as_deref(), Some("accountParameters"));
    }

    #[test]
    fn test_path_parameter_constraints() {
        let url = VALID_URL.replace("mystore01", "My_Store");
        let result = validate_request(
            &cache(),
            &request(&url, Some(json!({"location": "westus"}))),
        );
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::Pattern]);
        assert_eq!(result.errors[0].path.as_deref(), Some("accountName"));
    }

    #[test]
    fn test_query_coercion_and_bounds() {
        let url = format!("{VALID_URL}&timeout=300");
        let result = validate_request(
            &cache(),
            &request(&url, Some(json!({"location": "westus"}))),
        );
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::Maximum]);

        let url = format!("{VALID_URL}&timeout=ninety");
        let result = validate_request(
            &cache(),
            &request(&url, Some(json!({"location": "westus"}))),
        );
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::InvalidType]);
    }

    #[test]
    fn test_header_format() {
        let mut live = request(VALID_URL, Some(json!({"location": "westus"})));
        live.headers.insert(
            "X-MS-CLIENT-REQUEST-ID".to_string(),
            "not-a-uuid".to_string(),
        );
        let result = validate_request(&cache(), &live);
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::InvalidFormat]);
        assert_eq!(
            result.errors[0].path.as_deref(),
            Some("x-ms-client-request-id")
        );
    }

    #[test]
    fn test_body_findings_point_into_payload() {
        let result = validate_request(
            &cache(),
            &request(
                VALID_URL,
                Some(json!({"sku": "standard_lrs", "unexpected": true})),
            ),
        );
        let mut found: Vec<(ErrorCode, Option<&str>)> = result
            .errors
            .iter()
            .map(|e| (e.code, e.path.as_deref()))
            .collect();
        found.sort_by_key(|(code, _)| code.as_str());
        assert_eq!(
            found,
            vec![
                (ErrorCode::EnumCaseMismatch, Some("sku")),
                (
                    ErrorCode::ObjectAdditionalProperties,
                    Some("unexpected")
                ),
                (
                    ErrorCode::ObjectMissingRequiredProperty,
                    Some("location")
                ),
            ]
        );
    }

    #[test]
    fn test_explicit_query_map_overrides_url() {
        let mut live = request(VALID_URL, Some(json!({"location": "westus"})));
        live.query = Some(
            [
                ("api-version".to_string(), "2024-01-01".to_string()),
                ("timeout".to_string(), "600".to_string()),
            ]
            .into(),
        );
        let result = validate_request(&cache(), &live);
        let codes: Vec<ErrorCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::Maximum]);
    }

    #[test]
    fn test_query_map_supplies_api_version_for_matching() {
        // Captured traffic often carries a bare URL with the query already
        // parsed out; matching must see the supplied map's api-version.
        let bare_url = VALID_URL.split_once('?').unwrap().0;
        let mut live = request(bare_url, Some(json!({"location": "westus"})));
        live.query = Some(
            [("api-version".to_string(), "2024-01-01".to_string())].into(),
        );
        let result = validate_request(&cache(), &live);
        assert!(result.is_valid(), "unexpected findings: {:?}", result.errors);
    }

    #[test]
    fn test_unparsable_url_is_recovered() {
        let live = request("garbage", None);
        let result = validate_request(&cache(), &live);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::ErrorInPreparingRequest);
    }

    #[test]
    fn test_match_failure_becomes_finding() {
        let url = VALID_URL.replace("2024-01-01", "1999-01-01");
        let result = validate_request(&cache(), &request(&url, None));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].code,
            ErrorCode::OperationNotFoundInCacheWithApi
        );
    }
}
