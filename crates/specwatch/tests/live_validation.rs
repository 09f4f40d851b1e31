//! End-to-end validation of captured transactions against a small contract
//! set: build the cache, match traffic, validate both sides, aggregate.

use serde_json::json;
use specwatch::{
    build_cache, match_operations, validate_request, validate_request_response, validate_response,
    CacheOptions, ContractDocument, ErrorCode, HttpVerb, LiveRequest, LiveResponse, ReportOptions,
    RequestContext, UNKNOWN_PROVIDER,
};

fn storage_contract() -> ContractDocument {
    ContractDocument::from_json(json!({
        "source": "storage.json",
        "apiVersion": "2024-01-01",
        "operations": [
            {
                "operationId": "StorageAccounts_List",
                "httpVerb": "get",
                "pathTemplate": "/subscriptions/{subscriptionId}/providers/Microsoft.Storage/storageAccounts",
                "parameters": [
                    {"name": "subscriptionId", "in": "path", "required": true,
                     "schema": {"type": "string"}},
                    {"name": "api-version", "in": "query", "required": true,
                     "schema": {"type": "string"}}
                ],
                "responses": {
                    "200": {
                        "schema": {
                            "type": "object",
                            "properties": {"value": {"type": "array", "items": {"type": "object"}}}
                        }
                    },
                    "default": {
                        "schema": {
                            "type": "object",
                            "properties": {"error": {"type": "object"}}
                        }
                    }
                },
                "producesContentTypes": ["application/json"]
            },
            {
                "operationId": "StorageAccounts_Create",
                "httpVerb": "put",
                "pathTemplate": "/subscriptions/{subscriptionId}/providers/Microsoft.Storage/storageAccounts/{accountName}",
                "parameters": [
                    {"name": "subscriptionId", "in": "path", "required": true,
                     "schema": {"type": "string"}},
                    {"name": "accountName", "in": "path", "required": true,
                     "schema": {"type": "string", "minLength": 3, "maxLength": 24}},
                    {"name": "api-version", "in": "query", "required": true,
                     "schema": {"type": "string"}},
                    {"name": "parameters", "in": "body", "required": true,
                     "schema": {
                         "type": "object",
                         "required": ["location"],
                         "properties": {
                             "location": {"type": "string"},
                             "id": {"type": "string", "format": "uuid"},
                             "capacity": {"type": "integer"}
                         },
                         "additionalProperties": false
                     }}
                ],
                "responses": {"200": {}}
            },
            {
                "operationId": "Subscriptions_Get",
                "httpVerb": "get",
                "pathTemplate": "/subscriptions/{subscriptionId}",
                "responses": {"200": {}}
            }
        ]
    }))
    .unwrap()
}

fn cache() -> specwatch::OperationCache {
    build_cache([Ok(storage_contract())], CacheOptions::default())
        .unwrap()
        .cache
}

const LIST_URL: &str = "https://management.example.com/subscriptions/sub1/providers/Microsoft.Storage/storageAccounts?api-version=2024-01-01";
const CREATE_URL: &str = "https://management.example.com/subscriptions/sub1/providers/Microsoft.Storage/storageAccounts/mystore?api-version=2024-01-01";

#[test]
fn every_operation_lands_in_exactly_one_bucket() {
    let cache = cache();
    assert_eq!(cache.len(), 3);

    let storage_get = cache.bucket_operation_ids("microsoft.storage", "2024-01-01", HttpVerb::Get);
    let storage_put = cache.bucket_operation_ids("microsoft.storage", "2024-01-01", HttpVerb::Put);
    let no_provider = cache.bucket_operation_ids(UNKNOWN_PROVIDER, "2024-01-01", HttpVerb::Get);

    assert_eq!(storage_get, vec!["StorageAccounts_List"]);
    assert_eq!(storage_put, vec!["StorageAccounts_Create"]);
    assert_eq!(no_provider, vec!["Subscriptions_Get"]);
}

#[test]
fn cache_build_is_idempotent() {
    let a = cache();
    let b = cache();
    assert_eq!(a.stats(), b.stats());
    assert_eq!(
        a.bucket_operation_ids("microsoft.storage", "2024-01-01", HttpVerb::Get),
        b.bucket_operation_ids("microsoft.storage", "2024-01-01", HttpVerb::Get)
    );
}

#[test]
fn match_resolves_the_expected_template() {
    let cache = cache();
    let outcome = match_operations(&cache, LIST_URL, "GET").unwrap();
    assert_eq!(outcome.operations.len(), 1);
    assert_eq!(
        outcome.operations[0].path_template.raw(),
        "/subscriptions/{subscriptionId}/providers/Microsoft.Storage/storageAccounts"
    );
}

#[test]
fn match_failures_name_the_missing_level() {
    let cache = cache();

    let unloaded_version = LIST_URL.replace("2024-01-01", "2020-06-01");
    let outcome = match_operations(&cache, &unloaded_version, "GET").unwrap();
    assert!(outcome.operations.is_empty());
    assert_eq!(
        outcome.failure.unwrap().code(),
        ErrorCode::OperationNotFoundInCacheWithApi
    );

    let unloaded_provider = LIST_URL.replace("Microsoft.Storage", "Microsoft.Network");
    let outcome = match_operations(&cache, &unloaded_provider, "GET").unwrap();
    assert_eq!(
        outcome.failure.unwrap().code(),
        ErrorCode::OperationNotFoundInCacheWithProvider
    );

    let outcome = match_operations(&cache, LIST_URL, "PATCH").unwrap();
    assert_eq!(
        outcome.failure.unwrap().code(),
        ErrorCode::OperationNotFoundInCacheWithVerb
    );

    let unmatched_path = LIST_URL.replace("storageAccounts", "blobServices");
    let outcome = match_operations(&cache, &unmatched_path, "GET").unwrap();
    assert_eq!(
        outcome.failure.unwrap().code(),
        ErrorCode::OperationNotFoundInCache
    );
}

#[test]
fn undeclared_error_code_accepted_through_default() {
    let cache = cache();
    let context = RequestContext {
        url: LIST_URL.to_string(),
        method: "GET".to_string(),
    };

    let not_found: LiveResponse = serde_json::from_value(json!({
        "statusCode": 404,
        "headers": {"content-type": "application/json"},
        "body": {"error": {"code": "NotFound"}}
    }))
    .unwrap();
    let result = validate_response(&cache, &not_found, &context);
    assert!(result.is_valid(), "findings: {:?}", result.errors);

    let redirect: LiveResponse = serde_json::from_value(json!({
        "statusCode": 300,
        "headers": {"content-type": "application/json"},
        "body": {}
    }))
    .unwrap();
    let result = validate_response(&cache, &redirect, &context);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ErrorCode::InvalidResponseCode);
}

fn non_conforming_create() -> LiveRequest {
    // Violates INVALID_TYPE (capacity), INVALID_FORMAT (id), and
    // OBJECT_ADDITIONAL_PROPERTIES (extra) in one payload.
    serde_json::from_value(json!({
        "url": CREATE_URL,
        "method": "PUT",
        "headers": {},
        "body": {
            "location": "westus",
            "id": "not-a-uuid",
            "capacity": "ten",
            "extra": true
        }
    }))
    .unwrap()
}

#[test]
fn include_errors_filters_the_report() {
    let cache = cache();
    let response: LiveResponse = serde_json::from_value(json!({"statusCode": 200})).unwrap();

    let unfiltered = validate_request_response(
        &cache,
        &non_conforming_create(),
        &response,
        &ReportOptions::default(),
    );
    let mut codes: Vec<&str> = unfiltered
        .request_validation_result
        .errors
        .iter()
        .map(|e| e.code.as_str())
        .collect();
    codes.sort();
    assert_eq!(
        codes,
        vec![
            "INVALID_FORMAT",
            "INVALID_TYPE",
            "OBJECT_ADDITIONAL_PROPERTIES"
        ]
    );

    let filtered = validate_request_response(
        &cache,
        &non_conforming_create(),
        &response,
        &ReportOptions {
            include_errors: vec![ErrorCode::InvalidType],
        },
    );
    assert_eq!(filtered.request_validation_result.errors.len(), 1);
    assert_eq!(
        filtered.request_validation_result.errors[0].code,
        ErrorCode::InvalidType
    );

    // An empty allow-list is the same as no filtering.
    let empty = validate_request_response(
        &cache,
        &non_conforming_create(),
        &response,
        &ReportOptions {
            include_errors: vec![],
        },
    );
    assert_eq!(
        empty.request_validation_result,
        unfiltered.request_validation_result
    );
}

#[test]
fn supplied_query_map_drives_matching_and_validation() {
    let cache = cache();
    let bare_url = CREATE_URL.split_once('?').unwrap().0;
    let mut request: LiveRequest = serde_json::from_value(json!({
        "url": bare_url,
        "method": "PUT",
        "headers": {},
        "body": {"location": "westus"}
    }))
    .unwrap();
    request.query = Some(
        [("api-version".to_string(), "2024-01-01".to_string())].into(),
    );

    let result = validate_request(&cache, &request);
    assert!(result.is_valid(), "findings: {:?}", result.errors);
}

#[test]
fn combined_and_split_entry_points_agree() {
    let cache = cache();
    let request = non_conforming_create();
    let response: LiveResponse = serde_json::from_value(json!({
        "statusCode": 404,
        "headers": {"content-type": "application/json"},
        "body": {"error": {}}
    }))
    .unwrap();

    let combined =
        validate_request_response(&cache, &request, &response, &ReportOptions::default());

    let split_request = validate_request(&cache, &request);
    let split_response =
        validate_response(&cache, &response, &RequestContext::from(&request));

    assert_eq!(combined.request_validation_result, split_request);
    assert_eq!(combined.response_validation_result, split_response);
}

#[test]
fn report_serializes_for_caller_formatting() {
    let cache = cache();
    let response: LiveResponse = serde_json::from_value(json!({"statusCode": 200})).unwrap();
    let report = validate_request_response(
        &cache,
        &non_conforming_create(),
        &response,
        &ReportOptions::default(),
    );

    let value = serde_json::to_value(&report).unwrap();
    assert!(value.get("requestValidationResult").is_some());
    assert!(value.get("responseValidationResult").is_some());
    let first = &value["requestValidationResult"]["errors"][0];
    assert!(first.get("code").is_some());
    assert!(first.get("message").is_some());
    assert_eq!(first["severity"], "error");
}
