//! Validation findings, the error-code taxonomy, and result aggregation.
//!
//! Every finding a validator produces funnels through one code space,
//! [`ErrorCode`], regardless of whether it originated in operation matching,
//! request shape checks, or the structural checker's raw vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The traffic does not conform to the contract.
    Error,
    /// Worth surfacing, but not a conformance failure.
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// The taxonomy of validation finding codes.
///
/// Naming follows the codes as they appear in reports: operation-matching and
/// response-policy codes are PascalCase, shape codes are SCREAMING_SNAKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Operation matching
    OperationNotFoundInCacheWithProvider,
    OperationNotFoundInCacheWithApi,
    OperationNotFoundInCacheWithVerb,
    OperationNotFoundInCache,

    // Request shape
    #[serde(rename = "MISSING_REQUIRED_PARAMETER")]
    MissingRequiredParameter,
    ErrorInPreparingRequest,

    // Structural mismatches (request and response values)
    #[serde(rename = "INVALID_TYPE")]
    InvalidType,
    #[serde(rename = "INVALID_FORMAT")]
    InvalidFormat,
    #[serde(rename = "ENUM_MISMATCH")]
    EnumMismatch,
    #[serde(rename = "ENUM_CASE_MISMATCH")]
    EnumCaseMismatch,
    #[serde(rename = "OBJECT_MISSING_REQUIRED_PROPERTY")]
    ObjectMissingRequiredProperty,
    #[serde(rename = "OBJECT_ADDITIONAL_PROPERTIES")]
    ObjectAdditionalProperties,
    #[serde(rename = "MAX_LENGTH")]
    MaxLength,
    #[serde(rename = "MIN_LENGTH")]
    MinLength,
    #[serde(rename = "MAXIMUM")]
    Maximum,
    #[serde(rename = "MINIMUM")]
    Minimum,
    #[serde(rename = "PATTERN")]
    Pattern,
    /// Structural mismatch reported by the checker in a vocabulary this
    /// taxonomy has no dedicated code for.
    #[serde(rename = "SCHEMA_VALIDATION_ERROR")]
    SchemaValidationError,

    // Response shape
    #[serde(rename = "INVALID_RESPONSE_CODE")]
    InvalidResponseCode,
    ResponseSchemaNotInSpec,
    ResponseStatusCodeNotInSpec,
    /// A header declared on the matched response is absent (warning-only).
    #[serde(rename = "MISSING_RESPONSE_HEADER")]
    MissingResponseHeader,

    // Ambiguity surfacing (warning-only)
    #[serde(rename = "MULTIPLE_OPERATIONS_FOUND")]
    MultipleOperationsFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::OperationNotFoundInCacheWithProvider => "OperationNotFoundInCacheWithProvider",
            ErrorCode::OperationNotFoundInCacheWithApi => "OperationNotFoundInCacheWithApi",
            ErrorCode::OperationNotFoundInCacheWithVerb => "OperationNotFoundInCacheWithVerb",
            ErrorCode::OperationNotFoundInCache => "OperationNotFoundInCache",
            ErrorCode::MissingRequiredParameter => "MISSING_REQUIRED_PARAMETER",
            ErrorCode::ErrorInPreparingRequest => "ErrorInPreparingRequest",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::EnumMismatch => "ENUM_MISMATCH",
            ErrorCode::EnumCaseMismatch => "ENUM_CASE_MISMATCH",
            ErrorCode::ObjectMissingRequiredProperty => "OBJECT_MISSING_REQUIRED_PROPERTY",
            ErrorCode::ObjectAdditionalProperties => "OBJECT_ADDITIONAL_PROPERTIES",
            ErrorCode::MaxLength => "MAX_LENGTH",
            ErrorCode::MinLength => "MIN_LENGTH",
            ErrorCode::Maximum => "MAXIMUM",
            ErrorCode::Minimum => "MINIMUM",
            ErrorCode::Pattern => "PATTERN",
            ErrorCode::SchemaValidationError => "SCHEMA_VALIDATION_ERROR",
            ErrorCode::InvalidResponseCode => "INVALID_RESPONSE_CODE",
            ErrorCode::ResponseSchemaNotInSpec => "ResponseSchemaNotInSpec",
            ErrorCode::ResponseStatusCodeNotInSpec => "ResponseStatusCodeNotInSpec",
            ErrorCode::MissingResponseHeader => "MISSING_RESPONSE_HEADER",
            ErrorCode::MultipleOperationsFound => "MULTIPLE_OPERATIONS_FOUND",
        }
    }

    /// Map the structural checker's raw vocabulary into the taxonomy.
    pub fn from_raw(code: &str) -> ErrorCode {
        match code {
            "INVALID_TYPE" => ErrorCode::InvalidType,
            "INVALID_FORMAT" => ErrorCode::InvalidFormat,
            "ENUM_MISMATCH" => ErrorCode::EnumMismatch,
            "ENUM_CASE_MISMATCH" => ErrorCode::EnumCaseMismatch,
            "OBJECT_MISSING_REQUIRED_PROPERTY" => ErrorCode::ObjectMissingRequiredProperty,
            "OBJECT_ADDITIONAL_PROPERTIES" => ErrorCode::ObjectAdditionalProperties,
            "MAX_LENGTH" => ErrorCode::MaxLength,
            "MIN_LENGTH" => ErrorCode::MinLength,
            "MAXIMUM" => ErrorCode::Maximum,
            "MINIMUM" => ErrorCode::Minimum,
            "PATTERN" => ErrorCode::Pattern,
            _ => ErrorCode::SchemaValidationError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    /// Pointer into the schema/payload where the mismatch occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ValidationError {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError {
            severity: Severity::Error,
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError {
            severity: Severity::Warning,
            code,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.is_empty() {
            self.path = Some(path);
        }
        self
    }
}

/// Accumulated findings of one validation call.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding, routed by severity.
    pub fn add(&mut self, finding: ValidationError) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the traffic conformed (warnings do not fail conformance).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// A new result containing only errors whose code is in the allow-list.
    /// An empty allow-list passes everything through. Warnings are not
    /// filtered. The receiver is left untouched.
    pub fn filtered(&self, include_errors: &[ErrorCode]) -> ValidationResult {
        if include_errors.is_empty() {
            return self.clone();
        }
        ValidationResult {
            errors: self
                .errors
                .iter()
                .filter(|e| include_errors.contains(&e.code))
                .cloned()
                .collect(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Options for combined request/response reporting.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// When non-empty, only errors with these codes are reported.
    pub include_errors: Vec<ErrorCode>,
}

/// Combined report for one live transaction.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub request_validation_result: ValidationResult,
    pub response_validation_result: ValidationResult,
}

impl ValidationReport {
    /// Single merged view over both sides of the transaction.
    pub fn combined(&self) -> ValidationResult {
        let mut combined = self.request_validation_result.clone();
        combined.merge(self.response_validation_result.clone());
        combined
    }

    pub fn is_valid(&self) -> bool {
        self.request_validation_result.is_valid() && self.response_validation_result.is_valid()
    }
}

/// Combine per-side results into a report, applying the `includeErrors`
/// allow-list as a filtered view.
pub fn aggregate(
    request: &ValidationResult,
    response: &ValidationResult,
    options: &ReportOptions,
) -> ValidationReport {
    ValidationReport {
        request_validation_result: request.filtered(&options.include_errors),
        response_validation_result: response.filtered(&options.include_errors),
    }
}
