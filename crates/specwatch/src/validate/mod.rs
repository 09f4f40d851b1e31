//! Request and response validators over a matched operation.
//!
//! Both validators share the same outer shape: match the transaction's URL and
//! verb against the cache, surface a match failure as a single coded finding,
//! otherwise check the concrete payload against the matched operation. All
//! findings funnel through the taxonomy in [`crate::result::ErrorCode`]; the
//! structural checker's raw vocabulary never leaks into a report.

mod request;
mod response;

pub use request::validate_request;
pub use response::validate_response;

use crate::operation::Operation;
use crate::result::{ErrorCode, ValidationError};
use crate::schema::{RawIssue, Schema};
use serde_json::Value;
use std::sync::Arc;

/// Translate one raw structural issue into a taxonomy finding, anchoring its
/// path under `root` (a parameter name, `headers.<name>`, or `""` for a body).
pub(crate) fn translate_issue(raw: RawIssue, root: &str) -> ValidationError {
    let path = if root.is_empty() {
        raw.path
    } else if raw.path.is_empty() {
        root.to_string()
    } else if raw.path.starts_with('[') {
        format!("{root}{}", raw.path)
    } else {
        format!("{root}.{}", raw.path)
    };
    ValidationError::error(ErrorCode::from_raw(&raw.code), raw.message).with_path(path)
}

/// Warning attached when a transaction matched more than one operation; the
/// validators check against the first and name the rest.
pub(crate) fn ambiguity_warning(operations: &[Arc<Operation>]) -> Option<ValidationError> {
    if operations.len() < 2 {
        return None;
    }
    let others: Vec<&str> = operations[1..]
        .iter()
        .map(|op| op.operation_id.as_str())
        .collect();
    Some(ValidationError::warning(
        ErrorCode::MultipleOperationsFound,
        format!(
            "request matched {} operations; validated against '{}', also matched: {}",
            operations.len(),
            operations[0].operation_id,
            others.join(", ")
        ),
    ))
}

/// Coerce a string carried in the URL or a header toward the declared scalar
/// type before the structural check; an unparsable value stays a string so
/// the checker reports the type mismatch.
pub(crate) fn coerce_scalar(text: &str, schema: &Schema) -> Value {
    match schema.kind.as_deref() {
        Some("integer") => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        Some("number") => text
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| Value::String(text.to_string())),
        Some("boolean") => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        _ => Value::String(text.to_string()),
    }
}
