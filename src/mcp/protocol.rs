//! MCP protocol response helpers.

use rmcp::model::CallToolResult;
use serde::Serialize;

use crate::error::MemoryError;

/// Single-item response that serializes as the raw inner value.
///
/// Use this for tool responses that return one object; the inner value is
/// serialized directly without wrapping.
///
/// # Example
///
/// ```ignore
/// let component = service.get_component(...).await?;
/// Response(component).into()
/// ```
pub struct Response<T>(pub T);

impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T: Serialize> From<Response<T>> for Result<CallToolResult, rmcp::model::ErrorData> {
    fn from(response: Response<T>) -> Self {
        let value = serde_json::to_value(&response.0).map_err(|e| {
            rmcp::model::ErrorData::internal_error(format!("serialization failed: {e}"), None)
        })?;
        let content = rmcp::model::Content::json(value).map_err(|e| {
            rmcp::model::ErrorData::internal_error(format!("content encoding failed: {e}"), None)
        })?;
        Ok(CallToolResult::success(vec![content]))
    }
}

/// Wraps a service error as a failed tool result.
///
/// The payload is `{success: false, error, errorId}` and the result is
/// marked as an error. The fresh error id correlates the client-visible
/// failure with server logs without leaking internals.
pub fn error_result(err: MemoryError) -> CallToolResult {
    let error_id = uuid::Uuid::new_v4().to_string();
    tracing::error!(error_id = %error_id, code = err.code(), "tool call failed: {err}");

    let payload = serde_json::json!({
        "success": false,
        "error": format!("[{}] {}", err.code(), err),
        "errorId": error_id,
    });

    match rmcp::model::Content::json(payload) {
        Ok(content) => CallToolResult::error(vec![content]),
        Err(_) => CallToolResult::error(vec![rmcp::model::Content::text(format!(
            "[{}] {} (errorId: {error_id})",
            err.code(),
            err
        ))]),
    }
}

/// Shorthand for handler bodies: success wraps, failure becomes an
/// `isError` tool result instead of a protocol error.
pub fn wrap<T: Serialize>(
    result: Result<T, MemoryError>,
) -> Result<CallToolResult, rmcp::model::ErrorData> {
    match result {
        Ok(value) => Response(value).into(),
        Err(err) => Ok(error_result(err)),
    }
}
