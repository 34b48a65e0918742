//! Application error types with MCP protocol conversion.

use std::path::PathBuf;

use rmcp::model::ErrorCode;
use thiserror::Error;

/// Application-level errors for the memory bank core.
#[derive(Error, Debug)]
pub enum MemoryError {
    // Argument and precondition errors
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("No memory bank initialized for this session. Call memory-bank init first.")]
    PreconditionRequired,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // Filesystem and engine errors
    #[error("Permission denied: {}", path.display())]
    Permission { path: PathBuf },

    #[error("Database is locked{}", lock_path.as_ref().map(|p| format!(" (lock file: {})", p.display())).unwrap_or_default())]
    Lock { lock_path: Option<PathBuf> },

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Query error: {message}")]
    Query { message: String, query: String },

    // Destructive-operation guards
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::InvalidArgs(_) => "INVALID_ARGS",
            MemoryError::PreconditionRequired => "PRECONDITION_REQUIRED",
            MemoryError::NotFound { .. } => "NOT_FOUND",
            MemoryError::Permission { .. } => "PERMISSION_ERROR",
            MemoryError::Lock { .. } => "LOCK_ERROR",
            MemoryError::Timeout(_) => "TIMEOUT",
            MemoryError::Query { .. } => "QUERY_ERROR",
            MemoryError::ConfirmationRequired(_) => "CONFIRMATION_REQUIRED",
            MemoryError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            MemoryError::Config(_) => "INTERNAL_ERROR",
            MemoryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Builds a query error carrying a truncated snippet of the offending query.
    pub fn query(message: impl Into<String>, query: &str) -> Self {
        let snippet: String = query.chars().take(200).collect();
        MemoryError::Query {
            message: message.into(),
            query: snippet,
        }
    }

    /// Annotates the error message with the tool-call scope.
    ///
    /// The service layer adds no catch of its own; it tags the error with
    /// where it happened and re-throws.
    pub fn with_scope(self, tool: &str, repository: &str, branch: &str) -> Self {
        match self {
            MemoryError::Internal(msg) => MemoryError::Internal(format!(
                "{msg} (tool={tool}, repository={repository}, branch={branch})"
            )),
            MemoryError::Query { message, query } => MemoryError::Query {
                message: format!(
                    "{message} (tool={tool}, repository={repository}, branch={branch})"
                ),
                query,
            },
            other => other,
        }
    }
}

impl From<MemoryError> for rmcp::model::ErrorData {
    fn from(err: MemoryError) -> Self {
        let code = match &err {
            MemoryError::NotFound { .. } => ErrorCode::RESOURCE_NOT_FOUND,
            MemoryError::InvalidArgs(_)
            | MemoryError::ConfirmationRequired(_)
            | MemoryError::UnsupportedOperation(_) => ErrorCode::INVALID_PARAMS,
            MemoryError::PreconditionRequired => ErrorCode::INVALID_REQUEST,
            MemoryError::Permission { .. }
            | MemoryError::Lock { .. }
            | MemoryError::Timeout(_)
            | MemoryError::Query { .. }
            | MemoryError::Config(_)
            | MemoryError::Internal(_) => ErrorCode::INTERNAL_ERROR,
        };

        rmcp::model::ErrorData::new(code, format!("[{}] {}", err.code(), err), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(
            MemoryError::PreconditionRequired.code(),
            "PRECONDITION_REQUIRED"
        );
        assert_eq!(
            MemoryError::NotFound {
                kind: "Component",
                id: "c1".into()
            }
            .code(),
            "NOT_FOUND"
        );
        assert_eq!(MemoryError::Timeout(30_000).code(), "TIMEOUT");
        assert_eq!(
            MemoryError::ConfirmationRequired("bulk delete".into()).code(),
            "CONFIRMATION_REQUIRED"
        );
    }

    #[test]
    fn test_query_snippet_truncated() {
        let long = "MATCH (n) ".repeat(100);
        let err = MemoryError::query("boom", &long);
        match err {
            MemoryError::Query { query, .. } => assert_eq!(query.chars().count(), 200),
            _ => panic!("expected query error"),
        }
    }

    #[test]
    fn test_scope_annotation_keeps_code() {
        let err =
            MemoryError::query("engine said no", "RETURN 1").with_scope("entity", "repo", "main");
        assert_eq!(err.code(), "QUERY_ERROR");
        assert!(err.to_string().contains("repository=repo"));
    }
}
