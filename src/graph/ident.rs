//! Sanitization for identifiers embedded in query text.
//!
//! Node labels and relationship types cannot be bound as parameters, so
//! where they must be spliced into a query string they are first reduced to
//! `[A-Za-z0-9_]`. An identifier that sanitizes to the empty string means
//! the call is refused, never a query with a hole in it.

use crate::error::MemoryError;

/// Reduces `raw` to the characters allowed in an embedded identifier.
///
/// Returns `None` when nothing survives; callers must treat that as
/// "refuse the call".
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Sanitizes a relationship-type filter list and joins it with `|` for a
/// variable-length pattern. Empty input or fully rejected entries refuse
/// the call.
pub fn sanitize_rel_types(types: &[String]) -> Result<String, MemoryError> {
    let cleaned: Vec<String> = types
        .iter()
        .filter_map(|t| sanitize_identifier(t))
        .collect();
    if cleaned.is_empty() {
        return Err(MemoryError::InvalidArgs(
            "no valid relationship types after sanitization".into(),
        ));
    }
    Ok(cleaned.join("|"))
}

/// Sanitizes a single label, failing with `INVALID_ARGS` when empty.
pub fn require_identifier(raw: &str) -> Result<String, MemoryError> {
    sanitize_identifier(raw)
        .ok_or_else(|| MemoryError::InvalidArgs(format!("invalid identifier: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(
            sanitize_identifier("DEPENDS_ON"),
            Some("DEPENDS_ON".to_string())
        );
    }

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(
            sanitize_identifier("DEPENDS ON; DROP--"),
            Some("DEPENDSONDROP".to_string())
        );
    }

    #[test]
    fn test_empty_is_refused() {
        assert_eq!(sanitize_identifier("!!! ---"), None);
        assert!(require_identifier("${}").is_err());
    }

    #[test]
    fn test_rel_type_join() {
        let joined =
            sanitize_rel_types(&["DEPENDS_ON".to_string(), "IMPLEMENTS".to_string()]).unwrap();
        assert_eq!(joined, "DEPENDS_ON|IMPLEMENTS");
    }

    #[test]
    fn test_rel_type_all_invalid() {
        assert!(sanitize_rel_types(&["***".to_string()]).is_err());
    }
}
