//! Domain entities stored in a project's memory bank.
//!
//! All structs expose the logical id; the graph-unique id is an engine
//! concern handled in the repository layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A (repository, branch) scope node. One exists per memory-bank init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Primary key `repository:branch`.
    pub id: String,
    pub name: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Free-form structured metadata, one node per (repository, branch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Logical id, conventionally `meta`.
    pub id: String,
    pub name: String,
    /// Free-form structured blob.
    pub content: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Daily working context: what an agent did and observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Logical id, conventionally `context-YYYY-MM-DD`.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub iso_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub observations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    #[default]
    Active,
    Deprecated,
    Planned,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Active => "active",
            ComponentStatus::Deprecated => "deprecated",
            ComponentStatus::Planned => "planned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ComponentStatus::Active),
            "deprecated" => Some(ComponentStatus::Deprecated),
            "planned" => Some(ComponentStatus::Planned),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An architectural component and its one-hop dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: ComponentStatus,
    /// Logical ids reachable by one outgoing DEPENDS_ON hop.
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recorded engineering decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub name: String,
    /// Prose context for the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A governance rule that may apply to components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub created: NaiveDate,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured blob carried by a File node.
///
/// The `branch` field always equals the branch segment of the owning
/// repository's key; it is set at write time, never by callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// An ingested source file, linkable to the components implementing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub metadata: FileMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project-global label attachable to any taggable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ComponentStatus::Active,
            ComponentStatus::Deprecated,
            ComponentStatus::Planned,
        ] {
            assert_eq!(ComponentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ComponentStatus::parse("retired"), None);
    }

    #[test]
    fn test_file_metadata_json_roundtrip() {
        let metadata = FileMetadata {
            branch: "main".into(),
            content: Some("fn main() {}".into()),
            metrics: Some(serde_json::json!({"loc": 1})),
            mime_type: Some("text/x-rust".into()),
        };
        let encoded = serde_json::to_string(&metadata).unwrap();
        let decoded: FileMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.branch, "main");
        assert_eq!(decoded.metrics.unwrap()["loc"], 1);
    }
}
