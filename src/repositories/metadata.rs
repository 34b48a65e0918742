//! Accessor for Metadata nodes (one per repository/branch).

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, repo_pk, Metadata};

/// The conventional logical id of the single metadata node.
pub const METADATA_LOGICAL_ID: &str = "meta";

pub struct MetadataRepository {
    db: DbHandle,
}

impl MetadataRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Option<Metadata>, MemoryError> {
        let row = self
            .db
            .query("MATCH (m:Metadata {id: $id}) RETURN m")
            .param("id", gid(repository, branch, METADATA_LOGICAL_ID))
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_metadata(&row)?)),
            None => Ok(None),
        }
    }

    /// MERGE-on-GUID upsert: all fields on create, mutable fields plus
    /// `updated_at` on match, then the PART_OF edge.
    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        name: &str,
        content: &JsonValue,
    ) -> Result<Metadata, MemoryError> {
        let now = Utc::now();
        let guid = gid(repository, branch, METADATA_LOGICAL_ID);
        let encoded = serde_json::to_string(content)
            .map_err(|e| MemoryError::InvalidArgs(format!("metadata content: {e}")))?;

        self.db
            .query(
                "MERGE (m:Metadata {id: $id})
                 ON CREATE SET m.logical_id = $logical_id, m.name = $name,
                               m.content = $content, m.created_at = $now, m.updated_at = $now
                 ON MATCH SET m.name = $name, m.content = $content, m.updated_at = $now",
            )
            .param("id", guid.as_str())
            .param("logical_id", METADATA_LOGICAL_ID)
            .param("name", name)
            .param("content", encoded)
            .param("now", now)
            .run()
            .await?;

        self.db
            .query(
                "MATCH (m:Metadata {id: $id}), (r:Repository {id: $repo_id})
                 MERGE (m)-[:PART_OF]->(r)",
            )
            .param("id", guid.as_str())
            .param("repo_id", repo_pk(repository, branch))
            .run()
            .await?;

        self.find(repository, branch).await?.ok_or_else(|| {
            MemoryError::Internal(format!("metadata vanished after upsert: {guid}"))
        })
    }

    fn row_to_metadata(row: &Row) -> Result<Metadata, MemoryError> {
        let node: Node = row.get("m")?;
        let raw_content: Option<String> = node.get_opt("content")?;
        let content = raw_content
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(JsonValue::Null);
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Metadata {
            id: node
                .get_opt("logical_id")?
                .unwrap_or_else(|| METADATA_LOGICAL_ID.to_string()),
            name: node.get_opt("name")?.unwrap_or_default(),
            content,
            created_at: created_at.unwrap_or_else(Utc::now),
            updated_at: updated_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_row_to_metadata_decodes_content_blob() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:meta".into()));
        properties.insert("logical_id".to_string(), Value::String("meta".into()));
        properties.insert("name".to_string(), Value::String("memory bank".into()));
        properties.insert(
            "content".to_string(),
            Value::String(r#"{"techStack":{"language":"rust"}}"#.into()),
        );

        let mut data = HashMap::new();
        data.insert(
            "m".to_string(),
            Value::Node(Node {
                label: "Metadata".into(),
                properties,
            }),
        );

        let metadata = MetadataRepository::row_to_metadata(&Row::new(data)).unwrap();
        assert_eq!(metadata.id, "meta");
        assert_eq!(metadata.content["techStack"]["language"], "rust");
    }
}
