//! Accessor for project-global Tag nodes and TAGGED_WITH edges.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{require_identifier, Node, QueryExt, Row};
use crate::models::{repo_pk, Tag};

/// Node labels that can carry a TAGGED_WITH edge.
pub const TAGGABLE_LABELS: &[&str] = &["Component", "Decision", "Rule", "File"];

/// Caller-supplied fields for a tag upsert.
#[derive(Debug, Clone)]
pub struct TagInput {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

pub struct TagRepository {
    db: DbHandle,
}

impl TagRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Tags are keyed by logical id, global within a project database.
    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        input: TagInput,
    ) -> Result<Tag, MemoryError> {
        let now = Utc::now();

        self.db
            .query(
                "MERGE (t:Tag {id: $id})
                 ON CREATE SET t.name = $name, t.category = $category,
                               t.description = $description, t.color = $color,
                               t.created_at = $now, t.updated_at = $now
                 ON MATCH SET t.name = $name, t.category = $category,
                              t.description = $description, t.color = $color,
                              t.updated_at = $now",
            )
            .param("id", input.id.as_str())
            .param("name", input.name.as_str())
            .param("category", input.category.clone())
            .param("description", input.description.clone())
            .param("color", input.color.clone())
            .param("now", now)
            .run()
            .await?;

        // Tags still scope to the repository they were created under.
        self.db
            .query(
                "MATCH (t:Tag {id: $id}), (r:Repository {id: $repo_id})
                 MERGE (t)-[:PART_OF]->(r)",
            )
            .param("id", input.id.as_str())
            .param("repo_id", repo_pk(repository, branch))
            .run()
            .await?;

        self.find_by_id(&input.id).await?.ok_or_else(|| {
            MemoryError::Internal(format!("tag vanished after upsert: {}", input.id))
        })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Tag>, MemoryError> {
        let row = self
            .db
            .query("MATCH (t:Tag {id: $id}) RETURN t")
            .param("id", id)
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_tag(&row)?)),
            None => Ok(None),
        }
    }

    /// Tags scoped to (repository, branch), by name.
    pub async fn list(&self, repository: &str, branch: &str) -> Result<Vec<Tag>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (t:Tag)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN t ORDER BY t.name",
            )
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter().map(Self::row_to_tag).collect()
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, MemoryError> {
        let row = self
            .db
            .query("MATCH (t:Tag {name: $name}) RETURN t")
            .param("name", name)
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_tag(&row)?)),
            None => Ok(None),
        }
    }

    /// Attaches a tag to an item. The label must be taggable; it is
    /// sanitized before being embedded, the ids are bound as parameters.
    /// Returns false when either endpoint is missing.
    pub async fn add_item_tag(
        &self,
        item_label: &str,
        item_id: &str,
        tag_id: &str,
    ) -> Result<bool, MemoryError> {
        let label = require_identifier(item_label)?;
        if !TAGGABLE_LABELS.contains(&label.as_str()) {
            return Err(MemoryError::InvalidArgs(format!(
                "label '{label}' is not taggable"
            )));
        }

        let exists = self
            .db
            .query(&format!(
                "MATCH (n:{label} {{id: $item_id}}), (t:Tag {{id: $tag_id}})
                 RETURN n.id AS id"
            ))
            .param("item_id", item_id)
            .param("tag_id", tag_id)
            .fetch_one()
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        self.db
            .query(&format!(
                "MATCH (n:{label} {{id: $item_id}}), (t:Tag {{id: $tag_id}})
                 MERGE (n)-[:TAGGED_WITH]->(t)"
            ))
            .param("item_id", item_id)
            .param("tag_id", tag_id)
            .run()
            .await?;
        Ok(true)
    }

    /// Heterogeneous listing of everything carrying a tag, as
    /// `{id, type, ...properties}` objects.
    pub async fn find_items_by_tag(
        &self,
        tag_id: &str,
        item_type_filter: Option<&str>,
    ) -> Result<Vec<JsonValue>, MemoryError> {
        let labels: Vec<String> = match item_type_filter {
            Some(filter) => {
                let label = require_identifier(filter)?;
                if !TAGGABLE_LABELS.contains(&label.as_str()) {
                    return Err(MemoryError::InvalidArgs(format!(
                        "label '{label}' is not taggable"
                    )));
                }
                vec![label]
            }
            None => TAGGABLE_LABELS.iter().map(|l| l.to_string()).collect(),
        };

        let mut items = Vec::new();
        for label in labels {
            let rows = self
                .db
                .query(&format!(
                    "MATCH (n:{label})-[:TAGGED_WITH]->(t:Tag {{id: $tag_id}})
                     RETURN n ORDER BY n.id"
                ))
                .param("tag_id", tag_id)
                .fetch_all()
                .await?;

            for row in &rows {
                let node: Node = row.get("n")?;
                let mut object = serde_json::Map::new();
                object.insert("type".into(), JsonValue::String(label.clone()));
                for (key, value) in &node.properties {
                    object.insert(key.clone(), value.to_json());
                }
                items.push(JsonValue::Object(object));
            }
        }
        Ok(items)
    }

    pub(crate) fn row_to_tag(row: &Row) -> Result<Tag, MemoryError> {
        let node: Node = row.get("t")?;
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Tag {
            id: node.get("id")?,
            name: node.get_opt("name")?.unwrap_or_default(),
            category: node.get_opt("category")?,
            description: node.get_opt("description")?,
            color: node.get_opt("color")?,
            created_at: created_at.unwrap_or_else(Utc::now),
            updated_at: updated_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taggable_labels_are_fixed() {
        assert!(TAGGABLE_LABELS.contains(&"Component"));
        assert!(!TAGGABLE_LABELS.contains(&"Repository"));
    }
}
