//! Bulk deletion protocols with referential consistency.
//!
//! Every destructive call requires `confirm = true`; `dry_run` returns the
//! would-be-deleted set without touching the graph. Deletions are DETACH
//! deletes, so dangling edges go with the node.

use serde::Serialize;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::QueryExt;
use crate::models::{gid, repo_pk};

/// Labels that live inside a (repository, branch) scope.
const BRANCH_SCOPED_LABELS: &[&str] = &[
    "Component",
    "Decision",
    "Rule",
    "File",
    "Tag",
    "Context",
    "Metadata",
];

/// Labels that can carry TAGGED_WITH edges.
const TAGGABLE_LABELS: &[&str] = &["Component", "Decision", "Rule", "File"];

/// What to delete.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    Single { entity_type: String, id: String },
    ByType { entity_type: String },
    ByTag { tag_id: String },
    ByBranch,
    ByRepository,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub count: usize,
    pub entities: Vec<DeletedEntity>,
    pub warnings: Vec<String>,
    pub message: String,
}

pub struct BulkRepository {
    db: DbHandle,
}

impl BulkRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Runs a delete protocol against (repository, branch).
    pub async fn delete(
        &self,
        repository: &str,
        branch: &str,
        target: DeleteTarget,
        confirm: bool,
        dry_run: bool,
    ) -> Result<DeleteOutcome, MemoryError> {
        if !dry_run && !confirm {
            return Err(MemoryError::ConfirmationRequired(
                "confirm=true is required for delete operations".into(),
            ));
        }

        let (entities, warnings) = self.collect(repository, branch, &target).await?;

        let scope = match &target {
            DeleteTarget::Single { entity_type, id } => format!("{entity_type} {id}"),
            DeleteTarget::ByType { entity_type } => {
                format!("all {entity_type} entities in branch {branch}")
            }
            DeleteTarget::ByTag { tag_id } => format!("entities tagged {tag_id}"),
            DeleteTarget::ByBranch => format!("branch {branch}"),
            DeleteTarget::ByRepository => format!("repository {repository}"),
        };

        if dry_run {
            return Ok(DeleteOutcome {
                count: entities.len(),
                message: format!(
                    "Dry run: {} entities would be deleted from {scope}",
                    entities.len()
                ),
                entities,
                warnings,
            });
        }

        for entity in &entities {
            self.db
                .query(&format!(
                    "MATCH (n:{} {{id: $id}}) DETACH DELETE n",
                    entity.entity_type
                ))
                .param("id", entity.id.as_str())
                .run()
                .await?;
        }

        Ok(DeleteOutcome {
            count: entities.len(),
            message: format!("Deleted {} entities from {scope}", entities.len()),
            entities,
            warnings,
        })
    }

    /// Resolves the would-be-deleted set. Ids here are node primary keys
    /// (graph-unique for branch-scoped entities, logical for File/Tag).
    async fn collect(
        &self,
        repository: &str,
        branch: &str,
        target: &DeleteTarget,
    ) -> Result<(Vec<DeletedEntity>, Vec<String>), MemoryError> {
        let repo_id = repo_pk(repository, branch);
        let mut entities = Vec::new();
        let mut warnings = Vec::new();

        match target {
            DeleteTarget::Single { entity_type, id } => {
                let label = label_for_entity_type(entity_type)?;
                let node_id = node_id_for(label, repository, branch, id);
                let row = self
                    .db
                    .query(&format!("MATCH (n:{label} {{id: $id}}) RETURN n.id AS id"))
                    .param("id", node_id.as_str())
                    .fetch_one()
                    .await?;
                match row {
                    Some(row) => entities.push(DeletedEntity {
                        id: row.get("id")?,
                        entity_type: label.to_string(),
                    }),
                    None => warnings.push(format!("{entity_type} {id} not found")),
                }
            }
            DeleteTarget::ByType { entity_type } => {
                let label = label_for_entity_type(entity_type)?;
                self.collect_label_in_repo(label, &repo_id, &mut entities)
                    .await?;
            }
            DeleteTarget::ByTag { tag_id } => {
                for label in TAGGABLE_LABELS {
                    let rows = self
                        .db
                        .query(&format!(
                            "MATCH (n:{label})-[:TAGGED_WITH]->(t:Tag {{id: $tag_id}})
                             MATCH (n)-[:PART_OF]->(r:Repository {{id: $repo_id}})
                             RETURN n.id AS id ORDER BY id"
                        ))
                        .param("tag_id", tag_id.as_str())
                        .param("repo_id", repo_id.as_str())
                        .fetch_all()
                        .await?;
                    for row in &rows {
                        entities.push(DeletedEntity {
                            id: row.get("id")?,
                            entity_type: label.to_string(),
                        });
                    }
                }
            }
            DeleteTarget::ByBranch => {
                for label in BRANCH_SCOPED_LABELS {
                    self.collect_label_in_repo(label, &repo_id, &mut entities)
                        .await?;
                }
            }
            DeleteTarget::ByRepository => {
                for label in BRANCH_SCOPED_LABELS {
                    let rows = self
                        .db
                        .query(&format!(
                            "MATCH (n:{label})-[:PART_OF]->(r:Repository)
                             WHERE r.name = $name
                             RETURN n.id AS id ORDER BY id"
                        ))
                        .param("name", repository)
                        .fetch_all()
                        .await?;
                    for row in &rows {
                        entities.push(DeletedEntity {
                            id: row.get("id")?,
                            entity_type: label.to_string(),
                        });
                    }
                }
                // The scope nodes themselves go last so PART_OF edges
                // still resolve while collecting.
                let rows = self
                    .db
                    .query(
                        "MATCH (r:Repository) WHERE r.name = $name
                         RETURN r.id AS id ORDER BY id",
                    )
                    .param("name", repository)
                    .fetch_all()
                    .await?;
                for row in &rows {
                    entities.push(DeletedEntity {
                        id: row.get("id")?,
                        entity_type: "Repository".to_string(),
                    });
                }
            }
        }

        if entities.is_empty() && warnings.is_empty() {
            warnings.push("nothing matched the delete scope".to_string());
        }
        Ok((entities, warnings))
    }

    async fn collect_label_in_repo(
        &self,
        label: &str,
        repo_id: &str,
        entities: &mut Vec<DeletedEntity>,
    ) -> Result<(), MemoryError> {
        let rows = self
            .db
            .query(&format!(
                "MATCH (n:{label})-[:PART_OF]->(r:Repository {{id: $repo_id}})
                 RETURN n.id AS id ORDER BY id"
            ))
            .param("repo_id", repo_id)
            .fetch_all()
            .await?;
        for row in &rows {
            entities.push(DeletedEntity {
                id: row.get("id")?,
                entity_type: label.to_string(),
            });
        }
        Ok(())
    }
}

/// Maps a tool-facing entity type to its node label.
pub fn label_for_entity_type(entity_type: &str) -> Result<&'static str, MemoryError> {
    match entity_type.to_ascii_lowercase().as_str() {
        "component" => Ok("Component"),
        "decision" => Ok("Decision"),
        "rule" => Ok("Rule"),
        "file" => Ok("File"),
        "tag" => Ok("Tag"),
        "context" => Ok("Context"),
        "metadata" => Ok("Metadata"),
        other => Err(MemoryError::InvalidArgs(format!(
            "unknown entity type: {other}"
        ))),
    }
}

/// File and Tag nodes are keyed by logical id; everything else by GUID.
fn node_id_for(label: &str, repository: &str, branch: &str, id: &str) -> String {
    match label {
        "File" | "Tag" => id.to_string(),
        _ => gid(repository, branch, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping() {
        assert_eq!(label_for_entity_type("component").unwrap(), "Component");
        assert_eq!(label_for_entity_type("TAG").unwrap(), "Tag");
        assert!(label_for_entity_type("workflow").is_err());
    }

    #[test]
    fn test_node_id_resolution() {
        assert_eq!(node_id_for("Component", "r", "main", "c1"), "r:main:c1");
        assert_eq!(node_id_for("File", "r", "main", "file-1"), "file-1");
        assert_eq!(node_id_for("Tag", "r", "main", "t1"), "t1");
    }
}
