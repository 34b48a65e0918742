//! Accessor for File nodes and Component→File IMPLEMENTS linkage.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, repo_pk, Component, File, FileMetadata};
use crate::repositories::component::ComponentRepository;

/// Caller-supplied fields for a file upsert. The branch goes into the
/// metadata blob at write time, keeping it equal to the owning
/// repository's branch segment.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub id: String,
    pub name: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub content: Option<String>,
    pub metrics: Option<JsonValue>,
}

/// Upsert outcome; `warnings` notes a skipped PART_OF edge when the
/// repository does not exist yet.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileUpsert {
    pub file: File,
    pub warnings: Vec<String>,
}

pub struct FileRepository {
    db: DbHandle,
}

impl FileRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Transactional upsert: MERGE the file with all properties, then link
    /// it to its repository only when that repository already exists (a
    /// file may be ingested before its repository in some workflows).
    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        input: FileInput,
    ) -> Result<FileUpsert, MemoryError> {
        let now = Utc::now();
        let repo_id = repo_pk(repository, branch);
        let metadata = FileMetadata {
            branch: branch.to_string(),
            content: input.content.clone(),
            metrics: input.metrics.clone(),
            mime_type: input.mime_type.clone(),
        };
        let encoded = serde_json::to_string(&metadata)
            .map_err(|e| MemoryError::InvalidArgs(format!("file metadata: {e}")))?;

        let file_id = input.id.clone();
        let tx_repo_id = repo_id.clone();
        let warnings = self
            .db
            .transaction(move |tx| async move {
                tx.query(
                    "MERGE (f:File {id: $id})
                     ON CREATE SET f.name = $name, f.path = $path, f.mime_type = $mime_type,
                                   f.size = $size, f.metadata = $metadata,
                                   f.created_at = $now, f.updated_at = $now
                     ON MATCH SET f.name = $name, f.path = $path, f.mime_type = $mime_type,
                                  f.size = $size, f.metadata = $metadata, f.updated_at = $now",
                )
                .param("id", input.id.as_str())
                .param("name", input.name.as_str())
                .param("path", input.path.as_str())
                .param("mime_type", input.mime_type.clone())
                .param("size", input.size)
                .param("metadata", encoded.as_str())
                .param("now", now)
                .run()
                .await?;

                let repo_row = tx
                    .query("MATCH (r:Repository {id: $repo_id}) RETURN r.id AS id")
                    .param("repo_id", tx_repo_id.as_str())
                    .fetch_one()
                    .await?;

                let mut warnings = Vec::new();
                if repo_row.is_some() {
                    tx.query(
                        "MATCH (f:File {id: $id}), (r:Repository {id: $repo_id})
                         MERGE (f)-[:PART_OF]->(r)",
                    )
                    .param("id", input.id.as_str())
                    .param("repo_id", tx_repo_id.as_str())
                    .run()
                    .await?;
                } else {
                    warnings.push(format!(
                        "repository {tx_repo_id} does not exist; PART_OF edge skipped"
                    ));
                }
                Ok(warnings)
            })
            .await?;

        let file = self
            .find_by_id(&file_id)
            .await?
            .ok_or_else(|| MemoryError::Internal(format!("file vanished after upsert: {file_id}")))?;

        Ok(FileUpsert { file, warnings })
    }

    /// Files scoped to (repository, branch), by path.
    pub async fn list(&self, repository: &str, branch: &str) -> Result<Vec<File>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (f:File)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN f ORDER BY f.path",
            )
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        let mut files = Vec::new();
        for row in &rows {
            let file = Self::row_to_file(row)?;
            if file.metadata.branch == branch {
                files.push(file);
            }
        }
        Ok(files)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<File>, MemoryError> {
        let row = self
            .db
            .query("MATCH (f:File {id: $id}) RETURN f")
            .param("id", id)
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_file(&row)?)),
            None => Ok(None),
        }
    }

    /// Creates the IMPLEMENTS edge. Returns false when either endpoint is
    /// missing.
    pub async fn link_component(
        &self,
        repository: &str,
        branch: &str,
        component_id: &str,
        file_id: &str,
    ) -> Result<bool, MemoryError> {
        let component_guid = gid(repository, branch, component_id);

        let exists = self
            .db
            .query(
                "MATCH (c:Component {id: $component_id}), (f:File {id: $file_id})
                 RETURN c.id AS id",
            )
            .param("component_id", component_guid.as_str())
            .param("file_id", file_id)
            .fetch_one()
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        self.db
            .query(
                "MATCH (c:Component {id: $component_id}), (f:File {id: $file_id})
                 MERGE (c)-[:IMPLEMENTS]->(f)",
            )
            .param("component_id", component_guid.as_str())
            .param("file_id", file_id)
            .run()
            .await?;
        Ok(true)
    }

    /// Files implemented by a component, filtered to the branch recorded
    /// in each file's metadata blob.
    pub async fn find_files_by_component(
        &self,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<File>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (c:Component {id: $component_id})-[:IMPLEMENTS]->(f:File)
                 RETURN f ORDER BY f.path",
            )
            .param("component_id", gid(repository, branch, component_id))
            .fetch_all()
            .await?;

        let mut files = Vec::new();
        for row in &rows {
            let file = Self::row_to_file(row)?;
            if file.metadata.branch == branch {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// Components implementing a file, scoped to (repository, branch) on
    /// both endpoints.
    pub async fn find_components_by_file(
        &self,
        repository: &str,
        branch: &str,
        file_id: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let Some(file) = self.find_by_id(file_id).await? else {
            return Ok(Vec::new());
        };
        if file.metadata.branch != branch {
            return Ok(Vec::new());
        }

        let rows = self
            .db
            .query(
                "MATCH (c:Component)-[:IMPLEMENTS]->(f:File {id: $file_id})
                 MATCH (c)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN DISTINCT c ORDER BY c.name",
            )
            .param("file_id", file_id)
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter().map(ComponentRepository::row_to_component).collect()
    }

    pub(crate) fn row_to_file(row: &Row) -> Result<File, MemoryError> {
        let node: Node = row.get("f")?;
        Self::node_to_file(&node)
    }

    pub(crate) fn node_to_file(node: &Node) -> Result<File, MemoryError> {
        let metadata = node
            .get_opt::<String>("metadata")?
            .and_then(|raw| serde_json::from_str::<FileMetadata>(&raw).ok())
            .unwrap_or_default();
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(File {
            id: node.get("id")?,
            name: node.get_opt("name")?.unwrap_or_default(),
            path: node.get_opt("path")?.unwrap_or_default(),
            mime_type: node.get_opt("mime_type")?,
            size: node.get_opt("size")?,
            metadata,
            created_at: created_at.unwrap_or_else(Utc::now),
            updated_at: updated_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;
    use std::collections::BTreeMap;

    #[test]
    fn test_node_to_file_parses_metadata_blob() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("file-src-main".into()));
        properties.insert("name".to_string(), Value::String("main.rs".into()));
        properties.insert("path".to_string(), Value::String("src/main.rs".into()));
        properties.insert("size".to_string(), Value::Int64(1024));
        properties.insert(
            "metadata".to_string(),
            Value::String(r#"{"branch":"main","mime_type":"text/x-rust"}"#.into()),
        );

        let file = FileRepository::node_to_file(&Node {
            label: "File".into(),
            properties,
        })
        .unwrap();

        assert_eq!(file.id, "file-src-main");
        assert_eq!(file.metadata.branch, "main");
        assert_eq!(file.size, Some(1024));
    }

    #[test]
    fn test_node_to_file_tolerates_missing_metadata() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("file-x".into()));

        let file = FileRepository::node_to_file(&Node {
            label: "File".into(),
            properties,
        })
        .unwrap();
        assert!(file.metadata.branch.is_empty());
    }
}
