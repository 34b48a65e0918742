//! Accessor for Repository scope nodes.

use chrono::{DateTime, Utc};

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{repo_pk, Repository};

/// Repository-node access. One node exists per (repository, branch).
pub struct RepositoryStore {
    db: DbHandle,
}

impl RepositoryStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Creates the (repository, branch) scope node if it is absent.
    pub async fn ensure(&self, repository: &str, branch: &str) -> Result<Repository, MemoryError> {
        let now = Utc::now();
        self.db
            .query(
                "MERGE (r:Repository {id: $id})
                 ON CREATE SET r.name = $name, r.branch = $branch,
                               r.created_at = $now, r.updated_at = $now
                 ON MATCH SET r.updated_at = $now",
            )
            .param("id", repo_pk(repository, branch))
            .param("name", repository)
            .param("branch", branch)
            .param("now", now)
            .run()
            .await?;

        self.find(repository, branch).await?.ok_or_else(|| {
            MemoryError::Internal(format!(
                "repository vanished after merge: {}",
                repo_pk(repository, branch)
            ))
        })
    }

    pub async fn find(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Option<Repository>, MemoryError> {
        let row = self
            .db
            .query("MATCH (r:Repository {id: $id}) RETURN r")
            .param("id", repo_pk(repository, branch))
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_repository(&row)?)),
            None => Ok(None),
        }
    }

    /// All (repository, branch) scope nodes in this memory bank.
    pub async fn list(&self) -> Result<Vec<Repository>, MemoryError> {
        let rows = self
            .db
            .query("MATCH (r:Repository) RETURN r ORDER BY r.id")
            .fetch_all()
            .await?;

        rows.iter().map(Self::row_to_repository).collect()
    }

    fn row_to_repository(row: &Row) -> Result<Repository, MemoryError> {
        let node: Node = row.get("r")?;
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Repository {
            id: node.get("id")?,
            name: node.get("name")?,
            branch: node.get("branch")?,
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
    fn test_row_to_repository() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("repo:main".into()));
        properties.insert("name".to_string(), Value::String("repo".into()));
        properties.insert("branch".to_string(), Value::String("main".into()));
        properties.insert("created_at".to_string(), Value::Timestamp(1_700_000_000_000_000_000));
        properties.insert("updated_at".to_string(), Value::Timestamp(1_700_000_100_000_000_000));

        let mut data = HashMap::new();
        data.insert(
            "r".to_string(),
            Value::Node(Node {
                label: "Repository".into(),
                properties,
            }),
        );

        let repo = RepositoryStore::row_to_repository(&Row::new(data)).unwrap();
        assert_eq!(repo.id, "repo:main");
        assert_eq!(repo.branch, "main");
        assert!(repo.updated_at >= repo.created_at);
    }
}
