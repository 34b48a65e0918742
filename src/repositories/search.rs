//! Keyword search over entity properties.

use serde::Serialize;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt};
use crate::models::{parse_gid, repo_pk};

/// Per-label text fields considered by keyword search.
const SEARCHABLE: &[(&str, &[&str])] = &[
    ("Component", &["name", "kind"]),
    ("Decision", &["name", "context"]),
    ("Rule", &["name", "content"]),
    ("File", &["name", "path"]),
    ("Context", &["summary", "agent"]),
    ("Tag", &["name", "description"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub score: f64,
}

pub struct SearchRepository {
    db: DbHandle,
}

impl SearchRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Case-insensitive substring match over the per-label field lists,
    /// scoped to (repository, branch) through PART_OF.
    pub async fn keyword(
        &self,
        repository: &str,
        branch: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let limit = limit.clamp(1, 100);
        let mut hits = Vec::new();

        for (label, fields) in SEARCHABLE {
            if hits.len() >= limit {
                break;
            }
            let predicate = fields
                .iter()
                .map(|field| format!("lower(coalesce(n.{field}, '')) CONTAINS lower($q)"))
                .collect::<Vec<_>>()
                .join(" OR ");

            let cypher = format!(
                "MATCH (n:{label})-[:PART_OF]->(r:Repository {{id: $repo_id}})
                 WHERE {predicate}
                 RETURN n ORDER BY n.id LIMIT $limit"
            );

            let rows = self
                .db
                .query(&cypher)
                .param("repo_id", repo_pk(repository, branch))
                .param("q", query)
                .param("limit", (limit - hits.len()) as i64)
                .fetch_all()
                .await?;

            for row in &rows {
                let node: Node = row.get("n")?;
                hits.push(Self::node_to_hit(label, &node)?);
            }
        }

        Ok(hits)
    }

    fn node_to_hit(label: &str, node: &Node) -> Result<SearchHit, MemoryError> {
        let raw_id: String = node.get("id")?;
        let id = match label {
            // Branch-scoped entities echo their logical id.
            "File" | "Tag" => raw_id,
            _ => parse_gid(&raw_id)
                .map(|(_, _, logical)| logical.to_string())
                .unwrap_or(raw_id),
        };

        let name: Option<String> = node.get_opt("name")?;
        let snippet = node
            .get_opt::<String>("content")?
            .or(node.get_opt::<String>("summary")?)
            .or(node.get_opt::<String>("context")?)
            .map(|text| text.chars().take(160).collect());

        Ok(SearchHit {
            id,
            entity_type: label.to_string(),
            name: name.unwrap_or_default(),
            snippet,
            score: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;
    use std::collections::BTreeMap;

    #[test]
    fn test_node_to_hit_strips_guid() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:comp-Auth".into()));
        properties.insert("name".to_string(), Value::String("Auth".into()));

        let hit = SearchRepository::node_to_hit(
            "Component",
            &Node {
                label: "Component".into(),
                properties,
            },
        )
        .unwrap();
        assert_eq!(hit.id, "comp-Auth");
        assert_eq!(hit.entity_type, "Component");
    }

    #[test]
    fn test_node_to_hit_truncates_snippet() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:rule-1".into()));
        properties.insert("name".to_string(), Value::String("rule".into()));
        properties.insert("content".to_string(), Value::String("x".repeat(500)));

        let hit = SearchRepository::node_to_hit(
            "Rule",
            &Node {
                label: "Rule".into(),
                properties,
            },
        )
        .unwrap();
        assert_eq!(hit.snippet.unwrap().len(), 160);
    }
}
