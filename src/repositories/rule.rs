//! Accessor for Rule nodes.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, parse_gid, repo_pk, Rule};

/// Caller-supplied fields for a rule upsert.
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub id: String,
    pub name: String,
    pub created: Option<NaiveDate>,
    pub triggers: Vec<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    /// Components this rule governs (GOVERNS edges).
    pub governed_components: Vec<String>,
}

pub struct RuleRepository {
    db: DbHandle,
}

impl RuleRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn find_by_id(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Option<Rule>, MemoryError> {
        let row = self
            .db
            .query("MATCH (rule:Rule {id: $id}) RETURN rule")
            .param("id", gid(repository, branch, id))
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_rule(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        input: RuleInput,
    ) -> Result<Rule, MemoryError> {
        let now = Utc::now();
        let guid = gid(repository, branch, &input.id);
        let created = input.created.unwrap_or_else(|| Utc::now().date_naive());
        let status = input.status.clone().unwrap_or_else(|| "active".to_string());

        self.db
            .query(
                "MERGE (rule:Rule {id: $id})
                 ON CREATE SET rule.logical_id = $logical_id, rule.name = $name,
                               rule.created = $created, rule.triggers = $triggers,
                               rule.content = $content, rule.status = $status,
                               rule.created_at = $now, rule.updated_at = $now
                 ON MATCH SET rule.name = $name, rule.triggers = $triggers,
                              rule.content = $content, rule.status = $status,
                              rule.updated_at = $now",
            )
            .param("id", guid.as_str())
            .param("logical_id", input.id.as_str())
            .param("name", input.name.as_str())
            .param("created", created)
            .param("triggers", input.triggers.clone())
            .param("content", input.content.clone())
            .param("status", status)
            .param("now", now)
            .run()
            .await?;

        self.db
            .query(
                "MATCH (rule:Rule {id: $id}), (r:Repository {id: $repo_id})
                 MERGE (rule)-[:PART_OF]->(r)",
            )
            .param("id", guid.as_str())
            .param("repo_id", repo_pk(repository, branch))
            .run()
            .await?;

        for component in &input.governed_components {
            self.db
                .query(
                    "MATCH (rule:Rule {id: $id}), (c:Component {id: $component_id})
                     MERGE (rule)-[:GOVERNS]->(c)",
                )
                .param("id", guid.as_str())
                .param("component_id", gid(repository, branch, component))
                .run()
                .await?;
        }

        self.find_by_id(repository, &input.id, branch)
            .await?
            .ok_or_else(|| MemoryError::Internal(format!("rule vanished after upsert: {guid}")))
    }

    /// All rules for a branch, by name.
    pub async fn list(&self, repository: &str, branch: &str) -> Result<Vec<Rule>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (rule:Rule)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN rule ORDER BY rule.name",
            )
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter().map(Self::row_to_rule).collect()
    }

    pub(crate) fn row_to_rule(row: &Row) -> Result<Rule, MemoryError> {
        let node: Node = row.get("rule")?;
        Self::node_to_rule(&node)
    }

    pub(crate) fn node_to_rule(node: &Node) -> Result<Rule, MemoryError> {
        let logical_id: Option<String> = node.get_opt("logical_id")?;
        let id = match logical_id {
            Some(id) => id,
            None => {
                let guid: String = node.get("id")?;
                parse_gid(&guid)
                    .map(|(_, _, logical)| logical.to_string())
                    .unwrap_or(guid)
            }
        };
        let created: Option<NaiveDate> = node.get_opt("created")?;
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Rule {
            id,
            name: node.get_opt("name")?.unwrap_or_default(),
            created: created.unwrap_or_else(|| Utc::now().date_naive()),
            triggers: node.get_opt("triggers")?.unwrap_or_default(),
            content: node.get_opt("content")?,
            status: node.get_opt("status")?,
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
    fn test_node_to_rule_triggers_list() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:rule-1".into()));
        properties.insert("logical_id".to_string(), Value::String("rule-1".into()));
        properties.insert("name".to_string(), Value::String("No cyclic deps".into()));
        properties.insert(
            "triggers".to_string(),
            Value::List(vec![
                Value::String("component.create".into()),
                Value::String("component.update".into()),
            ]),
        );
        properties.insert("status".to_string(), Value::String("active".into()));

        let rule = RuleRepository::node_to_rule(&Node {
            label: "Rule".into(),
            properties,
        })
        .unwrap();

        assert_eq!(rule.id, "rule-1");
        assert_eq!(rule.triggers.len(), 2);
        assert_eq!(rule.status.as_deref(), Some("active"));
    }
}
