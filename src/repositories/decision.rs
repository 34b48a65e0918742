//! Accessor for Decision nodes.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, parse_gid, repo_pk, Decision};

/// Caller-supplied fields for a decision upsert.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    pub id: String,
    pub name: String,
    pub context: Option<String>,
    pub date: NaiveDate,
    /// Components this decision affects (AFFECTS edges).
    pub affected_components: Vec<String>,
}

pub struct DecisionRepository {
    db: DbHandle,
}

impl DecisionRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub async fn find_by_id(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Option<Decision>, MemoryError> {
        let row = self
            .db
            .query("MATCH (d:Decision {id: $id}) RETURN d")
            .param("id", gid(repository, branch, id))
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_decision(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        input: DecisionInput,
    ) -> Result<Decision, MemoryError> {
        let now = Utc::now();
        let guid = gid(repository, branch, &input.id);

        self.db
            .query(
                "MERGE (d:Decision {id: $id})
                 ON CREATE SET d.logical_id = $logical_id, d.name = $name,
                               d.context = $context, d.date = $date,
                               d.created_at = $now, d.updated_at = $now
                 ON MATCH SET d.name = $name, d.context = $context, d.updated_at = $now",
            )
            .param("id", guid.as_str())
            .param("logical_id", input.id.as_str())
            .param("name", input.name.as_str())
            .param("context", input.context.clone())
            .param("date", input.date)
            .param("now", now)
            .run()
            .await?;

        self.db
            .query(
                "MATCH (d:Decision {id: $id}), (r:Repository {id: $repo_id})
                 MERGE (d)-[:PART_OF]->(r)",
            )
            .param("id", guid.as_str())
            .param("repo_id", repo_pk(repository, branch))
            .run()
            .await?;

        for component in &input.affected_components {
            self.db
                .query(
                    "MATCH (d:Decision {id: $id}), (c:Component {id: $component_id})
                     MERGE (d)-[:AFFECTS]->(c)",
                )
                .param("id", guid.as_str())
                .param("component_id", gid(repository, branch, component))
                .run()
                .await?;
        }

        self.find_by_id(repository, &input.id, branch)
            .await?
            .ok_or_else(|| MemoryError::Internal(format!("decision vanished after upsert: {guid}")))
    }

    /// Decisions in a date range, newest first. Open bounds list everything.
    pub async fn list_by_date_range(
        &self,
        repository: &str,
        branch: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Decision>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (d:Decision)-[:PART_OF]->(r:Repository {id: $repo_id})
                 WHERE d.date >= $start AND d.date <= $end
                 RETURN d ORDER BY d.date DESC",
            )
            .param("repo_id", repo_pk(repository, branch))
            .param("start", start.unwrap_or(NaiveDate::MIN))
            .param("end", end.unwrap_or(NaiveDate::MAX))
            .fetch_all()
            .await?;

        rows.iter().map(Self::row_to_decision).collect()
    }

    pub(crate) fn row_to_decision(row: &Row) -> Result<Decision, MemoryError> {
        let node: Node = row.get("d")?;
        Self::node_to_decision(&node)
    }

    pub(crate) fn node_to_decision(node: &Node) -> Result<Decision, MemoryError> {
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
        let date: Option<NaiveDate> = node.get_opt("date")?;
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Decision {
            id,
            name: node.get_opt("name")?.unwrap_or_default(),
            context: node.get_opt("context")?,
            date: date.unwrap_or_else(|| Utc::now().date_naive()),
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
    fn test_node_to_decision_with_string_date() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:dec-1".into()));
        properties.insert("logical_id".to_string(), Value::String("dec-1".into()));
        properties.insert("name".to_string(), Value::String("Use embedded engine".into()));
        // Engines sometimes hand dates back as strings.
        properties.insert("date".to_string(), Value::String("2025-03-15".into()));

        let decision = DecisionRepository::node_to_decision(&Node {
            label: "Decision".into(),
            properties,
        })
        .unwrap();

        assert_eq!(decision.id, "dec-1");
        assert_eq!(decision.date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
    }
}
