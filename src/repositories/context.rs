//! Accessor for daily Context nodes.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, repo_pk, Context};

/// Fields accepted by a context update. Scalars replace, lists append.
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub agent: Option<String>,
    pub related_issue: Option<String>,
    pub summary: Option<String>,
    pub decision: Option<String>,
    pub observation: Option<String>,
}

pub struct ContextRepository {
    db: DbHandle,
}

impl ContextRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Logical id of the context node for a calendar day.
    pub fn logical_id_for(date: NaiveDate) -> String {
        format!("context-{}", date.format("%Y-%m-%d"))
    }

    pub async fn find_by_date(
        &self,
        repository: &str,
        branch: &str,
        date: NaiveDate,
    ) -> Result<Option<Context>, MemoryError> {
        let row = self
            .db
            .query("MATCH (c:Context {id: $id}) RETURN c")
            .param("id", gid(repository, branch, &Self::logical_id_for(date)))
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_context(&row)?)),
            None => Ok(None),
        }
    }

    /// Appends to (or creates) the context node for `date`.
    ///
    /// The read-merge-write keeps the list semantics simple: existing
    /// decisions and observations are preserved, the update's entries are
    /// appended, and scalar fields replace when supplied.
    pub async fn append(
        &self,
        repository: &str,
        branch: &str,
        date: NaiveDate,
        update: ContextUpdate,
    ) -> Result<Context, MemoryError> {
        let existing = self.find_by_date(repository, branch, date).await?;

        let mut decisions = existing
            .as_ref()
            .map(|c| c.decisions.clone())
            .unwrap_or_default();
        let new_decision = update.decision.clone();
        if let Some(decision) = update.decision {
            decisions.push(decision);
        }
        let mut observations = existing
            .as_ref()
            .map(|c| c.observations.clone())
            .unwrap_or_default();
        if let Some(observation) = update.observation {
            observations.push(observation);
        }

        let merged = Context {
            id: Self::logical_id_for(date),
            name: existing.as_ref().and_then(|c| c.name.clone()),
            iso_date: date,
            agent: update.agent.or_else(|| existing.as_ref().and_then(|c| c.agent.clone())),
            related_issue: update
                .related_issue
                .or_else(|| existing.as_ref().and_then(|c| c.related_issue.clone())),
            summary: update
                .summary
                .or_else(|| existing.as_ref().and_then(|c| c.summary.clone())),
            decisions,
            observations,
            created_at: existing.as_ref().map(|c| c.created_at).unwrap_or_else(Utc::now),
            updated_at: Utc::now(),
        };

        let context = self.upsert(repository, branch, &merged).await?;

        // A decision named in the update gets a CONTEXT_OF edge when its
        // node exists, so contextual history can walk back from it.
        if let Some(decision_id) = new_decision {
            self.db
                .query(
                    "MATCH (c:Context {id: $context_id}), (d:Decision {id: $decision_id})
                     MERGE (c)-[:CONTEXT_OF]->(d)",
                )
                .param("context_id", gid(repository, branch, &context.id))
                .param("decision_id", gid(repository, branch, &decision_id))
                .run()
                .await?;
        }

        Ok(context)
    }

    /// Attaches this day's context to an item (CONTEXT_OF edge). The
    /// target label is picked by the caller from Component, Decision, or
    /// Rule; missing endpoints are a no-op.
    pub async fn attach_to(
        &self,
        repository: &str,
        branch: &str,
        date: NaiveDate,
        item_label: &str,
        item_id: &str,
    ) -> Result<(), MemoryError> {
        let label = crate::graph::require_identifier(item_label)?;
        if !matches!(label.as_str(), "Component" | "Decision" | "Rule") {
            return Err(MemoryError::InvalidArgs(format!(
                "contexts cannot attach to {label}"
            )));
        }

        self.db
            .query(&format!(
                "MATCH (c:Context {{id: $context_id}}), (item:{label} {{id: $item_id}})
                 MERGE (c)-[:CONTEXT_OF]->(item)"
            ))
            .param(
                "context_id",
                gid(repository, branch, &Self::logical_id_for(date)),
            )
            .param("item_id", gid(repository, branch, item_id))
            .run()
            .await
    }

    /// MERGE-on-GUID upsert plus the PART_OF edge.
    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        context: &Context,
    ) -> Result<Context, MemoryError> {
        let now = Utc::now();
        let guid = gid(repository, branch, &context.id);

        self.db
            .query(
                "MERGE (c:Context {id: $id})
                 ON CREATE SET c.logical_id = $logical_id, c.name = $name,
                               c.iso_date = $iso_date, c.agent = $agent,
                               c.related_issue = $related_issue, c.summary = $summary,
                               c.decisions = $decisions, c.observations = $observations,
                               c.created_at = $now, c.updated_at = $now
                 ON MATCH SET c.name = $name, c.agent = $agent,
                              c.related_issue = $related_issue, c.summary = $summary,
                              c.decisions = $decisions, c.observations = $observations,
                              c.updated_at = $now",
            )
            .param("id", guid.as_str())
            .param("logical_id", context.id.as_str())
            .param("name", context.name.clone())
            .param("iso_date", context.iso_date)
            .param("agent", context.agent.clone())
            .param("related_issue", context.related_issue.clone())
            .param("summary", context.summary.clone())
            .param("decisions", context.decisions.clone())
            .param("observations", context.observations.clone())
            .param("now", now)
            .run()
            .await?;

        self.db
            .query(
                "MATCH (c:Context {id: $id}), (r:Repository {id: $repo_id})
                 MERGE (c)-[:PART_OF]->(r)",
            )
            .param("id", guid.as_str())
            .param("repo_id", repo_pk(repository, branch))
            .run()
            .await?;

        self.find_by_date(repository, branch, context.iso_date)
            .await?
            .ok_or_else(|| MemoryError::Internal(format!("context vanished after upsert: {guid}")))
    }

    /// Most recent contexts for a branch, newest first.
    pub async fn latest(
        &self,
        repository: &str,
        branch: &str,
        limit: i64,
    ) -> Result<Vec<Context>, MemoryError> {
        let limit = limit.clamp(1, 100);
        let rows = self
            .db
            .query(
                "MATCH (c:Context)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN c ORDER BY c.iso_date DESC LIMIT $limit",
            )
            .param("repo_id", repo_pk(repository, branch))
            .param("limit", limit)
            .fetch_all()
            .await?;

        rows.iter().map(Self::row_to_context).collect()
    }

    pub(crate) fn row_to_context(row: &Row) -> Result<Context, MemoryError> {
        let node: Node = row.get("c")?;
        Self::node_to_context(&node)
    }

    pub(crate) fn node_to_context(node: &Node) -> Result<Context, MemoryError> {
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;
        let iso_date: Option<NaiveDate> = node.get_opt("iso_date")?;

        let logical_id: Option<String> = node.get_opt("logical_id")?;
        let id = match logical_id {
            Some(id) => id,
            None => {
                let guid: String = node.get("id")?;
                crate::models::parse_gid(&guid)
                    .map(|(_, _, logical)| logical.to_string())
                    .unwrap_or(guid)
            }
        };

        Ok(Context {
            id,
            name: node.get_opt("name")?,
            iso_date: iso_date.unwrap_or_else(|| Utc::now().date_naive()),
            agent: node.get_opt("agent")?,
            related_issue: node.get_opt("related_issue")?,
            summary: node.get_opt("summary")?,
            // Scalar reads promote to one-element arrays.
            decisions: node.get_opt("decisions")?.unwrap_or_default(),
            observations: node.get_opt("observations")?.unwrap_or_default(),
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
    fn test_node_to_context_promotes_scalar_lists() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("r:main:context-2025-06-01".into()));
        properties.insert("logical_id".to_string(), Value::String("context-2025-06-01".into()));
        properties.insert(
            "iso_date".to_string(),
            Value::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
        );
        // A single scalar where a list is expected
        properties.insert("decisions".to_string(), Value::String("dec-1".into()));

        let context = ContextRepository::node_to_context(&Node {
            label: "Context".into(),
            properties,
        })
        .unwrap();

        assert_eq!(context.id, "context-2025-06-01");
        assert_eq!(context.decisions, vec!["dec-1".to_string()]);
        assert!(context.observations.is_empty());
    }

    #[test]
    fn test_logical_id_for_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(ContextRepository::logical_id_for(date), "context-2025-01-09");
    }
}
