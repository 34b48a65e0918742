//! Accessor for Component nodes: CRUD and the transactional upsert.

use chrono::{DateTime, Utc};

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt, Row};
use crate::models::{gid, parse_gid, repo_pk, Component, ComponentStatus};

/// Caller-supplied fields for a component upsert.
#[derive(Debug, Clone)]
pub struct ComponentInput {
    pub id: String,
    pub name: String,
    pub kind: Option<String>,
    pub status: Option<ComponentStatus>,
    /// When supplied, the outgoing DEPENDS_ON edges are rewritten to
    /// exactly this set. Absent targets are created as planned placeholders.
    pub depends_on: Option<Vec<String>>,
}

pub struct ComponentRepository {
    db: DbHandle,
}

impl ComponentRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Components with `status = active` in (repository, branch), by name.
    pub async fn get_active(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        self.list_by_status(repository, branch, Some(ComponentStatus::Active))
            .await
    }

    /// Components in (repository, branch), optionally filtered by status.
    pub async fn list_by_status(
        &self,
        repository: &str,
        branch: &str,
        status: Option<ComponentStatus>,
    ) -> Result<Vec<Component>, MemoryError> {
        let cypher = match status {
            Some(_) => {
                "MATCH (c:Component)-[:PART_OF]->(r:Repository {id: $repo_id})
                 WHERE c.status = $status
                 RETURN c ORDER BY c.name"
            }
            None => {
                "MATCH (c:Component)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN c ORDER BY c.name"
            }
        };

        let mut query = self
            .db
            .query(cypher)
            .param("repo_id", repo_pk(repository, branch));
        if let Some(status) = status {
            query = query.param("status", status.as_str());
        }

        let rows = query.fetch_all().await?;
        rows.iter().map(Self::row_to_component).collect()
    }

    /// Two-step fetch: the node, then its outgoing DEPENDS_ON logical ids.
    /// A missing node is `Ok(None)`, not an error.
    pub async fn find_by_id_and_branch(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Option<Component>, MemoryError> {
        let guid = gid(repository, branch, id);
        let row = self
            .db
            .query("MATCH (c:Component {id: $id}) RETURN c")
            .param("id", guid.as_str())
            .fetch_one()
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut component = Self::row_to_component(&row)?;

        let dep_rows = self
            .db
            .query(
                "MATCH (c:Component {id: $id})-[:DEPENDS_ON]->(d:Component)
                 RETURN d.logical_id AS dep ORDER BY dep",
            )
            .param("id", guid.as_str())
            .fetch_all()
            .await?;

        component.depends_on = dep_rows
            .iter()
            .filter_map(|row| row.get_opt::<String>("dep").ok().flatten())
            .collect();

        Ok(Some(component))
    }

    /// Sets the status and bumps `updated_at`. Absent node returns `None`.
    pub async fn update_status(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
        status: ComponentStatus,
    ) -> Result<Option<Component>, MemoryError> {
        self.db
            .query(
                "MATCH (c:Component {id: $id})
                 SET c.status = $status, c.updated_at = $now",
            )
            .param("id", gid(repository, branch, id))
            .param("status", status.as_str())
            .param("now", Utc::now())
            .run()
            .await?;

        self.find_by_id_and_branch(repository, id, branch).await
    }

    /// Transactional upsert: repository MERGE, component MERGE (all fields
    /// on create and match), PART_OF edge, and, when `depends_on` is
    /// supplied, a full rewrite of the outgoing DEPENDS_ON edges with
    /// planned placeholders for absent targets. The committed state is
    /// re-read before returning.
    pub async fn upsert(
        &self,
        repository: &str,
        branch: &str,
        input: ComponentInput,
    ) -> Result<Component, MemoryError> {
        let now = Utc::now();
        let repo_id = repo_pk(repository, branch);
        let guid = gid(repository, branch, &input.id);
        let status = input.status.unwrap_or_default();

        let repo_name = repository.to_string();
        let branch_name = branch.to_string();
        let logical_id = input.id.clone();
        let find_id = input.id.clone();
        let tx_guid = guid.clone();
        let tx_repo_id = repo_id.clone();

        self.db
            .transaction(move |tx| async move {
                tx.query(
                    "MERGE (r:Repository {id: $id})
                     ON CREATE SET r.name = $name, r.branch = $branch,
                                   r.created_at = $now, r.updated_at = $now
                     ON MATCH SET r.updated_at = $now",
                )
                .param("id", tx_repo_id.as_str())
                .param("name", repo_name.as_str())
                .param("branch", branch_name.as_str())
                .param("now", now)
                .run()
                .await?;

                tx.query(
                    "MERGE (c:Component {id: $id})
                     ON CREATE SET c.logical_id = $logical_id, c.name = $name,
                                   c.kind = $kind, c.status = $status,
                                   c.created_at = $now, c.updated_at = $now
                     ON MATCH SET c.logical_id = $logical_id, c.name = $name,
                                  c.kind = $kind, c.status = $status, c.updated_at = $now",
                )
                .param("id", tx_guid.as_str())
                .param("logical_id", logical_id.as_str())
                .param("name", input.name.as_str())
                .param("kind", input.kind.clone())
                .param("status", status.as_str())
                .param("now", now)
                .run()
                .await?;

                tx.query(
                    "MATCH (c:Component {id: $id}), (r:Repository {id: $repo_id})
                     MERGE (c)-[:PART_OF]->(r)",
                )
                .param("id", tx_guid.as_str())
                .param("repo_id", tx_repo_id.as_str())
                .run()
                .await?;

                if let Some(deps) = &input.depends_on {
                    tx.query(
                        "MATCH (c:Component {id: $id})-[d:DEPENDS_ON]->(:Component)
                         DELETE d",
                    )
                    .param("id", tx_guid.as_str())
                    .run()
                    .await?;

                    tx.query("MATCH (c:Component {id: $id}) SET c.depends_on = $deps")
                        .param("id", tx_guid.as_str())
                        .param("deps", deps.clone())
                        .run()
                        .await?;

                    for dep in deps {
                        let dep_guid = gid(&repo_name, &branch_name, dep);

                        tx.query(
                            "MERGE (t:Component {id: $id})
                             ON CREATE SET t.logical_id = $logical_id, t.name = $logical_id,
                                           t.status = 'planned',
                                           t.created_at = $now, t.updated_at = $now",
                        )
                        .param("id", dep_guid.as_str())
                        .param("logical_id", dep.as_str())
                        .param("now", now)
                        .run()
                        .await?;

                        // Placeholders are scoped to the repository too.
                        tx.query(
                            "MATCH (t:Component {id: $id}), (r:Repository {id: $repo_id})
                             MERGE (t)-[:PART_OF]->(r)",
                        )
                        .param("id", dep_guid.as_str())
                        .param("repo_id", tx_repo_id.as_str())
                        .run()
                        .await?;

                        tx.query(
                            "MATCH (c:Component {id: $from}), (t:Component {id: $to})
                             MERGE (c)-[:DEPENDS_ON]->(t)",
                        )
                        .param("from", tx_guid.as_str())
                        .param("to", dep_guid.as_str())
                        .run()
                        .await?;
                    }
                }

                Ok(())
            })
            .await?;

        self.find_by_id_and_branch(repository, &find_id, branch)
            .await?
            .ok_or_else(|| MemoryError::Internal(format!("component vanished after upsert: {guid}")))
    }

    pub(crate) fn row_to_component(row: &Row) -> Result<Component, MemoryError> {
        let node: Node = row.get("c")?;
        Self::node_to_component(&node)
    }

    pub(crate) fn node_to_component(node: &Node) -> Result<Component, MemoryError> {
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

        let status = node
            .get_opt::<String>("status")?
            .and_then(|s| ComponentStatus::parse(&s))
            .unwrap_or_default();
        let created_at: Option<DateTime<Utc>> = node.get_opt("created_at")?;
        let updated_at: Option<DateTime<Utc>> = node.get_opt("updated_at")?;

        Ok(Component {
            id,
            name: node.get_opt("name")?.unwrap_or_default(),
            kind: node.get_opt("kind")?,
            status,
            depends_on: node.get_opt("depends_on")?.unwrap_or_default(),
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

    fn component_node(pairs: Vec<(&str, Value)>) -> Node {
        Node {
            label: "Component".into(),
            properties: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_node_to_component_basic() {
        let node = component_node(vec![
            ("id", Value::String("r:main:comp-Auth".into())),
            ("logical_id", Value::String("comp-Auth".into())),
            ("name", Value::String("Auth".into())),
            ("kind", Value::String("service".into())),
            ("status", Value::String("active".into())),
        ]);

        let component = ComponentRepository::node_to_component(&node).unwrap();
        assert_eq!(component.id, "comp-Auth");
        assert_eq!(component.kind.as_deref(), Some("service"));
        assert_eq!(component.status, ComponentStatus::Active);
        assert!(component.depends_on.is_empty());
    }

    #[test]
    fn test_node_to_component_falls_back_to_guid_parse() {
        let node = component_node(vec![
            ("id", Value::String("r:main:comp-X".into())),
            ("name", Value::String("X".into())),
        ]);
        let component = ComponentRepository::node_to_component(&node).unwrap();
        assert_eq!(component.id, "comp-X");
    }

    #[test]
    fn test_node_to_component_unknown_status_defaults_active() {
        let node = component_node(vec![
            ("id", Value::String("r:main:c".into())),
            ("logical_id", Value::String("c".into())),
            ("status", Value::String("archived".into())),
        ]);
        let component = ComponentRepository::node_to_component(&node).unwrap();
        assert_eq!(component.status, ComponentStatus::Active);
    }

    #[test]
    fn test_node_to_component_scalar_depends_on_promotes() {
        let node = component_node(vec![
            ("id", Value::String("r:main:c".into())),
            ("logical_id", Value::String("c".into())),
            ("depends_on", Value::String("other".into())),
        ]);
        let component = ComponentRepository::node_to_component(&node).unwrap();
        assert_eq!(component.depends_on, vec!["other".to_string()]);
    }
}
