//! Graph traversal accessors: paths, neighborhoods, and history.

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{sanitize_rel_types, Node, Path, QueryExt};
use crate::models::{gid, repo_pk, Component, Context, Decision, Rule};
use crate::repositories::component::ComponentRepository;
use crate::repositories::context::ContextRepository;
use crate::repositories::decision::DecisionRepository;
use crate::repositories::rule::RuleRepository;

/// Direction of a traversal relative to the start node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    /// Arrow fragments around the relationship pattern.
    fn arrows(self) -> (&'static str, &'static str) {
        match self {
            Direction::Outgoing => ("-", "->"),
            Direction::Incoming => ("<-", "-"),
            Direction::Both => ("-", "-"),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OUTGOING" => Some(Direction::Outgoing),
            "INCOMING" => Some(Direction::Incoming),
            "BOTH" => Some(Direction::Both),
            _ => None,
        }
    }
}

/// Options for path and neighborhood queries.
#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    /// Relationship types to follow; defaults to DEPENDS_ON.
    pub rel_types: Option<Vec<String>>,
    pub direction: Option<Direction>,
    /// Hop cap, clamped to [1, 10].
    pub depth: Option<u32>,
}

/// Entity kinds a Context can annotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextItemType {
    Component,
    Decision,
    Rule,
}

impl ContextItemType {
    fn label(self) -> &'static str {
        match self {
            ContextItemType::Component => "Component",
            ContextItemType::Decision => "Decision",
            ContextItemType::Rule => "Rule",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "component" => Some(ContextItemType::Component),
            "decision" => Some(ContextItemType::Decision),
            "rule" => Some(ContextItemType::Rule),
            _ => None,
        }
    }
}

/// Result of a shortest-path query. An unreachable target yields an
/// empty path, not an error.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShortestPath {
    pub path: Vec<Component>,
    pub length: usize,
}

pub struct TraversalRepository {
    db: DbHandle,
}

impl TraversalRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Single-query shortest path using the engine's `* SHORTEST` syntax.
    pub async fn find_shortest_path(
        &self,
        repository: &str,
        start_id: &str,
        end_id: &str,
        branch: &str,
        options: TraversalOptions,
    ) -> Result<ShortestPath, MemoryError> {
        let types = match &options.rel_types {
            Some(types) => sanitize_rel_types(types)?,
            None => "DEPENDS_ON".to_string(),
        };
        let depth = options.depth.unwrap_or(10).clamp(1, 10);
        let (left, right) = options.direction.unwrap_or_default().arrows();

        let cypher = format!(
            "MATCH p = (a:Component {{id: $start}}){left}[:{types}* SHORTEST 1..{depth}]{right}(b:Component {{id: $end}})
             RETURN p LIMIT 1"
        );

        let row = self
            .db
            .query(&cypher)
            .param("start", gid(repository, branch, start_id))
            .param("end", gid(repository, branch, end_id))
            .fetch_one()
            .await?;

        let Some(row) = row else {
            return Ok(ShortestPath {
                path: Vec::new(),
                length: 0,
            });
        };

        let path: Path = row.get("p")?;
        let components: Vec<Component> = path
            .nodes
            .iter()
            .map(ComponentRepository::node_to_component)
            .collect::<Result<_, _>>()?;

        Ok(ShortestPath {
            length: path.len(),
            path: components,
        })
    }

    /// One-hop DEPENDS_ON targets, branch-scoped and deduplicated.
    pub async fn get_dependencies(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (c:Component {id: $id})-[:DEPENDS_ON]->(d:Component)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN DISTINCT d ORDER BY d.name",
            )
            .param("id", gid(repository, branch, id))
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("d")?;
                ComponentRepository::node_to_component(&node)
            })
            .collect()
    }

    /// One-hop DEPENDS_ON sources, branch-scoped and deduplicated.
    pub async fn get_dependents(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (d:Component)-[:DEPENDS_ON]->(c:Component {id: $id})
                 MATCH (d)-[:PART_OF]->(r:Repository {id: $repo_id})
                 RETURN DISTINCT d ORDER BY d.name",
            )
            .param("id", gid(repository, branch, id))
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("d")?;
                ComponentRepository::node_to_component(&node)
            })
            .collect()
    }

    /// Variable-length neighborhood, depth clamped to [1, 10]. The start
    /// node is excluded.
    pub async fn get_related(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
        options: TraversalOptions,
    ) -> Result<Vec<Component>, MemoryError> {
        let types = match &options.rel_types {
            Some(types) => sanitize_rel_types(types)?,
            None => "DEPENDS_ON".to_string(),
        };
        let depth = options.depth.unwrap_or(1).clamp(1, 10);
        let (left, right) = options.direction.unwrap_or(Direction::Both).arrows();

        let cypher = format!(
            "MATCH (c:Component {{id: $id}}){left}[:{types}*1..{depth}]{right}(other:Component)
             MATCH (other)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             WHERE other.id <> c.id
             RETURN DISTINCT other ORDER BY other.name"
        );

        let rows = self
            .db
            .query(&cypher)
            .param("id", gid(repository, branch, id))
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("other")?;
                ComponentRepository::node_to_component(&node)
            })
            .collect()
    }

    /// Contexts attached to an item, newest first, capped at 100.
    pub async fn get_item_contextual_history(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
        item_type: ContextItemType,
    ) -> Result<Vec<Context>, MemoryError> {
        let label = item_type.label();
        let cypher = format!(
            "MATCH (c:Context)-[:CONTEXT_OF]->(item:{label} {{id: $id}})
             MATCH (c)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             RETURN c ORDER BY c.created_at DESC LIMIT 100"
        );

        let rows = self
            .db
            .query(&cypher)
            .param("id", gid(repository, branch, id))
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter().map(ContextRepository::row_to_context).collect()
    }

    /// Decisions with an AFFECTS edge into the component.
    pub async fn get_governing_decisions(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Vec<Decision>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (d:Decision)-[:AFFECTS]->(c:Component {id: $id})
                 RETURN d ORDER BY d.date DESC",
            )
            .param("id", gid(repository, branch, id))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("d")?;
                DecisionRepository::node_to_decision(&node)
            })
            .collect()
    }

    /// Rules with a GOVERNS edge into the component.
    pub async fn get_governing_rules(
        &self,
        repository: &str,
        id: &str,
        branch: &str,
    ) -> Result<Vec<Rule>, MemoryError> {
        let rows = self
            .db
            .query(
                "MATCH (rule:Rule)-[:GOVERNS]->(c:Component {id: $id})
                 RETURN rule ORDER BY rule.name",
            )
            .param("id", gid(repository, branch, id))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("rule")?;
                RuleRepository::node_to_rule(&node)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_arrows() {
        assert_eq!(Direction::Outgoing.arrows(), ("-", "->"));
        assert_eq!(Direction::Incoming.arrows(), ("<-", "-"));
        assert_eq!(Direction::Both.arrows(), ("-", "-"));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("outgoing"), Some(Direction::Outgoing));
        assert_eq!(Direction::parse("INCOMING"), Some(Direction::Incoming));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_item_type_labels() {
        assert_eq!(ContextItemType::parse("component"), Some(ContextItemType::Component));
        assert_eq!(ContextItemType::Decision.label(), "Decision");
        assert_eq!(ContextItemType::parse("tag"), None);
    }
}
