//! Graph-algorithm accessors over the shared component projection.
//!
//! Every call first ensures the named projected graph exists (idempotent,
//! concurrent creators tolerated), runs the algorithm, and post-joins the
//! result to the requesting repository through PART_OF.

use serde::Serialize;

use crate::db::DbHandle;
use crate::error::MemoryError;
use crate::graph::{Node, QueryExt};
use crate::models::{repo_pk, Component};
use crate::repositories::component::ComponentRepository;

/// Name of the process-wide projection over Component / DEPENDS_ON.
pub const PROJECTION_NAME: &str = "AllComponentsAndDependencies";

#[derive(Debug, Clone, Serialize)]
pub struct KCoreEntry {
    pub component: Component,
    pub k_degree: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityEntry {
    pub component: Component,
    pub community: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankEntry {
    pub component: Component,
    pub rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupEntry {
    pub component: Component,
    pub group: i64,
}

/// Optional PageRank tunables; engine defaults apply when absent.
#[derive(Debug, Clone, Default)]
pub struct PageRankOptions {
    pub damping_factor: Option<f64>,
    pub max_iterations: Option<i64>,
    pub tolerance: Option<f64>,
    pub normalize_initial: Option<bool>,
}

pub struct AlgorithmRepository {
    db: DbHandle,
}

impl AlgorithmRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Idempotently creates the projection. The membership probe keeps
    /// concurrent creators from tripping over each other; a racing CREATE
    /// that still collides is tolerated.
    async fn ensure_projection(&self) -> Result<(), MemoryError> {
        let rows = self
            .db
            .query("CALL show_graphs() RETURN name")
            .fetch_all()
            .await?;

        let exists = rows.iter().any(|row| {
            row.get::<String>("name")
                .map(|name| name == PROJECTION_NAME)
                .unwrap_or(false)
        });
        if exists {
            return Ok(());
        }

        let create = format!(
            "CALL project_graph('{PROJECTION_NAME}', ['Component'], ['DEPENDS_ON'])"
        );
        match self.db.query(&create).run().await {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("already") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Components with k-core degree >= k in the requesting repository.
    pub async fn k_core(
        &self,
        repository: &str,
        branch: &str,
        k: i64,
    ) -> Result<Vec<KCoreEntry>, MemoryError> {
        self.ensure_projection().await?;

        let cypher = format!(
            "CALL k_core_decomposition('{PROJECTION_NAME}')
             WITH node, k_degree
             MATCH (node)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             WHERE k_degree >= $k
             RETURN node, k_degree ORDER BY k_degree DESC, node.name"
        );

        let rows = self
            .db
            .query(&cypher)
            .param("repo_id", repo_pk(repository, branch))
            .param("k", k)
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("node")?;
                Ok(KCoreEntry {
                    component: ComponentRepository::node_to_component(&node)?,
                    k_degree: row.get("k_degree")?,
                })
            })
            .collect()
    }

    /// Louvain community detection, ordered by community then name.
    pub async fn louvain(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<CommunityEntry>, MemoryError> {
        self.ensure_projection().await?;

        let cypher = format!(
            "CALL louvain('{PROJECTION_NAME}')
             WITH node, louvain_id
             MATCH (node)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             RETURN node, louvain_id ORDER BY louvain_id, node.name"
        );

        let rows = self
            .db
            .query(&cypher)
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("node")?;
                Ok(CommunityEntry {
                    component: ComponentRepository::node_to_component(&node)?,
                    community: row.get("louvain_id")?,
                })
            })
            .collect()
    }

    /// PageRank ordered by rank descending. Tunables are validated and
    /// embedded as named arguments (numbers and booleans only).
    pub async fn page_rank(
        &self,
        repository: &str,
        branch: &str,
        options: PageRankOptions,
    ) -> Result<Vec<RankEntry>, MemoryError> {
        self.ensure_projection().await?;

        let mut args = vec![format!("'{PROJECTION_NAME}'")];
        if let Some(damping) = options.damping_factor {
            if !damping.is_finite() || !(0.0..=1.0).contains(&damping) {
                return Err(MemoryError::InvalidArgs(format!(
                    "dampingFactor out of range: {damping}"
                )));
            }
            args.push(format!("dampingFactor := {damping}"));
        }
        if let Some(iterations) = options.max_iterations {
            if iterations <= 0 {
                return Err(MemoryError::InvalidArgs(format!(
                    "maxIterations must be positive: {iterations}"
                )));
            }
            args.push(format!("maxIterations := {iterations}"));
        }
        if let Some(tolerance) = options.tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(MemoryError::InvalidArgs(format!(
                    "tolerance must be positive: {tolerance}"
                )));
            }
            args.push(format!("tolerance := {tolerance}"));
        }
        if let Some(normalize) = options.normalize_initial {
            args.push(format!("normalizeInitial := {normalize}"));
        }

        let cypher = format!(
            "CALL page_rank({})
             WITH node, rank
             MATCH (node)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             RETURN node, rank ORDER BY rank DESC, node.name",
            args.join(", ")
        );

        let rows = self
            .db
            .query(&cypher)
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("node")?;
                Ok(RankEntry {
                    component: ComponentRepository::node_to_component(&node)?,
                    rank: row.get("rank")?,
                })
            })
            .collect()
    }

    /// Strongly connected components.
    pub async fn strongly_connected(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<GroupEntry>, MemoryError> {
        self.grouped("strongly_connected_components", repository, branch)
            .await
    }

    /// Weakly connected components.
    pub async fn weakly_connected(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<GroupEntry>, MemoryError> {
        self.grouped("weakly_connected_components", repository, branch)
            .await
    }

    async fn grouped(
        &self,
        function: &str,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<GroupEntry>, MemoryError> {
        self.ensure_projection().await?;

        let cypher = format!(
            "CALL {function}('{PROJECTION_NAME}')
             WITH node, group_id
             MATCH (node)-[:PART_OF]->(r:Repository {{id: $repo_id}})
             RETURN node, group_id ORDER BY group_id, node.name"
        );

        let rows = self
            .db
            .query(&cypher)
            .param("repo_id", repo_pk(repository, branch))
            .fetch_all()
            .await?;

        rows.iter()
            .map(|row| {
                let node: Node = row.get("node")?;
                Ok(GroupEntry {
                    component: ComponentRepository::node_to_component(&node)?,
                    group: row.get("group_id")?,
                })
            })
            .collect()
    }
}
