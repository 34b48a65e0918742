//! analyze and detect tools: graph algorithms and heuristics.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::MemoryError;
use crate::mcp::protocol::{error_result, wrap};
use crate::mcp::server::McpServer;
use crate::repositories::{Direction, PageRankOptions, TraversalOptions};
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Pagerank,
    KCore,
    Louvain,
    Scc,
    Wcc,
    ShortestPath,
}

/// Parameters for the analyze tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeParams {
    pub algorithm: Algorithm,
    pub repository: String,
    pub branch: String,
    /// Minimum core degree for k-core.
    #[serde(default)]
    pub k: Option<i64>,
    /// Start component for shortest-path.
    #[serde(default, rename = "startId")]
    pub start_id: Option<String>,
    /// End component for shortest-path.
    #[serde(default, rename = "endId")]
    pub end_id: Option<String>,
    #[serde(default, rename = "dampingFactor")]
    pub damping_factor: Option<f64>,
    #[serde(default, rename = "maxIterations")]
    pub max_iterations: Option<i64>,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default, rename = "normalizeInitial")]
    pub normalize_initial: Option<bool>,
    /// Relationship filter for shortest-path.
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Detector {
    /// Dependency cycles (SCC groups larger than one).
    Cycles,
    /// Isolated components (WCC singletons).
    Islands,
}

/// Parameters for the detect tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectParams {
    pub detector: Detector,
    pub repository: String,
    pub branch: String,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = analyze_tools, vis = "pub(crate)")]
impl McpServer {
    /// Run a graph algorithm over the component dependency graph.
    #[tool(
        name = "analyze",
        description = "Graph algorithms over components and DEPENDS_ON: pagerank, k-core, louvain, scc, wcc, shortest-path."
    )]
    pub async fn analyze(
        &self,
        Parameters(params): Parameters<AnalyzeParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("analyze").await;

        let root = match self
            .resolve_root(
                params.client_project_root.as_deref(),
                &params.repository,
                &params.branch,
            )
            .await
        {
            Ok(root) => root,
            Err(e) => return Ok(error_result(e)),
        };

        let service = self.resolve::<MemoryService>();
        let repository = params.repository.as_str();
        let branch = params.branch.as_str();

        ctx.progress.send(
            "in_progress",
            format!("running {:?}", params.algorithm),
            10,
        );

        let result = match params.algorithm {
            Algorithm::Pagerank => {
                let options = PageRankOptions {
                    damping_factor: params.damping_factor,
                    max_iterations: params.max_iterations,
                    tolerance: params.tolerance,
                    normalize_initial: params.normalize_initial,
                };
                service
                    .page_rank(&ctx, &root, repository, branch, options)
                    .await
                    .map(|entries| json!({ "algorithm": "pagerank", "results": entries }))
            }
            Algorithm::KCore => service
                .k_core(&ctx, &root, repository, branch, params.k.unwrap_or(1))
                .await
                .map(|entries| json!({ "algorithm": "k-core", "results": entries })),
            Algorithm::Louvain => service
                .louvain(&ctx, &root, repository, branch)
                .await
                .map(|entries| json!({ "algorithm": "louvain", "results": entries })),
            Algorithm::Scc => service
                .strongly_connected(&ctx, &root, repository, branch)
                .await
                .map(|entries| json!({ "algorithm": "scc", "results": entries })),
            Algorithm::Wcc => service
                .weakly_connected(&ctx, &root, repository, branch)
                .await
                .map(|entries| json!({ "algorithm": "wcc", "results": entries })),
            Algorithm::ShortestPath => {
                let (Some(start_id), Some(end_id)) = (&params.start_id, &params.end_id) else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "shortest-path requires startId and endId".into(),
                    )));
                };
                let options = TraversalOptions {
                    rel_types: params.types.clone(),
                    direction: params.direction.as_deref().and_then(Direction::parse),
                    depth: params.depth,
                };
                service
                    .shortest_path(&ctx, &root, repository, branch, start_id, end_id, options)
                    .await
                    .map(|shortest| json!(shortest))
            }
        };

        if result.is_ok() {
            ctx.progress.complete("analysis finished");
        }
        wrap(result)
    }
}

#[tool_router(router = detect_tools, vis = "pub(crate)")]
impl McpServer {
    /// Structural heuristics over the dependency graph.
    #[tool(
        name = "detect",
        description = "Detect structural problems: dependency cycles, isolated components."
    )]
    pub async fn detect(
        &self,
        Parameters(params): Parameters<DetectParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("detect").await;

        let root = match self
            .resolve_root(
                params.client_project_root.as_deref(),
                &params.repository,
                &params.branch,
            )
            .await
        {
            Ok(root) => root,
            Err(e) => return Ok(error_result(e)),
        };

        let service = self.resolve::<MemoryService>();
        let repository = params.repository.as_str();
        let branch = params.branch.as_str();

        match params.detector {
            Detector::Cycles => {
                let result = service
                    .detect_cycles(&ctx, &root, repository, branch)
                    .await
                    .map(|cycles| {
                        json!({
                            "detector": "cycles",
                            "found": !cycles.is_empty(),
                            "cycles": cycles,
                        })
                    });
                wrap(result)
            }
            Detector::Islands => {
                let result = service
                    .detect_islands(&ctx, &root, repository, branch)
                    .await
                    .map(|islands| {
                        json!({
                            "detector": "islands",
                            "found": !islands.is_empty(),
                            "components": islands,
                        })
                    });
                wrap(result)
            }
        }
    }
}
