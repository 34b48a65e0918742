//! search tool: keyword matching plus the declared semantic placeholder.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;
use serde_json::json;

use crate::mcp::protocol::{error_result, wrap, Response};
use crate::mcp::server::McpServer;
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    /// Placeholder mode; returns a documented stub until a vector store
    /// is integrated.
    Semantic,
}

/// Parameters for the search tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    pub mode: SearchMode,
    pub query: String,
    pub repository: String,
    pub branch: String,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Accepted for semantic mode compatibility; unused by keyword mode.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = search_tools, vis = "pub(crate)")]
impl McpServer {
    /// Search entity properties by keyword.
    #[tool(
        name = "search",
        description = "Search entities. Keyword mode matches properties; semantic mode is a placeholder pending a vector store."
    )]
    pub async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("search").await;

        match params.mode {
            SearchMode::Semantic => {
                // Declared placeholder: no vector store is wired in.
                let payload = json!({
                    "mode": "semantic",
                    "query": params.query,
                    "results": [{
                        "id": "semantic-placeholder",
                        "score": 0.0,
                        "message": "Semantic search is not yet available; no vector store is configured. Use mode: \"keyword\" instead.",
                    }],
                });
                Response(payload).into()
            }
            SearchMode::Keyword => {
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
                ctx.progress.send("in_progress", "searching", 10);
                let result = service
                    .keyword_search(
                        &ctx,
                        &root,
                        &params.repository,
                        &params.branch,
                        &params.query,
                        params.limit.unwrap_or(20),
                    )
                    .await
                    .map(|hits| {
                        json!({
                            "mode": "keyword",
                            "query": params.query,
                            "results": hits,
                        })
                    });
                if result.is_ok() {
                    ctx.progress.complete("search finished");
                }
                wrap(result)
            }
        }
    }
}
