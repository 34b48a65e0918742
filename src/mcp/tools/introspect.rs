//! introspect tool: schema and content summary.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;
use serde_json::json;

use crate::mcp::protocol::{error_result, wrap};
use crate::mcp::server::McpServer;
use crate::services::MemoryService;

/// Parameters for the introspect tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IntrospectParams {
    pub repository: String,
    pub branch: String,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = introspect_tools, vis = "pub(crate)")]
impl McpServer {
    /// Summarize the memory bank: labels, counts, relationship vocabulary.
    #[tool(
        name = "introspect",
        description = "Entity counts per label and the relationship vocabulary of the memory bank."
    )]
    pub async fn introspect(
        &self,
        Parameters(params): Parameters<IntrospectParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("introspect").await;

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
        let result = service
            .introspect_labels(&ctx, &root, &params.repository, &params.branch)
            .await
            .map(|counts| {
                json!({
                    "repository": params.repository,
                    "branch": params.branch,
                    "labels": counts
                        .iter()
                        .map(|(label, count)| json!({ "label": label, "count": count }))
                        .collect::<Vec<_>>(),
                    "relationships": [
                        "PART_OF", "DEPENDS_ON", "IMPLEMENTS", "GOVERNS",
                        "AFFECTS", "CONTEXT_OF", "TAGGED_WITH",
                    ],
                })
            });
        wrap(result)
    }
}
