//! memory-bank tool: init and metadata management.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::MemoryError;
use crate::mcp::protocol::{error_result, wrap};
use crate::mcp::server::McpServer;
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryBankOperation {
    /// Create or open the memory bank for a project root.
    Init,
    /// Read the metadata blob.
    GetMetadata,
    /// Replace the metadata blob.
    UpdateMetadata,
}

/// Parameters for the memory-bank tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MemoryBankParams {
    pub operation: MemoryBankOperation,
    /// Absolute path to the project root. Required for init; later calls
    /// inherit it from the session.
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
    /// Repository name.
    pub repository: String,
    /// Branch name.
    pub branch: String,
    /// Metadata content for update-metadata.
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

#[tool_router(router = memory_bank_tools, vis = "pub(crate)")]
impl McpServer {
    /// Initialize a project's memory bank or manage its metadata.
    #[tool(
        name = "memory-bank",
        description = "Initialize a project memory bank (operation: init) or read/update its metadata."
    )]
    pub async fn memory_bank(
        &self,
        Parameters(params): Parameters<MemoryBankParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("memory-bank").await;
        tracing::info!(
            repository = %params.repository,
            branch = %params.branch,
            "Running memory-bank tool"
        );

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

        match params.operation {
            MemoryBankOperation::Init => {
                self.bind_session(&root, &params.repository, &params.branch)
                    .await;
                wrap(
                    service
                        .init_memory_bank(&ctx, &root, &params.repository, &params.branch)
                        .await,
                )
            }
            MemoryBankOperation::GetMetadata => {
                let result = service
                    .get_metadata(&ctx, &root, &params.repository, &params.branch)
                    .await
                    .and_then(|metadata| {
                        metadata.ok_or(MemoryError::NotFound {
                            kind: "Metadata",
                            id: format!("{}:{}", params.repository, params.branch),
                        })
                    });
                wrap(result)
            }
            MemoryBankOperation::UpdateMetadata => {
                let Some(content) = params.metadata else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "update-metadata requires a metadata object".into(),
                    )));
                };
                wrap(
                    service
                        .update_metadata(&ctx, &root, &params.repository, &params.branch, &content)
                        .await,
                )
            }
        }
    }
}
