//! associate tool: tag and implementation edges.

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
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AssociateOperation {
    /// Attach a tag to an entity (TAGGED_WITH).
    TagItem,
    /// Link a component to a file it implements (IMPLEMENTS).
    ComponentFile,
}

/// Parameters for the associate tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AssociateParams {
    pub operation: AssociateOperation,
    pub repository: String,
    pub branch: String,
    /// Entity type of the item being tagged.
    #[serde(default, rename = "entityType")]
    pub entity_type: Option<String>,
    /// Logical id of the item being tagged.
    #[serde(default, rename = "itemId")]
    pub item_id: Option<String>,
    #[serde(default, rename = "tagId")]
    pub tag_id: Option<String>,
    #[serde(default, rename = "componentId")]
    pub component_id: Option<String>,
    #[serde(default, rename = "fileId")]
    pub file_id: Option<String>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = associate_tools, vis = "pub(crate)")]
impl McpServer {
    /// Create tag or implementation edges between entities.
    #[tool(
        name = "associate",
        description = "Attach a tag to an entity, or link a component to the file it implements."
    )]
    pub async fn associate(
        &self,
        Parameters(params): Parameters<AssociateParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("associate").await;

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

        match params.operation {
            AssociateOperation::TagItem => {
                let (Some(entity_type), Some(item_id), Some(tag_id)) =
                    (params.entity_type, params.item_id, params.tag_id)
                else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "tag-item requires entityType, itemId, and tagId".into(),
                    )));
                };
                let result = service
                    .tag_item(
                        &ctx,
                        &root,
                        repository,
                        branch,
                        &entity_type,
                        &item_id,
                        &tag_id,
                    )
                    .await
                    .map(|linked| {
                        json!({
                            "success": linked,
                            "message": if linked {
                                format!("tagged {entity_type} {item_id} with {tag_id}")
                            } else {
                                format!("{entity_type} {item_id} or tag {tag_id} not found")
                            },
                        })
                    });
                wrap(result)
            }
            AssociateOperation::ComponentFile => {
                let (Some(component_id), Some(file_id)) = (params.component_id, params.file_id)
                else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "component-file requires componentId and fileId".into(),
                    )));
                };
                let result = service
                    .associate_file_with_component(
                        &ctx,
                        &root,
                        repository,
                        branch,
                        &component_id,
                        &file_id,
                    )
                    .await
                    .map(|linked| {
                        json!({
                            "success": linked,
                            "message": if linked {
                                format!("component {component_id} implements file {file_id}")
                            } else {
                                format!("component {component_id} or file {file_id} not found")
                            },
                        })
                    });
                wrap(result)
            }
        }
    }
}
