//! query tool: read-only graph questions.

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
use crate::repositories::{ContextItemType, Direction, TraversalOptions};
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    /// One-hop DEPENDS_ON targets of a component.
    Dependencies,
    /// One-hop DEPENDS_ON sources of a component.
    Dependents,
    /// Variable-length neighborhood of a component.
    Related,
    /// Decisions and rules governing a component.
    Governance,
    /// Contexts attached to an item.
    History,
    /// Entities of one type in the branch.
    List,
    /// Items carrying a tag.
    Tagged,
}

/// Parameters for the query tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    pub mode: QueryMode,
    pub repository: String,
    pub branch: String,
    /// Component/item id for the component-centric modes; tag id for
    /// tagged.
    #[serde(default)]
    pub id: Option<String>,
    /// Entity type for list (component, decision, rule, file, tag,
    /// context) and history (component, decision, rule).
    #[serde(default, rename = "entityType")]
    pub entity_type: Option<String>,
    /// Relationship types for related.
    #[serde(default)]
    pub types: Option<Vec<String>>,
    /// Traversal depth for related, clamped to [1, 10].
    #[serde(default)]
    pub depth: Option<u32>,
    /// OUTGOING, INCOMING, or BOTH.
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = query_tools, vis = "pub(crate)")]
impl McpServer {
    /// Read-only graph questions: dependencies, governance, history, lists.
    #[tool(
        name = "query",
        description = "Query the graph: dependencies, dependents, related items, governance, contextual history, entity lists, tagged items."
    )]
    pub async fn query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("query").await;

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

        let require_id = |id: &Option<String>| -> Result<String, MemoryError> {
            id.clone()
                .ok_or_else(|| MemoryError::InvalidArgs("this query mode requires an id".into()))
        };

        match params.mode {
            QueryMode::Dependencies => {
                let id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                wrap(
                    service
                        .get_dependencies(&ctx, &root, repository, branch, &id)
                        .await,
                )
            }
            QueryMode::Dependents => {
                let id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                wrap(
                    service
                        .get_dependents(&ctx, &root, repository, branch, &id)
                        .await,
                )
            }
            QueryMode::Related => {
                let id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                let options = TraversalOptions {
                    rel_types: params.types.clone(),
                    direction: params.direction.as_deref().and_then(Direction::parse),
                    depth: params.depth,
                };
                wrap(
                    service
                        .get_related(&ctx, &root, repository, branch, &id, options)
                        .await,
                )
            }
            QueryMode::Governance => {
                let id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                let decisions = service
                    .governing_decisions(&ctx, &root, repository, branch, &id)
                    .await;
                let rules = service
                    .governing_rules(&ctx, &root, repository, branch, &id)
                    .await;
                wrap(decisions.and_then(|decisions| {
                    rules.map(|rules| json!({ "decisions": decisions, "rules": rules }))
                }))
            }
            QueryMode::History => {
                let id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                let item_type = params
                    .entity_type
                    .as_deref()
                    .and_then(ContextItemType::parse);
                let Some(item_type) = item_type else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "history requires entityType of component, decision, or rule".into(),
                    )));
                };
                wrap(
                    service
                        .contextual_history(&ctx, &root, repository, branch, &id, item_type)
                        .await,
                )
            }
            QueryMode::List => {
                let entity_type = params.entity_type.as_deref().unwrap_or("component");
                let result = match entity_type {
                    "component" => service
                        .list_components(&ctx, &root, repository, branch)
                        .await
                        .map(|v| json!(v)),
                    "decision" => service
                        .list_decisions(&ctx, &root, repository, branch, None, None)
                        .await
                        .map(|v| json!(v)),
                    "rule" => service
                        .list_rules(&ctx, &root, repository, branch)
                        .await
                        .map(|v| json!(v)),
                    "file" => service
                        .list_files(&ctx, &root, repository, branch)
                        .await
                        .map(|v| json!(v)),
                    "tag" => service
                        .list_tags(&ctx, &root, repository, branch)
                        .await
                        .map(|v| json!(v)),
                    "context" => service
                        .latest_contexts(&ctx, &root, repository, branch, params.limit)
                        .await
                        .map(|v| json!(v)),
                    other => Err(MemoryError::InvalidArgs(format!(
                        "unknown entity type for list: {other}"
                    ))),
                };
                wrap(result)
            }
            QueryMode::Tagged => {
                let tag_id = match require_id(&params.id) {
                    Ok(id) => id,
                    Err(e) => return Ok(error_result(e)),
                };
                wrap(
                    service
                        .items_by_tag(
                            &ctx,
                            &root,
                            repository,
                            branch,
                            &tag_id,
                            params.entity_type.as_deref(),
                        )
                        .await,
                )
            }
        }
    }
}
