//! context tool: daily working-context updates and reads.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;

use crate::error::MemoryError;
use crate::mcp::protocol::{error_result, wrap};
use crate::mcp::server::McpServer;
use crate::repositories::ContextUpdate;
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContextOperation {
    /// Append to today's (or the named day's) context.
    Update,
    /// List recent contexts, newest first.
    List,
    /// Get one day's context.
    Get,
    /// Attach the day's context to a component, decision, or rule.
    Attach,
}

/// Parameters for the context tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ContextParams {
    pub operation: ContextOperation,
    pub repository: String,
    pub branch: String,
    /// Day in YYYY-MM-DD form; defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default, alias = "relatedIssue")]
    pub related_issue: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// A decision reference to append.
    #[serde(default)]
    pub decision: Option<String>,
    /// An observation to append.
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Entity type for attach (component, decision, rule).
    #[serde(default, rename = "entityType")]
    pub entity_type: Option<String>,
    /// Item id for attach.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[tool_router(router = context_tools, vis = "pub(crate)")]
impl McpServer {
    /// Update or read the daily working context.
    #[tool(
        name = "context",
        description = "Append to, list, fetch, or attach the per-day working context."
    )]
    pub async fn context(
        &self,
        Parameters(params): Parameters<ContextParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("context").await;

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

        let date = match params.date.as_deref().map(parse_date).transpose() {
            Ok(date) => date,
            Err(e) => return Ok(error_result(e)),
        };

        match params.operation {
            ContextOperation::Update => {
                let update = ContextUpdate {
                    agent: params.agent,
                    related_issue: params.related_issue,
                    summary: params.summary,
                    decision: params.decision,
                    observation: params.observation,
                };
                wrap(
                    service
                        .update_context(&ctx, &root, repository, branch, date, update)
                        .await,
                )
            }
            ContextOperation::List => wrap(
                service
                    .latest_contexts(&ctx, &root, repository, branch, params.limit)
                    .await,
            ),
            ContextOperation::Get => {
                let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
                let result = service
                    .context_by_date(&ctx, &root, repository, branch, date)
                    .await
                    .and_then(|context| {
                        context.ok_or(MemoryError::NotFound {
                            kind: "Context",
                            id: date.format("%Y-%m-%d").to_string(),
                        })
                    });
                wrap(result)
            }
            ContextOperation::Attach => {
                let (Some(entity_type), Some(id)) = (params.entity_type, params.id) else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "attach requires entityType and id".into(),
                    )));
                };
                let result = service
                    .attach_context(&ctx, &root, repository, branch, date, &entity_type, &id)
                    .await
                    .map(|()| serde_json::json!({ "success": true }));
                wrap(result)
            }
        }
    }
}

fn parse_date(raw: &str) -> Result<chrono::NaiveDate, MemoryError> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| MemoryError::InvalidArgs(format!("invalid date (expected YYYY-MM-DD): {raw}")))
}
