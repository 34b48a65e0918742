//! delete and bulk-import tools.

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
use crate::models::ComponentStatus;
use crate::repositories::{ComponentInput, DecisionInput, DeleteTarget, RuleInput};
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteOperation {
    Single,
    BulkByType,
    BulkByTag,
    BulkByBranch,
    BulkByRepository,
    /// Declared but unsupported.
    BulkByFilter,
}

/// Parameters for the delete tool. Destructive calls need `confirm: true`;
/// `dryRun: true` previews the deletion set.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteParams {
    pub operation: DeleteOperation,
    pub repository: String,
    pub branch: String,
    #[serde(default, rename = "entityType")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "tagId")]
    pub tag_id: Option<String>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default, rename = "dryRun")]
    pub dry_run: bool,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    Components,
    Decisions,
    Rules,
}

/// Parameters for the bulk-import tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BulkImportParams {
    #[serde(rename = "type")]
    pub import_type: ImportType,
    pub repository: String,
    pub branch: String,
    /// Items to import; shape depends on `type`.
    pub items: Vec<JsonValue>,
    /// Overwrite existing entities instead of skipping them.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComponentItem {
    id: String,
    name: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    status: Option<ComponentStatus>,
    #[serde(default)]
    depends_on: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DecisionItem {
    id: String,
    name: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    date: Option<chrono::NaiveDate>,
    #[serde(default, alias = "affectedComponents")]
    affected_components: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleItem {
    id: String,
    name: String,
    #[serde(default)]
    created: Option<chrono::NaiveDate>,
    #[serde(default)]
    triggers: Vec<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "governedComponents")]
    governed_components: Vec<String>,
}

fn parse_items<T: serde::de::DeserializeOwned>(
    items: Vec<JsonValue>,
    kind: &str,
) -> Result<Vec<T>, MemoryError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| MemoryError::InvalidArgs(format!("{kind} item {index}: {e}")))
        })
        .collect()
}

#[tool_router(router = bulk_tools, vis = "pub(crate)")]
impl McpServer {
    /// Delete entities, singly or in bulk.
    #[tool(
        name = "delete",
        description = "Delete entities: single, bulk-by-type, bulk-by-tag, bulk-by-branch, bulk-by-repository. Requires confirm: true; dryRun previews."
    )]
    pub async fn delete(
        &self,
        Parameters(params): Parameters<DeleteParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("delete").await;

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

        let target = match params.operation {
            DeleteOperation::Single => {
                let (Some(entity_type), Some(id)) = (params.entity_type, params.id) else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "single delete requires entityType and id".into(),
                    )));
                };
                DeleteTarget::Single { entity_type, id }
            }
            DeleteOperation::BulkByType => {
                let Some(entity_type) = params.entity_type else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "bulk-by-type requires entityType".into(),
                    )));
                };
                DeleteTarget::ByType { entity_type }
            }
            DeleteOperation::BulkByTag => {
                let Some(tag_id) = params.tag_id else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "bulk-by-tag requires tagId".into(),
                    )));
                };
                DeleteTarget::ByTag { tag_id }
            }
            DeleteOperation::BulkByBranch => DeleteTarget::ByBranch,
            DeleteOperation::BulkByRepository => DeleteTarget::ByRepository,
            DeleteOperation::BulkByFilter => {
                return Ok(error_result(MemoryError::UnsupportedOperation(
                    "bulk-by-filter is not supported".into(),
                )));
            }
        };

        let service = self.resolve::<MemoryService>();
        wrap(
            service
                .delete_entities(
                    &ctx,
                    &root,
                    &params.repository,
                    &params.branch,
                    target,
                    params.confirm,
                    params.dry_run,
                )
                .await,
        )
    }

    /// Import many entities in one call, with streamed progress.
    #[tool(
        name = "bulk-import",
        description = "Import components, decisions, or rules in bulk. Skips existing ids unless overwrite: true."
    )]
    pub async fn bulk_import(
        &self,
        Parameters(params): Parameters<BulkImportParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("bulk-import").await;

        if params.items.is_empty() {
            return Ok(error_result(MemoryError::InvalidArgs(
                "bulk-import requires a non-empty items array".into(),
            )));
        }

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

        match params.import_type {
            ImportType::Components => {
                let items: Vec<ComponentItem> = match parse_items(params.items, "component") {
                    Ok(items) => items,
                    Err(e) => return Ok(error_result(e)),
                };
                let inputs = items
                    .into_iter()
                    .map(|item| ComponentInput {
                        id: item.id,
                        name: item.name,
                        kind: item.kind,
                        status: item.status,
                        depends_on: item.depends_on,
                    })
                    .collect();
                wrap(
                    service
                        .import_components(&ctx, &root, repository, branch, inputs, params.overwrite)
                        .await,
                )
            }
            ImportType::Decisions => {
                let items: Vec<DecisionItem> = match parse_items(params.items, "decision") {
                    Ok(items) => items,
                    Err(e) => return Ok(error_result(e)),
                };
                let inputs = items
                    .into_iter()
                    .map(|item| DecisionInput {
                        id: item.id,
                        name: item.name,
                        context: item.context,
                        date: item.date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
                        affected_components: item.affected_components,
                    })
                    .collect();
                wrap(
                    service
                        .import_decisions(&ctx, &root, repository, branch, inputs, params.overwrite)
                        .await,
                )
            }
            ImportType::Rules => {
                let items: Vec<RuleItem> = match parse_items(params.items, "rule") {
                    Ok(items) => items,
                    Err(e) => return Ok(error_result(e)),
                };
                let inputs = items
                    .into_iter()
                    .map(|item| RuleInput {
                        id: item.id,
                        name: item.name,
                        created: item.created,
                        triggers: item.triggers,
                        content: item.content,
                        status: item.status,
                        governed_components: item.governed_components,
                    })
                    .collect();
                wrap(
                    service
                        .import_rules(&ctx, &root, repository, branch, inputs, params.overwrite)
                        .await,
                )
            }
        }
    }
}
