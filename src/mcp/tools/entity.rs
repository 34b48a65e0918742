//! entity tool: CRUD multiplexed over the five entity families.

use chrono::NaiveDate;
use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::MemoryError;
use crate::mcp::protocol::{error_result, wrap, Response};
use crate::mcp::server::McpServer;
use crate::models::ComponentStatus;
use crate::repositories::{
    ComponentInput, DecisionInput, DeleteTarget, FileInput, RuleInput, TagInput,
};
use crate::services::MemoryService;

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityOperation {
    Create,
    Update,
    Get,
    Delete,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Component,
    Decision,
    Rule,
    File,
    Tag,
}

impl EntityType {
    fn as_str(self) -> &'static str {
        match self {
            EntityType::Component => "component",
            EntityType::Decision => "decision",
            EntityType::Rule => "rule",
            EntityType::File => "file",
            EntityType::Tag => "tag",
        }
    }
}

/// Parameters for the entity tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityParams {
    pub operation: EntityOperation,
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    pub repository: String,
    pub branch: String,
    /// Logical id; required for get and delete.
    #[serde(default)]
    pub id: Option<String>,
    /// Entity fields; required for create and update.
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default, rename = "clientProjectRoot")]
    pub client_project_root: Option<String>,
}

// Typed shapes for the `data` argument.

#[derive(Debug, Deserialize)]
struct ComponentData {
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
struct DecisionData {
    id: String,
    name: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default, alias = "affectedComponents")]
    affected_components: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleData {
    id: String,
    name: String,
    #[serde(default)]
    created: Option<NaiveDate>,
    #[serde(default)]
    triggers: Vec<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "governedComponents")]
    governed_components: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileData {
    id: String,
    name: String,
    path: String,
    #[serde(default, alias = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metrics: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

fn parse_data<T: serde::de::DeserializeOwned>(
    data: Option<JsonValue>,
    entity_type: &str,
) -> Result<T, MemoryError> {
    let data = data.ok_or_else(|| {
        MemoryError::InvalidArgs(format!("create/update of a {entity_type} requires data"))
    })?;
    serde_json::from_value(data)
        .map_err(|e| MemoryError::InvalidArgs(format!("invalid {entity_type} data: {e}")))
}

#[tool_router(router = entity_tools, vis = "pub(crate)")]
impl McpServer {
    /// CRUD over components, decisions, rules, files, and tags.
    #[tool(
        name = "entity",
        description = "Create, update, get, or delete a component, decision, rule, file, or tag."
    )]
    pub async fn entity(
        &self,
        Parameters(params): Parameters<EntityParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.tool_ctx("entity").await;
        tracing::info!(
            entity_type = params.entity_type.as_str(),
            repository = %params.repository,
            "Running entity tool"
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
        let repository = params.repository.as_str();
        let branch = params.branch.as_str();

        match params.operation {
            EntityOperation::Create | EntityOperation::Update => match params.entity_type {
                EntityType::Component => {
                    let data: ComponentData = match parse_data(params.data, "component") {
                        Ok(data) => data,
                        Err(e) => return Ok(error_result(e)),
                    };
                    let input = ComponentInput {
                        id: data.id,
                        name: data.name,
                        kind: data.kind,
                        status: data.status,
                        depends_on: data.depends_on,
                    };
                    wrap(
                        service
                            .upsert_component(&ctx, &root, repository, branch, input)
                            .await,
                    )
                }
                EntityType::Decision => {
                    let data: DecisionData = match parse_data(params.data, "decision") {
                        Ok(data) => data,
                        Err(e) => return Ok(error_result(e)),
                    };
                    let input = DecisionInput {
                        id: data.id,
                        name: data.name,
                        context: data.context,
                        date: data.date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
                        affected_components: data.affected_components,
                    };
                    wrap(
                        service
                            .upsert_decision(&ctx, &root, repository, branch, input)
                            .await,
                    )
                }
                EntityType::Rule => {
                    let data: RuleData = match parse_data(params.data, "rule") {
                        Ok(data) => data,
                        Err(e) => return Ok(error_result(e)),
                    };
                    let input = RuleInput {
                        id: data.id,
                        name: data.name,
                        created: data.created,
                        triggers: data.triggers,
                        content: data.content,
                        status: data.status,
                        governed_components: data.governed_components,
                    };
                    wrap(
                        service
                            .upsert_rule(&ctx, &root, repository, branch, input)
                            .await,
                    )
                }
                EntityType::File => {
                    let data: FileData = match parse_data(params.data, "file") {
                        Ok(data) => data,
                        Err(e) => return Ok(error_result(e)),
                    };
                    let input = FileInput {
                        id: data.id,
                        name: data.name,
                        path: data.path,
                        mime_type: data.mime_type,
                        size: data.size,
                        content: data.content,
                        metrics: data.metrics,
                    };
                    wrap(
                        service
                            .upsert_file(&ctx, &root, repository, branch, input)
                            .await,
                    )
                }
                EntityType::Tag => {
                    let data: TagData = match parse_data(params.data, "tag") {
                        Ok(data) => data,
                        Err(e) => return Ok(error_result(e)),
                    };
                    let input = TagInput {
                        id: data.id,
                        name: data.name,
                        category: data.category,
                        description: data.description,
                        color: data.color,
                    };
                    wrap(
                        service
                            .upsert_tag(&ctx, &root, repository, branch, input)
                            .await,
                    )
                }
            },
            EntityOperation::Get => {
                let Some(id) = params.id else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "get requires an id".into(),
                    )));
                };
                match params.entity_type {
                    EntityType::Component => wrap(
                        service
                            .get_component(&ctx, &root, repository, branch, &id)
                            .await
                            .and_then(|c| require_found(c, "Component", &id)),
                    ),
                    EntityType::Decision => wrap(
                        service
                            .get_decision(&ctx, &root, repository, branch, &id)
                            .await
                            .and_then(|d| require_found(d, "Decision", &id)),
                    ),
                    EntityType::Rule => wrap(
                        service
                            .get_rule(&ctx, &root, repository, branch, &id)
                            .await
                            .and_then(|r| require_found(r, "Rule", &id)),
                    ),
                    EntityType::File => wrap(
                        service
                            .get_file(&ctx, &root, repository, branch, &id)
                            .await
                            .and_then(|f| require_found(f, "File", &id)),
                    ),
                    EntityType::Tag => wrap(
                        service
                            .get_tag(&ctx, &root, repository, branch, &id)
                            .await
                            .and_then(|t| require_found(t, "Tag", &id)),
                    ),
                }
            }
            EntityOperation::Delete => {
                let Some(id) = params.id else {
                    return Ok(error_result(MemoryError::InvalidArgs(
                        "delete requires an id".into(),
                    )));
                };
                let target = DeleteTarget::Single {
                    entity_type: params.entity_type.as_str().to_string(),
                    id,
                };
                match service
                    .delete_entities(&ctx, &root, repository, branch, target, true, false)
                    .await
                {
                    Ok(outcome) => Response(outcome).into(),
                    Err(e) => Ok(error_result(e)),
                }
            }
        }
    }
}

fn require_found<T>(value: Option<T>, kind: &'static str, id: &str) -> Result<T, MemoryError> {
    value.ok_or(MemoryError::NotFound {
        kind,
        id: id.to_string(),
    })
}
