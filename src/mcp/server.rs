//! MCP server implementation for the memory bank.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, ServerHandler},
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool_handler,
};
use tokio::sync::RwLock;

use crate::context::AppContext;
use crate::di::FromRef;
use crate::error::MemoryError;
use crate::mcp::session::{resolve_project_root, SessionState};
use crate::services::ToolCtx;

/// Memory bank MCP server.
///
/// One instance exists per connection (the HTTP transport builds one per
/// session); the shared state lives in [`AppContext`]. The session carries
/// the resolved project root and (repository, branch) across calls.
#[derive(Clone)]
pub struct McpServer {
    pub(crate) ctx: Arc<AppContext>,
    pub(crate) session: Arc<RwLock<SessionState>>,
    tool_router: ToolRouter<McpServer>,
}

impl McpServer {
    pub fn new(ctx: AppContext) -> Self {
        tracing::info!("Initializing memory bank MCP server");

        Self {
            ctx: Arc::new(ctx),
            session: Arc::new(RwLock::new(SessionState::new())),
            tool_router: Self::tool_router(),
        }
    }

    /// Build the combined tool router from all tool modules.
    fn tool_router() -> ToolRouter<Self> {
        Self::memory_bank_tools()
            + Self::entity_tools()
            + Self::context_tools()
            + Self::query_tools()
            + Self::associate_tools()
            + Self::analyze_tools()
            + Self::detect_tools()
            + Self::bulk_tools()
            + Self::search_tools()
            + Self::introspect_tools()
    }

    /// Resolve a dependency from the context.
    pub fn resolve<T: FromRef<AppContext>>(&self) -> T {
        T::from_ref(&self.ctx)
    }

    /// Builds the per-call context and stamps session activity.
    ///
    /// Uses the log-only progress sink; a transport that can stream
    /// events installs its own via `ToolCtx::with_progress`.
    pub(crate) async fn tool_ctx(&self, tool: &str) -> ToolCtx {
        let mut session = self.session.write().await;
        session.touch();
        ToolCtx::new(tool, &session.session_id)
    }

    /// Resolves the project root for a call: explicit arg, then session,
    /// then the process-wide registry, then the environment default.
    pub(crate) async fn resolve_root(
        &self,
        explicit: Option<&str>,
        repository: &str,
        branch: &str,
    ) -> Result<PathBuf, MemoryError> {
        let session = self.session.read().await;
        resolve_project_root(explicit, &session, &self.ctx.projects, repository, branch)
    }

    /// Records the initialized project in the session and the registry so
    /// subsequent calls (from any session naming the same repository and
    /// branch) resolve without repeating the root.
    pub(crate) async fn bind_session(&self, root: &Path, repository: &str, branch: &str) {
        {
            let mut session = self.session.write().await;
            session.client_project_root = Some(root.to_path_buf());
            session.repository = Some(repository.to_string());
            session.branch = Some(branch.to_string());
            session.touch();
        }
        self.ctx
            .projects
            .register(repository, branch, root.to_path_buf());
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                r#"KuzuMem - Per-Project Graph Memory Bank MCP Server

Structured software engineering knowledge (components, decisions, rules,
files, tags, daily contexts) stored in an embedded graph database per
project root and (repository, branch) pair.

## Quick Start

1. **memory-bank** {operation: "init", clientProjectRoot, repository, branch}
2. **entity** {operation: "create", entityType: "component", data: {...}}
3. **query** {mode: "dependencies", id: "comp-..."}

## Tools

**memory-bank**: init, get-metadata, update-metadata
**entity**: create/update/get/delete over component, decision, rule, file, tag
**context**: update or read the daily working context
**query**: dependencies, dependents, related, governance, history, list
**associate**: tag an item, or link a component to a file it implements
**analyze**: pagerank, k-core, louvain, scc, wcc, shortest-path
**detect**: cycles, islands
**delete**: single or bulk deletion (requires confirm: true)
**bulk-import**: components, decisions, or rules in one call
**search**: keyword search (semantic mode is a placeholder)
**introspect**: entity counts and schema summary

All entities are scoped to the (repository, branch) named in the call.
Run memory-bank init once per project root before anything else.
"#
                .to_string(),
            ),
        }
    }
}
