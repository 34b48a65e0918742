//! MCP server command handler (stdio transport).

use color_eyre::Result;
use rmcp::ServiceExt;

use crate::config::Config;
use crate::context::AppContext;
use crate::mcp::McpServer;

/// Runs the MCP server over stdin/stdout. Stderr carries logs and the
/// readiness line; stdout is reserved for protocol frames.
pub async fn run_mcp() -> Result<()> {
    tracing::info!("Starting memory bank MCP server (stdio)");

    let config = Config::load()?;
    let ctx = AppContext::from_config(config);
    let handles = ctx.handles.clone();
    let server = McpServer::new(ctx);

    let service = server.serve(rmcp::transport::stdio()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to start MCP server");
        color_eyre::eyre::eyre!("Failed to start MCP server: {e}")
    })?;

    eprintln!("kuzumem mcp server ready");
    tracing::info!("MCP server started, waiting for connections");

    service.waiting().await.map_err(|e| {
        tracing::error!(error = %e, "MCP server error");
        color_eyre::eyre::eyre!("MCP server error: {e}")
    })?;

    tracing::info!("MCP server shutting down");
    handles.shutdown().await;
    Ok(())
}
