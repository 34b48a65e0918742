//! HTTP server command handler (streamable HTTP transport).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use axum::Router;
use color_eyre::Result;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::context::AppContext;
use crate::mcp::McpServer;

/// Budget for one HTTP request; expiry writes a 408.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long open sessions get to drain after a shutdown signal before the
/// process exits anyway.
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Runs the MCP server over streamable HTTP. Each session gets its own
/// `McpServer` instance; the app context (handle registry, project
/// registry) is shared.
pub async fn run_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    tracing::info!("Starting memory bank HTTP server");

    let config = Config::load()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let ctx = AppContext::from_config(config);
    let handles = ctx.handles.clone();

    let service = StreamableHttpService::new(
        move || Ok(McpServer::new(ctx.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("mcp-session-id"),
        ]);

    let app = Router::new()
        .fallback_service(ServiceBuilder::new().service(service))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid address {host}:{port}: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Failed to bind to {addr}: {e}"))?;

    tracing::info!("memory bank HTTP server listening on http://{addr}");

    // The signal starts the graceful drain; the deadline bounds it.
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received, draining sessions");
        let _ = drain_tx.send(());
    };

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    });

    tokio::select! {
        result = &mut server => {
            result
                .map_err(|e| color_eyre::eyre::eyre!("HTTP server task failed: {e}"))?
                .map_err(|e| {
                    tracing::error!(error = %e, "HTTP server error");
                    color_eyre::eyre::eyre!("HTTP server error: {e}")
                })?;
        }
        _ = async {
            let _ = drain_rx.await;
            tokio::time::sleep(DRAIN_DEADLINE).await;
        } => {
            tracing::warn!(
                deadline_secs = DRAIN_DEADLINE.as_secs(),
                "Sessions did not close before the drain deadline, forcing shutdown"
            );
            server.abort();
        }
    }

    tracing::info!("HTTP server shutting down");
    handles.shutdown().await;
    Ok(())
}
