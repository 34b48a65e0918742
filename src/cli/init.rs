//! Init command handler.

use color_eyre::Result;

use crate::config::Config;
use crate::context::AppContext;
use crate::di::FromRef;
use crate::services::{MemoryService, ToolCtx};

use super::ScopeArgs;

/// Initializes the memory bank for a project root.
pub async fn run_init(scope: ScopeArgs) -> Result<()> {
    let root = scope.resolve_root()?;
    let config = Config::load()?;
    let ctx = AppContext::from_config(config);
    let service = MemoryService::from_ref(&ctx);
    let call = ToolCtx::new("cli-init", "cli");

    tracing::info!(
        root = %root.display(),
        repository = %scope.repository,
        branch = %scope.branch,
        "Initializing memory bank"
    );

    let outcome = service
        .init_memory_bank(&call, &root, &scope.repository, &scope.branch)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("init failed: {e}"))?;

    println!(
        "memory bank ready: {} ({})",
        outcome.repository.id,
        root.display()
    );

    service.shutdown().await;
    Ok(())
}
