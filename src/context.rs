//! Application context providing the dependency injection root.

use std::sync::Arc;

use crate::config::Config;
use crate::db::HandleManager;
use crate::di::Context as ContextDerive;
use crate::graph::backends::embedded::KuzuEngine;
use crate::mcp::session::ProjectRegistry;

/// Root application context for dependency injection.
///
/// Holds the shared, process-wide pieces: the database handle manager, the
/// configuration, and the (repository, branch) → project-root registry.
/// `#[derive(Context)]` generates `FromRef` implementations for each field,
/// enabling compile-time dependency resolution.
#[derive(ContextDerive, Clone)]
pub struct AppContext {
    /// Process-wide registry of per-project database handles.
    pub handles: HandleManager,
    /// Application configuration.
    pub config: Arc<Config>,
    /// Project roots registered by memory-bank init, keyed by (repository, branch).
    pub projects: ProjectRegistry,
}

impl AppContext {
    /// Builds the context over the embedded engine.
    pub fn from_config(config: Config) -> Self {
        let handles = HandleManager::new(Arc::new(KuzuEngine), config.database.clone());
        Self {
            handles,
            config: Arc::new(config),
            projects: ProjectRegistry::default(),
        }
    }
}
