//! Session state and project-root resolution.
//!
//! A session is created per MCP connection and carries the resolved
//! `clientProjectRoot` plus the active (repository, branch) pair. The
//! process-wide [`ProjectRegistry`] remembers roots announced by
//! `memory-bank init`, so follow-up calls that only name (repository,
//! branch) still resolve.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::MemoryError;

/// Per-connection session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub client_project_root: Option<PathBuf>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            client_project_root: None,
            repository: None,
            branch: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide `(repository, branch) → clientProjectRoot` registry.
///
/// Writes happen on `memory-bank init`; reads are point lookups from any
/// session.
#[derive(Clone, Default)]
pub struct ProjectRegistry {
    inner: Arc<RwLock<HashMap<(String, String), PathBuf>>>,
}

impl ProjectRegistry {
    pub fn register(&self, repository: &str, branch: &str, root: PathBuf) {
        self.inner
            .write()
            .expect("project registry poisoned")
            .insert((repository.to_string(), branch.to_string()), root);
    }

    pub fn lookup(&self, repository: &str, branch: &str) -> Option<PathBuf> {
        self.inner
            .read()
            .expect("project registry poisoned")
            .get(&(repository.to_string(), branch.to_string()))
            .cloned()
    }
}

/// Resolves the project root for a tool call.
///
/// Order: explicit argument, then the session, then the registry keyed by
/// (repository, branch), then the `CLIENT_PROJECT_ROOT` environment
/// default. Absence is a precondition failure telling the caller to
/// initialize first.
pub fn resolve_project_root(
    explicit: Option<&str>,
    session: &SessionState,
    registry: &ProjectRegistry,
    repository: &str,
    branch: &str,
) -> Result<PathBuf, MemoryError> {
    if let Some(root) = explicit.filter(|r| !r.is_empty()) {
        let root = PathBuf::from(root);
        if !root.is_absolute() {
            return Err(MemoryError::InvalidArgs(format!(
                "clientProjectRoot must be an absolute path: {}",
                root.display()
            )));
        }
        return Ok(root);
    }

    if let Some(root) = &session.client_project_root {
        return Ok(root.clone());
    }

    if let Some(root) = registry.lookup(repository, branch) {
        return Ok(root);
    }

    if let Some(root) = Config::default_client_project_root() {
        return Ok(root);
    }

    Err(MemoryError::PreconditionRequired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_root_wins() {
        let session = SessionState::new();
        let registry = ProjectRegistry::default();
        registry.register("r", "main", PathBuf::from("/registered"));

        let root =
            resolve_project_root(Some("/explicit"), &session, &registry, "r", "main").unwrap();
        assert_eq!(root, PathBuf::from("/explicit"));
    }

    #[test]
    fn test_relative_explicit_root_rejected() {
        let session = SessionState::new();
        let registry = ProjectRegistry::default();
        let err =
            resolve_project_root(Some("relative/path"), &session, &registry, "r", "main")
                .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGS");
    }

    #[test]
    fn test_session_beats_registry() {
        let mut session = SessionState::new();
        session.client_project_root = Some(PathBuf::from("/from-session"));
        let registry = ProjectRegistry::default();
        registry.register("r", "main", PathBuf::from("/registered"));

        let root = resolve_project_root(None, &session, &registry, "r", "main").unwrap();
        assert_eq!(root, PathBuf::from("/from-session"));
    }

    #[test]
    fn test_registry_fallback() {
        let session = SessionState::new();
        let registry = ProjectRegistry::default();
        registry.register("r", "dev", PathBuf::from("/registered"));

        let root = resolve_project_root(None, &session, &registry, "r", "dev").unwrap();
        assert_eq!(root, PathBuf::from("/registered"));
    }

    #[test]
    fn test_absent_root_is_precondition_failure() {
        let session = SessionState::new();
        let registry = ProjectRegistry::default();
        let err = resolve_project_root(None, &session, &registry, "r", "main").unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_REQUIRED");
    }

    #[test]
    fn test_session_activity_is_monotonic() {
        let mut session = SessionState::new();
        let before = session.last_activity;
        session.touch();
        assert!(session.last_activity >= before);
    }
}
