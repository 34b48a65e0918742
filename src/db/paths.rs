//! Filesystem preparation for per-project database files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::MemoryError;

/// Resolves the database file path for a client project root.
///
/// An absolute `path_override` bypasses per-project resolution entirely;
/// that mode breaks multi-project isolation and exists for test harnesses.
pub fn resolve_db_path(client_project_root: &Path, config: &DatabaseConfig) -> PathBuf {
    if let Some(path) = &config.path_override {
        return path.clone();
    }
    client_project_root
        .join(&config.relative_dir)
        .join(&config.filename)
}

/// The engine's lock file sits next to the database file.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let file_name = db_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    db_path.with_file_name(format!("{file_name}.lock"))
}

/// Creates missing parent directories and verifies the directory is
/// writable by writing and deleting a probe file.
pub fn prepare_database_dir(db_path: &Path) -> Result<(), MemoryError> {
    let parent = db_path
        .parent()
        .ok_or_else(|| MemoryError::InvalidArgs(format!("invalid db path: {}", db_path.display())))?;

    std::fs::create_dir_all(parent).map_err(|e| permission_or_internal(e, parent))?;

    let probe = parent.join(".kuzumem-probe");
    std::fs::write(&probe, b"probe").map_err(|e| permission_or_internal(e, parent))?;
    std::fs::remove_file(&probe).map_err(|e| permission_or_internal(e, &probe))?;
    Ok(())
}

/// Removes a lock file older than `max_age`.
///
/// A younger lock is left alone; the engine will surface the contention
/// to the caller.
pub fn recover_stale_lock(db_path: &Path, max_age: Duration) -> Result<(), MemoryError> {
    let lock = lock_path(db_path);
    let metadata = match std::fs::metadata(&lock) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    let age = metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .unwrap_or_default();

    if age >= max_age {
        std::fs::remove_file(&lock).map_err(|e| permission_or_internal(e, &lock))?;
        tracing::info!(
            lock_file = %lock.display(),
            age_secs = age.as_secs(),
            "Removed stale lock file"
        );
    }
    Ok(())
}

fn permission_or_internal(err: std::io::Error, path: &Path) -> MemoryError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        MemoryError::Permission {
            path: path.to_path_buf(),
        }
    } else {
        MemoryError::Internal(format!("{}: {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig::default()
    }

    #[test]
    fn test_resolve_per_project_path() {
        let path = resolve_db_path(Path::new("/tmp/p1"), &config());
        assert_eq!(path, PathBuf::from("/tmp/p1/.kuzumem/memory-bank.db"));
    }

    #[test]
    fn test_resolve_with_override() {
        let mut cfg = config();
        cfg.path_override = Some(PathBuf::from("/var/test/shared.db"));
        let path = resolve_db_path(Path::new("/tmp/p1"), &cfg);
        assert_eq!(path, PathBuf::from("/var/test/shared.db"));
    }

    #[test]
    fn test_lock_path_is_sibling() {
        let lock = lock_path(Path::new("/tmp/p1/.kuzumem/memory-bank.db"));
        assert_eq!(
            lock,
            PathBuf::from("/tmp/p1/.kuzumem/memory-bank.db.lock")
        );
    }

    #[test]
    fn test_prepare_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/.kuzumem/memory-bank.db");
        prepare_database_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
        // Probe file cleaned up
        assert!(!db_path.parent().unwrap().join(".kuzumem-probe").exists());
    }

    #[test]
    fn test_stale_lock_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("memory-bank.db");
        let lock = lock_path(&db_path);
        std::fs::write(&lock, b"").unwrap();

        // Zero max age: any lock counts as stale.
        recover_stale_lock(&db_path, Duration::ZERO).unwrap();
        assert!(!lock.exists());
    }

    #[test]
    fn test_young_lock_kept() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("memory-bank.db");
        let lock = lock_path(&db_path);
        std::fs::write(&lock, b"").unwrap();

        recover_stale_lock(&db_path, Duration::from_secs(300)).unwrap();
        assert!(lock.exists());
    }

    #[test]
    fn test_missing_lock_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("memory-bank.db");
        recover_stale_lock(&db_path, Duration::ZERO).unwrap();
    }
}
