//! Database Handle Manager.
//!
//! Owns the process-wide `(clientProjectRoot → DbHandle)` registry. Each
//! registry entry is in one of three states (absent, initializing, ready)
//! and concurrent `acquire` calls for the same root await a single
//! initialization through a watch-channel barrier. The barrier receiver is
//! cloned under the registry lock, before the initializer can publish its
//! result under that same lock, so a waiter never misses the wakeup.

mod paths;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::config::DatabaseConfig;
use crate::error::MemoryError;
use crate::graph::{
    query_with_timeout, CypherExecutor, GraphConnection, GraphEngine, Params, Row,
};

pub use paths::{lock_path, prepare_database_dir, recover_stale_lock, resolve_db_path};

/// Tunable lifetimes for handles and probes.
#[derive(Debug, Clone)]
pub struct HandleLimits {
    /// Default per-statement budget.
    pub query_timeout: Duration,
    /// A handle older than this is reset on the next acquire.
    pub handle_ttl: Duration,
    /// Minimum interval between connection health probes.
    pub revalidate_after: Duration,
    /// Budget for the `RETURN 1` health probe.
    pub validation_timeout: Duration,
    /// A lock file older than this is considered abandoned.
    pub stale_lock_age: Duration,
}

impl Default for HandleLimits {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            handle_ttl: Duration::from_secs(30 * 60),
            revalidate_after: Duration::from_secs(5 * 60),
            validation_timeout: Duration::from_secs(1),
            stale_lock_age: Duration::from_secs(5 * 60),
        }
    }
}

enum Entry {
    /// First-touch initialization in flight; wait on the barrier, then
    /// re-check the registry.
    Initializing(watch::Receiver<bool>),
    Ready(DbHandle),
}

/// Process-wide registry of initialized database handles.
///
/// Cheap to clone; all clones share the registry.
#[derive(Clone)]
pub struct HandleManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    engine: Arc<dyn GraphEngine>,
    db_config: DatabaseConfig,
    limits: HandleLimits,
    registry: Mutex<HashMap<PathBuf, Entry>>,
}

enum Plan {
    Wait(watch::Receiver<bool>),
    Use(DbHandle),
    Init(watch::Sender<bool>),
    Reset(DbHandle, watch::Sender<bool>),
}

impl HandleManager {
    pub fn new(engine: Arc<dyn GraphEngine>, db_config: DatabaseConfig) -> Self {
        let limits = HandleLimits {
            query_timeout: Duration::from_millis(db_config.query_timeout_ms),
            ..HandleLimits::default()
        };
        Self::with_limits(engine, db_config, limits)
    }

    pub fn with_limits(
        engine: Arc<dyn GraphEngine>,
        db_config: DatabaseConfig,
        limits: HandleLimits,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                engine,
                db_config,
                limits,
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns a ready handle for the project root, initializing the
    /// database on first touch. Idempotent and safe to call concurrently
    /// for the same or different roots.
    pub async fn acquire(&self, client_project_root: &Path) -> Result<DbHandle, MemoryError> {
        let db_path = resolve_db_path(client_project_root, &self.inner.db_config);

        loop {
            let plan = {
                let mut registry = self.inner.registry.lock().await;
                match registry.get(&db_path) {
                    None => {
                        let (tx, rx) = watch::channel(false);
                        registry.insert(db_path.clone(), Entry::Initializing(rx));
                        Plan::Init(tx)
                    }
                    Some(Entry::Initializing(rx)) => Plan::Wait(rx.clone()),
                    Some(Entry::Ready(handle)) => {
                        if handle.age() >= self.inner.limits.handle_ttl {
                            let stale = handle.clone();
                            let (tx, rx) = watch::channel(false);
                            registry.insert(db_path.clone(), Entry::Initializing(rx));
                            Plan::Reset(stale, tx)
                        } else {
                            Plan::Use(handle.clone())
                        }
                    }
                }
            };

            match plan {
                Plan::Wait(mut rx) => {
                    // A send or a dropped sender both wake us; re-check.
                    if rx.changed().await.is_err() {
                        // The initializer vanished without publishing a
                        // result. Clear its stale entry so the next pass
                        // can retry instead of waiting forever.
                        let mut registry = self.inner.registry.lock().await;
                        if let Some(Entry::Initializing(current)) = registry.get(&db_path) {
                            if current.same_channel(&rx) {
                                registry.remove(&db_path);
                            }
                        }
                    }
                }
                Plan::Use(handle) => {
                    if handle.validate().await {
                        return Ok(handle);
                    }
                    self.evict(&db_path, &handle).await;
                    handle.close().await;
                }
                Plan::Init(barrier) => {
                    return self
                        .initialize(client_project_root, &db_path, barrier)
                        .await;
                }
                Plan::Reset(stale, barrier) => {
                    tracing::info!(
                        db_path = %db_path.display(),
                        "Handle expired, reinitializing"
                    );
                    stale.close().await;
                    return self
                        .initialize(client_project_root, &db_path, barrier)
                        .await;
                }
            }
        }
    }

    /// Runs a query on the handle with an optional per-call timeout.
    pub async fn execute_query(
        &self,
        handle: &DbHandle,
        cypher: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Row>, MemoryError> {
        handle.execute_cypher(cypher, params, timeout).await
    }

    /// Closes and forgets the handle for a project root.
    pub async fn close(&self, client_project_root: &Path) {
        let db_path = resolve_db_path(client_project_root, &self.inner.db_config);
        let entry = self.inner.registry.lock().await.remove(&db_path);
        if let Some(Entry::Ready(handle)) = entry {
            handle.close().await;
        }
    }

    /// Closes every cached handle.
    pub async fn shutdown(&self) {
        let entries: Vec<Entry> = {
            let mut registry = self.inner.registry.lock().await;
            registry.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            if let Entry::Ready(handle) = entry {
                handle.close().await;
            }
        }
    }

    async fn evict(&self, db_path: &Path, handle: &DbHandle) {
        let mut registry = self.inner.registry.lock().await;
        if let Some(Entry::Ready(current)) = registry.get(db_path) {
            if Arc::ptr_eq(&current.inner, &handle.inner) {
                registry.remove(db_path);
            }
        }
    }

    async fn initialize(
        &self,
        client_project_root: &Path,
        db_path: &Path,
        barrier: watch::Sender<bool>,
    ) -> Result<DbHandle, MemoryError> {
        let result = self.first_touch(client_project_root, db_path).await;

        {
            let mut registry = self.inner.registry.lock().await;
            match &result {
                Ok(handle) => {
                    registry.insert(db_path.to_path_buf(), Entry::Ready(handle.clone()));
                }
                // Delete the record so a subsequent call retries cleanly.
                Err(_) => {
                    registry.remove(db_path);
                }
            }
        }
        let _ = barrier.send(true);
        result
    }

    async fn first_touch(
        &self,
        client_project_root: &Path,
        db_path: &Path,
    ) -> Result<DbHandle, MemoryError> {
        prepare_database_dir(db_path)?;
        recover_stale_lock(db_path, self.inner.limits.stale_lock_age)?;

        let conn = self.inner.engine.open(db_path).await?;

        match schema::ensure_schema(&conn, &lock_path(db_path)).await {
            Ok(ran_ddl) => {
                if ran_ddl {
                    tracing::info!(db_path = %db_path.display(), "Schema bootstrap complete");
                }
            }
            // DDL failure is fatal for this attempt; the handle is not cached.
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        }

        schema::load_algo_extension(&conn).await;

        Ok(DbHandle {
            inner: Arc::new(HandleInner {
                client_project_root: client_project_root.to_path_buf(),
                db_path: db_path.to_path_buf(),
                conn,
                gate: Mutex::new(()),
                limits: self.inner.limits.clone(),
                created_at: Instant::now(),
                health: Mutex::new(Health {
                    last_validated: Instant::now(),
                    valid: true,
                }),
            }),
        })
    }
}

struct Health {
    last_validated: Instant,
    valid: bool,
}

/// An initialized, health-validated connection to one project's database.
///
/// Cloning is cheap; all clones share the per-handle critical section, so
/// statements and transactions on one database file never interleave.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    client_project_root: PathBuf,
    db_path: PathBuf,
    conn: Arc<dyn GraphConnection>,
    gate: Mutex<()>,
    limits: HandleLimits,
    created_at: Instant,
    health: Mutex<Health>,
}

impl DbHandle {
    pub fn client_project_root(&self) -> &Path {
        &self.inner.client_project_root
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    /// Probes the connection with `RETURN 1`, at most once per
    /// revalidation interval. Returns whether the handle is usable.
    pub async fn validate(&self) -> bool {
        let mut health = self.inner.health.lock().await;
        if health.valid && health.last_validated.elapsed() < self.inner.limits.revalidate_after {
            return true;
        }

        let ok = query_with_timeout(
            &self.inner.conn,
            "RETURN 1 AS test;",
            Params::new(),
            self.inner.limits.validation_timeout,
        )
        .await
        .is_ok();

        health.valid = ok;
        health.last_validated = Instant::now();
        if !ok {
            tracing::warn!(
                db_path = %self.inner.db_path.display(),
                "Connection failed validation probe"
            );
        }
        ok
    }

    /// Executes `f` inside a transaction on this handle's connection.
    ///
    /// Commits when `f` returns `Ok`, rolls back on `Err`. A rollback
    /// failure is logged; the original error propagates. The per-handle
    /// critical section is held for the whole transaction, so no other
    /// caller's statements interleave.
    pub async fn transaction<F, Fut, R>(&self, f: F) -> Result<R, MemoryError>
    where
        F: FnOnce(TxHandle) -> Fut,
        Fut: std::future::Future<Output = Result<R, MemoryError>>,
    {
        let _gate = self.inner.gate.lock().await;
        let timeout = self.inner.limits.query_timeout;

        query_with_timeout(&self.inner.conn, "BEGIN TRANSACTION", Params::new(), timeout).await?;

        let tx = TxHandle {
            conn: Arc::clone(&self.inner.conn),
            timeout,
        };

        match f(tx).await {
            Ok(value) => {
                query_with_timeout(&self.inner.conn, "COMMIT", Params::new(), timeout).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) =
                    query_with_timeout(&self.inner.conn, "ROLLBACK", Params::new(), timeout).await
                {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Releases the underlying connection. The handle must not be used
    /// afterwards; the manager drops it from the registry first.
    pub async fn close(&self) {
        self.inner.conn.close().await;
    }
}

#[async_trait]
impl CypherExecutor for DbHandle {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Row>, MemoryError> {
        let _gate = self.inner.gate.lock().await;
        query_with_timeout(
            &self.inner.conn,
            cypher,
            params,
            timeout.unwrap_or(self.inner.limits.query_timeout),
        )
        .await
    }
}

/// Executor bound to an open transaction.
///
/// Statements bypass the handle gate (the transaction already holds it)
/// and run on the same connection, in call order.
pub struct TxHandle {
    conn: Arc<dyn GraphConnection>,
    timeout: Duration,
}

#[async_trait]
impl CypherExecutor for TxHandle {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Row>, MemoryError> {
        query_with_timeout(&self.conn, cypher, params, timeout.unwrap_or(self.timeout)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scriptable in-memory engine for registry tests.
    ///
    /// All connections share the engine's statement log so tests can
    /// inspect what ran without reaching into the handle.
    #[derive(Default)]
    struct FakeEngine {
        opens: AtomicUsize,
        fail_opens: AtomicUsize,
        preloaded_tables: Vec<String>,
        statements: Arc<StdMutex<Vec<String>>>,
    }

    struct FakeConnection {
        statements: Arc<StdMutex<Vec<String>>>,
        tables: StdMutex<HashSet<String>>,
    }

    #[async_trait]
    impl GraphEngine for FakeEngine {
        async fn open(&self, _db_path: &Path) -> Result<Arc<dyn GraphConnection>, MemoryError> {
            if self.fail_opens.load(Ordering::SeqCst) > 0 {
                self.fail_opens.fetch_sub(1, Ordering::SeqCst);
                return Err(MemoryError::Internal("scripted open failure".into()));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeConnection {
                statements: Arc::clone(&self.statements),
                tables: StdMutex::new(self.preloaded_tables.iter().cloned().collect()),
            }))
        }
    }

    impl FakeEngine {
        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphConnection for FakeConnection {
        async fn query(&self, cypher: &str, _params: Params) -> Result<Vec<Row>, MemoryError> {
            self.statements.lock().unwrap().push(cypher.to_string());

            if cypher.starts_with("CALL show_tables") {
                let tables = self.tables.lock().unwrap();
                return Ok(tables
                    .iter()
                    .map(|name| {
                        let mut data = HashMap::new();
                        data.insert("name".to_string(), Value::String(name.clone()));
                        Row::new(data)
                    })
                    .collect());
            }
            if let Some(rest) = cypher.strip_prefix("CREATE NODE TABLE IF NOT EXISTS ") {
                if let Some(name) = rest.split('(').next() {
                    self.tables.lock().unwrap().insert(name.trim().to_string());
                }
            }
            Ok(Vec::new())
        }

        async fn close(&self) {}
    }

    fn manager_with(engine: Arc<FakeEngine>) -> HandleManager {
        HandleManager::new(engine, DatabaseConfig::default())
    }

    fn root(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().to_path_buf()
    }

    #[tokio::test]
    async fn test_acquire_initializes_once_under_concurrency() {
        let engine = Arc::new(FakeEngine::default());
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();
        let project = root(&dir);

        let handles = futures::future::join_all(
            (0..8).map(|_| {
                let manager = manager.clone();
                let project = project.clone();
                tokio::spawn(async move { manager.acquire(&project).await })
            }),
        )
        .await;

        for handle in handles {
            assert!(handle.unwrap().is_ok());
        }
        // One open, one DDL run for the same root.
        assert_eq!(engine.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ddl_runs_exactly_once() {
        let engine = Arc::new(FakeEngine::default());
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();
        let project = root(&dir);

        let _first = manager.acquire(&project).await.unwrap();
        let _second = manager.acquire(&project).await.unwrap();

        // The second acquire reuses the cached handle, so the fake saw the
        // schema probe once and each CREATE once.
        let repo_ddl = engine
            .statements()
            .iter()
            .filter(|s| s.starts_with("CREATE NODE TABLE IF NOT EXISTS Repository"))
            .count();
        assert_eq!(repo_ddl, 1);
    }

    #[tokio::test]
    async fn test_distinct_roots_get_distinct_databases() {
        let engine = Arc::new(FakeEngine::default());
        let manager = manager_with(Arc::clone(&engine));
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        manager.acquire(&root(&dir_a)).await.unwrap();
        manager.acquire(&root(&dir_b)).await.unwrap();
        assert_eq!(engine.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_init_retries_cleanly() {
        let engine = Arc::new(FakeEngine {
            fail_opens: AtomicUsize::new(1),
            ..FakeEngine::default()
        });
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();
        let project = root(&dir);

        assert!(manager.acquire(&project).await.is_err());
        // The per-path record was deleted; this attempt starts fresh.
        assert!(manager.acquire(&project).await.is_ok());
        assert_eq!(engine.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preexisting_schema_skips_ddl() {
        let engine = Arc::new(FakeEngine {
            preloaded_tables: vec!["Repository".to_string()],
            ..FakeEngine::default()
        });
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();

        let _handle = manager.acquire(&root(&dir)).await.unwrap();
        assert!(!engine
            .statements()
            .iter()
            .any(|s| s.starts_with("CREATE NODE TABLE")));
    }

    #[tokio::test]
    async fn test_expired_handle_resets() {
        let engine = Arc::new(FakeEngine::default());
        let limits = HandleLimits {
            handle_ttl: Duration::ZERO,
            ..HandleLimits::default()
        };
        let manager =
            HandleManager::with_limits(Arc::clone(&engine) as Arc<dyn GraphEngine>, DatabaseConfig::default(), limits);
        let dir = tempfile::tempdir().unwrap();
        let project = root(&dir);

        manager.acquire(&project).await.unwrap();
        manager.acquire(&project).await.unwrap();
        assert_eq!(engine.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback_statements() {
        let engine = Arc::new(FakeEngine::default());
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();
        let handle = manager.acquire(&root(&dir)).await.unwrap();

        handle
            .transaction(|tx| async move {
                tx.execute_cypher("CREATE (n:Component {id: $id})", Params::new(), None)
                    .await?;
                Ok(())
            })
            .await
            .unwrap();

        let err = handle
            .transaction(|_tx| async move {
                Err::<(), _>(MemoryError::Internal("caller bailed".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let statements = engine.statements();
        assert!(statements.iter().any(|s| s == "BEGIN TRANSACTION"));
        assert!(statements.iter().any(|s| s == "COMMIT"));
        assert!(statements.iter().any(|s| s == "ROLLBACK"));
    }

    #[tokio::test]
    async fn test_close_forgets_handle() {
        let engine = Arc::new(FakeEngine::default());
        let manager = manager_with(Arc::clone(&engine));
        let dir = tempfile::tempdir().unwrap();
        let project = root(&dir);

        manager.acquire(&project).await.unwrap();
        manager.close(&project).await;
        manager.acquire(&project).await.unwrap();
        assert_eq!(engine.opens.load(Ordering::SeqCst), 2);
    }
}
