//! Core traits for graph database abstraction.
//!
//! Two seams are defined here:
//!
//! - [`CypherExecutor`] - what repositories program against (handles,
//!   transactions)
//! - [`GraphEngine`] / [`GraphConnection`] - the embedded engine adapter,
//!   object-safe so tests can inject fakes

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::graph::value::{Params, Row};

/// Executes Cypher statements and returns fully materialized rows.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a Cypher query and returns its rows.
    ///
    /// `timeout` overrides the executor's default budget; on expiry the
    /// call rejects with `TIMEOUT` while the engine-side operation is
    /// allowed to complete.
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<Vec<Row>, MemoryError>;

    /// Executes a statement for its side effects, discarding rows.
    async fn run_cypher(
        &self,
        cypher: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<(), MemoryError> {
        self.execute_cypher(cypher, params, timeout).await?;
        Ok(())
    }
}

/// A live connection to one embedded database file.
///
/// Statements on one connection are serialized by the implementation; a
/// transaction is expressed as `BEGIN TRANSACTION` / `COMMIT` / `ROLLBACK`
/// statements on the same connection.
#[async_trait]
pub trait GraphConnection: Send + Sync {
    async fn query(&self, cypher: &str, params: Params) -> Result<Vec<Row>, MemoryError>;

    /// Releases the connection and the underlying database file.
    async fn close(&self);
}

/// Races a statement against a sleep.
///
/// On expiry the call rejects with `TIMEOUT`; the engine-side operation is
/// not cancelled and may still complete.
pub async fn query_with_timeout(
    conn: &Arc<dyn GraphConnection>,
    cypher: &str,
    params: Params,
    timeout: Duration,
) -> Result<Vec<Row>, MemoryError> {
    match tokio::time::timeout(timeout, conn.query(cypher, params)).await {
        Ok(result) => result,
        Err(_) => Err(MemoryError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Opens embedded databases by filesystem path.
///
/// The handle manager owns an engine; tests inject in-memory fakes.
#[async_trait]
pub trait GraphEngine: Send + Sync {
    async fn open(&self, db_path: &Path) -> Result<Arc<dyn GraphConnection>, MemoryError>;
}
