//! Idempotent schema bootstrap for a memory bank database.

use std::sync::Arc;
use std::time::Duration;

use crate::error::MemoryError;
use crate::graph::{query_with_timeout, GraphConnection, Params};

/// Table whose presence marks an initialized schema.
pub const SENTINEL_TABLE: &str = "Repository";

/// Budget for the schema-presence probe. A probe that cannot answer within
/// this window is treated as lock contention.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Node and relationship DDL, all `IF NOT EXISTS` so re-runs are no-ops.
pub fn ddl_statements() -> &'static [&'static str] {
    &[
        // Node tables. `id` is the graph-unique id (repo:branch:logicalId)
        // except for File and Tag, which are keyed by logical id.
        "CREATE NODE TABLE IF NOT EXISTS Repository(id STRING, name STRING, branch STRING, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Metadata(id STRING, logical_id STRING, name STRING, content STRING, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Context(id STRING, logical_id STRING, name STRING, iso_date DATE, agent STRING, related_issue STRING, summary STRING, decisions STRING[], observations STRING[], created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Component(id STRING, logical_id STRING, name STRING, kind STRING, status STRING, depends_on STRING[], created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Decision(id STRING, logical_id STRING, name STRING, context STRING, date DATE, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Rule(id STRING, logical_id STRING, name STRING, created DATE, triggers STRING[], content STRING, status STRING, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS File(id STRING, name STRING, path STRING, mime_type STRING, size INT64, metadata STRING, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        "CREATE NODE TABLE IF NOT EXISTS Tag(id STRING, name STRING, category STRING, description STRING, color STRING, created_at TIMESTAMP, updated_at TIMESTAMP, PRIMARY KEY (id))",
        // Repository ownership edges
        "CREATE REL TABLE IF NOT EXISTS HAS_METADATA(FROM Repository TO Metadata)",
        "CREATE REL TABLE IF NOT EXISTS HAS_CONTEXT(FROM Repository TO Context)",
        "CREATE REL TABLE IF NOT EXISTS HAS_COMPONENT(FROM Repository TO Component)",
        "CREATE REL TABLE IF NOT EXISTS HAS_DECISION(FROM Repository TO Decision)",
        "CREATE REL TABLE IF NOT EXISTS HAS_RULE(FROM Repository TO Rule)",
        "CREATE REL TABLE IF NOT EXISTS HAS_FILE(FROM Repository TO File)",
        // Domain edges
        "CREATE REL TABLE IF NOT EXISTS DEPENDS_ON(FROM Component TO Component)",
        "CREATE REL TABLE IF NOT EXISTS IMPLEMENTS(FROM Component TO File)",
        "CREATE REL TABLE IF NOT EXISTS GOVERNS(FROM Rule TO Component)",
        "CREATE REL TABLE IF NOT EXISTS AFFECTS(FROM Decision TO Component)",
        "CREATE REL TABLE IF NOT EXISTS CONTEXT_OF(FROM Context TO Component, FROM Context TO Decision, FROM Context TO Rule)",
        // Scoping: every entity points at its Repository
        "CREATE REL TABLE IF NOT EXISTS PART_OF(FROM Metadata TO Repository, FROM Context TO Repository, FROM Component TO Repository, FROM Decision TO Repository, FROM Rule TO Repository, FROM File TO Repository, FROM Tag TO Repository)",
        // Tagging: every taggable entity to Tag
        "CREATE REL TABLE IF NOT EXISTS TAGGED_WITH(FROM Component TO Tag, FROM Decision TO Tag, FROM Rule TO Tag, FROM File TO Tag)",
    ]
}

/// Probes for the schema and runs the DDL when it is absent.
///
/// Returns `true` when the DDL was executed. A probe timeout is read as
/// lock contention and surfaced as `LOCK_ERROR` so the caller can tell the
/// user which file is held.
pub async fn ensure_schema(
    conn: &Arc<dyn GraphConnection>,
    lock_path: &std::path::Path,
) -> Result<bool, MemoryError> {
    let rows = query_with_timeout(
        conn,
        "CALL show_tables() RETURN name;",
        Params::new(),
        PROBE_TIMEOUT,
    )
    .await
    .map_err(|e| match e {
            MemoryError::Timeout(_) => MemoryError::Lock {
                lock_path: Some(lock_path.to_path_buf()),
            },
            other => other,
        })?;

    let mut has_sentinel = false;
    for row in &rows {
        if let Ok(name) = row.get::<String>("name") {
            if name == SENTINEL_TABLE {
                has_sentinel = true;
                break;
            }
        }
    }

    if has_sentinel {
        return Ok(false);
    }

    tracing::info!("Schema absent, running DDL bootstrap");
    for statement in ddl_statements() {
        query_with_timeout(conn, statement, Params::new(), PROBE_TIMEOUT).await?;
    }
    Ok(true)
}

/// Installs and loads the graph-algorithm extension.
///
/// An already-installed response is success. Any other failure leaves the
/// handle usable; the algorithm tools will fail gracefully later.
pub async fn load_algo_extension(conn: &Arc<dyn GraphConnection>) {
    for statement in ["INSTALL algo", "LOAD EXTENSION algo"] {
        if let Err(e) = query_with_timeout(conn, statement, Params::new(), PROBE_TIMEOUT).await {
            let message = e.to_string();
            if message.to_lowercase().contains("already") {
                continue;
            }
            tracing::warn!(
                statement,
                error = %message,
                "Graph-algorithm extension unavailable; algorithm tools will fail gracefully"
            );
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ddl_is_idempotent() {
        for statement in ddl_statements() {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "not idempotent: {statement}"
            );
        }
    }

    #[test]
    fn test_every_entity_is_scoped_to_repository() {
        let part_of = ddl_statements()
            .iter()
            .find(|s| s.contains("PART_OF"))
            .unwrap();
        for entity in ["Metadata", "Context", "Component", "Decision", "Rule", "File", "Tag"] {
            assert!(
                part_of.contains(&format!("FROM {entity} TO Repository")),
                "{entity} missing PART_OF pair"
            );
        }
    }

    #[test]
    fn test_context_of_has_multiple_from_pairs() {
        let context_of = ddl_statements()
            .iter()
            .find(|s| s.contains("CONTEXT_OF"))
            .unwrap();
        for target in ["Component", "Decision", "Rule"] {
            assert!(context_of.contains(&format!("FROM Context TO {target}")));
        }
    }
}
