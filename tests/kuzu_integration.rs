//! Integration tests against the embedded engine.
//!
//! These tests open real database files under temp directories.
//! Run with: `cargo test --features integration --test kuzu_integration`

#![cfg(feature = "integration")]

use kuzumem::config::Config;
use kuzumem::context::AppContext;
use kuzumem::error::MemoryError;
use kuzumem::graph::QueryExt;
use kuzumem::models::ComponentStatus;
use kuzumem::repositories::{ComponentInput, DeleteTarget, FileInput, TagInput};
use kuzumem::services::{MemoryService, ToolCtx};
use kuzumem::FromRef;

const REPO: &str = "test-repo";
const BRANCH: &str = "main";

fn harness() -> (AppContext, MemoryService, tempfile::TempDir) {
    let ctx = AppContext::from_config(Config::default());
    let service = MemoryService::from_ref(&ctx);
    let dir = tempfile::tempdir().expect("tempdir");
    (ctx, service, dir)
}

fn call() -> ToolCtx {
    ToolCtx::new("test", "test-session")
}

fn component(id: &str, deps: Option<Vec<&str>>) -> ComponentInput {
    ComponentInput {
        id: id.to_string(),
        name: id.to_uppercase(),
        kind: Some("service".to_string()),
        status: Some(ComponentStatus::Active),
        depends_on: deps.map(|d| d.into_iter().map(str::to_string).collect()),
    }
}

#[tokio::test]
async fn test_init_then_upsert_component() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();

    let outcome = service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .expect("init");
    assert!(outcome.success);
    assert_eq!(outcome.repository.id, format!("{REPO}:{BRANCH}"));

    let created = service
        .upsert_component(&call(), root, REPO, BRANCH, component("c1", None))
        .await
        .expect("create component");
    assert_eq!(created.id, "c1");
    assert_eq!(created.status, ComponentStatus::Active);
    assert!(created.depends_on.is_empty());

    let listed = service
        .list_components(&call(), root, REPO, BRANCH)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "c1");

    service.shutdown().await;
}

#[tokio::test]
async fn test_upsert_find_roundtrip() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    let input = component("comp-Auth", Some(vec!["comp-Db"]));
    let created = service
        .upsert_component(&call(), root, REPO, BRANCH, input.clone())
        .await
        .unwrap();

    let found = service
        .get_component(&call(), root, REPO, BRANCH, "comp-Auth")
        .await
        .unwrap()
        .expect("component exists");

    assert_eq!(found.id, created.id);
    assert_eq!(found.name, input.name);
    assert_eq!(found.kind, input.kind);
    assert_eq!(found.depends_on, vec!["comp-Db".to_string()]);
    assert!(found.updated_at >= found.created_at);

    service.shutdown().await;
}

#[tokio::test]
async fn test_dependency_rewrite() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    service
        .upsert_component(&call(), root, REPO, BRANCH, component("c1", Some(vec!["c2", "c3"])))
        .await
        .unwrap();

    // Placeholders exist as planned components.
    let placeholder = service
        .get_component(&call(), root, REPO, BRANCH, "c2")
        .await
        .unwrap()
        .expect("placeholder c2");
    assert_eq!(placeholder.status, ComponentStatus::Planned);

    let deps = service
        .get_dependencies(&call(), root, REPO, BRANCH, "c1")
        .await
        .unwrap();
    let dep_ids: Vec<&str> = deps.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(dep_ids, vec!["c2", "c3"]);

    // Rewrite to a single dependency: the c3 edge goes, the node stays.
    service
        .upsert_component(&call(), root, REPO, BRANCH, component("c1", Some(vec!["c2"])))
        .await
        .unwrap();

    let deps = service
        .get_dependencies(&call(), root, REPO, BRANCH, "c1")
        .await
        .unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].id, "c2");

    let still_there = service
        .get_component(&call(), root, REPO, BRANCH, "c3")
        .await
        .unwrap();
    assert!(still_there.is_some());

    service.shutdown().await;
}

#[tokio::test]
async fn test_shortest_path() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    service
        .upsert_component(&call(), root, REPO, BRANCH, component("a", Some(vec!["b"])))
        .await
        .unwrap();
    service
        .upsert_component(&call(), root, REPO, BRANCH, component("b", Some(vec!["c"])))
        .await
        .unwrap();
    service
        .upsert_component(&call(), root, REPO, BRANCH, component("c", Some(vec!["d"])))
        .await
        .unwrap();

    let found = service
        .shortest_path(&call(), root, REPO, BRANCH, "a", "d", Default::default())
        .await
        .unwrap();
    assert_eq!(found.length, 3);
    let ids: Vec<&str> = found.path.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);

    // No route in the reverse direction: empty path, no error.
    let missing = service
        .shortest_path(&call(), root, REPO, BRANCH, "d", "a", Default::default())
        .await
        .unwrap();
    assert_eq!(missing.length, 0);
    assert!(missing.path.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_transaction_atomicity() {
    let (ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    let handle = ctx.handles.acquire(root).await.unwrap();
    let result: Result<(), MemoryError> = handle
        .transaction(|tx| async move {
            tx.query(
                "CREATE (c:Component {id: 'test-repo:main:ghost', logical_id: 'ghost', name: 'Ghost'})",
            )
            .run()
            .await?;
            Err(MemoryError::Internal("abort".into()))
        })
        .await;
    assert!(result.is_err());

    // Nothing from the rolled-back transaction is visible.
    let ghost = service
        .get_component(&call(), root, REPO, BRANCH, "ghost")
        .await
        .unwrap();
    assert!(ghost.is_none());

    service.shutdown().await;
}

#[tokio::test]
async fn test_bulk_delete_by_tag_confirmation_flow() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    for id in ["c1", "c2", "c3"] {
        service
            .upsert_component(&call(), root, REPO, BRANCH, component(id, None))
            .await
            .unwrap();
    }
    service
        .upsert_tag(
            &call(),
            root,
            REPO,
            BRANCH,
            TagInput {
                id: "t1".into(),
                name: "deprecated-batch".into(),
                category: None,
                description: None,
                color: None,
            },
        )
        .await
        .unwrap();
    for id in ["c1", "c2", "c3"] {
        let linked = service
            .tag_item(&call(), root, REPO, BRANCH, "component", id, "t1")
            .await
            .unwrap();
        assert!(linked);
    }

    // Without confirm: refused, nothing deleted.
    let refused = service
        .delete_entities(
            &call(),
            root,
            REPO,
            BRANCH,
            DeleteTarget::ByTag { tag_id: "t1".into() },
            false,
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(refused.code(), "CONFIRMATION_REQUIRED");

    // Dry run reports the same set a confirmed delete would remove.
    let preview = service
        .delete_entities(
            &call(),
            root,
            REPO,
            BRANCH,
            DeleteTarget::ByTag { tag_id: "t1".into() },
            false,
            true,
        )
        .await
        .unwrap();
    assert_eq!(preview.count, 3);
    assert_eq!(
        service
            .list_components(&call(), root, REPO, BRANCH)
            .await
            .unwrap()
            .len(),
        3
    );

    let deleted = service
        .delete_entities(
            &call(),
            root,
            REPO,
            BRANCH,
            DeleteTarget::ByTag { tag_id: "t1".into() },
            true,
            false,
        )
        .await
        .unwrap();
    assert_eq!(deleted.count, 3);
    assert!(deleted.message.contains("Deleted 3 entities"));

    let remaining = service
        .list_components(&call(), root, REPO, BRANCH)
        .await
        .unwrap();
    assert!(remaining.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_file_upsert_before_repository() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();

    // No init: the repository node does not exist yet.
    let upsert = service
        .upsert_file(
            &call(),
            root,
            REPO,
            BRANCH,
            FileInput {
                id: "file-src-main".into(),
                name: "main.rs".into(),
                path: "src/main.rs".into(),
                mime_type: Some("text/x-rust".into()),
                size: Some(128),
                content: None,
                metrics: None,
            },
        )
        .await
        .expect("file upsert succeeds without repository");
    assert_eq!(upsert.file.metadata.branch, BRANCH);
    assert_eq!(upsert.warnings.len(), 1);

    // After init the same upsert links the file.
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();
    let upsert = service
        .upsert_file(
            &call(),
            root,
            REPO,
            BRANCH,
            FileInput {
                id: "file-src-main".into(),
                name: "main.rs".into(),
                path: "src/main.rs".into(),
                mime_type: Some("text/x-rust".into()),
                size: Some(128),
                content: None,
                metrics: None,
            },
        )
        .await
        .unwrap();
    assert!(upsert.warnings.is_empty());

    let files = service
        .list_files(&call(), root, REPO, BRANCH)
        .await
        .unwrap();
    assert_eq!(files.len(), 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_context_append_accumulates() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    let update = kuzumem::repositories::ContextUpdate {
        agent: Some("agent-1".into()),
        summary: Some("first pass".into()),
        decision: Some("dec-1".into()),
        ..Default::default()
    };
    service
        .update_context(&call(), root, REPO, BRANCH, None, update)
        .await
        .unwrap();

    let update = kuzumem::repositories::ContextUpdate {
        observation: Some("tests are green".into()),
        decision: Some("dec-2".into()),
        ..Default::default()
    };
    let context = service
        .update_context(&call(), root, REPO, BRANCH, None, update)
        .await
        .unwrap();

    assert_eq!(context.decisions, vec!["dec-1".to_string(), "dec-2".to_string()]);
    assert_eq!(context.observations, vec!["tests are green".to_string()]);
    assert_eq!(context.summary.as_deref(), Some("first pass"));

    service.shutdown().await;
}

#[tokio::test]
async fn test_keyword_search_scoped_to_branch() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();
    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .unwrap();

    service
        .upsert_component(&call(), root, REPO, BRANCH, component("comp-AuthService", None))
        .await
        .unwrap();

    let hits = service
        .keyword_search(&call(), root, REPO, BRANCH, "authservice", 10)
        .await
        .unwrap();
    assert!(hits.iter().any(|h| h.id == "comp-AuthService"));

    let none = service
        .keyword_search(&call(), root, REPO, "other-branch", "authservice", 10)
        .await
        .unwrap();
    assert!(none.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_young_lock_file_is_left_alone() {
    let (_ctx, service, dir) = harness();
    let root = dir.path();

    // A fresh lock file is younger than the staleness threshold; init
    // leaves it for the engine to arbitrate.
    let db_dir = root.join(".kuzumem");
    std::fs::create_dir_all(&db_dir).unwrap();
    let lock = db_dir.join("memory-bank.db.lock");
    std::fs::write(&lock, b"").unwrap();

    service
        .init_memory_bank(&call(), root, REPO, BRANCH)
        .await
        .expect("init succeeds despite unrelated young lock file");
    assert!(lock.exists());

    service.shutdown().await;
}
