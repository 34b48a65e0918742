//! Entity write and snapshot command handlers.

use std::path::PathBuf;

use chrono::NaiveDate;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::context::AppContext;
use crate::di::FromRef;
use crate::models::{Component, ComponentStatus, Decision, Rule};
use crate::repositories::{ComponentInput, ContextUpdate, DecisionInput, RuleInput};
use crate::services::{MemoryService, ToolCtx};

use super::ScopeArgs;

/// YAML snapshot of the importable entity families.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    decisions: Vec<Decision>,
    #[serde(default)]
    rules: Vec<Rule>,
}

fn open_service() -> Result<MemoryService> {
    let config = Config::load()?;
    let ctx = AppContext::from_config(config);
    Ok(MemoryService::from_ref(&ctx))
}

pub async fn run_export(scope: ScopeArgs, output: Option<PathBuf>) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-export", "cli");

    let snapshot = Snapshot {
        components: service
            .list_components(&call, &root, &scope.repository, &scope.branch)
            .await
            .map_err(|e| eyre!("export failed: {e}"))?,
        decisions: service
            .list_decisions(&call, &root, &scope.repository, &scope.branch, None, None)
            .await
            .map_err(|e| eyre!("export failed: {e}"))?,
        rules: service
            .list_rules(&call, &root, &scope.repository, &scope.branch)
            .await
            .map_err(|e| eyre!("export failed: {e}"))?,
    };

    let yaml = serde_yaml::to_string(&snapshot)?;
    match output {
        Some(path) => {
            std::fs::write(&path, yaml)?;
            println!(
                "exported {} components, {} decisions, {} rules to {}",
                snapshot.components.len(),
                snapshot.decisions.len(),
                snapshot.rules.len(),
                path.display()
            );
        }
        None => print!("{yaml}"),
    }

    service.shutdown().await;
    Ok(())
}

pub async fn run_import(scope: ScopeArgs, input: PathBuf, overwrite: bool) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-import", "cli");

    let raw = std::fs::read_to_string(&input)?;
    let snapshot: Snapshot = serde_yaml::from_str(&raw)?;

    let mut imported = 0;
    let mut skipped = 0;
    let mut failed = 0;

    if !snapshot.components.is_empty() {
        let inputs = snapshot
            .components
            .into_iter()
            .map(|c| ComponentInput {
                id: c.id,
                name: c.name,
                kind: c.kind,
                status: Some(c.status),
                depends_on: Some(c.depends_on),
            })
            .collect();
        let outcome = service
            .import_components(&call, &root, &scope.repository, &scope.branch, inputs, overwrite)
            .await
            .map_err(|e| eyre!("import failed: {e}"))?;
        imported += outcome.imported;
        skipped += outcome.skipped;
        failed += outcome.failed;
    }

    if !snapshot.decisions.is_empty() {
        let inputs = snapshot
            .decisions
            .into_iter()
            .map(|d| DecisionInput {
                id: d.id,
                name: d.name,
                context: d.context,
                date: d.date,
                affected_components: Vec::new(),
            })
            .collect();
        let outcome = service
            .import_decisions(&call, &root, &scope.repository, &scope.branch, inputs, overwrite)
            .await
            .map_err(|e| eyre!("import failed: {e}"))?;
        imported += outcome.imported;
        skipped += outcome.skipped;
        failed += outcome.failed;
    }

    if !snapshot.rules.is_empty() {
        let inputs = snapshot
            .rules
            .into_iter()
            .map(|r| RuleInput {
                id: r.id,
                name: r.name,
                created: Some(r.created),
                triggers: r.triggers,
                content: r.content,
                status: r.status,
                governed_components: Vec::new(),
            })
            .collect();
        let outcome = service
            .import_rules(&call, &root, &scope.repository, &scope.branch, inputs, overwrite)
            .await
            .map_err(|e| eyre!("import failed: {e}"))?;
        imported += outcome.imported;
        skipped += outcome.skipped;
        failed += outcome.failed;
    }

    println!("imported {imported}, skipped {skipped}, failed {failed}");
    service.shutdown().await;

    if failed > 0 {
        return Err(eyre!("{failed} items failed to import"));
    }
    Ok(())
}

pub async fn run_add_context(
    scope: ScopeArgs,
    summary: Option<String>,
    decision: Option<String>,
    observation: Option<String>,
    agent: Option<String>,
) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-add-context", "cli");

    let update = ContextUpdate {
        agent,
        related_issue: None,
        summary,
        decision,
        observation,
    };
    let context = service
        .update_context(&call, &root, &scope.repository, &scope.branch, None, update)
        .await
        .map_err(|e| eyre!("add-context failed: {e}"))?;

    println!("context {} updated", context.id);
    service.shutdown().await;
    Ok(())
}

pub async fn run_add_component(
    scope: ScopeArgs,
    id: String,
    name: String,
    kind: Option<String>,
    status: Option<String>,
    depends_on: Vec<String>,
) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-add-component", "cli");

    let status = match status.as_deref() {
        Some(raw) => Some(
            ComponentStatus::parse(raw)
                .ok_or_else(|| eyre!("invalid status '{raw}' (active|deprecated|planned)"))?,
        ),
        None => None,
    };

    let input = ComponentInput {
        id,
        name,
        kind,
        status,
        depends_on: if depends_on.is_empty() {
            None
        } else {
            Some(depends_on)
        },
    };
    let component = service
        .upsert_component(&call, &root, &scope.repository, &scope.branch, input)
        .await
        .map_err(|e| eyre!("add-component failed: {e}"))?;

    println!("component {} ({})", component.id, component.status);
    service.shutdown().await;
    Ok(())
}

pub async fn run_add_decision(
    scope: ScopeArgs,
    id: String,
    name: String,
    context: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-add-decision", "cli");

    let date = match date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| eyre!("invalid date '{raw}' (expected YYYY-MM-DD)"))?,
        None => chrono::Utc::now().date_naive(),
    };

    let input = DecisionInput {
        id,
        name,
        context,
        date,
        affected_components: Vec::new(),
    };
    let decision = service
        .upsert_decision(&call, &root, &scope.repository, &scope.branch, input)
        .await
        .map_err(|e| eyre!("add-decision failed: {e}"))?;

    println!("decision {} ({})", decision.id, decision.date);
    service.shutdown().await;
    Ok(())
}

pub async fn run_add_rule(
    scope: ScopeArgs,
    id: String,
    name: String,
    content: Option<String>,
    triggers: Vec<String>,
    status: Option<String>,
) -> Result<()> {
    let root = scope.resolve_root()?;
    let service = open_service()?;
    let call = ToolCtx::new("cli-add-rule", "cli");

    let input = RuleInput {
        id,
        name,
        created: None,
        triggers,
        content,
        status,
        governed_components: Vec::new(),
    };
    let rule = service
        .upsert_rule(&call, &root, &scope.repository, &scope.branch, input)
        .await
        .map_err(|e| eyre!("add-rule failed: {e}"))?;

    println!("rule {} created", rule.id);
    service.shutdown().await;
    Ok(())
}
