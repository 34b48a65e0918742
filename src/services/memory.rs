//! Memory service: the single façade between tool handlers and the data
//! layer.
//!
//! Every method resolves the database handle for the call's
//! `clientProjectRoot` through the handle manager, dispatches to the
//! matching repository accessor, and returns the result unchanged. Errors
//! are annotated with the tool-call scope and re-thrown; no reshaping
//! happens here.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::context::AppContext;
use crate::db::{DbHandle, HandleManager};
use crate::di::FromContext;
use crate::error::MemoryError;
use crate::models::{Component, ComponentStatus, Context, Decision, File, Metadata, Repository, Rule, Tag};
use crate::repositories::{
    AlgorithmRepository, BulkRepository, CommunityEntry, ComponentInput, ComponentRepository,
    ContextItemType, ContextRepository, ContextUpdate, DecisionInput, DecisionRepository,
    DeleteOutcome, DeleteTarget, FileInput, FileRepository, FileUpsert, GroupEntry, KCoreEntry,
    MetadataRepository, PageRankOptions, RankEntry, RepositoryStore, RuleInput, RuleRepository,
    SearchHit, SearchRepository, ShortestPath, TagInput, TagRepository, TraversalOptions,
    TraversalRepository,
};
use crate::services::ctx::ToolCtx;

/// Result of `memory-bank init`.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub success: bool,
    pub repository: Repository,
    pub metadata: Metadata,
}

/// Result of a bulk import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Cycle detected among components (an SCC group larger than one).
#[derive(Debug, Clone, Serialize)]
pub struct CycleGroup {
    pub group: i64,
    pub components: Vec<String>,
}

/// Process-wide service façade. Resolved from [`AppContext`]; carries no
/// per-call state.
#[derive(FromContext, Clone)]
#[from_context(Context = "AppContext")]
pub struct MemoryService {
    handles: HandleManager,
    config: Arc<Config>,
}

impl MemoryService {
    async fn db(&self, client_project_root: &Path) -> Result<DbHandle, MemoryError> {
        self.handles.acquire(client_project_root).await
    }

    fn scope(err: MemoryError, ctx: &ToolCtx, repository: &str, branch: &str) -> MemoryError {
        err.with_scope(&ctx.tool, repository, branch)
    }

    /// Closes every cached database handle.
    pub async fn shutdown(&self) {
        self.handles.shutdown().await;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------
    // memory-bank
    // -----------------------------------------------------------------

    /// Initializes (or re-opens) the memory bank for a project root and
    /// guarantees the Repository node plus a metadata stub exist.
    pub async fn init_memory_bank(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<InitOutcome, MemoryError> {
        let db = self.db(client_project_root).await?;

        let repo = RepositoryStore::new(db.clone())
            .ensure(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))?;

        let metadata_repo = MetadataRepository::new(db);
        let metadata = match metadata_repo
            .find(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))?
        {
            Some(existing) => existing,
            None => {
                let content = serde_json::json!({
                    "project": { "name": repository, "branch": branch },
                    "techStack": {},
                    "architecture": "unknown",
                });
                metadata_repo
                    .upsert(repository, branch, repository, &content)
                    .await
                    .map_err(|e| Self::scope(e, ctx, repository, branch))?
            }
        };

        ctx.progress.complete(format!(
            "memory bank ready for {repository}:{branch} at {}",
            client_project_root.display()
        ));

        Ok(InitOutcome {
            success: true,
            repository: repo,
            metadata,
        })
    }

    pub async fn get_metadata(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Option<Metadata>, MemoryError> {
        let db = self.db(client_project_root).await?;
        MetadataRepository::new(db)
            .find(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn update_metadata(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        content: &JsonValue,
    ) -> Result<Metadata, MemoryError> {
        let db = self.db(client_project_root).await?;
        MetadataRepository::new(db)
            .upsert(repository, branch, repository, content)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------

    pub async fn upsert_component(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        input: ComponentInput,
    ) -> Result<Component, MemoryError> {
        let db = self.db(client_project_root).await?;
        ComponentRepository::new(db)
            .upsert(repository, branch, input)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_component(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
    ) -> Result<Option<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ComponentRepository::new(db)
            .find_by_id_and_branch(repository, id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn update_component_status(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
        status: ComponentStatus,
    ) -> Result<Option<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ComponentRepository::new(db)
            .update_status(repository, id, branch, status)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_active_components(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ComponentRepository::new(db)
            .get_active(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn list_components(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ComponentRepository::new(db)
            .list_by_status(repository, branch, None)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Decisions / Rules
    // -----------------------------------------------------------------

    pub async fn upsert_decision(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        input: DecisionInput,
    ) -> Result<Decision, MemoryError> {
        let db = self.db(client_project_root).await?;
        DecisionRepository::new(db)
            .upsert(repository, branch, input)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_decision(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
    ) -> Result<Option<Decision>, MemoryError> {
        let db = self.db(client_project_root).await?;
        DecisionRepository::new(db)
            .find_by_id(repository, id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn list_decisions(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Decision>, MemoryError> {
        let db = self.db(client_project_root).await?;
        DecisionRepository::new(db)
            .list_by_date_range(repository, branch, start, end)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn upsert_rule(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        input: RuleInput,
    ) -> Result<Rule, MemoryError> {
        let db = self.db(client_project_root).await?;
        RuleRepository::new(db)
            .upsert(repository, branch, input)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_rule(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
    ) -> Result<Option<Rule>, MemoryError> {
        let db = self.db(client_project_root).await?;
        RuleRepository::new(db)
            .find_by_id(repository, id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn list_rules(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<Rule>, MemoryError> {
        let db = self.db(client_project_root).await?;
        RuleRepository::new(db)
            .list(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Files / Tags
    // -----------------------------------------------------------------

    pub async fn upsert_file(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        input: FileInput,
    ) -> Result<FileUpsert, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .upsert(repository, branch, input)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_file(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
    ) -> Result<Option<File>, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .find_by_id(id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn list_files(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<File>, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .list(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Creates the Component→File IMPLEMENTS edge.
    pub async fn associate_file_with_component(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
        file_id: &str,
    ) -> Result<bool, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .link_component(repository, branch, component_id, file_id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn files_by_component(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<File>, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .find_files_by_component(repository, branch, component_id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn components_by_file(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        file_id: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        FileRepository::new(db)
            .find_components_by_file(repository, branch, file_id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn upsert_tag(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        input: TagInput,
    ) -> Result<Tag, MemoryError> {
        let db = self.db(client_project_root).await?;
        TagRepository::new(db)
            .upsert(repository, branch, input)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_tag(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        id: &str,
    ) -> Result<Option<Tag>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TagRepository::new(db)
            .find_by_id(id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn list_tags(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<Tag>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TagRepository::new(db)
            .list(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Attaches a tag to an item of the given entity type.
    pub async fn tag_item(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        entity_type: &str,
        item_id: &str,
        tag_id: &str,
    ) -> Result<bool, MemoryError> {
        let db = self.db(client_project_root).await?;
        let label = crate::repositories::label_for_entity_type(entity_type)?;
        let node_id = match label {
            "File" | "Tag" => item_id.to_string(),
            _ => crate::models::gid(repository, branch, item_id),
        };
        TagRepository::new(db)
            .add_item_tag(label, &node_id, tag_id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn items_by_tag(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        tag_id: &str,
        item_type_filter: Option<&str>,
    ) -> Result<Vec<JsonValue>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TagRepository::new(db)
            .find_items_by_tag(tag_id, item_type_filter)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------

    pub async fn update_context(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        date: Option<NaiveDate>,
        update: ContextUpdate,
    ) -> Result<Context, MemoryError> {
        let db = self.db(client_project_root).await?;
        let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        ContextRepository::new(db)
            .append(repository, branch, date, update)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Attaches the day's context to a component, decision, or rule.
    pub async fn attach_context(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        date: Option<NaiveDate>,
        entity_type: &str,
        item_id: &str,
    ) -> Result<(), MemoryError> {
        let db = self.db(client_project_root).await?;
        let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let label = crate::repositories::label_for_entity_type(entity_type)?;
        ContextRepository::new(db)
            .attach_to(repository, branch, date, label, item_id)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn latest_contexts(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Context>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ContextRepository::new(db)
            .latest(repository, branch, limit.unwrap_or(10))
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn context_by_date(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        date: NaiveDate,
    ) -> Result<Option<Context>, MemoryError> {
        let db = self.db(client_project_root).await?;
        ContextRepository::new(db)
            .find_by_date(repository, branch, date)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------

    pub async fn get_dependencies(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_dependencies(repository, component_id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_dependents(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_dependents(repository, component_id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn get_related(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
        options: TraversalOptions,
    ) -> Result<Vec<Component>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_related(repository, component_id, branch, options)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn shortest_path(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        start_id: &str,
        end_id: &str,
        options: TraversalOptions,
    ) -> Result<ShortestPath, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .find_shortest_path(repository, start_id, end_id, branch, options)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn contextual_history(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        item_id: &str,
        item_type: ContextItemType,
    ) -> Result<Vec<Context>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_item_contextual_history(repository, item_id, branch, item_type)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn governing_decisions(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<Decision>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_governing_decisions(repository, component_id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn governing_rules(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        component_id: &str,
    ) -> Result<Vec<Rule>, MemoryError> {
        let db = self.db(client_project_root).await?;
        TraversalRepository::new(db)
            .get_governing_rules(repository, component_id, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    // -----------------------------------------------------------------
    // Algorithms & detection
    // -----------------------------------------------------------------

    pub async fn k_core(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        k: i64,
    ) -> Result<Vec<KCoreEntry>, MemoryError> {
        let db = self.db(client_project_root).await?;
        AlgorithmRepository::new(db)
            .k_core(repository, branch, k)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn louvain(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<CommunityEntry>, MemoryError> {
        let db = self.db(client_project_root).await?;
        AlgorithmRepository::new(db)
            .louvain(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn page_rank(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        options: PageRankOptions,
    ) -> Result<Vec<RankEntry>, MemoryError> {
        let db = self.db(client_project_root).await?;
        AlgorithmRepository::new(db)
            .page_rank(repository, branch, options)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn strongly_connected(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<GroupEntry>, MemoryError> {
        let db = self.db(client_project_root).await?;
        AlgorithmRepository::new(db)
            .strongly_connected(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    pub async fn weakly_connected(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<GroupEntry>, MemoryError> {
        let db = self.db(client_project_root).await?;
        AlgorithmRepository::new(db)
            .weakly_connected(repository, branch)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Dependency cycles: SCC groups with more than one member.
    pub async fn detect_cycles(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<CycleGroup>, MemoryError> {
        let groups = self
            .strongly_connected(ctx, client_project_root, repository, branch)
            .await?;

        let mut by_group: std::collections::BTreeMap<i64, Vec<String>> = Default::default();
        for entry in groups {
            by_group
                .entry(entry.group)
                .or_default()
                .push(entry.component.id);
        }

        Ok(by_group
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(group, components)| CycleGroup { group, components })
            .collect())
    }

    /// Isolated components: WCC singletons.
    pub async fn detect_islands(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<String>, MemoryError> {
        let groups = self
            .weakly_connected(ctx, client_project_root, repository, branch)
            .await?;

        let mut by_group: std::collections::BTreeMap<i64, Vec<String>> = Default::default();
        for entry in groups {
            by_group
                .entry(entry.group)
                .or_default()
                .push(entry.component.id);
        }

        Ok(by_group
            .into_values()
            .filter(|members| members.len() == 1)
            .flatten()
            .collect())
    }

    // -----------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------

    pub async fn delete_entities(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        target: DeleteTarget,
        confirm: bool,
        dry_run: bool,
    ) -> Result<DeleteOutcome, MemoryError> {
        let db = self.db(client_project_root).await?;
        BulkRepository::new(db)
            .delete(repository, branch, target, confirm, dry_run)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Imports components in bulk, reporting progress as it goes.
    ///
    /// With `overwrite = false`, existing ids are skipped. Empty input is
    /// refused with a descriptive error.
    pub async fn import_components(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        items: Vec<ComponentInput>,
        overwrite: bool,
    ) -> Result<ImportOutcome, MemoryError> {
        if items.is_empty() {
            return Err(MemoryError::InvalidArgs(
                "bulk import requires at least one item".into(),
            ));
        }

        let db = self.db(client_project_root).await?;
        let components = ComponentRepository::new(db);
        let total = items.len();
        let mut outcome = ImportOutcome::default();

        for (index, item) in items.into_iter().enumerate() {
            let id = item.id.clone();
            if !overwrite {
                match components
                    .find_by_id_and_branch(repository, &id, branch)
                    .await
                {
                    Ok(Some(_)) => {
                        outcome.skipped += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        outcome.failed += 1;
                        outcome.errors.push(format!("{id}: {e}"));
                        continue;
                    }
                }
            }
            match components.upsert(repository, branch, item).await {
                Ok(_) => outcome.imported += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.errors.push(format!("{id}: {e}"));
                }
            }
            let percent = (((index + 1) * 100) / total) as u8;
            ctx.progress.send(
                "in_progress",
                format!("imported {}/{total} components", index + 1),
                percent.min(99),
            );
        }

        ctx.progress.complete(format!(
            "import finished: {} imported, {} skipped, {} failed",
            outcome.imported, outcome.skipped, outcome.failed
        ));
        Ok(outcome)
    }

    pub async fn import_decisions(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        items: Vec<DecisionInput>,
        overwrite: bool,
    ) -> Result<ImportOutcome, MemoryError> {
        if items.is_empty() {
            return Err(MemoryError::InvalidArgs(
                "bulk import requires at least one item".into(),
            ));
        }

        let db = self.db(client_project_root).await?;
        let decisions = DecisionRepository::new(db);
        let total = items.len();
        let mut outcome = ImportOutcome::default();

        for (index, item) in items.into_iter().enumerate() {
            let id = item.id.clone();
            if !overwrite {
                match decisions.find_by_id(repository, &id, branch).await {
                    Ok(Some(_)) => {
                        outcome.skipped += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        outcome.failed += 1;
                        outcome.errors.push(format!("{id}: {e}"));
                        continue;
                    }
                }
            }
            match decisions.upsert(repository, branch, item).await {
                Ok(_) => outcome.imported += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.errors.push(format!("{id}: {e}"));
                }
            }
            ctx.progress.send(
                "in_progress",
                format!("imported {}/{total} decisions", index + 1),
                ((((index + 1) * 100) / total) as u8).min(99),
            );
        }

        ctx.progress.complete(format!(
            "import finished: {} imported, {} skipped, {} failed",
            outcome.imported, outcome.skipped, outcome.failed
        ));
        Ok(outcome)
    }

    pub async fn import_rules(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        items: Vec<RuleInput>,
        overwrite: bool,
    ) -> Result<ImportOutcome, MemoryError> {
        if items.is_empty() {
            return Err(MemoryError::InvalidArgs(
                "bulk import requires at least one item".into(),
            ));
        }

        let db = self.db(client_project_root).await?;
        let rules = RuleRepository::new(db);
        let total = items.len();
        let mut outcome = ImportOutcome::default();

        for (index, item) in items.into_iter().enumerate() {
            let id = item.id.clone();
            if !overwrite {
                match rules.find_by_id(repository, &id, branch).await {
                    Ok(Some(_)) => {
                        outcome.skipped += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        outcome.failed += 1;
                        outcome.errors.push(format!("{id}: {e}"));
                        continue;
                    }
                }
            }
            match rules.upsert(repository, branch, item).await {
                Ok(_) => outcome.imported += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.errors.push(format!("{id}: {e}"));
                }
            }
            ctx.progress.send(
                "in_progress",
                format!("imported {}/{total} rules", index + 1),
                ((((index + 1) * 100) / total) as u8).min(99),
            );
        }

        ctx.progress.complete(format!(
            "import finished: {} imported, {} skipped, {} failed",
            outcome.imported, outcome.skipped, outcome.failed
        ));
        Ok(outcome)
    }

    // -----------------------------------------------------------------
    // Search & introspection
    // -----------------------------------------------------------------

    pub async fn keyword_search(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let db = self.db(client_project_root).await?;
        SearchRepository::new(db)
            .keyword(repository, branch, query, limit)
            .await
            .map_err(|e| Self::scope(e, ctx, repository, branch))
    }

    /// Node labels with their instance counts for (repository, branch).
    pub async fn introspect_labels(
        &self,
        ctx: &ToolCtx,
        client_project_root: &Path,
        repository: &str,
        branch: &str,
    ) -> Result<Vec<(String, i64)>, MemoryError> {
        use crate::graph::QueryExt;

        let db = self.db(client_project_root).await?;
        let repo_id = crate::models::repo_pk(repository, branch);
        let mut counts = Vec::new();
        for label in ["Component", "Decision", "Rule", "File", "Tag", "Context", "Metadata"] {
            let row = db
                .query(&format!(
                    "MATCH (n:{label})-[:PART_OF]->(r:Repository {{id: $repo_id}})
                     RETURN count(n) AS cnt"
                ))
                .param("repo_id", repo_id.as_str())
                .fetch_one()
                .await
                .map_err(|e| Self::scope(e, ctx, repository, branch))?;
            let count = match row {
                Some(row) => row.get_opt::<i64>("cnt")?.unwrap_or(0),
                None => 0,
            };
            counts.push((label.to_string(), count));
        }
        Ok(counts)
    }
}
