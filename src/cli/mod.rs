//! CLI for the memory bank.
//!
//! Subcommands:
//! - `init`: Initialize a project's memory bank
//! - `export` / `import`: YAML snapshots of the entity families
//! - `add-context`, `add-component`, `add-decision`, `add-rule`: quick writes
//! - `mcp`: Run the MCP server (stdio transport)
//! - `serve`: Run the MCP server (HTTP streaming transport)
//!
//! Every subcommand calls into the memory service; the CLI is not a
//! separate data path.

mod init;
mod mcp;
mod memory;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// KuzuMem - per-project graph memory bank
#[derive(Parser)]
#[command(name = "kuzumem")]
#[command(about = "Per-project graph memory bank - MCP server for engineering knowledge")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Arguments naming the memory bank a command works on.
#[derive(Debug, clap::Args)]
pub struct ScopeArgs {
    /// Project root holding the memory bank (defaults to
    /// CLIENT_PROJECT_ROOT, then the current directory)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Repository name
    #[arg(long)]
    pub repository: String,

    /// Branch name
    #[arg(long, default_value = "main")]
    pub branch: String,
}

impl ScopeArgs {
    /// Resolves the project root: flag, env default, current directory.
    pub fn resolve_root(&self) -> color_eyre::Result<PathBuf> {
        if let Some(root) = &self.project_root {
            return Ok(root.clone());
        }
        if let Some(root) = Config::default_client_project_root() {
            return Ok(root);
        }
        Ok(std::env::current_dir()?)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the memory bank for a project
    Init(ScopeArgs),

    /// Export entities to a YAML snapshot
    Export {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import entities from a YAML snapshot
    Import {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Snapshot file to read
        #[arg(long, short)]
        input: PathBuf,

        /// Overwrite existing entities instead of skipping them
        #[arg(long)]
        overwrite: bool,
    },

    /// Append to today's working context
    AddContext {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        decision: Option<String>,

        #[arg(long)]
        observation: Option<String>,

        #[arg(long)]
        agent: Option<String>,
    },

    /// Create or update a component
    AddComponent {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        kind: Option<String>,

        /// active, deprecated, or planned
        #[arg(long)]
        status: Option<String>,

        /// Dependency logical ids (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },

    /// Record a decision
    AddDecision {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        context: Option<String>,

        /// Decision date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a rule
    AddRule {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        content: Option<String>,

        /// Trigger names (repeatable)
        #[arg(long = "trigger")]
        triggers: Vec<String>,

        #[arg(long)]
        status: Option<String>,
    },

    /// Run the MCP server (stdio transport for local use)
    Mcp,

    /// Run the MCP server (HTTP streaming transport)
    Serve {
        /// Host address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Init(scope) => init::run_init(scope).await,
            Command::Export { scope, output } => memory::run_export(scope, output).await,
            Command::Import {
                scope,
                input,
                overwrite,
            } => memory::run_import(scope, input, overwrite).await,
            Command::AddContext {
                scope,
                summary,
                decision,
                observation,
                agent,
            } => memory::run_add_context(scope, summary, decision, observation, agent).await,
            Command::AddComponent {
                scope,
                id,
                name,
                kind,
                status,
                depends_on,
            } => memory::run_add_component(scope, id, name, kind, status, depends_on).await,
            Command::AddDecision {
                scope,
                id,
                name,
                context,
                date,
            } => memory::run_add_decision(scope, id, name, context, date).await,
            Command::AddRule {
                scope,
                id,
                name,
                content,
                triggers,
                status,
            } => memory::run_add_rule(scope, id, name, content, triggers, status).await,
            Command::Mcp => mcp::run_mcp().await,
            Command::Serve { host, port } => serve::run_serve(host, port).await,
        }
    }
}
