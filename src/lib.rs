//! KuzuMem - Per-Project Graph Memory Bank MCP Server
//!
//! Structured software engineering knowledge (components, decisions,
//! rules, files, tags, daily contexts) stored per project root in an
//! embedded graph database and exposed over the Model Context Protocol.

pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod di;
pub mod error;
pub mod graph;
pub mod mcp;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export FromRef at crate root for di-macros generated code
pub use di::FromRef;
