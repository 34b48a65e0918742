//! Domain models for the memory bank graph.

mod entities;
mod ids;

pub use entities::{
    Component, ComponentStatus, Context, Decision, File, FileMetadata, Metadata, Repository, Rule,
    Tag,
};
pub use ids::{gid, parse_gid, repo_pk};
