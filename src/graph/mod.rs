//! Graph abstraction layer for backend-agnostic database access.
//!
//! Repositories speak Cypher through [`CypherExecutor`] and read results as
//! [`Row`]s of a small [`Value`] sum type. The embedded engine hides behind
//! the object-safe [`GraphEngine`]/[`GraphConnection`] pair so the handle
//! manager (and tests) can swap it out.
//!
//! # Usage
//!
//! ```ignore
//! use kuzumem::graph::QueryExt;
//!
//! let rows = db
//!     .query("MATCH (c:Component) WHERE c.branch = $branch RETURN c")
//!     .param("branch", "main")
//!     .fetch_all()
//!     .await?;
//! ```

mod ident;
mod macros;
mod query;
mod traits;
mod value;

pub mod backends;

// Re-export core types
pub use ident::{require_identifier, sanitize_identifier, sanitize_rel_types};
pub use query::{Query, QueryExt};
pub use traits::{query_with_timeout, CypherExecutor, GraphConnection, GraphEngine};
pub use value::{timestamp_from_nanos, FromValue, Node, Params, Path, Rel, Row, Value};

// Re-export macro (defined at crate root via #[macro_export])
#[doc(inline)]
pub use crate::cypher;
