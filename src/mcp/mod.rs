//! MCP server: session state, protocol helpers, and the tool surface.

pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use server::McpServer;
