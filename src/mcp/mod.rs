//! MCP (Model Context Protocol) server
//!
//! JSON-RPC 2.0 over stdio. No external SDK - blocking I/O, minimal dependencies.
//! Slack tools are thin wrappers; `slack_smart_search` runs the search pipeline.

mod protocol;
mod server;
mod tools;

pub use protocol::{Request, Response};
pub use server::{run_mcp_server, serve, McpServer};
pub use tools::{list_channels, NOT_INITIALIZED};
