//! Slack MCP server with natural-language smart search
//!
//! The `search` module holds the pipeline (parse → retrieve → rank → group →
//! format); `slack`, `llm` and `embeddings` are its collaborators and `mcp`
//! exposes everything as tools over stdio.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod search;
pub mod slack;

pub use config::Config;
pub use search::{SearchRequest, SmartSearch};
